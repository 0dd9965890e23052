//! Artifact download.
//!
//! Large files on servers that accept byte ranges are fetched in concurrent
//! segments, everything else as a single stream. Either way the caller only sees
//! the final [`DownloadStatus`] once every transfer has finished.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::Path;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

/// Servers must advertise at least this many bytes before the file is split up.
pub const MIN_SEGMENTED_SIZE: u64 = 1024 * 1024;
pub const MAX_SEGMENTS: usize = 8;

/// Terminal state of a download. Only [`DownloadStatus::Completed`] means the file is usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    Completed,
    Failed(String),
    Incomplete { expected: u64, received: u64 },
}

impl DownloadStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, DownloadStatus::Completed)
    }
}

/// Fetches a URL into a file on disk.
pub trait Downloader {
    fn download(&self, url: &str, dest: &Path) -> DownloadStatus;
}

pub struct HttpDownloader {
    client: Client,
    max_segments: usize,
    min_segmented_size: u64,
}

impl HttpDownloader {
    pub fn new() -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("gvm/", env!("CARGO_PKG_VERSION")))
            .timeout(None::<std::time::Duration>)
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            max_segments: MAX_SEGMENTS,
            min_segmented_size: MIN_SEGMENTED_SIZE,
        }
    }

    /// Changes how many segments are used and from which size on.
    pub fn with_segments(mut self, max_segments: usize, min_segmented_size: u64) -> Self {
        self.max_segments = max_segments.max(1);
        self.min_segmented_size = min_segmented_size;
        self
    }

    /// Asks the server for the length and whether it serves byte ranges.
    fn probe(&self, url: &str) -> (Option<u64>, bool) {
        let response = match self.client.head(url).send() {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!("HEAD {} answered {}", url, response.status());
                return (None, false);
            }
            Err(e) => {
                debug!("HEAD {} failed: {}", url, e);
                return (None, false);
            }
        };
        let headers = response.headers();
        let length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let ranges = headers
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("bytes"));
        (length, ranges)
    }

    fn download_single(&self, url: &str, dest: &Path, expected: Option<u64>) -> DownloadStatus {
        let mut response = match self.client.get(url).send().and_then(|r| r.error_for_status()) {
            Ok(response) => response,
            Err(e) => return DownloadStatus::Failed(e.to_string()),
        };
        let expected = expected.or_else(|| response.content_length());
        let mut file = match File::create(dest) {
            Ok(file) => file,
            Err(e) => return DownloadStatus::Failed(format!("{}: {}", dest.display(), e)),
        };
        let received = match std::io::copy(&mut response, &mut file) {
            Ok(received) => received,
            Err(e) => return DownloadStatus::Failed(e.to_string()),
        };
        match expected {
            Some(expected) if expected != received => {
                DownloadStatus::Incomplete { expected, received }
            }
            _ => DownloadStatus::Completed,
        }
    }

    fn download_segmented(&self, url: &str, dest: &Path, total: u64) -> DownloadStatus {
        let file = match File::create(dest) {
            Ok(file) => file,
            Err(e) => return DownloadStatus::Failed(format!("{}: {}", dest.display(), e)),
        };
        if let Err(e) = file.set_len(total) {
            return DownloadStatus::Failed(e.to_string());
        }
        drop(file);

        let segments = split_ranges(total, self.max_segments);
        debug!("downloading {} in {} segments", url, segments.len());
        let results: Vec<Result<u64, String>> = std::thread::scope(|scope| {
            let handles: Vec<_> = segments
                .iter()
                .map(|&(start, end)| scope.spawn(move || self.fetch_range(url, dest, start, end)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err("download segment panicked".to_string()))
                })
                .collect()
        });

        let mut received = 0;
        for result in results {
            match result {
                Ok(bytes) => received += bytes,
                Err(e) => return DownloadStatus::Failed(e),
            }
        }
        if received != total {
            return DownloadStatus::Incomplete {
                expected: total,
                received,
            };
        }
        DownloadStatus::Completed
    }

    /// Fetches the inclusive byte range `start..=end` into the same offset of `dest`.
    fn fetch_range(&self, url: &str, dest: &Path, start: u64, end: u64) -> Result<u64, String> {
        let mut response = self
            .client
            .get(url)
            .header(RANGE, format!("bytes={}-{}", start, end))
            .send()
            .map_err(|e| e.to_string())?;
        if response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(format!(
                "range {}-{} answered with {}",
                start,
                end,
                response.status()
            ));
        }
        let mut file = OpenOptions::new()
            .write(true)
            .open(dest)
            .map_err(|e| e.to_string())?;
        file.seek(SeekFrom::Start(start)).map_err(|e| e.to_string())?;
        let mut limited = std::io::Read::take(&mut response, end - start + 1);
        std::io::copy(&mut limited, &mut file).map_err(|e| e.to_string())
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> DownloadStatus {
        info!("downloading {}", url);
        let (length, ranges) = self.probe(url);
        let status = match length {
            Some(total) if ranges && self.max_segments > 1 && total >= self.min_segmented_size => {
                self.download_segmented(url, dest, total)
            }
            _ => self.download_single(url, dest, length),
        };
        if !status.is_completed() {
            warn!("download of {} ended with {:?}", url, status);
        }
        status
    }
}

/// Splits `0..total` into at most `segments` inclusive ranges of near-equal size.
fn split_ranges(total: u64, segments: usize) -> Vec<(u64, u64)> {
    if total == 0 {
        return Vec::new();
    }
    let segments = (segments.max(1) as u64).min(total);
    let size = total.div_ceil(segments);
    (0..segments)
        .map(|i| (i * size, ((i + 1) * size).min(total) - 1))
        .filter(|(start, end)| start <= end)
        .collect()
}
