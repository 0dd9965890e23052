use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::{GvmError, Result};
use crate::util::strip_version_tag;

/// Default catalog of every published Go release.
pub const DEFAULT_CATALOG_URL: &str = "https://go.dev/dl/?mode=json&include=all";
/// Default base URL artifact file names are appended to.
pub const DEFAULT_DOWNLOAD_URL: &str = "https://go.dev/dl/";
/// Overrides [`DEFAULT_CATALOG_URL`].
pub const CATALOG_URL_VAR: &str = "GVM_CATALOG_URL";
/// Overrides [`DEFAULT_DOWNLOAD_URL`].
pub const DOWNLOAD_URL_VAR: &str = "GVM_DOWNLOAD_URL";

/// A Go release as published in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteVersion {
    /// Tagged version, e.g. `go1.22.0`.
    pub version: String,
    pub stable: bool,
    #[serde(default)]
    pub files: Vec<RemoteFile>,
}

/// One downloadable artifact of a release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteFile {
    pub filename: String,
    pub os: String,
    pub arch: String,
    #[serde(default)]
    pub version: String,
    /// Hex SHA-256 of the artifact.
    pub sha256: String,
    #[serde(default)]
    pub size: u64,
    /// `archive`, `installer` or `source`.
    pub kind: String,
}

impl RemoteVersion {
    /// The version with its `go` tag stripped, as stored in the registry.
    pub fn bare_version(&self) -> &str {
        strip_version_tag(&self.version)
    }

    /// Finds the artifact for the given platform and kind.
    pub fn find_file(&self, os: &str, arch: &str, kind: &str) -> Option<&RemoteFile> {
        self.files
            .iter()
            .find(|file| file.os == os && file.arch == arch && file.kind == kind)
    }
}

/// Finds the release whose tag-stripped version equals `version` exactly.
pub fn find_version<'a>(versions: &'a [RemoteVersion], version: &str) -> Option<&'a RemoteVersion> {
    versions.iter().find(|remote| remote.bare_version() == version)
}

/// Source of the available Go releases.
pub trait Catalog {
    /// Fetches the list of releases, fresh on every call.
    fn fetch(&self) -> Result<Vec<RemoteVersion>>;

    /// URL an artifact of this catalog is downloaded from.
    fn download_url(&self, file: &RemoteFile) -> String;
}

/// The go.dev JSON catalog.
pub struct HttpCatalog {
    client: Client,
    catalog_url: String,
    download_url: String,
}

impl HttpCatalog {
    /// Creates a catalog client for go.dev, honouring `GVM_CATALOG_URL` and `GVM_DOWNLOAD_URL`.
    pub fn new() -> Result<Self> {
        let catalog_url = std::env::var(CATALOG_URL_VAR)
            .unwrap_or_else(|_| DEFAULT_CATALOG_URL.to_string());
        let download_url = std::env::var(DOWNLOAD_URL_VAR)
            .unwrap_or_else(|_| DEFAULT_DOWNLOAD_URL.to_string());
        let client = Client::builder()
            .user_agent(concat!("gvm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GvmError::Catalog(e.to_string()))?;
        Ok(Self::with_client(client, catalog_url, download_url))
    }

    pub fn with_client(client: Client, catalog_url: String, download_url: String) -> Self {
        Self {
            client,
            catalog_url,
            download_url,
        }
    }
}

impl Catalog for HttpCatalog {
    fn fetch(&self) -> Result<Vec<RemoteVersion>> {
        debug!("fetching catalog from {}", self.catalog_url);
        let response = self
            .client
            .get(&self.catalog_url)
            .send()
            .map_err(|e| GvmError::Catalog(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GvmError::Catalog(format!(
                "{} answered with {}",
                self.catalog_url,
                response.status()
            )));
        }
        let body = response.text().map_err(|e| GvmError::Catalog(e.to_string()))?;
        let versions: Vec<RemoteVersion> =
            serde_json::from_str(&body).map_err(|e| GvmError::Catalog(e.to_string()))?;
        debug!("catalog lists {} versions", versions.len());
        Ok(versions)
    }

    fn download_url(&self, file: &RemoteFile) -> String {
        format!("{}{}", self.download_url, file.filename)
    }
}
