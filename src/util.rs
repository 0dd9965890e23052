use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;
use flate2::read::GzDecoder;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::WalkDir;
use crate::error::{GvmError, Result};

/// Subdirectory of a Go root that holds the `go` binary.
pub const BIN_DIR: &str = "bin";

#[cfg(target_os = "windows")]
pub const GO_BINARY: &str = "go.exe";
#[cfg(not(target_os = "windows"))]
pub const GO_BINARY: &str = "go";

#[cfg(target_os = "windows")]
pub const SEARCH_PATH_SEPARATOR: char = ';';
#[cfg(not(target_os = "windows"))]
pub const SEARCH_PATH_SEPARATOR: char = ':';

/// Strips the `sha256:` prefix from a hash if present.
pub fn format_hash(hash: &str) -> String {
    hash.strip_prefix("sha256:").unwrap_or(hash).to_string()
}

/// Strips the `go` language tag from a catalog version (`go1.22.0` -> `1.22.0`).
pub fn strip_version_tag(version: &str) -> &str {
    version.strip_prefix("go").unwrap_or(version)
}

/// Returns the Go `(os, arch)` pair of the host, as named in the catalog.
pub fn current_platform() -> (&'static str, &'static str) {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "arm" => "armv6l",
        "powerpc64" => "ppc64le",
        other => other,
    };
    (os, arch)
}

/// Path of the `go` binary inside a Go root.
pub fn go_binary(root: &Path) -> PathBuf {
    root.join(BIN_DIR).join(GO_BINARY)
}

/// Computes the lowercase hex SHA-256 of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .map_err(|e| GvmError::fs(format!("Unable to open {}", path.display()), e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)
        .map_err(|e| GvmError::fs(format!("Unable to read {}", path.display()), e))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Checks a file against an expected SHA-256, ignoring case and a `sha256:` prefix.
pub fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(path)?;
    let expected = format_hash(expected.trim());
    if !actual.eq_ignore_ascii_case(&expected) {
        return Err(GvmError::Integrity { expected, actual });
    }
    debug!("checksum of {} verified", path.display());
    Ok(())
}

/// Runs `program` with `args` and returns its standard output.
///
/// # Errors
/// [`GvmError::ToolchainNotFound`] if the program cannot be started.
pub fn run_command(program: &Path, args: &[&str]) -> Result<String> {
    debug!("running {} {}", program.display(), args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|_| GvmError::ToolchainNotFound(program.to_path_buf()))?;
    if !output.status.success() {
        warn!(
            "{} exited with {}: {}",
            program.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Extracts the version from `go version` output (`go version go1.21.3 linux/amd64` -> `1.21.3`).
pub fn parse_go_version(output: &str) -> Option<String> {
    let re = Regex::new(r"(?m)^\s*go\s+version\s+go(\S+)").ok()?;
    re.captures(output).map(|caps| caps[1].to_string())
}

/// Unpacks a `.zip` or `.tar.gz` archive into `dest`.
pub fn unpack_archive(archive: &Path, dest: &Path) -> Result<()> {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let file = File::open(archive)
        .map_err(|e| GvmError::fs(format!("Unable to open {}", archive.display()), e))?;
    debug!("unpacking {} into {}", archive.display(), dest.display());

    if name.ends_with(".zip") {
        let mut zip = zip::ZipArchive::new(BufReader::new(file))
            .map_err(|e| GvmError::Unpack(e.to_string()))?;
        zip.extract(dest).map_err(|e| GvmError::Unpack(e.to_string()))?;
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
        tar.unpack(dest).map_err(|e| GvmError::Unpack(e.to_string()))?;
    } else {
        return Err(GvmError::Unpack(format!("unsupported archive {}", name)));
    }
    Ok(())
}

/// Deletes a directory tree, including read-only entries such as Go's module cache.
///
/// Returns `Ok(false)` if the directory did not exist.
pub fn remove_dir_tolerant(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(|e| {
            GvmError::fs(
                format!("Unable to walk {}", path.display()),
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
            )
        })?;
        make_writable(entry.path());
    }
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(GvmError::fs(format!("Unable to remove {}", path.display()), e)),
    }
}

#[cfg(unix)]
fn make_writable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = std::fs::symlink_metadata(path) {
        if meta.file_type().is_symlink() {
            return;
        }
        let mode = meta.permissions().mode();
        if mode & 0o200 == 0 {
            let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode | 0o200));
        }
    }
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn make_writable(path: &Path) {
    if let Ok(meta) = std::fs::metadata(path) {
        let mut perms = meta.permissions();
        if perms.readonly() {
            perms.set_readonly(false);
            let _ = std::fs::set_permissions(path, perms);
        }
    }
}

/// Splits a search path value, dropping empty entries.
pub fn split_search_path(value: &str) -> Vec<String> {
    value
        .split(SEARCH_PATH_SEPARATOR)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_search_path(entries: &[String]) -> String {
    entries.join(&SEARCH_PATH_SEPARATOR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_format_hash_removes_prefix() {
        assert_eq!(format_hash("sha256:abcdef123456"), "abcdef123456");
        assert_eq!(format_hash("abcdef123456"), "abcdef123456");
    }

    #[test]
    fn test_strip_version_tag() {
        assert_eq!(strip_version_tag("go1.22.0"), "1.22.0");
        assert_eq!(strip_version_tag("1.22.0"), "1.22.0");
    }

    #[test]
    fn test_sha256_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hello");
        std::fs::write(&path, "hello").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_verify_checksum_ignores_case() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hello");
        std::fs::write(&path, "hello").unwrap();
        let upper = "2CF24DBA5FB0A30E26E83B2AC5B9E29E1B161E5C1FA7425E73043362938B9824";
        assert!(verify_checksum(&path, upper).is_ok());
        assert!(verify_checksum(&path, &format!("sha256:{}", upper.to_lowercase())).is_ok());
    }

    #[test]
    fn test_verify_checksum_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hello");
        std::fs::write(&path, "hello!").unwrap();
        let err = verify_checksum(
            &path,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
        )
        .unwrap_err();
        assert!(matches!(err, GvmError::Integrity { .. }));
    }

    #[test]
    fn test_parse_go_version() {
        assert_eq!(
            parse_go_version("go version go1.21.3 linux/amd64\n").as_deref(),
            Some("1.21.3")
        );
        assert_eq!(
            parse_go_version("go version go1.22rc1 windows/amd64").as_deref(),
            Some("1.22rc1")
        );
        assert_eq!(parse_go_version("gofmt version 1"), None);
        assert_eq!(parse_go_version(""), None);
    }

    #[test]
    fn test_current_platform_is_mapped() {
        let (os, arch) = current_platform();
        assert_ne!(os, "macos");
        assert_ne!(arch, "x86_64");
        assert_ne!(arch, "aarch64");
    }

    #[test]
    fn test_unpack_tar_gz() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("go.tar.gz");
        {
            let file = File::create(&archive).unwrap();
            let enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(enc);
            let data = b"#!/bin/sh\n";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, "go/bin/go", &data[..]).unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }
        let dest = dir.path().join("out");
        std::fs::create_dir_all(&dest).unwrap();
        unpack_archive(&archive, &dest).unwrap();
        assert!(dest.join("go").join("bin").join("go").is_file());
    }

    #[test]
    fn test_unpack_unknown_archive() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("go.msi");
        std::fs::write(&archive, "").unwrap();
        assert!(matches!(unpack_archive(&archive, dir.path()), Err(GvmError::Unpack(_))));
    }

    #[test]
    fn test_remove_dir_tolerant() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("install");
        let nested = target.join("workspace").join("pkg");
        std::fs::create_dir_all(&nested).unwrap();
        let file = nested.join("mod.go");
        std::fs::write(&file, "package x").unwrap();
        let mut perms = std::fs::metadata(&file).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(&file, perms).unwrap();

        assert!(remove_dir_tolerant(&target).unwrap());
        assert!(!target.exists());
        assert!(!remove_dir_tolerant(&target).unwrap());
    }

    #[test]
    fn test_split_and_join_search_path() {
        let sep = SEARCH_PATH_SEPARATOR;
        let value = format!("a{sep}{sep}b{sep}");
        let entries = split_search_path(&value);
        assert_eq!(entries, vec!["a", "b"]);
        assert_eq!(join_search_path(&entries), format!("a{sep}b"));
        assert!(split_search_path("").is_empty());
    }
}
