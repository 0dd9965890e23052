use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use crate::activation::{activate, clear_activation, deactivate};
use crate::catalog::{find_version, Catalog, RemoteVersion};
use crate::download::{DownloadStatus, Downloader};
use crate::environment::{EnvironmentStore, Scope};
use crate::error::{GvmError, Result};
use crate::registry::{InstallationRecord, Registry};
use crate::util::{current_platform, go_binary, parse_go_version, remove_dir_tolerant, run_command, unpack_archive, verify_checksum};

/// Catalog file kind that holds a ready-to-unpack Go root.
pub const ARCHIVE_KIND: &str = "archive";
/// Directory the Go archives unpack their root into.
pub const ARCHIVE_ROOT: &str = "go";

/// Downloads, verifies and registers Go `version` from the catalog.
///
/// Returns the index of the new installation. The registry is only saved once the
/// archive is verified and unpacked; a failed checksum leaves the download in
/// place for inspection.
pub fn install_remote(
    registry: &mut Registry,
    catalog: &dyn Catalog,
    downloader: &dyn Downloader,
    version: &str,
) -> Result<usize> {
    if registry.find_remote_version(version).is_some() {
        return Err(GvmError::AlreadyInstalled(version.to_string()));
    }

    let versions = catalog.fetch()?;
    let remote = find_version(&versions, version)
        .ok_or_else(|| GvmError::VersionNotFound(version.to_string()))?;
    println!("Version match found for {}...", version);

    let (os, arch) = current_platform();
    let file = remote
        .find_file(os, arch, ARCHIVE_KIND)
        .ok_or_else(|| GvmError::PlatformUnavailable {
            version: version.to_string(),
            os: os.to_string(),
            arch: arch.to_string(),
        })?;
    println!("Found a download candidate for {}/{}...", os, arch);

    let record = InstallationRecord::new(
        remote.bare_version(),
        PathBuf::new(),
        false,
        remote.stable,
    );
    let install_dir = registry.installation_dir(&record.id);
    std::fs::create_dir_all(&install_dir).map_err(|e| {
        GvmError::fs(
            format!("Unable to create {} in the data directory", install_dir.display()),
            e,
        )
    })?;

    let url = catalog.download_url(file);
    let archive = install_dir.join(&file.filename);
    println!("Downloading file: {}", url);
    match downloader.download(&url, &archive) {
        DownloadStatus::Completed => println!("Download completed..."),
        DownloadStatus::Failed(reason) => return Err(GvmError::Download(reason)),
        DownloadStatus::Incomplete { expected, received } => {
            return Err(GvmError::Download(format!(
                "received {} of {} bytes",
                received, expected
            )));
        }
    }

    verify_checksum(&archive, &file.sha256)?;
    unpack_archive(&archive, &install_dir)?;

    let record = InstallationRecord {
        path: install_dir.join(ARCHIVE_ROOT),
        ..record
    };
    info!("registering go {} at {}", record.version, record.path.display());
    let index = registry.add(record);
    registry.save()?;
    Ok(index)
}

/// Registers an existing Go root at `path`.
///
/// The version is read from `go version`; stability is looked up in the catalog on
/// a best-effort basis and defaults to unstable, also when no catalog is at hand.
pub fn install_local(
    registry: &mut Registry,
    catalog: Option<&dyn Catalog>,
    path: &Path,
) -> Result<usize> {
    let full_path = absolute(path)?;
    if registry.find_by_path(&full_path).is_some() {
        return Err(GvmError::AlreadyManaged(full_path));
    }

    let binary = go_binary(&full_path);
    let output = run_command(&binary, &["version"])?;
    let version = parse_go_version(&output).ok_or(GvmError::ToolchainNotFound(binary))?;
    debug!("{} reports go {}", full_path.display(), version);

    let stable = match catalog.map(|catalog| detect_stability(catalog, &version)) {
        Some(Ok(stable)) => {
            println!("Version matched with server!");
            stable
        }
        Some(Err(e)) => {
            warn!("stability lookup for {} failed: {}", version, e);
            println!("{} Setting stability to unstable!", e);
            false
        }
        None => {
            warn!("no catalog available to look up go {}", version);
            println!("Version catalog unavailable. Setting stability to unstable!");
            false
        }
    };

    let record = InstallationRecord::new(&version, full_path, true, stable);
    let index = registry.add(record);
    registry.save()?;
    Ok(index)
}

/// Looks `version` up in the catalog and returns whether it is a stable release.
pub fn detect_stability(catalog: &dyn Catalog, version: &str) -> Result<bool> {
    let versions = catalog.fetch()?;
    find_version(&versions, version)
        .map(|remote| remote.stable)
        .ok_or_else(|| GvmError::VersionNotFound(version.to_string()))
}

/// Removes the installation at the user-supplied `index`.
///
/// `confirm` is asked before anything is touched; a negative answer yields
/// [`GvmError::Declined`]. Files `gvm` created for the installation are deleted,
/// the installation is deactivated if it is the current one, and the registry is
/// saved once at the end.
pub fn remove_installation<F>(
    registry: &mut Registry,
    env: &mut dyn EnvironmentStore,
    scope: Scope,
    index: &str,
    confirm: F,
) -> Result<InstallationRecord>
where
    F: FnOnce(&InstallationRecord) -> bool,
{
    let index = registry.resolve_index(index)?;
    let record = registry.get(index)?.clone();
    if !confirm(&record) {
        return Err(GvmError::Declined);
    }

    let install_dir = registry.installation_dir(&record.id);
    println!("Deleting installation at {}", record.path.display());
    if !remove_dir_tolerant(&install_dir)? {
        warn!("{} not found, removing the entry anyway", install_dir.display());
        println!("Directory not found! Removing entry anyway!");
    }

    if registry.is_current(&record) {
        clear_activation(registry, env, scope)?;
    }
    let removed = registry.remove_at(index)?;
    registry.save()?;
    Ok(removed)
}

/// Activates the installation at the user-supplied `index`.
pub fn set_installation<'a>(
    registry: &'a mut Registry,
    env: &mut dyn EnvironmentStore,
    scope: Scope,
    index: &str,
) -> Result<&'a InstallationRecord> {
    let index = registry.resolve_index(index)?;
    activate(registry, index, env, scope)?;
    registry.get(index)
}

/// Deactivates whatever is active.
pub fn unset_installation(
    registry: &mut Registry,
    env: &mut dyn EnvironmentStore,
    scope: Scope,
) -> Result<()> {
    deactivate(registry, env, scope)
}

/// The active installation, if any.
pub fn current_installation(registry: &Registry) -> Result<Option<&InstallationRecord>> {
    registry.current_installation()
}

/// Every installation with its index and whether it is the active one.
pub fn list_installations(registry: &Registry) -> Vec<(usize, &InstallationRecord, bool)> {
    registry
        .installations()
        .iter()
        .enumerate()
        .map(|(index, record)| (index, record, registry.is_current(record)))
        .collect()
}

/// Every release the catalog offers, in catalog order.
pub fn list_remote(catalog: &dyn Catalog) -> Result<Vec<RemoteVersion>> {
    catalog.fetch()
}

/// Absolute form of `path` with `.` and `..` resolved lexically.
fn absolute(path: &Path) -> Result<PathBuf> {
    let full = std::path::absolute(path)
        .map_err(|e| GvmError::fs(format!("Unable to resolve {}", path.display()), e))?;
    let mut normalized = PathBuf::new();
    for component in full.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}
