use std::path::PathBuf;
use directories::BaseDirs;
use crate::error::{GvmError, Result};

/// Name of the save file, both next to the executable and in the home directory.
pub const SAVE_FILE: &str = ".gvm";
/// Name of the directory holding downloaded toolchains.
pub const DATA_DIRECTORY: &str = "gvm-data";
/// Name of the per-user environment profile written on activation.
pub const USER_ENV_FILE: &str = ".gvm-env";
/// Machine-wide environment profile, used when running as root.
pub const MACHINE_ENV_FILE: &str = "/etc/profile.d/gvm.sh";

/// Overrides the home directory used for the save file, data directory and user profile.
pub const HOME_OVERRIDE_VAR: &str = "GVM_HOME";

/// Returns the home directory `gvm` keeps its per-user state in.
///
/// `GVM_HOME` takes precedence over the platform home directory.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_OVERRIDE_VAR).filter(|h| !h.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    let dirs = BaseDirs::new().ok_or_else(|| GvmError::ConfigDirectoryError {
        path: PathBuf::from("~"),
        source: std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "could not determine the home directory",
        ),
    })?;
    Ok(dirs.home_dir().to_path_buf())
}

/// Returns `<home>/.gvm`.
pub fn get_user_save_file() -> Result<PathBuf> {
    Ok(get_home_dir()?.join(SAVE_FILE))
}

/// Returns `<exe dir>/.gvm`, if the executable location is known.
pub fn get_local_save_file() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(SAVE_FILE))
}

/// Returns `<home>/gvm-data`.
pub fn get_default_data_dir() -> Result<PathBuf> {
    Ok(get_home_dir()?.join(DATA_DIRECTORY))
}

/// Returns `<home>/.gvm-env`.
pub fn get_user_env_file() -> Result<PathBuf> {
    Ok(get_home_dir()?.join(USER_ENV_FILE))
}

/// Picks the save file to use.
///
/// A save file next to the executable wins over the per-user one. When neither exists
/// the per-user location is returned so it can be created there.
pub fn locate_save_file() -> Result<PathBuf> {
    let user = get_user_save_file()?;
    Ok(choose_save_file(get_local_save_file(), user))
}

fn choose_save_file(local: Option<PathBuf>, user: PathBuf) -> PathBuf {
    match local {
        Some(local) if local.is_file() => local,
        _ => user,
    }
}
