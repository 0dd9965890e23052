use std::path::PathBuf;
use thiserror::Error;

/// Broad failure category. The CLI exits with a distinct status for `Config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Catalog,
    Download,
    Integrity,
    Filesystem,
    Environment,
    UserInput,
}

/// Every way a `gvm` operation can fail.
///
/// Any failure raised before the registry is saved leaves the save file untouched.
#[derive(Debug, Error)]
pub enum GvmError {
    #[error("Unable to read save file {path}: {message}")]
    ConfigUnreadable { path: PathBuf, message: String },

    #[error("Unable to create data directory {path}: {source}")]
    ConfigDirectoryError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to write save file {path}: {source}")]
    ConfigWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to get or deserialize the version catalog: {0}")]
    Catalog(String),

    #[error("Unable to match version {0}! Check `gvm list --remote` for available versions.")]
    VersionNotFound(String),

    #[error("Go {version} is not available for this platform ({os}/{arch})")]
    PlatformUnavailable {
        version: String,
        os: String,
        arch: String,
    },

    #[error("Go {0} is already installed! You may remove and install it again.")]
    AlreadyInstalled(String),

    #[error("The installation at {0} is already managed by gvm!")]
    AlreadyManaged(PathBuf),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Checksum verification failed! expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    #[error("{message}: {source}")]
    Filesystem {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to extract archive: {0}")]
    Unpack(String),

    #[error("Unable to create workspace directory {path}: {source}")]
    WorkspaceCreateError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to access environment: {0}")]
    EnvironmentAccessError(String),

    #[error("Index {index} does not exist ({len} installations)! Use an index listed in `gvm list`.")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Unable to parse index {0:?}! Use an index listed in `gvm list`.")]
    InvalidIndex(String),

    #[error("Aborted, nothing was removed.")]
    Declined,

    #[error("Unable to find a go executable at {0}")]
    ToolchainNotFound(PathBuf),

    #[error("Save file is misconfigured: current installation {0} does not exist")]
    MisconfiguredState(String),

    #[error("Installation {0} is still active, unset it before removing it")]
    StillActive(String),
}

impl GvmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GvmError::ConfigUnreadable { .. }
            | GvmError::ConfigDirectoryError { .. }
            | GvmError::ConfigWriteError { .. }
            | GvmError::MisconfiguredState(_)
            | GvmError::StillActive(_) => ErrorKind::Config,
            GvmError::Catalog(_)
            | GvmError::VersionNotFound(_)
            | GvmError::PlatformUnavailable { .. } => ErrorKind::Catalog,
            GvmError::Download(_) => ErrorKind::Download,
            GvmError::Integrity { .. } => ErrorKind::Integrity,
            GvmError::Filesystem { .. }
            | GvmError::Unpack(_)
            | GvmError::WorkspaceCreateError { .. }
            | GvmError::ToolchainNotFound(_) => ErrorKind::Filesystem,
            GvmError::EnvironmentAccessError(_) => ErrorKind::Environment,
            GvmError::AlreadyInstalled(_)
            | GvmError::AlreadyManaged(_)
            | GvmError::IndexOutOfRange { .. }
            | GvmError::InvalidIndex(_)
            | GvmError::Declined => ErrorKind::UserInput,
        }
    }

    pub(crate) fn fs(message: impl Into<String>, source: std::io::Error) -> Self {
        GvmError::Filesystem {
            message: message.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, GvmError>;
