use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;
use crate::error::{GvmError, Result};
use crate::paths::{get_default_data_dir, locate_save_file};

/// Subdirectory of an installation directory that becomes `GOPATH` when it is active.
pub const WORKSPACE_DIR: &str = "workspace";

/// One Go toolchain tracked by `gvm`, either downloaded or pointed at by the user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct InstallationRecord {
    /// Generated token, unique within the registry.
    pub id: String,
    /// Version without the `go` tag, e.g. `1.22.0`.
    pub version: String,
    /// Absolute path of the toolchain root (`GOROOT`).
    pub path: PathBuf,
    /// `true` when the user registered an existing toolchain.
    pub local: bool,
    pub stable: bool,
}

impl InstallationRecord {
    pub fn new(version: &str, path: PathBuf, local: bool, stable: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            version: version.to_string(),
            path,
            local,
            stable,
        }
    }

    /// Short description used by `list` and `current`, e.g. `1.22.0 (Local, Stable) @ /opt/go`.
    pub fn describe(&self) -> String {
        format!(
            "{} ({}{}) @ {}",
            self.version,
            if self.local { "Local, " } else { "" },
            if self.stable { "Stable" } else { "Unstable" },
            self.path.display()
        )
    }
}

/// The persisted set of installations and the active-selection pointer.
///
/// Loaded once per command, mutated in memory and written back with [`Registry::save`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    data_directory: PathBuf,
    #[serde(default, deserialize_with = "nullable_vec")]
    installations: Vec<InstallationRecord>,
    #[serde(
        default,
        serialize_with = "empty_if_none",
        deserialize_with = "none_if_empty"
    )]
    current: Option<String>,
    #[serde(default, deserialize_with = "nullable_string")]
    current_bin_path: String,
    #[serde(skip)]
    save_path: PathBuf,
}

impl Registry {
    /// Creates an empty registry that will be saved at `save_path`.
    pub fn new<P: AsRef<Path>>(save_path: P, data_directory: PathBuf) -> Self {
        Self {
            data_directory,
            installations: Vec::new(),
            current: None,
            current_bin_path: String::new(),
            save_path: save_path.as_ref().to_path_buf(),
        }
    }

    /// Loads the registry from its preferred location, creating a default one if needed.
    pub fn load() -> Result<Self> {
        let save_path = locate_save_file()?;
        Self::load_from(save_path, get_default_data_dir()?)
    }

    /// Loads the registry saved at `save_path`.
    ///
    /// A missing file is created with `default_data_dir` as data directory. The data
    /// directory itself is created if it does not exist yet.
    ///
    /// # Errors
    /// [`GvmError::ConfigUnreadable`] if the file exists but cannot be read or parsed,
    /// [`GvmError::ConfigDirectoryError`] if the data directory cannot be created.
    pub fn load_from<P: AsRef<Path>>(save_path: P, default_data_dir: PathBuf) -> Result<Self> {
        let save_path = save_path.as_ref();
        if !save_path.exists() {
            debug!("creating save file at {}", save_path.display());
            Self::new(save_path, default_data_dir).save()?;
        }
        let content = fs::read_to_string(save_path).map_err(|e| GvmError::ConfigUnreadable {
            path: save_path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut registry: Registry =
            serde_json::from_str(&content).map_err(|e| GvmError::ConfigUnreadable {
                path: save_path.to_path_buf(),
                message: e.to_string(),
            })?;
        registry.save_path = save_path.to_path_buf();

        if !registry.data_directory.exists() {
            fs::create_dir_all(&registry.data_directory).map_err(|e| {
                GvmError::ConfigDirectoryError {
                    path: registry.data_directory.clone(),
                    source: e,
                }
            })?;
        }
        debug!(
            "loaded {} installation(s) from {}",
            registry.installations.len(),
            save_path.display()
        );
        Ok(registry)
    }

    /// Writes the whole registry to its save file.
    ///
    /// The content goes to a temporary file in the same directory first and is renamed
    /// over the save file, so a failed write never leaves a truncated save file behind.
    pub fn save(&self) -> Result<()> {
        let write_err = |source: std::io::Error| GvmError::ConfigWriteError {
            path: self.save_path.clone(),
            source,
        };
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        let parent = match self.save_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
        tmp.write_all(content.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.save_path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    /// Appends a record and returns its index. Uniqueness is the caller's business.
    pub fn add(&mut self, record: InstallationRecord) -> usize {
        self.installations.push(record);
        self.installations.len() - 1
    }

    /// Removes and returns the record at `index`, shifting later records down by one.
    ///
    /// The active installation cannot be removed: it has to be deactivated first so
    /// the search path entry it owns is cleaned up.
    pub fn remove_at(&mut self, index: usize) -> Result<InstallationRecord> {
        let record = self.get(index)?;
        if self.current.as_deref() == Some(record.id.as_str()) {
            return Err(GvmError::StillActive(record.id.clone()));
        }
        Ok(self.installations.remove(index))
    }

    /// Bounds-checked access by positional index.
    pub fn get(&self, index: usize) -> Result<&InstallationRecord> {
        self.installations
            .get(index)
            .ok_or(GvmError::IndexOutOfRange {
                index,
                len: self.installations.len(),
            })
    }

    /// Parses a user-supplied index and checks it against the current installations.
    pub fn resolve_index(&self, raw: &str) -> Result<usize> {
        let index: usize = raw
            .trim()
            .parse()
            .map_err(|_| GvmError::InvalidIndex(raw.to_string()))?;
        self.get(index)?;
        Ok(index)
    }

    /// Resolves the `current` pointer.
    ///
    /// Returns `Ok(None)` when nothing is active and [`GvmError::MisconfiguredState`]
    /// when the pointer references no known installation.
    pub fn current_installation(&self) -> Result<Option<&InstallationRecord>> {
        match &self.current {
            None => Ok(None),
            Some(id) => self
                .installations
                .iter()
                .find(|record| &record.id == id)
                .map(Some)
                .ok_or_else(|| GvmError::MisconfiguredState(id.clone())),
        }
    }

    /// Finds a downloaded (non-local) installation of `version`.
    pub fn find_remote_version(&self, version: &str) -> Option<&InstallationRecord> {
        self.installations
            .iter()
            .find(|record| !record.local && record.version == version)
    }

    pub fn find_by_path(&self, path: &Path) -> Option<&InstallationRecord> {
        self.installations.iter().find(|record| record.path == path)
    }

    pub fn is_current(&self, record: &InstallationRecord) -> bool {
        self.current.as_deref() == Some(record.id.as_str())
    }

    /// Directory holding everything `gvm` created for an installation.
    pub fn installation_dir(&self, id: &str) -> PathBuf {
        self.data_directory.join(id)
    }

    /// Directory exported as `GOPATH` while the installation is active.
    pub fn workspace_dir(&self, id: &str) -> PathBuf {
        self.installation_dir(id).join(WORKSPACE_DIR)
    }

    pub(crate) fn set_current(&mut self, id: &str, bin_path: String) {
        self.current = Some(id.to_string());
        self.current_bin_path = bin_path;
    }

    pub(crate) fn clear_current(&mut self) {
        self.current = None;
        self.current_bin_path.clear();
    }

    pub fn data_directory(&self) -> &Path {
        &self.data_directory
    }

    pub fn installations(&self) -> &[InstallationRecord] {
        &self.installations
    }

    pub fn len(&self) -> usize {
        self.installations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installations.is_empty()
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// The search path entry injected by the last activation, empty if none.
    pub fn current_bin_path(&self) -> &str {
        &self.current_bin_path
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }
}

// Older save files carry `null` where an empty value is meant.
fn nullable_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_vec<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn none_if_empty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
}

fn empty_if_none<S: Serializer>(value: &Option<String>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_deref().unwrap_or(""))
}
