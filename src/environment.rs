//! Persistent environment variables.
//!
//! Variables live in a scope: the invoking user's, or the whole machine's when
//! running with administrative privileges. On Unix each scope is a POSIX shell
//! profile of `export NAME='value'` lines that login shells source. The profile
//! only records the entries `gvm` adds to `PATH`; they are appended to the
//! inherited `$PATH` when the profile is sourced. Non-Unix targets always use
//! the user scope.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;
use crate::error::{GvmError, Result};
use crate::paths::{get_user_env_file, MACHINE_ENV_FILE};

/// Search path variable.
pub const PATH_VAR: &str = "PATH";
/// Variable pointing at the active Go root.
pub const ROOT_VAR: &str = "GOROOT";
/// Variable pointing at the active installation's workspace.
pub const WORKSPACE_VAR: &str = "GOPATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    User,
    Machine,
}

/// Machine-wide when the process is elevated, per-user otherwise.
pub fn detect_scope() -> Scope {
    if is_elevated() {
        Scope::Machine
    } else {
        Scope::User
    }
}

#[cfg(unix)]
pub fn is_elevated() -> bool {
    nix::unistd::Uid::effective().is_root()
}

#[cfg(not(unix))]
pub fn is_elevated() -> bool {
    false
}

/// Reads and writes persistent environment variables of a scope.
pub trait EnvironmentStore {
    fn get(&self, scope: Scope, name: &str) -> Result<Option<String>>;

    /// Applies all updates at once; `None` removes the variable.
    fn set(&mut self, scope: Scope, updates: &[(&str, Option<&str>)]) -> Result<()>;
}

/// Shell profile files, one per scope.
pub struct ProfileEnvironment {
    user_file: PathBuf,
    machine_file: PathBuf,
}

impl ProfileEnvironment {
    /// Uses `<home>/.gvm-env` for the user and `/etc/profile.d/gvm.sh` for the machine.
    pub fn new() -> Result<Self> {
        Ok(Self::with_files(get_user_env_file()?, PathBuf::from(MACHINE_ENV_FILE)))
    }

    pub fn with_files(user_file: PathBuf, machine_file: PathBuf) -> Self {
        Self {
            user_file,
            machine_file,
        }
    }

    pub fn file(&self, scope: Scope) -> &Path {
        match scope {
            Scope::User => &self.user_file,
            Scope::Machine => &self.machine_file,
        }
    }

    fn read_profile(&self, scope: Scope) -> Result<BTreeMap<String, String>> {
        let path = self.file(scope);
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(parse_profile(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(GvmError::EnvironmentAccessError(format!(
                "{}: {}",
                path.display(),
                e
            ))),
        }
    }
}

impl EnvironmentStore for ProfileEnvironment {
    fn get(&self, scope: Scope, name: &str) -> Result<Option<String>> {
        let mut vars = self.read_profile(scope)?;
        Ok(vars.remove(name))
    }

    fn set(&mut self, scope: Scope, updates: &[(&str, Option<&str>)]) -> Result<()> {
        let before = self.read_profile(scope)?;
        let mut vars = before.clone();
        for (name, value) in updates {
            match value {
                Some(value) => vars.insert(name.to_string(), value.to_string()),
                None => vars.remove(*name),
            };
        }
        let path = self.file(scope);
        if vars == before {
            debug!("{} is unchanged", path.display());
            return Ok(());
        }
        debug!("writing {} variable(s) to {}", vars.len(), path.display());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GvmError::EnvironmentAccessError(format!("{}: {}", parent.display(), e))
            })?;
        }
        std::fs::write(path, render_profile(&vars))
            .map_err(|e| GvmError::EnvironmentAccessError(format!("{}: {}", path.display(), e)))
    }
}

const PROFILE_HEADER: &str = "# Managed by gvm. Source this file from your shell profile.\n";
const INHERITED_PATH: &str = "\"$PATH\":";

fn render_profile(vars: &BTreeMap<String, String>) -> String {
    let mut out = String::from(PROFILE_HEADER);
    for (name, value) in vars {
        let quoted = format!("'{}'", value.replace('\'', r"'\''"));
        if name == PATH_VAR {
            out.push_str(&format!("export {}={}{}\n", name, INHERITED_PATH, quoted));
        } else {
            out.push_str(&format!("export {}={}\n", name, quoted));
        }
    }
    out
}

fn parse_profile(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix("export "))
        .filter_map(|assignment| assignment.split_once('='))
        .map(|(name, value)| {
            let value = value.trim();
            let value = value.strip_prefix(INHERITED_PATH).unwrap_or(value);
            (name.trim().to_string(), unquote(value))
        })
        .collect()
}

fn unquote(value: &str) -> String {
    match value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
        Some(inner) => inner.replace(r"'\''", "'"),
        None => value.to_string(),
    }
}

/// In-memory store, for embedding `gvm` where the environment is managed elsewhere.
#[derive(Debug, Default, Clone)]
pub struct MemoryEnvironment {
    vars: HashMap<(Scope, String), String>,
    unavailable: bool,
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every access fails with [`GvmError::EnvironmentAccessError`].
    pub fn unavailable() -> Self {
        Self {
            vars: HashMap::new(),
            unavailable: true,
        }
    }

    pub fn with_var(mut self, scope: Scope, name: &str, value: &str) -> Self {
        self.vars.insert((scope, name.to_string()), value.to_string());
        self
    }

    fn check(&self) -> Result<()> {
        if self.unavailable {
            return Err(GvmError::EnvironmentAccessError(
                "environment is unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl EnvironmentStore for MemoryEnvironment {
    fn get(&self, scope: Scope, name: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.vars.get(&(scope, name.to_string())).cloned())
    }

    fn set(&mut self, scope: Scope, updates: &[(&str, Option<&str>)]) -> Result<()> {
        self.check()?;
        for (name, value) in updates {
            let key = (scope, name.to_string());
            match value {
                Some(value) => self.vars.insert(key, value.to_string()),
                None => self.vars.remove(&key),
            };
        }
        Ok(())
    }
}
