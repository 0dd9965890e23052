//! Switching the active Go installation.
//!
//! Activation appends `<root>/bin` to the search path of the chosen scope and
//! exports `GOROOT` and `GOPATH`. The exact entry that was appended is stored in
//! the registry as `currentBinPath`; it is the only handle used to find and
//! remove that entry again, so repeated activations never pile up entries.
//! Deactivation leaves `PATH` alone unless that entry is present.

use tracing::{debug, info};
use crate::environment::{EnvironmentStore, Scope, PATH_VAR, ROOT_VAR, WORKSPACE_VAR};
use crate::error::{GvmError, Result};
use crate::registry::Registry;
use crate::util::{join_search_path, split_search_path, BIN_DIR};

/// Makes the installation at `index` the active one and saves the registry.
///
/// Fails without touching the environment or the registry if the installation
/// directory is gone or its workspace cannot be created.
pub fn activate(
    registry: &mut Registry,
    index: usize,
    env: &mut dyn EnvironmentStore,
    scope: Scope,
) -> Result<()> {
    let record = registry.get(index)?.clone();
    if !record.path.is_dir() {
        return Err(GvmError::fs(
            format!("Installation directory {} no longer exists", record.path.display()),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        ));
    }

    let mut entries = read_search_path(env, scope, registry.current_bin_path())?;
    let bin_path = record.path.join(BIN_DIR).to_string_lossy().into_owned();
    entries.push(bin_path.clone());

    let workspace = registry.workspace_dir(&record.id);
    if !workspace.is_dir() {
        std::fs::create_dir_all(&workspace).map_err(|e| GvmError::WorkspaceCreateError {
            path: workspace.clone(),
            source: e,
        })?;
    }
    let workspace = workspace.to_string_lossy().into_owned();
    let root = record.path.to_string_lossy().into_owned();

    let search_path = join_search_path(&entries);

    debug!("activating {} in {:?} scope", record.id, scope);
    env.set(
        scope,
        &[
            (PATH_VAR, Some(search_path.as_str())),
            (ROOT_VAR, Some(root.as_str())),
            (WORKSPACE_VAR, Some(workspace.as_str())),
        ],
    )?;

    registry.set_current(&record.id, bin_path);
    registry.save()?;
    info!("activated go {} from {}", record.version, root);
    Ok(())
}

/// Removes any active installation from the environment and saves the registry.
///
/// Safe to call when nothing is active.
pub fn deactivate(
    registry: &mut Registry,
    env: &mut dyn EnvironmentStore,
    scope: Scope,
) -> Result<()> {
    clear_activation(registry, env, scope)?;
    registry.save()
}

/// Environment and in-memory half of [`deactivate`]; the caller saves.
///
/// `PATH` is only rewritten when the recorded entry is actually present.
pub(crate) fn clear_activation(
    registry: &mut Registry,
    env: &mut dyn EnvironmentStore,
    scope: Scope,
) -> Result<()> {
    let stale = registry.current_bin_path();
    let mut updates: Vec<(&str, Option<&str>)> = vec![(ROOT_VAR, None), (WORKSPACE_VAR, None)];
    let mut search_path = None;
    if !stale.is_empty() {
        let value = env.get(scope, PATH_VAR)?.unwrap_or_default();
        let entries = split_search_path(&value);
        if entries.iter().any(|entry| entry.as_str() == stale) {
            let remaining: Vec<String> = entries
                .into_iter()
                .filter(|entry| entry.as_str() != stale)
                .collect();
            if !remaining.is_empty() {
                search_path = Some(join_search_path(&remaining));
            }
            updates.push((PATH_VAR, search_path.as_deref()));
        }
    }
    debug!("deactivating in {:?} scope", scope);
    env.set(scope, &updates)?;
    registry.clear_current();
    Ok(())
}

/// Reads the search path of `scope` without empty entries and without `stale`.
fn read_search_path(
    env: &dyn EnvironmentStore,
    scope: Scope,
    stale: &str,
) -> Result<Vec<String>> {
    let value = env.get(scope, PATH_VAR)?.unwrap_or_default();
    let mut entries = split_search_path(&value);
    if !stale.is_empty() {
        entries.retain(|entry| entry != stale);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};
    use crate::environment::{MemoryEnvironment, ProfileEnvironment};
    use crate::registry::InstallationRecord;
    use crate::util::SEARCH_PATH_SEPARATOR;

    fn setup() -> (TempDir, Registry) {
        let dir = tempdir().unwrap();
        let mut registry = Registry::new(dir.path().join(".gvm"), dir.path().join("data"));
        for name in ["a", "b"] {
            let root = dir.path().join(name).join("go");
            std::fs::create_dir_all(root.join("bin")).unwrap();
            registry.add(InstallationRecord::new("1.22.0", root, false, true));
        }
        (dir, registry)
    }

    fn base_env() -> MemoryEnvironment {
        let sep = SEARCH_PATH_SEPARATOR;
        MemoryEnvironment::new().with_var(Scope::User, PATH_VAR, &format!("/usr/bin{sep}{sep}/bin"))
    }

    fn path_entries(env: &MemoryEnvironment) -> Vec<String> {
        split_search_path(&env.get(Scope::User, PATH_VAR).unwrap().unwrap_or_default())
    }

    fn bin_of(registry: &Registry, index: usize) -> String {
        registry.get(index).unwrap().path.join("bin").to_string_lossy().into_owned()
    }

    #[test]
    fn test_activate_sets_variables() {
        let (_dir, mut registry) = setup();
        let mut env = base_env();
        activate(&mut registry, 0, &mut env, Scope::User).unwrap();

        let record = registry.get(0).unwrap().clone();
        assert_eq!(path_entries(&env), vec!["/usr/bin".to_string(), "/bin".to_string(), bin_of(&registry, 0)]);
        assert_eq!(
            env.get(Scope::User, ROOT_VAR).unwrap().map(PathBuf::from),
            Some(record.path.clone())
        );
        let workspace = registry.workspace_dir(&record.id);
        assert!(workspace.is_dir());
        assert_eq!(
            env.get(Scope::User, WORKSPACE_VAR).unwrap().map(PathBuf::from),
            Some(workspace)
        );
        assert_eq!(registry.current_id(), Some(record.id.as_str()));
        assert_eq!(registry.current_bin_path(), bin_of(&registry, 0));

        let saved = Registry::load_from(registry.save_path(), PathBuf::from("/unused")).unwrap();
        assert_eq!(saved.current_id(), Some(record.id.as_str()));
    }

    #[test]
    fn test_switching_leaves_one_entry() {
        let (_dir, mut registry) = setup();
        let mut env = base_env();
        activate(&mut registry, 0, &mut env, Scope::User).unwrap();
        activate(&mut registry, 1, &mut env, Scope::User).unwrap();
        activate(&mut registry, 1, &mut env, Scope::User).unwrap();

        let entries = path_entries(&env);
        assert!(!entries.contains(&bin_of(&registry, 0)));
        assert_eq!(entries.iter().filter(|e| **e == bin_of(&registry, 1)).count(), 1);
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_deactivate_is_idempotent() {
        let (_dir, mut registry) = setup();
        let mut env = base_env();
        activate(&mut registry, 1, &mut env, Scope::User).unwrap();

        deactivate(&mut registry, &mut env, Scope::User).unwrap();
        let once = (path_entries(&env), env.get(Scope::User, ROOT_VAR).unwrap());
        deactivate(&mut registry, &mut env, Scope::User).unwrap();
        let twice = (path_entries(&env), env.get(Scope::User, ROOT_VAR).unwrap());

        assert_eq!(once, twice);
        assert_eq!(once.0, vec!["/usr/bin".to_string(), "/bin".to_string()]);
        assert_eq!(once.1, None);
        assert_eq!(env.get(Scope::User, WORKSPACE_VAR).unwrap(), None);
        assert_eq!(registry.current_id(), None);
        assert_eq!(registry.current_bin_path(), "");
    }

    #[test]
    fn test_deactivate_with_nothing_active() {
        let (_dir, mut registry) = setup();
        let mut env = base_env();
        deactivate(&mut registry, &mut env, Scope::User).unwrap();
        assert_eq!(path_entries(&env), vec!["/usr/bin".to_string(), "/bin".to_string()]);
    }

    #[test]
    fn test_deactivate_fresh_profile_writes_nothing() {
        let (dir, mut registry) = setup();
        let user = dir.path().join("user.sh");
        let machine = dir.path().join("machine.sh");
        let mut env = ProfileEnvironment::with_files(user.clone(), machine.clone());

        deactivate(&mut registry, &mut env, Scope::Machine).unwrap();
        deactivate(&mut registry, &mut env, Scope::User).unwrap();
        assert!(!machine.exists());
        assert!(!user.exists());
    }

    #[test]
    fn test_profile_round_trip_keeps_inherited_path() {
        let (dir, mut registry) = setup();
        let profile = dir.path().join("machine.sh");
        let mut env = ProfileEnvironment::with_files(dir.path().join("user.sh"), profile.clone());

        activate(&mut registry, 0, &mut env, Scope::Machine).unwrap();
        let content = std::fs::read_to_string(&profile).unwrap();
        assert!(content.contains(&format!("export PATH=\"$PATH\":'{}'\n", bin_of(&registry, 0))));

        deactivate(&mut registry, &mut env, Scope::Machine).unwrap();
        let content = std::fs::read_to_string(&profile).unwrap();
        assert!(!content.contains("export PATH="));
        assert!(!content.contains("GOROOT"));
    }

    #[test]
    fn test_deactivate_leaves_path_without_recorded_entry() {
        let (_dir, mut registry) = setup();
        let id = registry.get(0).unwrap().id.clone();
        registry.set_current(&id, "/gone/bin".to_string());
        let mut env = base_env();

        deactivate(&mut registry, &mut env, Scope::User).unwrap();
        let sep = SEARCH_PATH_SEPARATOR;
        assert_eq!(
            env.get(Scope::User, PATH_VAR).unwrap(),
            Some(format!("/usr/bin{sep}{sep}/bin"))
        );
        assert_eq!(registry.current_id(), None);
    }

    #[test]
    fn test_activate_cleans_stale_entry_from_other_scope_run() {
        let (_dir, mut registry) = setup();
        let stale = bin_of(&registry, 0);
        let id = registry.get(0).unwrap().id.clone();
        registry.set_current(&id, stale.clone());
        let sep = SEARCH_PATH_SEPARATOR;
        let mut env = MemoryEnvironment::new().with_var(
            Scope::Machine,
            PATH_VAR,
            &format!("{stale}{sep}/bin{sep}{stale}"),
        );

        activate(&mut registry, 1, &mut env, Scope::Machine).unwrap();
        let value = env.get(Scope::Machine, PATH_VAR).unwrap().unwrap();
        assert_eq!(split_search_path(&value), vec!["/bin".to_string(), bin_of(&registry, 1)]);
    }

    #[test]
    fn test_activate_missing_directory() {
        let (dir, mut registry) = setup();
        std::fs::remove_dir_all(dir.path().join("a")).unwrap();
        let mut env = base_env();

        let err = activate(&mut registry, 0, &mut env, Scope::User).unwrap_err();
        assert!(matches!(err, GvmError::Filesystem { .. }));
        assert_eq!(env.get(Scope::User, ROOT_VAR).unwrap(), None);
        assert_eq!(registry.current_id(), None);
    }

    #[test]
    fn test_activate_workspace_not_creatable() {
        let (dir, mut registry) = setup();
        std::fs::write(dir.path().join("data"), "").unwrap();
        let mut env = base_env();

        let err = activate(&mut registry, 0, &mut env, Scope::User).unwrap_err();
        assert!(matches!(err, GvmError::WorkspaceCreateError { .. }));
        assert_eq!(path_entries(&env).len(), 2);
        assert_eq!(registry.current_id(), None);
        assert!(!registry.save_path().exists());
    }

    #[test]
    fn test_environment_failure_leaves_registry() {
        let (_dir, mut registry) = setup();
        let mut env = MemoryEnvironment::unavailable();

        let err = activate(&mut registry, 0, &mut env, Scope::User).unwrap_err();
        assert!(matches!(err, GvmError::EnvironmentAccessError(_)));
        assert_eq!(registry.current_id(), None);
        assert!(!registry.save_path().exists());
    }
}
