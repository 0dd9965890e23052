use std::io::{BufRead, Write};
use std::path::Path;
use anyhow::Result;
use colored::Colorize;
use gvm::catalog::{Catalog, HttpCatalog};
use gvm::download::HttpDownloader;
use gvm::environment::{detect_scope, ProfileEnvironment};
use gvm::error::GvmError;
use gvm::installer::{current_installation, install_local, install_remote, list_installations, list_remote, remove_installation, set_installation, unset_installation};
use gvm::registry::{InstallationRecord, Registry};
use tracing::warn;
use crate::cli::{GvmCommand, CLI};

pub fn execute(cli: CLI) -> Result<()> {
    let mut registry = Registry::load()?;
    match cli.command {
        GvmCommand::Install { version, local } => {
            execute_install(&mut registry, version, local.as_deref())
        }
        GvmCommand::Remove { index, yes } => {
            execute_remove(&mut registry, &index, yes)
        }
        GvmCommand::List { remote } => {
            execute_list(&registry, remote)
        }
        GvmCommand::Set { index } => {
            execute_set(&mut registry, &index)
        }
        GvmCommand::Unset => {
            execute_unset(&mut registry)
        }
        GvmCommand::Current => {
            execute_current(&registry)
        }
    }
}

pub fn execute_install(registry: &mut Registry, version: Option<String>, local: Option<&Path>) -> Result<()> {
    match (version, local) {
        (Some(version), _) => {
            let catalog = HttpCatalog::new()?;
            let downloader = HttpDownloader::new()?;
            let index = install_remote(registry, &catalog, &downloader, &version)?;
            println!(
                "Go {} has been added to the manager at index {}! Use it with `gvm set --index {}`.",
                version, index, index
            );
        }
        (None, Some(path)) => {
            let catalog = HttpCatalog::new()
                .inspect_err(|e| warn!("unable to set up the version catalog: {}", e))
                .ok();
            let index = install_local(registry, catalog.as_ref().map(|c| c as &dyn Catalog), path)?;
            let record = registry.get(index)?;
            println!(
                "Go version {} added successfully from {}",
                record.version,
                record.path.display()
            );
        }
        (None, None) => {
            anyhow::bail!("Either --version or --local is required");
        }
    }
    Ok(())
}

pub fn execute_remove(registry: &mut Registry, index: &str, yes: bool) -> Result<()> {
    let mut env = ProfileEnvironment::new()?;
    let confirm = |record: &InstallationRecord| yes || ask_confirmation(record);
    match remove_installation(registry, &mut env, detect_scope(), index, confirm) {
        Ok(record) => {
            println!("Go {} has been removed.", record.version);
            Ok(())
        }
        Err(GvmError::Declined) => {
            println!("{}", GvmError::Declined);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn ask_confirmation(record: &InstallationRecord) -> bool {
    print!(
        "Are you sure that you want to remove go {} at {}? (y / N): ",
        record.version,
        record.path.display()
    );
    let _ = std::io::stdout().flush();
    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => answer.trim().eq_ignore_ascii_case("y"),
        Err(_) => false,
    }
}

pub fn execute_list(registry: &Registry, remote: bool) -> Result<()> {
    if remote {
        let catalog = HttpCatalog::new()?;
        for version in list_remote(&catalog)? {
            if version.stable {
                println!("{}", format!("{} (stable)", version.bare_version()).green());
            } else {
                println!("{}", format!("{} (unstable)", version.bare_version()).red());
            }
        }
        return Ok(());
    }

    let installations = list_installations(registry);
    if installations.is_empty() {
        println!("No Go installations found!");
        return Ok(());
    }
    for (index, record, current) in installations {
        let marker = if current { "*" } else { " " };
        println!("{}[{}] => {}", marker, index, record.describe());
    }
    Ok(())
}

pub fn execute_set(registry: &mut Registry, index: &str) -> Result<()> {
    let mut env = ProfileEnvironment::new()?;
    let scope = detect_scope();
    let record = set_installation(registry, &mut env, scope, index)?;
    println!("The system is now set to use go version {}!", record.version);
    println!(
        "Open a new shell or source {} to pick up the change.",
        env.file(scope).display()
    );
    Ok(())
}

pub fn execute_unset(registry: &mut Registry) -> Result<()> {
    let mut env = ProfileEnvironment::new()?;
    unset_installation(registry, &mut env, detect_scope())?;
    println!("All variables pertaining to Go have been removed from the environment.");
    Ok(())
}

pub fn execute_current(registry: &Registry) -> Result<()> {
    match current_installation(registry)? {
        Some(record) => {
            println!("{} => {}", record.id, record.describe());
        }
        None => {
            println!("No go version set as default!");
        }
    }
    Ok(())
}
