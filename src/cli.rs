use std::path::PathBuf;
use clap::{ArgGroup, Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    /// Print diagnostic output to stderr
    #[clap(short, long)]
    pub(crate) verbose: bool,
    #[command(subcommand)]
    pub(crate) command: GvmCommand,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum GvmCommand {
    /// Install a Go version from go.dev, or add an existing Go installation
    #[command(group(ArgGroup::new("source").required(true).args(["version", "local"])))]
    Install {
        /// Version to install, as shown by `gvm list --remote`
        #[clap(short, long)]
        version: Option<String>,
        /// Path of an existing Go installation to manage
        #[clap(short, long)]
        local: Option<PathBuf>,
    },
    /// Remove an installation. Deletes all files gvm created for it
    Remove {
        /// Index of the installation, as shown by `gvm list`
        #[clap(short, long)]
        index: String,
        /// Do not ask for confirmation
        #[clap(short, long)]
        yes: bool,
    },
    /// List managed installations
    List {
        /// List the versions available on go.dev instead
        #[clap(short, long)]
        remote: bool,
    },
    /// Make an installation the current one
    Set {
        /// Index of the installation, as shown by `gvm list`
        #[clap(short, long)]
        index: String,
    },
    /// Remove the current installation from the environment
    Unset,
    /// Show the current installation
    Current,
}
