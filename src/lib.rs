//! # gvm Core Library
//!
//! This crate contains the core logic of the `gvm` tool – a small version manager for Go
//! toolchains. It discovers published Go releases, downloads and verifies them, registers
//! toolchains that already exist on the machine, and switches the active one by rewriting the
//! persistent `PATH`, `GOROOT` and `GOPATH` variables.
//!
//! This library is built for the `gvm` CLI, but every operation takes its collaborators
//! (catalog, downloader, environment) as arguments and can be driven from elsewhere.
//!
//! ## Modules Overview
//! - [`registry`] – The persisted list of installations and the current selection
//! - [`activation`] – Injecting and removing an installation from the environment
//! - [`installer`] – Install, remove, set and unset as complete operations
//! - [`catalog`] – The remote list of Go releases
//! - [`download`] – Segmented artifact downloads
//! - [`environment`] – Persistent environment variables per scope
//! - [`util`] – Checksums, archives, subprocesses and platform naming
//! - [`paths`] – Where the save file and data live
//! - [`error`] – The error type shared by all of the above

pub mod error;
pub mod paths;
pub mod registry;
pub mod catalog;
pub mod download;
pub mod environment;
pub mod activation;
pub mod installer;
pub mod util;

pub use error::*;
pub use registry::*;
pub use catalog::*;
pub use download::*;
pub use environment::*;
pub use activation::*;
pub use installer::*;
pub use util::*;
