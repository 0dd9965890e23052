mod cli;
mod execute;

use std::process::ExitCode;
use clap::Parser;
use gvm::error::{ErrorKind, GvmError};
use tracing_subscriber::EnvFilter;
use crate::cli::CLI;

/// Overrides the log filter, e.g. `GVM_LOG=gvm=trace`.
const LOG_ENV: &str = "GVM_LOG";
/// Exit status when the save file or data directory is unusable.
const CONFIG_FAILURE: u8 = 2;

fn main() -> ExitCode {
    let cli = CLI::parse();
    init_logging(cli.verbose);
    match execute::execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<GvmError>().map(GvmError::kind) {
            Some(ErrorKind::Config) => {
                println!("gvm cannot continue: {}", e);
                ExitCode::from(CONFIG_FAILURE)
            }
            _ => {
                println!("{}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "gvm=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
