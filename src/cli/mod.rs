//! CLI module for dapi
//!
//! Provides command-line interface for:
//! - serve: Load the catalog and serve HTTP
//! - inspect: Print the catalog and exit

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{inspect, resolve_config, run_command, serve};
pub use errors::{CliError, CliErrorCode, CliResult};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    run_command(Cli::parse_args().command)
}

/// Report a fatal CLI error on stderr
pub fn report(err: &CliError) {
    io::write_error(err.code_str(), err.message());
}
