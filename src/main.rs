//! dapi CLI entry point
//!
//! Parses arguments, runs the command, and exits non-zero on failure. All
//! logic lives in the CLI module.

use dapi::cli;

fn main() {
    if let Err(e) = cli::run() {
        cli::report(&e);
        std::process::exit(1);
    }
}
