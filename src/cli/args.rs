//! CLI argument definitions using clap
//!
//! Commands:
//! - dapi serve --config <path> [--database <path>] [--port <n>]
//! - dapi inspect --config <path> [--database <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dapi - a REST interface generated from a SQLite schema
#[derive(Parser, Debug)]
#[command(name = "dapi")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the CRUD and batch endpoints
    Serve {
        /// Path to configuration file (defaults apply if it does not exist)
        #[arg(long, default_value = "./dapi.json")]
        config: PathBuf,

        /// Database file, overriding the config
        #[arg(long)]
        database: Option<String>,

        /// Listen port, overriding the config
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the introspected catalog as JSON and exit
    Inspect {
        /// Path to configuration file (defaults apply if it does not exist)
        #[arg(long, default_value = "./dapi.json")]
        config: PathBuf,

        /// Database file, overriding the config
        #[arg(long)]
        database: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
