//! CLI command implementations
//!
//! `serve` boots the HTTP server; `inspect` prints the catalog.

use std::path::Path;

use crate::catalog::{Catalog, CatalogLoader};
use crate::config::DapiConfig;
use crate::context::{ConnectionPool, DatabaseTarget};
use crate::http_server::HttpServer;
use crate::observability::{log_event, log_event_with_fields, Event, Logger};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::write_json;

/// Run the parsed command to completion
pub fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::Serve {
            config,
            database,
            port,
        } => {
            let config = resolve_config(&config, database, port)?;
            serve(config)
        }
        Command::Inspect { config, database } => {
            let config = resolve_config(&config, database, None)?;
            let catalog = inspect(&config)?;
            write_json(&catalog)
        }
    }
}

/// Load the config file and apply flag overrides
pub fn resolve_config(
    path: &Path,
    database: Option<String>,
    port: Option<u16>,
) -> CliResult<DapiConfig> {
    let mut config = DapiConfig::load_or_default(path)?;
    if let Some(database) = database {
        config.database = database;
    }
    if let Some(port) = port {
        config.port = port;
    }
    config.validate()?;

    Logger::set_min_severity(config.severity()?);
    log_event_with_fields(
        Event::ConfigLoaded,
        &[
            ("database", &config.database),
            ("path", &path.display().to_string()),
        ],
    );
    Ok(config)
}

/// Boot the server and block until it stops
pub fn serve(config: DapiConfig) -> CliResult<()> {
    log_event(Event::BootStart);
    let server = HttpServer::bootstrap(config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::boot_failed(format!("Failed to start runtime: {}", e)))?;

    runtime
        .block_on(server.start())
        .map_err(|e| CliError::boot_failed(e.to_string()))
}

/// Introspect the configured database without serving it
pub fn inspect(config: &DapiConfig) -> CliResult<Catalog> {
    let pool = ConnectionPool::open(
        DatabaseTarget::parse(&config.database),
        config.pool_options(),
    )?;
    let conn = pool.checkout()?;
    Ok(CatalogLoader::load(&conn)?)
}
