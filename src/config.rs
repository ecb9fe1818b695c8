//! Service configuration
//!
//! Read from a JSON file. Every field is optional; a missing file means all
//! defaults.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batch::BatchOptions;
use crate::cli::{CliError, CliResult};
use crate::context::{PoolOptions, MAX_TIMEOUT_MS};
use crate::observability::Severity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DapiConfig {
    /// SQLite database file, or `:memory:`
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Prefix every CRUD path is mounted under
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// How long a statement waits on a locked database
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,

    #[serde(default = "default_max_batch_requests")]
    pub max_batch_requests: usize,

    /// Allow DELETE with a limit but no filter
    #[serde(default)]
    pub allow_unfiltered_delete: bool,

    /// Allowed CORS origins (empty = any origin)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Minimum severity written to the log
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_database() -> String {
    "./dapi.db".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    9000
}
fn default_api_prefix() -> String {
    "/api/v1".to_string()
}
fn default_pool_size() -> usize {
    4
}
fn default_busy_timeout_ms() -> u64 {
    5000
}
fn default_batch_timeout_ms() -> u64 {
    30_000
}
fn default_max_batch_requests() -> usize {
    100
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DapiConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            host: default_host(),
            port: default_port(),
            api_prefix: default_api_prefix(),
            pool_size: default_pool_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
            batch_timeout_ms: default_batch_timeout_ms(),
            max_batch_requests: default_max_batch_requests(),
            allow_unfiltered_delete: false,
            cors_origins: Vec::new(),
            log_level: default_log_level(),
        }
    }
}

impl DapiConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: DapiConfig = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Like `load`, but a missing file yields the defaults
    pub fn load_or_default(path: &Path) -> CliResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> CliResult<()> {
        if self.database.trim().is_empty() {
            return Err(CliError::config_error("database must not be empty"));
        }
        if self.port == 0 {
            return Err(CliError::config_error("port must be > 0"));
        }
        if !self.api_prefix.starts_with('/') {
            return Err(CliError::config_error(format!(
                "api_prefix must start with '/': '{}'",
                self.api_prefix
            )));
        }
        if self.pool_size == 0 {
            return Err(CliError::config_error("pool_size must be > 0"));
        }
        for (name, value) in [
            ("busy_timeout_ms", self.busy_timeout_ms),
            ("batch_timeout_ms", self.batch_timeout_ms),
        ] {
            if value == 0 || value > MAX_TIMEOUT_MS {
                return Err(CliError::config_error(format!(
                    "{} must be between 1 and {}",
                    name, MAX_TIMEOUT_MS
                )));
            }
        }
        if self.max_batch_requests == 0 {
            return Err(CliError::config_error("max_batch_requests must be > 0"));
        }
        self.severity()?;
        Ok(())
    }

    /// Prefix without a trailing slash; `/` becomes empty
    pub fn prefix(&self) -> &str {
        self.api_prefix.trim_end_matches('/')
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn severity(&self) -> CliResult<Severity> {
        Severity::from_str(&self.log_level).map_err(CliError::config_error)
    }

    pub fn pool_options(&self) -> PoolOptions {
        let busy = Duration::from_millis(self.busy_timeout_ms);
        PoolOptions {
            max_size: self.pool_size,
            busy_timeout: busy,
            checkout_timeout: busy,
        }
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            max_requests: self.max_batch_requests,
            timeout: Duration::from_millis(self.batch_timeout_ms),
        }
    }
}
