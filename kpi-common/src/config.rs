//! Configuration loading and resolution
//!
//! Priority order for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: a warning is logged and the
//! compiled defaults apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the database path
pub const ENV_DATABASE: &str = "KPI_DATABASE";
/// Environment variable overriding the HTTP bind address
pub const ENV_BIND: &str = "KPI_BIND";

const APP_DIR: &str = "kpi-engine";

/// Compiled fallback values
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub database_path: PathBuf,
    pub bind_address: String,
    pub log_level: String,
    pub scheduler: SchedulerConfig,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let database_path = dirs::data_local_dir()
            .map(|d| d.join(APP_DIR).join("kpi.db"))
            .unwrap_or_else(|| PathBuf::from("./kpi_data/kpi.db"));

        Self {
            database_path,
            bind_address: "127.0.0.1:5740".to_string(),
            log_level: "info".to_string(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

/// `[scheduler]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Run the background due sweep
    pub enabled: bool,
    /// Wall-clock hour (UTC) of the daily trigger
    pub hour_utc: u32,
    /// Indicators evaluated concurrently within one tenant
    pub workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour_utc: 2,
            workers: 4,
        }
    }
}

/// On-disk TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub database_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub database_path: PathBuf,
    pub bind_address: String,
    pub log_level: String,
    pub scheduler: SchedulerConfig,
}

/// Default config file location (`<config dir>/kpi-engine/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Load a TOML config file
///
/// Returns `Ok(None)` when the file does not exist; parse failures are errors.
pub fn load_toml_config(path: &Path) -> Result<Option<TomlConfig>> {
    if !path.exists() {
        warn!("Config file not found: {} (using defaults)", path.display());
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!("Loaded config file: {}", path.display());
    Ok(Some(config))
}

/// Write a TOML config file, creating parent directories
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Resolves the runtime configuration from CLI, environment, TOML and defaults
#[derive(Debug, Default)]
pub struct ConfigResolver {
    cli_database: Option<PathBuf>,
    cli_bind: Option<String>,
    config_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(mut self, path: Option<PathBuf>) -> Self {
        self.cli_database = path;
        self
    }

    pub fn with_bind_address(mut self, bind: Option<String>) -> Self {
        self.cli_bind = bind;
        self
    }

    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let defaults = CompiledDefaults::for_current_platform();

        let toml = match self.config_path.clone().or_else(default_config_path) {
            Some(path) => load_toml_config(&path)?.unwrap_or_default(),
            None => TomlConfig::default(),
        };

        let database_path = self
            .cli_database
            .clone()
            .or_else(|| std::env::var(ENV_DATABASE).ok().map(PathBuf::from))
            .or(toml.database_path)
            .unwrap_or(defaults.database_path);

        let bind_address = self
            .cli_bind
            .clone()
            .or_else(|| std::env::var(ENV_BIND).ok())
            .or(toml.bind_address)
            .unwrap_or(defaults.bind_address);

        let log_level = toml.logging.level.unwrap_or(defaults.log_level);

        let scheduler = toml.scheduler;
        if scheduler.hour_utc > 23 {
            return Err(Error::Config(format!(
                "scheduler.hour_utc must be 0-23, got {}",
                scheduler.hour_utc
            )));
        }
        if scheduler.workers == 0 {
            return Err(Error::Config("scheduler.workers must be at least 1".to_string()));
        }

        Ok(ResolvedConfig {
            database_path,
            bind_address,
            log_level,
            scheduler,
        })
    }
}
