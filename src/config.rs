//! Configuration file support for scan-tree.
//!
//! Provides YAML-based configuration through `scan-tree.config.yml` files,
//! including data structures, file loading, validation and merging with
//! command-line overrides.

use anyhow::{bail, Context};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use scan_tree::shared::Result;

pub const CONFIG_FILENAME: &str = "scan-tree.config.yml";

const DEFAULT_DATABASE_PATH: &str = "scan-tree.db";
const DEFAULT_REFRESH_INTERVAL_SECONDS: u64 = 5;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level configuration file schema.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    pub database_path: Option<PathBuf>,
    pub view_refresh_interval_seconds: Option<u64>,
    pub busy_timeout_ms: Option<u64>,
    pub log_level: Option<String>,
    /// Captures unknown fields for warnings.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_yaml_ng::Value>,
}

/// Effective settings after applying defaults, the config file and CLI
/// overrides, in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_path: PathBuf,
    pub view_refresh_interval: Duration,
    pub busy_timeout: Duration,
    pub log_level: Option<String>,
}

impl Settings {
    pub fn resolve(config: Option<ConfigFile>, database_override: Option<PathBuf>) -> Self {
        let config = config.unwrap_or_default();
        Self {
            database_path: database_override
                .or(config.database_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            view_refresh_interval: Duration::from_secs(
                config
                    .view_refresh_interval_seconds
                    .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECONDS),
            ),
            busy_timeout: Duration::from_millis(
                config.busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
            ),
            log_level: config.log_level,
        }
    }
}

/// Load config from an explicit path. Returns an error if the file is not found.
pub fn load_config_from_path(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read config file: {}\n\n💡 Hint: Check that the file exists and is readable.",
            path.display()
        )
    })?;

    let config: ConfigFile = serde_yaml_ng::from_str(&content).with_context(|| {
        format!(
            "Failed to parse config file: {}\n\n💡 Hint: Ensure the file contains valid YAML syntax.",
            path.display()
        )
    })?;

    validate_config(&config)?;

    Ok(config)
}

/// Auto-discover config in a directory. Returns `None` silently if not found.
pub fn discover_config(dir: &Path) -> Result<Option<ConfigFile>> {
    let config_path = dir.join(CONFIG_FILENAME);

    if !config_path.exists() {
        return Ok(None);
    }

    let config = load_config_from_path(&config_path)?;
    Ok(Some(config))
}

fn validate_config(config: &ConfigFile) -> Result<()> {
    if config.view_refresh_interval_seconds == Some(0) {
        bail!(
            "Invalid config: view_refresh_interval_seconds must be at least 1.\n\n\
             💡 Hint: Remove the field to use the default of {} seconds.",
            DEFAULT_REFRESH_INTERVAL_SECONDS
        );
    }
    if let Some(level) = &config.log_level {
        if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
            bail!(
                "Invalid config: log_level '{}' is not recognised.\n\n\
                 💡 Hint: Use one of {}.",
                level,
                LOG_LEVELS.join(", ")
            );
        }
    }
    if let Some(path) = &config.database_path {
        if path.as_os_str().is_empty() {
            bail!(
                "Invalid config: database_path must not be empty.\n\n\
                 💡 Hint: Remove the field to use {}.",
                DEFAULT_DATABASE_PATH
            );
        }
    }
    Ok(())
}

/// Logs a warning per unknown field. Called once logging is initialised,
/// since the config supplies the log level.
pub fn warn_unknown_fields(config: &ConfigFile) {
    for key in config.unknown_fields.keys() {
        warn!(field = %key, "unknown config field will be ignored");
    }
}
