//! Subcommand implementations.

pub mod batch;
pub mod config;
pub mod parts;
pub mod process;

mod prompt;
mod report;

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use invaudit_core::models::AuditConfig;
use invaudit_core::SqliteStore;

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invaudit")
        .join("config.json")
}

/// Load the configuration from `--config`, the default path, or defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<AuditConfig> {
    if let Some(path) = config_path {
        return AuditConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to read config file {}", path));
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using config file {}", default_path.display());
        return AuditConfig::from_file(&default_path)
            .with_context(|| format!("Failed to read config file {}", default_path.display()));
    }

    Ok(AuditConfig::default())
}

/// Open the parts database, preferring an explicit path over the config.
pub fn open_store(db: Option<&Path>, config: &AuditConfig) -> anyhow::Result<SqliteStore> {
    let path = db.unwrap_or(&config.store.path);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    SqliteStore::open(path)
        .with_context(|| format!("Failed to open parts database {}", path.display()))
}
