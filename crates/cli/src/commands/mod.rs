//! Subcommand implementations and the helpers they share.

pub mod init;
pub mod process;
pub mod session;
pub mod tasks;

use acontext_config::{AppConfig, ConfigError};
use acontext_store::SqliteStore;
use std::path::Path;

/// Load the config from `path`, or from the default location.
///
/// Environment overrides apply either way.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let Some(path) = path else {
        return AppConfig::load();
    };
    let mut config = AppConfig::load_from(path)?;
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Open the configured SQLite database, creating its directory if needed.
pub async fn open_store(config: &AppConfig) -> Result<SqliteStore, Box<dyn std::error::Error>> {
    if let Some(parent) = sqlite_file(&config.database_url).and_then(Path::parent) {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = SqliteStore::connect(&config.database_url, config.database_pool_size).await?;
    Ok(store)
}

/// The file path inside a `sqlite://` url, if it names a file.
fn sqlite_file(url: &str) -> Option<&Path> {
    let rest = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.starts_with(":memory:") {
        None
    } else {
        Some(Path::new(path))
    }
}
