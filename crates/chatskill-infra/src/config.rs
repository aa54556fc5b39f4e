//! Configuration loading and data directory resolution.
//!
//! Reads `config.toml` from the data directory (`~/.chatskill/` by default)
//! and deserializes it into [`ChatskillConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::{Path, PathBuf};

use chatskill_types::config::ChatskillConfig;

pub const CONFIG_FILE: &str = "config.toml";

/// Resolve the data directory.
///
/// Priority:
/// 1. `CHATSKILL_DATA_DIR` environment variable
/// 2. `~/.chatskill`
/// 3. `.chatskill` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHATSKILL_DATA_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".chatskill");
    }
    PathBuf::from(".chatskill")
}

/// Load `{data_dir}/config.toml`.
///
/// A missing file yields the defaults silently; an unreadable or invalid one
/// yields the defaults with a warning.
pub async fn load_config(data_dir: &Path) -> ChatskillConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ChatskillConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ChatskillConfig::default();
        }
    };

    match toml::from_str::<ChatskillConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", config_path.display());
            ChatskillConfig::default()
        }
    }
}
