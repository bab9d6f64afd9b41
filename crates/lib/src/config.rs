//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.weft/config.json`) and
//! environment. Kept minimal: transcript hydration and history location.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Transcript engine settings.
    #[serde(default)]
    pub transcript: TranscriptConfig,

    /// Persisted history location.
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Transcript engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptConfig {
    /// Messages loaded per page when a conversation view opens (default 10000).
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    crate::history::DEFAULT_PAGE_SIZE
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

/// Persisted history settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryConfig {
    /// Override the default history root. Relative paths are resolved against
    /// the config file's parent. Omit to use the config directory's `history`
    /// subdirectory (~/.weft/history when config is ~/.weft/config.json).
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("WEFT_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".weft").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the default path (or WEFT_CONFIG_PATH). Missing file =>
/// default config. Returns the config and the path that was used (for
/// resolving the config directory).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Default history root when no override is set: `history` subdirectory of the
/// config file's parent.
pub fn history_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join("history")
}

/// Resolve the history root: uses `config.history.directory` if set (relative
/// paths resolved against the config file's parent), otherwise the default
/// `history` subdirectory.
pub fn resolve_history_dir(config: &Config, config_path: &Path) -> PathBuf {
    let config_parent = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match &config.history.directory {
        Some(d) if !d.as_os_str().is_empty() => {
            if d.is_absolute() {
                d.clone()
            } else {
                config_parent.join(d)
            }
        }
        _ => history_dir(config_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_page_size_matches_history() {
        let t = TranscriptConfig::default();
        assert_eq!(t.page_size, 10_000);
    }

    #[test]
    fn resolve_history_dir_default() {
        let config = Config::default();
        let path = Path::new("/home/user/.weft/config.json");
        assert_eq!(
            resolve_history_dir(&config, path),
            PathBuf::from("/home/user/.weft/history")
        );
    }

    #[test]
    fn resolve_history_dir_override_relative() {
        let mut config = Config::default();
        config.history.directory = Some(PathBuf::from("custom/history"));
        let path = Path::new("/home/user/.weft/config.json");
        assert_eq!(
            resolve_history_dir(&config, path),
            PathBuf::from("/home/user/.weft/custom/history")
        );
    }

    #[test]
    fn resolve_history_dir_override_absolute() {
        let mut config = Config::default();
        config.history.directory = Some(PathBuf::from("/data/history"));
        let path = Path::new("/home/user/.weft/config.json");
        assert_eq!(
            resolve_history_dir(&config, path),
            PathBuf::from("/data/history")
        );
    }
}
