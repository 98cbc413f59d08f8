//! Configuration for chirp.
//!
//! Layered from three sources, lowest to highest priority:
//!
//! 1. **Compiled defaults**
//! 2. **User config file** - `~/.config/chirp/config.toml`
//! 3. **Environment variables** - `CHIRP_*` prefix
//!
//! CLI arguments always win over all of these.
//!
//! # Example Configuration File
//!
//! ```toml
//! [paths]
//! db = "~/.local/share/chirp/chirp.db"
//!
//! [output]
//! colors = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Main configuration structure for chirp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path-related configuration.
    pub paths: PathsConfig,
    /// Output formatting configuration.
    pub output: OutputConfig,
}

/// Path configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Path to the `SQLite` database file.
    /// Environment variable: `CHIRP_DB`
    pub db: Option<PathBuf>,
}

/// Output formatting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Enable colored output.
    pub colors: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { colors: true }
    }
}

impl Config {
    /// Load configuration from all sources.
    #[must_use]
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(user_config) = Self::load_user_config() {
            config.merge(user_config);
        }

        config.apply_env_overrides();

        debug!("Configuration loaded: {:?}", config);
        config
    }

    /// Load configuration from a specific file. Parse failures log a
    /// warning and fall back to `None` rather than aborting.
    #[must_use]
    pub fn load_from_file(path: &PathBuf) -> Option<Self> {
        if !path.exists() {
            debug!("Config file not found: {}", path.display());
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    info!("Loaded config from: {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            }
        }
    }

    fn load_user_config() -> Option<Self> {
        let config_path = Self::user_config_path()?;
        Self::load_from_file(&config_path)
    }

    /// Get the path to the user configuration file.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("chirp").join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(db) = std::env::var("CHIRP_DB") {
            self.paths.db = Some(PathBuf::from(db));
        }
        if std::env::var("CHIRP_NO_COLOR").is_ok() || std::env::var("NO_COLOR").is_ok() {
            self.output.colors = false;
        }
    }

    /// Merge another config into this one (other takes precedence).
    fn merge(&mut self, other: Self) {
        if other.paths.db.is_some() {
            self.paths.db = other.paths.db;
        }
        self.output.colors = other.output.colors;
    }

    /// Get the database path, using the default when not configured.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.paths.db.clone().unwrap_or_else(crate::default_db_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_db_path_falls_back() {
        let config = Config::default();
        assert!(config.db_path().ends_with("chirp.db"));
    }

    #[test]
    fn merge_prefers_other_paths() {
        let mut base = Config::default();
        let other = Config {
            paths: PathsConfig {
                db: Some(PathBuf::from("/tmp/custom.db")),
            },
            output: OutputConfig { colors: false },
        };
        base.merge(other);
        assert_eq!(base.db_path(), PathBuf::from("/tmp/custom.db"));
        assert!(!base.output.colors);
    }

    #[test]
    fn load_from_missing_file_is_none() {
        assert!(Config::load_from_file(&PathBuf::from("/nonexistent/config.toml")).is_none());
    }
}
