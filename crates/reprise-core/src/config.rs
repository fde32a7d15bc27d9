//! Persisted config (notes root, daily limit, review data location) in the app data directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_data;
use crate::daily::{DailyLimit, InvalidLimit, DEFAULT_NEW_ITEMS_PER_DAY};
use crate::filter::ChainMode;
use crate::store::StoreSettings;

const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the user's notes directory (chosen by them).
    pub notes_root: Option<String>,
    /// New items per day: -1 for unlimited, otherwise 1..=1000.
    pub new_items_per_day_limit: i32,
    /// Review data file. Defaults to `reviews.json` in the app data directory.
    pub persistence_path: Option<String>,
    /// How filter chains combine AND/OR entries.
    pub filter_mode: ChainMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notes_root: None,
            new_items_per_day_limit: DEFAULT_NEW_ITEMS_PER_DAY as i32,
            persistence_path: None,
            filter_mode: ChainMode::default(),
        }
    }
}

impl Config {
    pub fn daily_limit(&self) -> Result<DailyLimit, ConfigError> {
        Ok(DailyLimit::try_from(self.new_items_per_day_limit)?)
    }

    pub fn notes_root(&self) -> Option<PathBuf> {
        self.notes_root.as_deref().filter(|s| !s.is_empty()).map(PathBuf::from)
    }

    pub fn persistence_path(&self) -> Result<PathBuf, ConfigError> {
        match self.persistence_path.as_deref().filter(|s| !s.is_empty()) {
            Some(p) => Ok(PathBuf::from(p)),
            None => app_data::default_persistence_path().ok_or(ConfigError::NoDataDir),
        }
    }

    /// Store settings derived from this config.
    pub fn store_settings(&self) -> Result<StoreSettings, ConfigError> {
        Ok(StoreSettings {
            persistence_path: self.persistence_path()?,
            new_items_per_day: self.daily_limit()?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.daily_limit().map(|_| ())
    }
}

fn config_path() -> Result<PathBuf, ConfigError> {
    let data_dir = app_data::app_data_dir().ok_or(ConfigError::NoDataDir)?;
    Ok(data_dir.join(CONFIG_FILENAME))
}

/// Load config from the app data directory. Returns default config if missing or invalid.
pub fn load_config() -> Config {
    match config_path() {
        Ok(path) => load_config_from(&path),
        Err(_) => Config::default(),
    }
}

/// Load config from `path`. Returns default config if missing or invalid.
pub fn load_config_from(path: &Path) -> Config {
    let Ok(s) = std::fs::read_to_string(path) else {
        return Config::default();
    };
    toml::from_str(&s).unwrap_or_else(|e| {
        log::warn!("ignoring invalid config at {}: {e}", path.display());
        Config::default()
    })
}

/// Save config to the app data directory.
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path()?, config)
}

pub fn save_config_to(path: &Path, config: &Config) -> Result<(), ConfigError> {
    config.validate()?;
    let s = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(path, s).map_err(ConfigError::Write)
}

/// Set and persist the notes root.
pub fn set_notes_root(path: &Path) -> Result<(), ConfigError> {
    let path = path.canonicalize().map_err(ConfigError::Canonicalize)?;
    if !path.is_dir() {
        return Err(ConfigError::NotADirectory(path));
    }
    let mut config = load_config();
    config.notes_root = Some(path.to_string_lossy().into_owned());
    save_config(&config)
}

/// Set and persist the daily new-item limit (-1 for unlimited).
pub fn set_daily_limit(limit: i32) -> Result<DailyLimit, ConfigError> {
    let parsed = DailyLimit::try_from(limit)?;
    let mut config = load_config();
    config.new_items_per_day_limit = limit;
    save_config(&config)?;
    Ok(parsed)
}

pub fn set_filter_mode(mode: ChainMode) -> Result<(), ConfigError> {
    let mut config = load_config();
    config.filter_mode = mode;
    save_config(&config)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("failed to resolve path: {0}")]
    Canonicalize(std::io::Error),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error(transparent)]
    InvalidLimit(#[from] InvalidLimit),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("config.toml"));
        assert_eq!(config, Config::default());
        assert_eq!(config.daily_limit().unwrap(), DailyLimit::PerDay(20));
    }

    #[test]
    fn round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config {
            notes_root: Some("/notes".into()),
            new_items_per_day_limit: -1,
            persistence_path: Some("/data/reviews.json".into()),
            filter_mode: ChainMode::ShortCircuit,
        };
        save_config_to(&path, &config).unwrap();

        let loaded = load_config_from(&path);
        assert_eq!(loaded, config);
        assert_eq!(loaded.daily_limit().unwrap(), DailyLimit::Unlimited);
        assert_eq!(
            loaded.store_settings().unwrap(),
            StoreSettings {
                persistence_path: PathBuf::from("/data/reviews.json"),
                new_items_per_day: DailyLimit::Unlimited,
            }
        );
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "filter_mode = \"short-circuit\"\n").unwrap();
        let config = load_config_from(&path);
        assert_eq!(config.filter_mode, ChainMode::ShortCircuit);
        assert_eq!(config.new_items_per_day_limit, 20);
    }

    #[test]
    fn out_of_range_limit_is_rejected_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config {
            new_items_per_day_limit: 0,
            ..Config::default()
        };
        assert!(matches!(save_config_to(&path, &config), Err(ConfigError::InvalidLimit(_))));
        assert!(!path.exists());
    }
}
