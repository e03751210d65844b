use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Environment variable that overrides the default config file location.
pub const CONFIG_ENV: &str = "ALBUM_SUGGESTER_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub stage1: Stage1Config,

    pub stage2: Stage2Config,

    pub additions: AdditionsConfig,

    #[serde(default)]
    pub preprocess: PreprocessConfig,

    #[serde(default)]
    pub dev_mode: DevModeConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Density clustering of assets into eventlets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Stage1Config {
    /// Seconds that count as "one unit" of time distance.
    pub time_window_seconds: f64,

    /// Degrees of latitude/longitude that count as "one unit" of distance.
    pub space_window_degrees: f64,

    /// Minimum neighbourhood size (the point itself included) for a core point.
    pub min_cluster_size: usize,
}

impl Stage1Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("stage1.time_window_seconds", self.time_window_seconds)?;
        positive("stage1.space_window_degrees", self.space_window_degrees)?;
        at_least_one("stage1.min_cluster_size", self.min_cluster_size)
    }
}

/// Similarity-graph merge of eventlets into album candidates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Stage2Config {
    /// Eventlets further apart than this are never connected.
    pub merge_time_window_days: f64,

    /// Cosine distance between mean embeddings must be strictly below this.
    pub merge_similarity_threshold: f64,

    /// Components with fewer eventlets are discarded.
    pub min_eventlets_for_album: usize,
}

impl Stage2Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("stage2.merge_time_window_days", self.merge_time_window_days)?;
        positive("stage2.merge_similarity_threshold", self.merge_similarity_threshold)?;
        at_least_one("stage2.min_eventlets_for_album", self.min_eventlets_for_album)
    }

    pub fn merge_time_window_seconds(&self) -> f64 {
        self.merge_time_window_days * 86_400.0
    }
}

/// Matching unclustered assets against finalized albums.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AdditionsConfig {
    /// Half of the margin added on each side of an album's date range.
    pub time_threshold_hours: f64,
}

impl AdditionsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("additions.time_threshold_hours", self.time_threshold_hours)
    }

    /// Margin applied before the start and after the end of an album.
    pub fn margin(&self) -> chrono::Duration {
        let seconds = 2.0 * self.time_threshold_hours * 3600.0;
        chrono::Duration::milliseconds((seconds * 1000.0).round() as i64)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PreprocessConfig {
    /// Expected embedding length. When unset, the first parsable row decides.
    #[serde(default)]
    pub embedding_dimension: Option<usize>,
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.embedding_dimension {
            Some(dim) => at_least_one("preprocess.embedding_dimension", dim),
            None => Ok(()),
        }
    }
}

/// Limits a run to the most recently created assets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DevModeConfig {
    #[serde(default)]
    pub enabled: bool,

    /// 0 means no limit.
    #[serde(default)]
    pub sample_size: usize,
}

impl DevModeConfig {
    pub fn row_limit(&self) -> Option<usize> {
        (self.enabled && self.sample_size > 0).then_some(self.sample_size)
    }
}

/// Fallback text for suggestions that have not been captioned yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DefaultsConfig {
    /// `{date_str}` is replaced by the month and year of the event.
    #[serde(default = "default_title_template")]
    pub title_template: String,

    #[serde(default = "default_description")]
    pub description: String,
}

fn default_title_template() -> String {
    "Event from {date_str}".to_string()
}

fn default_description() -> String {
    "An automatically suggested album.".to_string()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            title_template: default_title_template(),
            description: default_description(),
        }
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn at_least_one(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value >= 1 {
        Ok(())
    } else {
        Err(ConfigError::ZeroCount { field })
    }
}

impl Config {
    /// Load from `$ALBUM_SUGGESTER_CONFIG` or the per-user config directory.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section once, before any stage runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stage1.validate()?;
        self.stage2.validate()?;
        self.additions.validate()?;
        self.preprocess.validate()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("album-suggester")
    }

    pub fn config_path() -> PathBuf {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => Self::config_dir().join("config.toml"),
        }
    }
}
