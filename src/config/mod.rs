//! Configuration for amperage

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::core::scheduler::{clamp_interval, DEFAULT_INTERVAL, MIN_INTERVAL};
use crate::integrations::processes::SortKey;
use crate::telemetry::Metric;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    #[error("{0} already exists, use --force to overwrite")]
    AlreadyExists(PathBuf),
}

/// Global application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub sampling: SamplingConfig,
    pub history: HistoryConfig,
    pub metrics: MetricsConfig,
    pub display: DisplayConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.validate())
    }

    /// Load `path`, or the default location, falling back to defaults on any error
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => return Self::default(),
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "using default configuration");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, content).map_err(io_err)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("amperage").join("config.toml"))
    }

    /// Clamp out-of-range values instead of rejecting the file
    pub fn validate(mut self) -> Self {
        let interval = clamp_interval(Duration::from_millis(self.sampling.interval_ms));
        self.sampling.interval_ms = interval.as_millis() as u64;
        self.sampling.top_processes = self.sampling.top_processes.clamp(1, 100);
        self.sampling.command_timeout_ms = self.sampling.command_timeout_ms.clamp(100, 30_000);

        self.history.retention_secs = self.history.retention_secs.clamp(60, 3600);

        self.metrics.enabled.sort();
        self.metrics.enabled.dedup();

        let retention = self.history.retention_secs;
        self.display.window_secs = self.display.window_secs.clamp(10, retention);
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.sampling.interval_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.sampling.command_timeout_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.history.retention_secs)
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.display.window_secs)
    }

    /// History slots per metric, enough for the retention at the fastest interval
    pub fn history_capacity(&self) -> usize {
        crate::telemetry::HistoryStore::capacity_for(self.retention(), MIN_INTERVAL)
    }

    pub fn is_enabled(&self, metric: Metric) -> bool {
        self.metrics.enabled.contains(&metric)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub interval_ms: u64,
    /// Consecutive failures a source may have before stale values turn unavailable
    pub stale_limit: u32,
    pub top_processes: usize,
    pub command_timeout_ms: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL.as_millis() as u64,
            stale_limit: 5,
            top_processes: 10,
            command_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub retention_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_secs: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: Vec<Metric>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: Metric::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub theme: String,
    pub window_secs: u64,
    pub process_sort: SortKey,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            theme: "tokyo-night".to_string(),
            window_secs: 60,
            process_sort: SortKey::Cpu,
        }
    }
}

/// Write the default configuration file
pub fn init_config(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    Config::default().save(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[sampling]\ninterval_ms = 500\n\n[metrics]\nenabled = [\"battery-percent\", \"cpu-power\"]\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.interval(), Duration::from_millis(500));
        assert_eq!(config.sampling.stale_limit, 5);
        assert_eq!(config.history.retention_secs, 600);
        assert!(config.is_enabled(Metric::CpuPower));
        assert!(!config.is_enabled(Metric::GpuPower));
        assert_eq!(config.display.theme, "tokyo-night");
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut config = Config::default();
        config.sampling.interval_ms = 5;
        config.sampling.top_processes = 0;
        config.history.retention_secs = 120;
        config.display.window_secs = 600;

        let config = config.validate();
        assert_eq!(config.interval(), MIN_INTERVAL);
        assert_eq!(config.sampling.top_processes, 1);
        assert_eq!(config.display.window_secs, 120);
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sampling\ninterval_ms = \"fast\"").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
        assert_eq!(Config::load_or_default(Some(&path)), Config::default());
    }

    #[test]
    fn unknown_metric_name_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[metrics]\nenabled = [\"fan-speed\"]\n").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        assert_eq!(Config::load_or_default(Some(&path)), Config::default());
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        init_config(&path, false).unwrap();
        assert_eq!(Config::load(&path).unwrap(), Config::default());

        assert!(matches!(
            init_config(&path, false),
            Err(ConfigError::AlreadyExists(_))
        ));
        init_config(&path, true).unwrap();
    }
}
