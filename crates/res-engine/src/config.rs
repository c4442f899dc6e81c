// config.rs - Engine configuration.
//
// EngineConfig is read from `<home>/config.toml`. Every field has a serde
// default, so an empty or missing file yields the stock setup. File paths
// are derived from the home directory by `for_home()`; only the data file
// location can be overridden.

use std::path::{Path, PathBuf};

use res_classifier::ClassifierConfig;
use res_goal::SparklineSettings;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::submission::TieBreak;

pub const CONFIG_FILE: &str = "config.toml";
pub const DATA_FILE: &str = "data.json";
pub const EVENTS_FILE: &str = "events.jsonl";

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding data, config and event log. Not read from the file.
    #[serde(skip)]
    pub home: PathBuf,

    /// Override for the state document location. Relative paths are
    /// resolved against `home`.
    #[serde(default)]
    pub data_file: Option<PathBuf>,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub progress: ProgressConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// `[matching]`: when a classifier suggestion is applied without asking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Suggestions strictly above this confidence are applied directly.
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: f64,

    #[serde(default)]
    pub tie_break: TieBreak,

    /// Most submissions held for confirmation at once. The oldest is
    /// dropped when a new one would exceed it.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: default_acceptance_threshold(),
            tie_break: TieBreak::default(),
            max_pending: default_max_pending(),
        }
    }
}

/// `[progress]`: sparkline shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "default_sparkline_buckets")]
    pub sparkline_buckets: usize,

    #[serde(default = "default_bucket_size_days")]
    pub bucket_size_days: u32,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            sparkline_buckets: default_sparkline_buckets(),
            bucket_size_days: default_bucket_size_days(),
        }
    }
}

impl ProgressConfig {
    pub fn sparkline(&self) -> SparklineSettings {
        SparklineSettings {
            buckets: self.sparkline_buckets,
            bucket_size_days: self.bucket_size_days,
        }
    }
}

// Serde default functions
fn default_acceptance_threshold() -> f64 {
    0.7
}

fn default_max_pending() -> usize {
    32
}

fn default_sparkline_buckets() -> usize {
    7
}

fn default_bucket_size_days() -> u32 {
    1
}

impl EngineConfig {
    /// Stock configuration with files under `home`.
    pub fn for_home(home: impl AsRef<Path>) -> Self {
        Self {
            home: home.as_ref().to_path_buf(),
            data_file: None,
            matching: MatchingConfig::default(),
            progress: ProgressConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }

    /// `~/.resolutions`, if the platform has a home directory.
    pub fn default_home() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".resolutions"))
    }

    /// Load and validate a config file. Its parent directory becomes `home`.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path).map_err(|e| EngineError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut config: EngineConfig = toml::from_str(&content).map_err(|e| EngineError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.home = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.validate().map_err(|reason| EngineError::Config {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(config)
    }

    /// Load `<home>/config.toml`, or the stock config if there is none.
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(home: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = home.as_ref().join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::for_home(home))
        }
    }

    pub fn data_file(&self) -> PathBuf {
        match &self.data_file {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.home.join(path),
            None => self.home.join(DATA_FILE),
        }
    }

    pub fn events_log(&self) -> PathBuf {
        self.home.join(EVENTS_FILE)
    }

    pub fn validate(&self) -> Result<(), String> {
        let threshold = self.matching.acceptance_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(format!(
                "matching.acceptance_threshold must be within 0..=1, got {}",
                threshold
            ));
        }
        if self.matching.max_pending == 0 {
            return Err("matching.max_pending must be at least 1".to_string());
        }
        if self.progress.sparkline_buckets == 0 {
            return Err("progress.sparkline_buckets must be at least 1".to_string());
        }
        if self.progress.bucket_size_days == 0 {
            return Err("progress.bucket_size_days must be at least 1".to_string());
        }
        self.classifier.validate().map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use res_classifier::Backend;
    use tempfile::tempdir;

    #[test]
    fn for_home_derives_paths() {
        let config = EngineConfig::for_home("/tmp/res-home");
        assert_eq!(config.data_file(), PathBuf::from("/tmp/res-home/data.json"));
        assert_eq!(config.events_log(), PathBuf::from("/tmp/res-home/events.jsonl"));
        assert_eq!(config.matching.acceptance_threshold, 0.7);
        assert_eq!(config.matching.tie_break, TieBreak::MostRecentActivity);
        assert_eq!(config.matching.max_pending, 32);
        assert_eq!(config.progress.sparkline(), SparklineSettings::default());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config, EngineConfig::for_home(dir.path()));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
data_file = "state/goals.json"

[matching]
acceptance_threshold = 0.85
tie_break = "classifier_order"

[classifier]
backend = "offline"
"#,
        )
        .unwrap();

        let config = EngineConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.home, dir.path());
        assert_eq!(config.matching.acceptance_threshold, 0.85);
        assert_eq!(config.matching.tie_break, TieBreak::ClassifierOrder);
        assert_eq!(config.progress.sparkline_buckets, 7);
        assert_eq!(config.classifier.backend, Backend::Offline);
        assert_eq!(config.classifier.timeout_ms, 10_000);
        assert_eq!(config.data_file(), dir.path().join("state/goals.json"));
    }

    #[test]
    fn malformed_or_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        std::fs::write(&path, "[matching\nacceptance_threshold = ").unwrap();
        assert!(matches!(
            EngineConfig::load_or_default(dir.path()),
            Err(EngineError::Config { .. })
        ));

        std::fs::write(&path, "[matching]\nacceptance_threshold = 1.5\n").unwrap();
        let err = EngineConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("acceptance_threshold"));

        std::fs::write(&path, "[matching]\nmax_pending = 0\n").unwrap();
        assert!(EngineConfig::load(&path).is_err());

        std::fs::write(&path, "[classifier]\nbackend = \"http\"\n").unwrap();
        assert!(EngineConfig::load(&path).is_err());
    }
}
