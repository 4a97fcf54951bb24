//! Project configuration loaded from YAML.
//!
//! One explicit value object carries every tunable; nothing is read from
//! ambient globals. API keys are resolved from the environment by the
//! provider factory and never stored here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("threshold policy is missing the required 'default' entry")]
    MissingDefaultThreshold,

    #[error("threshold for '{field}' is {value}, expected a value in [0, 1]")]
    ThresholdOutOfRange { field: String, value: f64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Per-field minimum confidence map with a required `default` entry.
///
/// The `default` entry doubles as the fallback for unlisted fields and as
/// the overall-acceptance bar.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>")]
pub struct ThresholdPolicy {
    thresholds: BTreeMap<String, f64>,
}

impl ThresholdPolicy {
    pub const DEFAULT_KEY: &'static str = "default";

    pub fn new(thresholds: BTreeMap<String, f64>) -> Result<Self, ConfigError> {
        if !thresholds.contains_key(Self::DEFAULT_KEY) {
            return Err(ConfigError::MissingDefaultThreshold);
        }
        for (field, &value) in &thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange {
                    field: field.clone(),
                    value,
                });
            }
        }
        Ok(Self { thresholds })
    }

    /// Threshold for a field, falling back to the `default` entry.
    pub fn threshold_for(&self, field: &str) -> f64 {
        self.thresholds
            .get(field)
            .copied()
            .unwrap_or_else(|| self.default_threshold())
    }

    pub fn default_threshold(&self) -> f64 {
        self.thresholds[Self::DEFAULT_KEY]
    }
}

impl TryFrom<BTreeMap<String, f64>> for ThresholdPolicy {
    type Error = ConfigError;

    fn try_from(map: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        Self::new(map)
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        let thresholds = BTreeMap::from([
            ("default".to_string(), 0.75),
            ("brand".to_string(), 0.80),
            ("model_or_type".to_string(), 0.70),
            ("primary_colors".to_string(), 0.65),
            ("materials".to_string(), 0.70),
            ("condition".to_string(), 0.75),
        ]);
        Self { thresholds }
    }
}

/// Image ingestion limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    pub max_images_per_item: usize,
    pub max_resolution: u32,
    pub supported_formats: Vec<String>,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            max_images_per_item: 3,
            max_resolution: 768,
            supported_formats: vec![
                ".jpg".to_string(),
                ".jpeg".to_string(),
                ".png".to_string(),
                ".webp".to_string(),
            ],
        }
    }
}

/// Settings for one provider block.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 1000,
            temperature: 0.1,
            timeout_secs: 30,
        }
    }
}

/// Security toggles applied during ingestion.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub strip_exif: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self { strip_exif: true }
    }
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub storage_root: PathBuf,
    pub file_path: PathBuf,
    pub create_dirs: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./storage"),
            file_path: PathBuf::from("./storage.parquet"),
            create_dirs: true,
        }
    }
}

/// Top-level project configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Component selector, e.g. `ingest.fs`.
    pub ingestor: String,
    /// Component selector, e.g. `providers.mistral`.
    pub provider: String,
    /// Component selector, e.g. `storage.files` or `storage.flat`.
    pub storage: String,

    pub schema_path: PathBuf,
    pub prompt_template: PathBuf,

    #[serde(default)]
    pub thresholds: ThresholdPolicy,
    #[serde(default)]
    pub io: IoConfig,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub storage_config: StorageConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&text)?;
        tracing::debug!(path = %path.display(), provider = %config.provider, "loaded config");
        Ok(config)
    }

    /// Settings for a provider by bare name (`mistral`, not `providers.mistral`).
    pub fn provider_config(&self, name: &str) -> ProviderConfig {
        self.providers.get(name).cloned().unwrap_or_default()
    }

    /// Bare provider name with the `providers.` selector prefix removed.
    pub fn provider_name(&self) -> &str {
        self.provider
            .strip_prefix("providers.")
            .unwrap_or(&self.provider)
    }

    /// Bare storage name with the `storage.` selector prefix removed.
    pub fn storage_name(&self) -> &str {
        self.storage.strip_prefix("storage.").unwrap_or(&self.storage)
    }
}
