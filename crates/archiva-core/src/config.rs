//! Runtime configuration for evidence audits and their pipelines.
//!
//! Values come from defaults, an optional TOML file and `ARCHIVA_*`
//! environment variables, applied in that order.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ConfigError {
    pub fn invalid_value(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Evidence audit configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    /// Storage strategy holding secure exports and reports
    pub default_strategy: String,
    /// Name of the NDJSON entry inside a secure export zip
    pub secure_export_entry: String,
    /// Number of per-object tasks running concurrently
    pub worker_concurrency: usize,
    /// Page size when scrolling the unit selection
    pub scroll_batch_size: usize,
    /// Number of object names per bulk availability check
    pub availability_batch_size: usize,
    pub availability_retry_delay_ms: u64,
    /// Availability checks attempted before a corrective run is deferred
    pub availability_max_attempts: u32,
    /// Computed fields stripped from units before digesting
    pub unit_computed_fields: Vec<String>,
    /// Computed fields stripped from object groups before digesting
    pub object_group_computed_fields: Vec<String>,
    /// Directory for downloaded exports; the system temp dir when unset
    pub tmp_dir: Option<PathBuf>,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        let common = ["_glpd", "_us", "_uds", "_us_sp", "_graph"];
        let unit_only = [
            "_max",
            "_min",
            "_computedInheritedRules",
            "_validComputedInheritedRules",
        ];
        Self {
            default_strategy: "default".to_string(),
            secure_export_entry: "data.txt".to_string(),
            worker_concurrency: 8,
            scroll_batch_size: 1000,
            availability_batch_size: 100,
            availability_retry_delay_ms: 30_000,
            availability_max_attempts: 3,
            unit_computed_fields: common
                .iter()
                .chain(unit_only.iter())
                .map(|s| (*s).to_string())
                .collect(),
            object_group_computed_fields: common.iter().map(|s| (*s).to_string()).collect(),
            tmp_dir: None,
        }
    }
}

impl EvidenceConfig {
    /// Parse a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, then apply environment overrides.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&content)?;
        config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `ARCHIVA_*` environment variables.
    pub fn merge_with_env(&mut self) -> Result<(), ConfigError> {
        self.merge_with_vars(std::env::vars())
    }

    fn merge_with_vars(
        &mut self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<(), ConfigError> {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix("ARCHIVA_") else {
                continue;
            };
            match name.to_ascii_lowercase().as_str() {
                "default_strategy" => self.default_strategy = value,
                "secure_export_entry" => self.secure_export_entry = value,
                "worker_concurrency" => self.worker_concurrency = parse_number(&key, &value)?,
                "scroll_batch_size" => self.scroll_batch_size = parse_number(&key, &value)?,
                "availability_batch_size" => {
                    self.availability_batch_size = parse_number(&key, &value)?;
                }
                "availability_retry_delay_ms" => {
                    self.availability_retry_delay_ms = parse_number(&key, &value)?;
                }
                "availability_max_attempts" => {
                    self.availability_max_attempts = parse_number(&key, &value)?;
                }
                "unit_computed_fields" => self.unit_computed_fields = parse_list(&value),
                "object_group_computed_fields" => {
                    self.object_group_computed_fields = parse_list(&value);
                }
                "tmp_dir" => self.tmp_dir = Some(PathBuf::from(value)),
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_strategy.is_empty() {
            return Err(ConfigError::invalid_value("default_strategy", "must not be empty"));
        }
        if self.secure_export_entry.is_empty() {
            return Err(ConfigError::invalid_value(
                "secure_export_entry",
                "must not be empty",
            ));
        }
        for (key, value) in [
            ("worker_concurrency", self.worker_concurrency),
            ("scroll_batch_size", self.scroll_batch_size),
            ("availability_batch_size", self.availability_batch_size),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid_value(key, "must be at least 1"));
            }
        }
        if self.availability_max_attempts == 0 {
            return Err(ConfigError::invalid_value(
                "availability_max_attempts",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid_value(key, e.to_string()))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
