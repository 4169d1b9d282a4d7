//! Pipeline configuration, loaded from TOML.
//!
//! Every section and field is optional; missing values take the defaults
//! below.
//!
//! ```toml
//! [provider]
//! base_url = "https://api.jolpi.ca/ergast/f1"
//! timeout_secs = 30
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 1000
//!
//! [batch]
//! width = 4
//! report_dropped = false
//! ```

use gridstats_core::data::ErgastConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration for a `Pipeline`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub provider: ErgastConfig,
    pub retry: RetryPolicy,
    pub batch: BatchConfig,
}

impl PipelineConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.width == 0 {
            return Err(ConfigError::Invalid("batch.width must be at least 1".into()));
        }
        if self.provider.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.base_url is empty".into()));
        }
        Ok(())
    }
}

/// Attempt cap and linear backoff for single-unit dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt with zero-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt) + 1))
    }
}

/// Fan-out settings for multi-entity requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Entities dispatched concurrently per batch.
    pub width: usize,
    /// Record a dropped batch in the aggregated error list instead of only
    /// logging it.
    pub report_dropped: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            width: 4,
            report_dropped: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.batch.width, 4);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            [retry]
            base_delay_ms = 10

            [batch]
            report_dropped = true
            "#,
        )
        .unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 10);
        assert!(config.batch.report_dropped);
        assert_eq!(config.batch.width, 4);
    }

    #[test]
    fn linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(3));
    }

    #[test]
    fn zero_batch_width_is_rejected() {
        let err = PipelineConfig::from_toml("[batch]\nwidth = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_attempts_is_accepted() {
        let config = PipelineConfig::from_toml("[retry]\nmax_attempts = 0\n").unwrap();
        assert_eq!(config.retry.max_attempts, 0);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = PipelineConfig::from_toml("[retry\nmax_attempts = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[provider]\nbase_url = \"http://localhost:8000/f1\"").unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.provider.base_url, "http://localhost:8000/f1");
        assert_eq!(config.provider.timeout_secs, 30);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
