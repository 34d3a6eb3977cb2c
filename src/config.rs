//! Engine configuration
//!
//! Loaded from a JSON file; every field is optional:
//!
//! ```json
//! {
//!   "reader": { "async_buffer_size": 65536, "pool_retain": 16, "max_depth": 64 },
//!   "shape_policy": "abort",
//!   "logging": { "format": "pretty" }
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed stack buffer used by synchronous readers for each refill
pub const SYNC_BUFFER_SIZE: usize = 8 * 1024;

/// Deepest nesting `reader.max_depth` may allow. Matched elements are decoded
/// with serde_json, which refuses more than 127 nested containers.
pub const MAX_DEPTH_LIMIT: usize = 127;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// What to do with an element that is valid JSON but not the declared shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapePolicy {
    /// Fail the query at that element
    #[default]
    Abort,
    /// Drop the element and keep going
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Size of each pooled buffer used by asynchronous readers
    #[serde(default = "default_async_buffer_size")]
    pub async_buffer_size: usize,

    /// Idle pooled buffers kept for reuse
    #[serde(default = "default_pool_retain")]
    pub pool_retain: usize,

    /// Maximum container nesting
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_async_buffer_size() -> usize {
    64 * 1024
}
fn default_pool_retain() -> usize {
    16
}
fn default_max_depth() -> usize {
    64
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            async_buffer_size: default_async_buffer_size(),
            pool_retain: default_pool_retain(),
            max_depth: default_max_depth(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,

    /// Filter directive used when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub reader: ReaderConfig,

    #[serde(default)]
    pub shape_policy: ShapePolicy,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reader.async_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "reader.async_buffer_size must be > 0".into(),
            ));
        }
        if self.reader.max_depth == 0 {
            return Err(ConfigError::Invalid("reader.max_depth must be > 0".into()));
        }
        if self.reader.max_depth > MAX_DEPTH_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "reader.max_depth must be <= {}",
                MAX_DEPTH_LIMIT
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.reader.async_buffer_size, 65536);
        assert_eq!(config.reader.pool_retain, 16);
        assert_eq!(config.reader.max_depth, 64);
        assert_eq!(config.shape_policy, ShapePolicy::Abort);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"reader": {"max_depth": 8}, "shape_policy": "skip"}"#).unwrap();
        assert_eq!(config.reader.max_depth, 8);
        assert_eq!(config.reader.async_buffer_size, 65536);
        assert_eq!(config.shape_policy, ShapePolicy::Skip);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_load_validates() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"reader": {{"async_buffer_size": 0}}}}"#).unwrap();
        let err = EngineConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_max_depth_bounded_by_decoder() {
        let mut config = EngineConfig::default();
        config.reader.max_depth = MAX_DEPTH_LIMIT;
        assert!(config.validate().is_ok());

        config.reader.max_depth = MAX_DEPTH_LIMIT + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"reader": {{"max_depth": 512}}}}"#).unwrap();
        assert!(EngineConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load(Path::new("/nonexistent/jsonflow.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
