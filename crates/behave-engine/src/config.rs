//! Runtime configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! result_policy = "last"
//! allow_deprecated_names = true
//! log_call_failures = false
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Errors while loading a [`BehaviorConfig`]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// TOML did not decode into a config
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Which handler result a value-returning broadcast keeps when several
/// handlers respond
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultPolicy {
    /// First handler to respond wins
    #[default]
    #[serde(rename = "first")]
    FirstResponder,
    /// Last handler to respond wins
    #[serde(rename = "last")]
    LastResponder,
}

/// Context-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Aggregation of value-returning bus broadcasts
    pub result_policy: ResultPolicy,
    /// Register deprecated-name aliases
    pub allow_deprecated_names: bool,
    /// Report failed calls through the log
    pub log_call_failures: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            result_policy: ResultPolicy::FirstResponder,
            allow_deprecated_names: true,
            log_call_failures: true,
        }
    }
}

impl BehaviorConfig {
    /// Parse from a TOML string; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> String {
        // Plain struct of scalars; serialization cannot fail.
        toml::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BehaviorConfig::from_toml_str("").unwrap();
        assert_eq!(config, BehaviorConfig::default());
        assert_eq!(config.result_policy, ResultPolicy::FirstResponder);
    }

    #[test]
    fn test_partial_override() {
        let config = BehaviorConfig::from_toml_str("result_policy = \"last\"\nlog_call_failures = false").unwrap();
        assert_eq!(config.result_policy, ResultPolicy::LastResponder);
        assert!(!config.log_call_failures);
        assert!(config.allow_deprecated_names);
    }

    #[test]
    fn test_invalid_policy() {
        let err = BehaviorConfig::from_toml_str("result_policy = \"random\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "allow_deprecated_names = false").unwrap();
        let config = BehaviorConfig::load(file.path()).unwrap();
        assert!(!config.allow_deprecated_names);

        let missing = BehaviorConfig::load(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = BehaviorConfig {
            result_policy: ResultPolicy::LastResponder,
            ..Default::default()
        };
        assert_eq!(BehaviorConfig::from_toml_str(&config.to_toml_string()).unwrap(), config);
    }
}
