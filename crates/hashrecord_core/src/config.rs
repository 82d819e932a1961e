//! Repository configuration.
//!
//! Parsed from JSON by the embedding application; loading files from disk
//! is left to the caller.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Prepended as `prefix:` to every store key.
    pub key_prefix: Option<String>,
    /// Batch size used by `all`.
    pub default_batch_size: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            key_prefix: None,
            default_batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid repository config: {err}"),
            Self::Invalid(message) => write!(f, "invalid repository config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl RepositoryConfig {
    /// Parses and validates a JSON document; missing fields take defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "default_batch_size must be greater than zero".to_string(),
            ));
        }
        if let Some(prefix) = &self.key_prefix {
            if prefix.trim().is_empty() || prefix.contains(char::is_whitespace) {
                return Err(ConfigError::Invalid(format!(
                    "key_prefix must be non-blank without whitespace, got `{prefix}`"
                )));
            }
        }
        Ok(())
    }
}
