//! Error types for configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors emitted while reading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path that was being read.
        path: PathBuf,
        /// Source [`std::io::Error`].
        source: std::io::Error,
    },
    /// The settings file is not valid TOML for the schema.
    #[error("failed to parse settings: {source}")]
    Parse {
        /// Source [`toml::de::Error`].
        #[from]
        source: toml::de::Error,
    },
    /// A value parsed correctly but is out of range.
    #[error("invalid setting `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Human-readable reason for rejection.
        reason: &'static str,
    },
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
