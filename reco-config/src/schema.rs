//! Strongly typed settings schema.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

/// Top-level settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Memory store sizing and consolidation policy.
    pub memory: MemorySettings,
    /// Model used to reflect on short-term windows.
    #[serde(default = "OllamaSettings::generator")]
    pub generator: OllamaSettings,
    /// Model used to embed long-term reflections.
    #[serde(default = "OllamaSettings::embedder")]
    pub embedder: OllamaSettings,
    /// Structured logging output.
    pub logging: LoggingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            memory: MemorySettings::default(),
            generator: OllamaSettings::generator(),
            embedder: OllamaSettings::embedder(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Settings {
    /// Checks value ranges that the type system cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        self.memory.validate()?;
        self.generator.validate("generator")?;
        self.embedder.validate("embedder")?;
        Ok(())
    }
}

/// Sizing and policy knobs for the memory coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemorySettings {
    /// Number of interactions kept in the short-term window.
    pub short_term_limit: usize,
    /// Consolidate every N updates; defaults to `short_term_limit` when unset.
    pub consolidate_every: Option<u64>,
    /// Number of long-term reflections returned per retrieval.
    pub retrieve_top_k: usize,
    /// Dimensionality produced by the embedder.
    pub embedding_dimensions: usize,
    /// Lowest rating on the source scale.
    pub rating_min: i64,
    /// Highest rating on the source scale.
    pub rating_max: i64,
    /// Replacement reflection prompt; must contain `{{interactions}}`.
    pub reflection_template: Option<String>,
    /// Directory loaded at startup when present.
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            short_term_limit: 10,
            consolidate_every: None,
            retrieve_top_k: 3,
            embedding_dimensions: 768,
            rating_min: 1,
            rating_max: 5,
            reflection_template: None,
            snapshot_dir: None,
        }
    }
}

impl MemorySettings {
    fn validate(&self) -> ConfigResult<()> {
        if self.short_term_limit == 0 {
            return Err(invalid("memory.short_term_limit", "must be at least 1"));
        }
        if self.consolidate_every == Some(0) {
            return Err(invalid("memory.consolidate_every", "must be at least 1"));
        }
        if self.retrieve_top_k == 0 {
            return Err(invalid("memory.retrieve_top_k", "must be at least 1"));
        }
        if self.embedding_dimensions == 0 {
            return Err(invalid("memory.embedding_dimensions", "must be at least 1"));
        }
        if self.rating_min >= self.rating_max {
            return Err(invalid(
                "memory.rating_min",
                "must be lower than memory.rating_max",
            ));
        }
        Ok(())
    }
}

/// Connection settings for an Ollama-served model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OllamaSettings {
    /// Base URL of the daemon.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model name as known to the daemon.
    pub model: String,
    /// Optional sampling temperature.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Optional generation cap.
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl OllamaSettings {
    /// Default generation model settings.
    #[must_use]
    pub fn generator() -> Self {
        Self::with_model("llama3.1")
    }

    /// Default embedding model settings.
    #[must_use]
    pub fn embedder() -> Self {
        Self::with_model("nomic-embed-text")
    }

    fn with_model(model: &str) -> Self {
        Self {
            base_url: default_base_url(),
            model: model.to_owned(),
            temperature: None,
            max_output_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    fn validate(&self, section: &'static str) -> ConfigResult<()> {
        if self.model.trim().is_empty() {
            return Err(invalid(section, "model must not be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid(section, "timeout_secs must be at least 1"));
        }
        Ok(())
    }
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Multi-field human readable lines.
    #[default]
    Full,
    /// Condensed single-line output.
    Compact,
}

/// Structured logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
    /// Emit an event when spans close, with their timing.
    pub span_events: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            format: LogFormat::Full,
            span_events: false,
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:11434/".to_owned()
}

const fn default_timeout_secs() -> u64 {
    60
}

fn invalid(field: &'static str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.memory.retrieve_top_k, 3);
        assert_eq!(settings.embedder.model, "nomic-embed-text");
    }

    #[test]
    fn rejects_inverted_rating_scale() {
        let mut settings = Settings::default();
        settings.memory.rating_min = 5;
        settings.memory.rating_max = 1;
        let err = settings.validate().expect_err("inverted scale");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "memory.rating_min",
                ..
            }
        ));
    }

    #[test]
    fn rejects_zero_consolidation_period() {
        let mut settings = Settings::default();
        settings.memory.consolidate_every = Some(0);
        assert!(settings.validate().is_err());
    }
}
