//! Settings file loader.

use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use crate::schema::Settings;
use crate::{ConfigError, ConfigResult};

/// Parses and validates settings from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed TOML and
/// [`ConfigError::Invalid`] for out-of-range values.
pub fn parse_settings(content: &str) -> ConfigResult<Settings> {
    let settings: Settings = toml::from_str(content)?;
    settings.validate()?;
    Ok(settings)
}

/// Loads settings from `path`.
///
/// A missing file yields [`Settings::default`]; any other read failure, parse
/// failure or invalid value is returned to the caller.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file exists but cannot be used.
pub async fn load_settings(path: &Path) -> ConfigResult<Settings> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "settings file not found, using defaults");
            return Ok(Settings::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let settings = parse_settings(&content)?;
    debug!(path = %path.display(), "settings loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LogFormat;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_returns_defaults() {
        let tmp = TempDir::new().unwrap();
        let settings = load_settings(&tmp.path().join("memory.toml")).await.unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn parses_partial_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("memory.toml");
        tokio::fs::write(
            &path,
            r#"
[memory]
short_term_limit = 2
consolidate_every = 3
embedding_dimensions = 64

[embedder]
model = "all-minilm"
base_url = "http://gpu-box:11434"

[logging]
filter = "reco_memory=debug"
format = "compact"
"#,
        )
        .await
        .unwrap();

        let settings = load_settings(&path).await.unwrap();
        assert_eq!(settings.memory.short_term_limit, 2);
        assert_eq!(settings.memory.consolidate_every, Some(3));
        assert_eq!(settings.memory.retrieve_top_k, 3);
        assert_eq!(settings.embedder.model, "all-minilm");
        assert_eq!(settings.embedder.timeout_secs, 60);
        assert_eq!(settings.generator.model, "llama3.1");
        assert_eq!(settings.logging.format, LogFormat::Compact);
    }

    #[test]
    fn section_without_model_is_rejected() {
        let err = parse_settings("[generator]\ntemperature = 0.3\n").expect_err("model required");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse_settings("[memory]\nshort_term_limt = 4\n").expect_err("typo");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = parse_settings("[memory]\nshort_term_limit = 0\n").expect_err("zero limit");
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
