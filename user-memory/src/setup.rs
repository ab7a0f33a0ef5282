//! Wiring a [`UserMemory`] to Ollama-served models from [`Settings`].

use std::sync::Arc;
use std::time::Duration;

use reco_adapters::ollama::{OllamaAdapter, OllamaConfig};
use reco_adapters::traits::AdapterError;
use reco_config::{OllamaSettings, Settings};
use reco_memory::{MemoryError, UserMemory, UserMemoryBuilder};
use thiserror::Error;
use tracing::info;

/// Errors raised while assembling a memory from settings.
#[derive(Debug, Error)]
pub enum SetupError {
    /// An adapter could not be configured.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    /// The memory could not be built or its snapshot loaded.
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Translates Ollama settings into an adapter.
///
/// # Errors
///
/// Returns [`AdapterError::Configuration`] for an invalid base URL.
pub fn ollama_adapter(settings: &OllamaSettings) -> Result<OllamaAdapter, AdapterError> {
    let mut config = OllamaConfig::new(settings.model.clone())
        .with_base_url(&settings.base_url)?
        .with_timeout(Duration::from_secs(settings.timeout_secs));
    if let Some(temperature) = settings.temperature {
        config = config.with_temperature(temperature);
    }
    if let Some(tokens) = settings.max_output_tokens {
        config = config.with_max_output_tokens(tokens);
    }
    OllamaAdapter::new(config)
}

/// Returns a builder preconfigured with the generator and embedder from
/// `settings`, ready for further customisation.
///
/// # Errors
///
/// See [`SetupError`].
pub fn builder_from_settings(settings: &Settings) -> Result<UserMemoryBuilder, SetupError> {
    let generator = ollama_adapter(&settings.generator)?;
    let embedder = ollama_adapter(&settings.embedder)?;
    Ok(UserMemoryBuilder::from_settings(&settings.memory)?
        .with_generator(Arc::new(generator))
        .with_embedder(Arc::new(embedder)))
}

/// Builds a memory from `settings`, loading its snapshot directory if set.
///
/// # Errors
///
/// See [`SetupError`].
pub async fn user_memory_from_settings(settings: &Settings) -> Result<UserMemory, SetupError> {
    let memory = builder_from_settings(settings)?.build().await?;
    info!(
        generator = %settings.generator.model,
        embedder = %settings.embedder.model,
        "user memory ready"
    );
    Ok(memory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_from_default_settings() {
        let memory = user_memory_from_settings(&Settings::default()).await.unwrap();
        assert_eq!(memory.config().short_term_limit().get(), 10);
        assert_eq!(memory.config().consolidate_every().get(), 10);
        assert_eq!(memory.long_term().dimensions().get(), 768);
    }

    #[test]
    fn rejects_bad_base_url() {
        let mut settings = Settings::default();
        settings.embedder.base_url = "ollama:11434".to_owned();
        let err = builder_from_settings(&settings).expect_err("missing scheme");
        assert!(matches!(err, SetupError::Adapter(AdapterError::Configuration { .. })));
    }

    #[test]
    fn rejects_template_without_placeholder() {
        let mut settings = Settings::default();
        settings.memory.reflection_template = Some("no placeholder".to_owned());
        let err = builder_from_settings(&settings).expect_err("bad template");
        assert!(matches!(err, SetupError::Memory(MemoryError::InvalidTemplate(_))));
    }
}
