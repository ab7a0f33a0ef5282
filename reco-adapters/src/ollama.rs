//! `Ollama` adapter providing both text generation and embeddings.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use hyper::body::to_bytes;
use hyper::{Body, Request, Uri};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::debug;

use crate::http_client::{HyperClient, build_https_client};
use crate::traits::{AdapterError, AdapterMetadata, AdapterResult, TextEmbedder, TextGenerator};

/// Configuration for the `Ollama` adapter.
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    base_url: String,
    model: String,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
    timeout: Duration,
}

impl OllamaConfig {
    /// Creates a configuration for the supplied model using default settings.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: "http://127.0.0.1:11434/".to_owned(),
            model: model.into(),
            temperature: None,
            max_output_tokens: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Overrides the base URL of the Ollama daemon.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the supplied URL is invalid.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> AdapterResult<Self> {
        self.base_url = sanitize_base_url(base_url.as_ref())?;
        Ok(self)
    }

    /// Sets the sampling temperature used for generation.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Caps the number of generated tokens.
    #[must_use]
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Sets the HTTP timeout for requests to the Ollama daemon.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// `Ollama` adapter that calls the daemon over HTTP/HTTPS.
///
/// The configured model is used for `/api/generate` when the adapter acts as a
/// [`TextGenerator`] and for `/api/embeddings` when it acts as a
/// [`TextEmbedder`]; build one adapter per model.
pub struct OllamaAdapter {
    client: HyperClient,
    generate_endpoint: Uri,
    embeddings_endpoint: Uri,
    metadata: AdapterMetadata,
    timeout: Duration,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

impl fmt::Debug for OllamaAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OllamaAdapter")
            .field("model", &self.metadata.model())
            .field("generate_endpoint", &self.generate_endpoint)
            .finish_non_exhaustive()
    }
}

impl OllamaAdapter {
    /// Constructs a new adapter from the supplied configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if an endpoint cannot be derived
    /// from the base URL.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(config: OllamaConfig) -> AdapterResult<Self> {
        let generate_endpoint = endpoint(&config.base_url, "api/generate")?;
        let embeddings_endpoint = endpoint(&config.base_url, "api/embeddings")?;

        Ok(Self {
            client: build_https_client(),
            generate_endpoint,
            embeddings_endpoint,
            metadata: AdapterMetadata::new("ollama", config.model.clone()),
            timeout: config.timeout,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn build_generate_request<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        let options = if self.temperature.is_some() || self.max_output_tokens.is_some() {
            Some(GenerateOptions {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            })
        } else {
            None
        };

        GenerateRequest {
            model: self.metadata.model(),
            prompt,
            stream: false,
            options,
        }
    }

    async fn post_json<Req, Resp>(&self, endpoint: &Uri, payload: &Req) -> AdapterResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(payload).map_err(|err| {
            AdapterError::invalid_request(format!("failed to encode Ollama request: {err}"))
        })?;

        let req = Request::post(endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .map_err(|err| {
                AdapterError::transport(format!("failed to build Ollama request: {err}"))
            })?;

        let response = timeout(self.timeout, self.client.request(req))
            .await
            .map_err(|_| AdapterError::transport("Ollama request timed out"))?
            .map_err(|err| AdapterError::transport(format!("Ollama request failed: {err}")))?;

        let status = response.status();
        let bytes = to_bytes(response.into_body()).await.map_err(|err| {
            AdapterError::transport(format!("failed to read Ollama response: {err}"))
        })?;

        if status.as_u16() == 429 {
            return Err(AdapterError::RateLimited { retry_after: None });
        }
        if !status.is_success() {
            let reason = String::from_utf8_lossy(&bytes);
            return Err(AdapterError::response(format!(
                "Ollama returned {status}: {reason}"
            )));
        }

        serde_json::from_slice(&bytes).map_err(|err| {
            AdapterError::response(format!("failed to decode Ollama response: {err}"))
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn generate(&self, prompt: &str) -> AdapterResult<String> {
        let payload = self.build_generate_request(prompt);
        let response: GenerateResponse = self.post_json(&self.generate_endpoint, &payload).await?;
        if let Some(error) = response.error {
            return Err(AdapterError::response(error));
        }
        debug!(model = self.metadata.model(), "ollama generation completed");
        Ok(response.response.unwrap_or_default().trim().to_owned())
    }
}

#[async_trait]
impl TextEmbedder for OllamaAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn embed(&self, text: &str) -> AdapterResult<Vec<f32>> {
        let payload = EmbeddingsRequest {
            model: self.metadata.model(),
            prompt: text,
        };
        let response: EmbeddingsResponse =
            self.post_json(&self.embeddings_endpoint, &payload).await?;
        if let Some(error) = response.error {
            return Err(AdapterError::response(error));
        }
        if response.embedding.is_empty() {
            return Err(AdapterError::response("Ollama returned an empty embedding"));
        }
        Ok(response.embedding)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "num_predict")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    embedding: Vec<f32>,
    #[serde(default)]
    error: Option<String>,
}

fn endpoint(base_url: &str, path: &str) -> AdapterResult<Uri> {
    format!("{base_url}{path}")
        .parse::<Uri>()
        .map_err(|err| AdapterError::configuration(format!("invalid Ollama endpoint: {err}")))
}

fn sanitize_base_url(input: &str) -> AdapterResult<String> {
    let mut base = input.trim().to_owned();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(AdapterError::configuration(
            "Ollama base URL must start with http:// or https://",
        ));
    }
    if !base.ends_with('/') {
        base.push('/');
    }
    base.parse::<Uri>()
        .map_err(|err| AdapterError::configuration(format!("invalid Ollama base URL: {err}")))?;
    Ok(base)
}
