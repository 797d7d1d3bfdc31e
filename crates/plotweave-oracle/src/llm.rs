//! LLM backend abstraction and implementations.
//!
//! Uses enum dispatch rather than trait objects because async methods are
//! not dyn-compatible. Concrete backends exist for `OpenAI`-compatible chat
//! completions and the Anthropic Messages API, both over `reqwest` with a
//! per-request timeout.
//!
//! A backend sends one user message and returns the trimmed text of the
//! first reply. It knows nothing about stories or scores.

use std::time::Duration;

use serde_json::{Value, json};

use crate::config::{BackendType, ModelSettings, OracleConfig};
use crate::error::OracleError;

/// Output cap sent to Anthropic when none is configured; the API requires one.
pub const DEFAULT_ANTHROPIC_MAX_TOKENS: u32 = 1024;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// One completion request.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    /// The user message.
    pub prompt: &'a str,
    /// Model, temperature and output cap.
    pub settings: &'a ModelSettings,
    /// JSON schema for structured output, where the backend supports it.
    pub json_schema: Option<&'a Value>,
}

// ---------------------------------------------------------------------------
// Unified backend enum
// ---------------------------------------------------------------------------

/// An HTTP LLM backend.
#[derive(Debug)]
pub enum LlmBackend {
    /// `OpenAI`-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
}

impl LlmBackend {
    /// Send a request and return the reply text, trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] if the HTTP call fails, the status is not a
    /// success, or the reply has no text.
    pub async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, OracleError> {
        match self {
            Self::OpenAi(backend) => backend.complete(request).await,
            Self::Anthropic(backend) => backend.complete(request).await,
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => OpenAiBackend::NAME,
            Self::Anthropic(_) => AnthropicBackend::NAME,
        }
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for `OpenAI`-compatible chat completions APIs.
///
/// Sends requests to `{api_url}/chat/completions`.
#[derive(Debug)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl OpenAiBackend {
    const NAME: &'static str = "openai-compatible";

    /// Create a backend sharing `client`.
    pub fn new(client: reqwest::Client, api_url: &str, api_key: &str) -> Self {
        Self {
            client,
            api_url: api_url.to_owned(),
            api_key: api_key.to_owned(),
        }
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, OracleError> {
        let url = format!("{}/chat/completions", self.api_url);
        let builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&openai_body(request));
        let json = post_json(Self::NAME, builder).await?;
        extract_openai_content(&json)
    }
}

/// Build the chat completions payload.
fn openai_body(request: &CompletionRequest<'_>) -> Value {
    let mut body = json!({
        "model": request.settings.model,
        "messages": [{"role": "user", "content": request.prompt}],
    });
    if let Some(temperature) = request.settings.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(max_tokens) = request.settings.max_output_tokens {
        body["max_completion_tokens"] = json!(max_tokens);
    }
    if let Some(schema) = request.json_schema {
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": schema,
        });
    }
    body
}

/// Extract the text content from an `OpenAI` chat completions response.
fn extract_openai_content(json: &Value) -> Result<String, OracleError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_owned())
        .ok_or_else(|| OracleError::MalformedResponse {
            backend: OpenAiBackend::NAME,
            message: "missing choices[0].message.content".to_owned(),
        })
}

// ---------------------------------------------------------------------------
// Anthropic Messages API backend
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API.
///
/// Differs from `OpenAI` in the `x-api-key` header, the mandatory
/// `max_tokens` field and the `content[0].text` reply shape. Structured
/// output schemas are not sent; the judge prompt asks for JSON itself.
#[derive(Debug)]
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl AnthropicBackend {
    const NAME: &'static str = "anthropic";

    /// Create a backend sharing `client`.
    pub fn new(client: reqwest::Client, api_url: &str, api_key: &str) -> Self {
        Self {
            client,
            api_url: api_url.to_owned(),
            api_key: api_key.to_owned(),
        }
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, OracleError> {
        let url = format!("{}/messages", self.api_url);
        let builder = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&anthropic_body(request));
        let json = post_json(Self::NAME, builder).await?;
        extract_anthropic_content(&json)
    }
}

/// Build the Messages API payload.
fn anthropic_body(request: &CompletionRequest<'_>) -> Value {
    let mut body = json!({
        "model": request.settings.model,
        "max_tokens": request
            .settings
            .max_output_tokens
            .unwrap_or(DEFAULT_ANTHROPIC_MAX_TOKENS),
        "messages": [{"role": "user", "content": request.prompt}],
    });
    if let Some(temperature) = request.settings.temperature {
        body["temperature"] = json!(temperature);
    }
    body
}

/// Extract the text content from an Anthropic Messages API response.
fn extract_anthropic_content(json: &Value) -> Result<String, OracleError> {
    json.get("content")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("text"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_owned())
        .ok_or_else(|| OracleError::MalformedResponse {
            backend: AnthropicBackend::NAME,
            message: "missing content[0].text".to_owned(),
        })
}

// ---------------------------------------------------------------------------
// Shared transport
// ---------------------------------------------------------------------------

/// Send a prepared request and decode a successful JSON reply.
async fn post_json(
    backend: &'static str,
    builder: reqwest::RequestBuilder,
) -> Result<Value, OracleError> {
    let response = builder
        .send()
        .await
        .map_err(|e| OracleError::transport(backend, &e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_owned());
        return Err(OracleError::Status {
            backend,
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| OracleError::MalformedResponse {
            backend,
            message: format!("response parse failed: {e}"),
        })
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Create an HTTP backend from configuration.
///
/// # Errors
///
/// Returns [`OracleError::Config`] for the stub backend, which has no HTTP
/// side, or if the HTTP client cannot be built.
pub fn create_backend(config: &OracleConfig) -> Result<LlmBackend, OracleError> {
    let client = build_client(config.request_timeout)?;
    match config.backend {
        BackendType::OpenAi => Ok(LlmBackend::OpenAi(OpenAiBackend::new(
            client,
            &config.api_url,
            &config.api_key,
        ))),
        BackendType::Anthropic => Ok(LlmBackend::Anthropic(AnthropicBackend::new(
            client,
            &config.api_url,
            &config.api_key,
        ))),
        BackendType::Stub => Err(OracleError::Config(
            "the stub backend has no HTTP client".to_owned(),
        )),
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, OracleError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| OracleError::Config(format!("failed to build HTTP client: {e}")))
}
