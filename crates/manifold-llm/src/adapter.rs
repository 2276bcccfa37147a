//! # Adapter trait
//!
//! Core abstraction for LLM backends. Every provider (OpenAI-compatible,
//! Anthropic, Google, Cohere, Azure) implements [`ChatAdapter`] to expose a
//! unified request/response and streaming interface.
//!
//! Streaming methods return a boxed [`Stream`] of canonical
//! [`StreamChunk`]s; the stream is finite and not restartable. Dropping it
//! mid-iteration releases the underlying HTTP reader.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use manifold_core::messages::{Capability, ModelInfo};
use manifold_core::{ChatRequest, ChatResponse, GatewayError, StreamChunk};

/// Result alias for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Boxed stream of [`StreamChunk`]s returned by [`ChatAdapter::chat_stream`].
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, AdapterError>> + Send>>;

/// Errors surfaced by adapter operations.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Backend rejected the credentials (HTTP 401).
    #[error("authentication failed: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Rate limited by the backend after exhausting retries.
    #[error("rate limited: {message}")]
    RateLimited {
        /// Suggested retry delay in seconds, from `Retry-After`.
        retry_after_secs: Option<u64>,
        /// Error description.
        message: String,
    },

    /// Transport failure before a response was received.
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned a non-retryable 4xx/5xx.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
        /// Provider-specific error code.
        code: Option<String>,
    },

    /// The requested model is unknown to this backend.
    #[error("model not found: {model}")]
    ModelNotFound {
        /// The model id.
        model: String,
    },

    /// Response body decoding failed.
    #[error("decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// Per-call timeout elapsed.
    #[error("request timed out after {seconds}s")]
    Timeout {
        /// The configured timeout.
        seconds: u64,
    },

    /// The call was cancelled by the gateway.
    #[error("request cancelled")]
    Cancelled,
}

impl AdapterError {
    /// Whether a fresh attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Auth { .. }
            | Self::ModelNotFound { .. }
            | Self::Json(_)
            | Self::Timeout { .. }
            | Self::Cancelled => false,
        }
    }

    /// Suggested retry delay in seconds, if the backend supplied one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs, .. } => *retry_after_secs,
            _ => None,
        }
    }
}

impl From<AdapterError> for GatewayError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Auth { message } => GatewayError::Authentication { message },
            AdapterError::RateLimited { retry_after_secs, message } => {
                GatewayError::RateLimit { message, retry_after: retry_after_secs }
            }
            AdapterError::Http(e) => {
                if e.is_timeout() {
                    GatewayError::Timeout { message: format!("upstream timeout: {e}") }
                } else {
                    GatewayError::Network { message: format!("upstream network error: {e}") }
                }
            }
            AdapterError::Api { status, message, code } => {
                GatewayError::Upstream { status, message, code }
            }
            AdapterError::ModelNotFound { model } => {
                GatewayError::NotFound { message: format!("model not found: {model}") }
            }
            AdapterError::Json(e) => {
                GatewayError::Internal { message: format!("upstream decode error: {e}") }
            }
            AdapterError::Timeout { seconds } => {
                GatewayError::Timeout { message: format!("request timed out after {seconds}s") }
            }
            AdapterError::Cancelled => {
                GatewayError::Internal { message: "request cancelled".to_string() }
            }
        }
    }
}

/// Per-backend translator and HTTP client.
///
/// Implementors must be `Send + Sync`; adapters are registered once at
/// startup and shared read-only across the pipeline and queue executors.
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    /// Stable provider identifier (e.g., `"openai"`, `"anthropic"`).
    fn provider_id(&self) -> &str;

    /// Capabilities this backend supports.
    fn capabilities(&self) -> &[Capability];

    /// Execute a non-streaming chat completion.
    async fn chat(&self, request: &ChatRequest) -> AdapterResult<ChatResponse>;

    /// Execute a streaming chat completion.
    ///
    /// The returned stream yields canonical chunks in backend order and ends
    /// after the terminal chunk.
    async fn chat_stream(&self, request: &ChatRequest) -> AdapterResult<ChunkStream>;

    /// List the models this backend serves.
    async fn list_models(&self) -> AdapterResult<Vec<ModelInfo>>;

    /// Check whether the configured credentials are accepted.
    async fn validate_key(&self) -> AdapterResult<bool>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
