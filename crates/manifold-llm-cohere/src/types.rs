//! Cohere v1 chat wire types.

use serde::{Deserialize, Serialize};

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.cohere.com";

/// Default chat endpoint path (the v1 surface).
pub const DEFAULT_CHAT_PATH: &str = "/v1/chat";

/// Models advertised when the list endpoint is unreachable.
pub const FALLBACK_MODELS: &[&str] = &["command-a-03-2025", "command-r-plus", "command-r"];

/// A v1 chat request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CohereRequest {
    /// Target model.
    pub model: String,
    /// The last user message.
    pub message: String,
    /// Prior turns, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chat_history: Vec<CohereTurn>,
    /// Coalesced system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preamble: Option<String>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Output token cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling (Cohere calls it `p`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<f64>,
    /// Stop sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Request a streaming response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// One history turn.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CohereTurn {
    /// `USER`, `CHATBOT`, or `TOOL`.
    pub role: String,
    /// Turn text.
    pub message: String,
}

/// A v1 chat response.
#[derive(Clone, Debug, Deserialize)]
pub struct CohereResponse {
    /// Response id.
    pub response_id: Option<String>,
    /// Generated text.
    #[serde(default)]
    pub text: String,
    /// `COMPLETE`, `MAX_TOKENS`, …
    pub finish_reason: Option<String>,
    /// Token accounting.
    pub meta: Option<CohereMeta>,
}

/// Response metadata.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct CohereMeta {
    /// Token counts.
    pub tokens: Option<CohereTokens>,
}

/// Token counts.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct CohereTokens {
    /// Input tokens.
    #[serde(default)]
    pub input_tokens: u64,
    /// Output tokens.
    #[serde(default)]
    pub output_tokens: u64,
}

/// One line-delimited stream event.
#[derive(Clone, Debug, Deserialize)]
pub struct CohereStreamEvent {
    /// `text-generation`, `stream-end`, `stream-start`, …
    pub event_type: String,
    /// Content fragment (`text-generation` only).
    pub text: Option<String>,
    /// Finish reason (`stream-end` only).
    pub finish_reason: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
