//! Anthropic Messages API wire types.
//!
//! Request/response bodies and the SSE event envelope. Unknown event and
//! delta variants deserialize to `Other` so new upstream event types never
//! break a stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Pinned API version header value.
pub const API_VERSION: &str = "2023-06-01";

/// `max_tokens` is mandatory on the Messages API; used when the client
/// leaves it unset.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Models advertised when the list endpoint is unreachable.
pub const FALLBACK_MODELS: &[&str] = &[
    "claude-opus-4-5",
    "claude-sonnet-4-5",
    "claude-haiku-4-5",
    "claude-3-haiku-20240307",
];

/// A Messages API request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnthropicRequest {
    /// Target model.
    pub model: String,
    /// Maximum tokens to generate (required by the API).
    pub max_tokens: u32,
    /// Conversation turns (user/assistant only).
    pub messages: Vec<AnthropicMessage>,
    /// Coalesced system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Stop sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Request SSE streaming.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Tool definitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<AnthropicTool>>,
    /// Tool-choice directive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<AnthropicToolChoice>,
}

/// One conversation turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnthropicMessage {
    /// `"user"` or `"assistant"`.
    pub role: String,
    /// Content blocks.
    pub content: Vec<ContentBlock>,
}

/// A request/response content block.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text block.
    Text {
        /// The text.
        text: String,
    },
    /// Image block.
    Image {
        /// Image source.
        source: ImageSource,
    },
    /// Tool invocation requested by the model.
    ToolUse {
        /// Call id.
        id: String,
        /// Tool name.
        name: String,
        /// Tool arguments.
        input: Value,
    },
    /// Tool result supplied by the caller.
    ToolResult {
        /// The call this result answers.
        tool_use_id: String,
        /// Result payload.
        content: Value,
        /// Marks a failed invocation.
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// Image source: inline base64 or a fetchable URL.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    /// Inline base64 data.
    Base64 {
        /// MIME type.
        media_type: String,
        /// Base64 payload.
        data: String,
    },
    /// Remote URL.
    Url {
        /// The URL.
        url: String,
    },
}

/// A tool definition.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnthropicTool {
    /// Tool name.
    pub name: String,
    /// Description shown to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for the input.
    pub input_schema: Value,
}

/// Tool-choice directive (`{"type": "auto" | "any" | "none" | "tool"}`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnthropicToolChoice {
    /// Choice type.
    #[serde(rename = "type")]
    pub choice_type: String,
    /// Tool name (only for `"tool"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A non-streaming Messages API response.
#[derive(Clone, Debug, Deserialize)]
pub struct AnthropicResponse {
    /// Message id (`msg_…`).
    pub id: String,
    /// The serving model.
    pub model: String,
    /// Response content blocks.
    pub content: Vec<ContentBlock>,
    /// Why generation stopped.
    pub stop_reason: Option<String>,
    /// Token usage.
    pub usage: AnthropicUsage,
}

/// Token usage on responses and `message_start` events.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct AnthropicUsage {
    /// Input tokens.
    #[serde(default)]
    pub input_tokens: u64,
    /// Output tokens.
    #[serde(default)]
    pub output_tokens: u64,
}

/// SSE stream events.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamEvent {
    /// Opens the stream; carries the message id and model.
    MessageStart {
        /// Partial message envelope.
        message: MessageStart,
    },
    /// A content block opened.
    ContentBlockStart {
        /// Block index.
        index: u32,
        /// The opening block.
        content_block: Value,
    },
    /// Incremental content for a block.
    ContentBlockDelta {
        /// Block index.
        index: u32,
        /// The delta payload.
        delta: BlockDelta,
    },
    /// A content block closed.
    ContentBlockStop {
        /// Block index.
        index: u32,
    },
    /// Top-level message delta (stop reason, usage).
    MessageDelta {
        /// Delta fields.
        delta: MessageDelta,
    },
    /// Stream end.
    MessageStop,
    /// Keep-alive.
    Ping,
    /// Anything this build does not recognize.
    #[serde(other)]
    Other,
}

/// The message envelope inside `message_start`.
#[derive(Clone, Debug, Deserialize)]
pub struct MessageStart {
    /// Message id.
    pub id: String,
    /// Serving model.
    pub model: String,
    /// Usage so far.
    #[serde(default)]
    pub usage: AnthropicUsage,
}

/// Delta payload inside `content_block_delta`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    /// Text fragment.
    TextDelta {
        /// The fragment.
        text: String,
    },
    /// Tool-input JSON fragment.
    InputJsonDelta {
        /// Partial JSON.
        partial_json: String,
    },
    /// Unrecognized delta kind.
    #[serde(other)]
    Other,
}

/// Fields inside `message_delta`.
#[derive(Clone, Debug, Deserialize)]
pub struct MessageDelta {
    /// Why generation stopped.
    pub stop_reason: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
