//! # Canonical chat types
//!
//! OpenAI-compatible wire types used on both sides of the gateway: clients
//! send them to `/v1/chat/completions`, and adapters translate them to and
//! from each backend's native schema.
//!
//! Serialization matches the OpenAI wire format exactly (`snake_case`
//! fields, optionals omitted when absent) so a request body can be forwarded
//! verbatim to OpenAI-compatible backends.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;

/// Message role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
    /// Tool invocation result.
    Tool,
}

/// Message content: plain text or an ordered sequence of parts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content.
    Text(String),
    /// Multi-part content (text, images, audio, video, files).
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Flatten the content to plain text, joining text parts with newlines.
    /// Non-text parts are skipped.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(t) => t.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// One part of a multi-part message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text segment.
    Text {
        /// The text.
        text: String,
    },
    /// Image by URL (https or data URI).
    ImageUrl {
        /// URL wrapper.
        image_url: ImageUrl,
    },
    /// Inline audio blob.
    InputAudio {
        /// Audio payload.
        input_audio: AudioBlob,
    },
    /// Video by URL.
    VideoUrl {
        /// URL wrapper.
        video_url: VideoUrl,
    },
    /// Reference to an uploaded file.
    File {
        /// File reference.
        file: FileRef,
    },
}

/// Image URL wrapper.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// The image URL (https or `data:` URI).
    pub url: String,
}

/// Inline audio payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioBlob {
    /// Base64-encoded audio data.
    pub data: String,
    /// Audio format (e.g., `"wav"`, `"mp3"`).
    pub format: String,
}

/// Video URL wrapper.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoUrl {
    /// The video URL.
    pub url: String,
}

/// File reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    /// File identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Inline file data (base64).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_data: Option<String>,
    /// Display filename.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// A single chat message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: Role,
    /// Message content. Absent for assistant messages that carry only
    /// tool calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    /// Participant name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// ID of the tool call this message responds to (role `tool` only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool calls requested by the assistant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    /// Construct a plain-text message.
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(content.into())),
            name: None,
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// The message content flattened to text (empty string when absent).
    pub fn content_text(&self) -> String {
        self.content.as_ref().map(MessageContent::as_text).unwrap_or_default()
    }
}

/// A tool call emitted by the assistant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier.
    pub id: String,
    /// Call type (always `"function"`).
    #[serde(rename = "type")]
    pub call_type: String,
    /// The function invocation.
    pub function: FunctionCall,
}

/// Function name and serialized arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name.
    pub name: String,
    /// JSON-encoded arguments.
    pub arguments: String,
}

/// A tool definition supplied by the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    /// Tool type (always `"function"`).
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function declaration.
    pub function: FunctionDef,
}

/// Function declaration: name, description, JSON-schema parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Function name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for the arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Tool-choice directive: `"auto"`, `"none"`, `"required"`, or a specific
/// function selector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    /// Mode string (`auto` / `none` / `required`).
    Mode(String),
    /// Force a specific function.
    Function {
        /// Selector type (always `"function"`).
        #[serde(rename = "type")]
        choice_type: String,
        /// The function to call.
        function: ToolChoiceFunction,
    },
}

/// Named function inside a [`ToolChoice::Function`] selector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolChoiceFunction {
    /// Function name.
    pub name: String,
}

/// Stop sequences: a single string or a list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    /// One stop sequence.
    One(String),
    /// Several stop sequences.
    Many(Vec<String>),
}

impl StopSequences {
    /// The sequences as a vector.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s.clone()],
            Self::Many(v) => v.clone(),
        }
    }
}

/// A chat-completion request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Target model, optionally prefixed `provider/model`.
    pub model: String,
    /// Conversation messages (at least one).
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature in `[0, 2]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum tokens to generate (≥ 1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling in `[0, 1]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Stop sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequences>,
    /// Request a streaming response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Tool definitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,
    /// Tool-choice directive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Presence penalty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Frequency penalty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
}

impl ChatRequest {
    /// Whether the client requested a streaming response.
    pub fn is_streaming(&self) -> bool {
        self.stream == Some(true)
    }

    /// Validate the request invariants.
    ///
    /// - at least one message, last role ∈ {user, tool}
    /// - `temperature` ∈ [0, 2], `top_p` ∈ [0, 1], `max_tokens` ≥ 1
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.model.is_empty() {
            return Err(GatewayError::invalid_request("model is required"));
        }
        if self.messages.is_empty() {
            return Err(GatewayError::invalid_request(
                "messages must contain at least one entry",
            ));
        }
        let last = &self.messages[self.messages.len() - 1];
        if !matches!(last.role, Role::User | Role::Tool) {
            return Err(GatewayError::invalid_request(
                "last message must have role 'user' or 'tool'",
            ));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(GatewayError::invalid_request(
                    "temperature must be between 0 and 2",
                ));
            }
        }
        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(GatewayError::invalid_request(
                    "top_p must be between 0 and 1",
                ));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(GatewayError::invalid_request("max_tokens must be at least 1"));
        }
        Ok(())
    }
}

/// Why generation stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of turn or stop sequence.
    Stop,
    /// `max_tokens` reached.
    Length,
    /// The model requested tool calls.
    ToolCalls,
    /// Content was filtered by the provider.
    ContentFilter,
}

/// One completion choice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Choice index.
    pub index: u32,
    /// The completed message.
    pub message: ChatMessage,
    /// Why generation stopped (`null` while streaming).
    pub finish_reason: Option<FinishReason>,
}

/// Token usage accounting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    pub prompt_tokens: u64,
    /// Tokens generated.
    pub completion_tokens: u64,
    /// Sum of prompt and completion tokens.
    pub total_tokens: u64,
}

impl Usage {
    /// Build a usage record, deriving `total_tokens`.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A non-streaming chat-completion response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Completion identifier (`chatcmpl-…`).
    pub id: String,
    /// Object tag (`"chat.completion"`).
    pub object: String,
    /// Creation time (unix seconds).
    pub created: i64,
    /// The model that produced the response.
    pub model: String,
    /// Completion choices (non-empty).
    pub choices: Vec<Choice>,
    /// Token usage, when the backend reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Content of the first choice flattened to text.
    pub fn first_content(&self) -> String {
        self.choices
            .first()
            .map(|c| c.message.content_text())
            .unwrap_or_default()
    }
}

/// Incremental message delta inside a stream chunk.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    /// Role, present only on the first chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Content fragment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Incremental tool calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Incremental tool-call fragment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Position in the tool-call list.
    pub index: u32,
    /// Call identifier (first fragment only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Call type (first fragment only).
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,
    /// Function fragment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionCallDelta>,
}

/// Incremental function-call fragment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallDelta {
    /// Function name (first fragment only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Arguments fragment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// One choice inside a stream chunk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Choice index.
    pub index: u32,
    /// The delta.
    pub delta: Delta,
    /// Set on the terminal chunk.
    pub finish_reason: Option<FinishReason>,
}

/// A streaming chat-completion chunk. Chunks sharing an `id` form a single
/// logical response; a chunk with a non-null `finish_reason` is terminal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Completion identifier, shared across the stream.
    pub id: String,
    /// Object tag (`"chat.completion.chunk"`).
    pub object: String,
    /// Creation time (unix seconds).
    pub created: i64,
    /// The model producing the stream.
    pub model: String,
    /// Chunk choices.
    pub choices: Vec<ChunkChoice>,
}

impl StreamChunk {
    /// Build a content-delta chunk.
    pub fn content(id: &str, created: i64, model: &str, text: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: Delta {
                    role: None,
                    content: Some(text.into()),
                    tool_calls: None,
                },
                finish_reason: None,
            }],
        }
    }

    /// Build the initial chunk carrying `delta.role = assistant`.
    pub fn role_preamble(id: &str, created: i64, model: &str) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: Delta {
                    role: Some(Role::Assistant),
                    content: None,
                    tool_calls: None,
                },
                finish_reason: None,
            }],
        }
    }

    /// Build a terminal chunk with an empty delta.
    pub fn terminal(id: &str, created: i64, model: &str, reason: FinishReason) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: Delta::default(),
                finish_reason: Some(reason),
            }],
        }
    }

    /// Whether any choice carries a finish reason.
    pub fn is_terminal(&self) -> bool {
        self.choices.iter().any(|c| c.finish_reason.is_some())
    }

    /// Content of the first choice's delta, if any.
    pub fn content_delta(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.delta.content.as_deref())
    }
}

/// Model metadata returned by `/v1/models`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier.
    pub id: String,
    /// Object tag (`"model"`).
    pub object: String,
    /// Creation time (unix seconds), 0 when unknown.
    pub created: i64,
    /// Owning organization or provider id.
    pub owned_by: String,
}

impl ModelInfo {
    /// Build a model entry owned by the given provider.
    pub fn new(id: impl Into<String>, owned_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: "model".to_string(),
            created: 0,
            owned_by: owned_by.into(),
        }
    }
}

/// Adapter capability flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Non-streaming chat completions.
    Chat,
    /// SSE streaming.
    Streaming,
    /// Embeddings.
    Embedding,
    /// Image inputs.
    Vision,
    /// Tool / function calling.
    Tools,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
