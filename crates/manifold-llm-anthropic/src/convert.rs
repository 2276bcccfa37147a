//! # Canonical ↔ Anthropic translation
//!
//! Translation is lossless for representable fields and deterministic
//! otherwise:
//!
//! - All `system` messages coalesce, in order, into the top-level `system`
//!   string (joined with blank lines).
//! - `assistant` maps to `assistant`; `user` and `tool` map to `user`, tool
//!   messages becoming `tool_result` blocks.
//! - `tool_choice`: `"auto"` → `{type: auto}`, `"none"` → `{type: none}`,
//!   `"required"` → `{type: any}`, named function → `{type: tool, name}`.
//! - Image parts: `data:` URIs become inline base64 sources, other URLs
//!   become URL sources. Audio/video/file parts are dropped (the API cannot
//!   render them).

use serde_json::{json, Value};

use manifold_core::messages::{
    ChatMessage, ContentPart, FunctionCall, MessageContent, Role, StopSequences, ToolCall,
    ToolChoice, ToolDef,
};
use manifold_core::{ChatRequest, ChatResponse, Choice, FinishReason, Usage};

use crate::types::{
    AnthropicMessage, AnthropicRequest, AnthropicResponse, AnthropicTool, AnthropicToolChoice,
    ContentBlock, ImageSource, DEFAULT_MAX_TOKENS,
};

// ─────────────────────────────────────────────────────────────────────────────
// Canonical → Anthropic
// ─────────────────────────────────────────────────────────────────────────────

/// Translate a canonical request into a Messages API request.
pub fn to_anthropic(request: &ChatRequest, stream: bool) -> AnthropicRequest {
    let mut system_parts: Vec<String> = Vec::new();
    let mut messages: Vec<AnthropicMessage> = Vec::new();

    for msg in &request.messages {
        match msg.role {
            Role::System => system_parts.push(msg.content_text()),
            Role::Assistant => messages.push(convert_assistant(msg)),
            Role::User => messages.push(AnthropicMessage {
                role: "user".into(),
                content: convert_user_content(msg),
            }),
            Role::Tool => messages.push(AnthropicMessage {
                role: "user".into(),
                content: vec![ContentBlock::ToolResult {
                    tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                    content: Value::String(msg.content_text()),
                    is_error: None,
                }],
            }),
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };

    AnthropicRequest {
        model: request
            .model
            .strip_prefix("anthropic/")
            .unwrap_or(&request.model)
            .to_string(),
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        messages,
        system,
        temperature: request.temperature,
        top_p: request.top_p,
        stop_sequences: request.stop.as_ref().map(StopSequences::to_vec),
        stream: stream.then_some(true),
        tools: request.tools.as_ref().map(|t| t.iter().map(convert_tool).collect()),
        tool_choice: request.tool_choice.as_ref().map(convert_tool_choice),
    }
}

fn convert_assistant(msg: &ChatMessage) -> AnthropicMessage {
    let mut blocks: Vec<ContentBlock> = Vec::new();

    let text = msg.content_text();
    if !text.is_empty() {
        blocks.push(ContentBlock::Text { text });
    }

    if let Some(calls) = &msg.tool_calls {
        for call in calls {
            let input =
                serde_json::from_str(&call.function.arguments).unwrap_or(Value::Object(Default::default()));
            blocks.push(ContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.function.name.clone(),
                input,
            });
        }
    }

    AnthropicMessage { role: "assistant".into(), content: blocks }
}

fn convert_user_content(msg: &ChatMessage) -> Vec<ContentBlock> {
    match &msg.content {
        None => vec![],
        Some(MessageContent::Text(text)) => vec![ContentBlock::Text { text: text.clone() }],
        Some(MessageContent::Parts(parts)) => parts.iter().filter_map(convert_part).collect(),
    }
}

/// Convert one content part; unrepresentable parts drop to `None`.
fn convert_part(part: &ContentPart) -> Option<ContentBlock> {
    match part {
        ContentPart::Text { text } => Some(ContentBlock::Text { text: text.clone() }),
        ContentPart::ImageUrl { image_url } => Some(ContentBlock::Image {
            source: image_source(&image_url.url),
        }),
        ContentPart::InputAudio { .. }
        | ContentPart::VideoUrl { .. }
        | ContentPart::File { .. } => None,
    }
}

/// Split a `data:` URI into an inline source; other URLs become URL sources.
fn image_source(url: &str) -> ImageSource {
    if let Some(rest) = url.strip_prefix("data:") {
        if let Some((meta, data)) = rest.split_once(",") {
            let media_type = meta.trim_end_matches(";base64").to_string();
            return ImageSource::Base64 {
                media_type: if media_type.is_empty() { "image/png".into() } else { media_type },
                data: data.to_string(),
            };
        }
    }
    ImageSource::Url { url: url.to_string() }
}

fn convert_tool(tool: &ToolDef) -> AnthropicTool {
    AnthropicTool {
        name: tool.function.name.clone(),
        description: tool.function.description.clone(),
        input_schema: tool.function.parameters.clone().unwrap_or_else(|| json!({"type": "object"})),
    }
}

fn convert_tool_choice(choice: &ToolChoice) -> AnthropicToolChoice {
    match choice {
        ToolChoice::Mode(mode) => AnthropicToolChoice {
            choice_type: match mode.as_str() {
                "none" => "none".into(),
                "required" => "any".into(),
                _ => "auto".into(),
            },
            name: None,
        },
        ToolChoice::Function { function, .. } => AnthropicToolChoice {
            choice_type: "tool".into(),
            name: Some(function.name.clone()),
        },
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Anthropic → canonical
// ─────────────────────────────────────────────────────────────────────────────

/// Map an Anthropic stop reason onto the canonical finish reason.
pub fn map_stop_reason(reason: Option<&str>) -> Option<FinishReason> {
    match reason {
        Some("end_turn" | "stop_sequence") => Some(FinishReason::Stop),
        Some("max_tokens") => Some(FinishReason::Length),
        Some("tool_use") => Some(FinishReason::ToolCalls),
        _ => None,
    }
}

/// Translate a Messages API response into the canonical shape.
pub fn from_anthropic_response(
    response: &AnthropicResponse,
    completion_id: &str,
    created: i64,
) -> ChatResponse {
    let mut text_parts: Vec<&str> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for block in &response.content {
        match block {
            ContentBlock::Text { text } => text_parts.push(text),
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id: id.clone(),
                call_type: "function".into(),
                function: FunctionCall {
                    name: name.clone(),
                    arguments: input.to_string(),
                },
            }),
            ContentBlock::Image { .. } | ContentBlock::ToolResult { .. } => {}
        }
    }

    let content = text_parts.join("");
    let message = ChatMessage {
        role: Role::Assistant,
        content: if content.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(MessageContent::Text(content))
        },
        name: None,
        tool_call_id: None,
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
    };

    ChatResponse {
        id: completion_id.to_string(),
        object: "chat.completion".into(),
        created,
        model: response.model.clone(),
        choices: vec![Choice {
            index: 0,
            message,
            finish_reason: map_stop_reason(response.stop_reason.as_deref()),
        }],
        usage: Some(Usage::new(response.usage.input_tokens, response.usage.output_tokens)),
    }
}

/// Translate a Messages API request back into the canonical shape.
///
/// The inverse of [`to_anthropic`]: the coalesced system string becomes one
/// leading system message, `tool_result` blocks become tool messages, and
/// tool definitions map back to function declarations.
pub fn from_anthropic(request: &AnthropicRequest) -> ChatRequest {
    let mut messages: Vec<ChatMessage> = Vec::new();

    if let Some(system) = &request.system {
        messages.push(ChatMessage::text(Role::System, system.clone()));
    }

    for msg in &request.messages {
        if msg.role == "assistant" {
            messages.push(restore_assistant(msg));
            continue;
        }
        // User turns may interleave tool results with regular content.
        let mut parts: Vec<ContentPart> = Vec::new();
        for block in &msg.content {
            match block {
                ContentBlock::ToolResult { tool_use_id, content, .. } => {
                    flush_user_parts(&mut messages, &mut parts);
                    messages.push(ChatMessage {
                        role: Role::Tool,
                        content: Some(MessageContent::Text(
                            content.as_str().map_or_else(|| content.to_string(), String::from),
                        )),
                        name: None,
                        tool_call_id: Some(tool_use_id.clone()),
                        tool_calls: None,
                    });
                }
                ContentBlock::Text { text } => parts.push(ContentPart::Text { text: text.clone() }),
                ContentBlock::Image { source } => parts.push(ContentPart::ImageUrl {
                    image_url: manifold_core::messages::ImageUrl {
                        url: match source {
                            ImageSource::Url { url } => url.clone(),
                            ImageSource::Base64 { media_type, data } => {
                                format!("data:{media_type};base64,{data}")
                            }
                        },
                    },
                }),
                ContentBlock::ToolUse { .. } => {}
            }
        }
        flush_user_parts(&mut messages, &mut parts);
    }

    ChatRequest {
        model: request.model.clone(),
        messages,
        temperature: request.temperature,
        max_tokens: Some(request.max_tokens),
        top_p: request.top_p,
        stop: request.stop_sequences.clone().map(StopSequences::Many),
        stream: request.stream,
        tools: request.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|t| ToolDef {
                    tool_type: "function".into(),
                    function: manifold_core::messages::FunctionDef {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: Some(t.input_schema.clone()),
                    },
                })
                .collect()
        }),
        tool_choice: request.tool_choice.as_ref().map(restore_tool_choice),
        presence_penalty: None,
        frequency_penalty: None,
    }
}

fn flush_user_parts(messages: &mut Vec<ChatMessage>, parts: &mut Vec<ContentPart>) {
    if parts.is_empty() {
        return;
    }
    let drained = std::mem::take(parts);
    let content = if drained.len() == 1 {
        if let ContentPart::Text { text } = &drained[0] {
            MessageContent::Text(text.clone())
        } else {
            MessageContent::Parts(drained)
        }
    } else {
        MessageContent::Parts(drained)
    };
    messages.push(ChatMessage {
        role: Role::User,
        content: Some(content),
        name: None,
        tool_call_id: None,
        tool_calls: None,
    });
}

fn restore_assistant(msg: &AnthropicMessage) -> ChatMessage {
    let mut text_parts: Vec<&str> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();
    for block in &msg.content {
        match block {
            ContentBlock::Text { text } => text_parts.push(text),
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id: id.clone(),
                call_type: "function".into(),
                function: FunctionCall { name: name.clone(), arguments: input.to_string() },
            }),
            ContentBlock::Image { .. } | ContentBlock::ToolResult { .. } => {}
        }
    }
    ChatMessage {
        role: Role::Assistant,
        content: if text_parts.is_empty() {
            None
        } else {
            Some(MessageContent::Text(text_parts.join("")))
        },
        name: None,
        tool_call_id: None,
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
    }
}

fn restore_tool_choice(choice: &AnthropicToolChoice) -> ToolChoice {
    match (choice.choice_type.as_str(), &choice.name) {
        ("tool", Some(name)) => ToolChoice::Function {
            choice_type: "function".into(),
            function: manifold_core::messages::ToolChoiceFunction { name: name.clone() },
        },
        ("none", _) => ToolChoice::Mode("none".into()),
        ("any", _) => ToolChoice::Mode("required".into()),
        _ => ToolChoice::Mode("auto".into()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
