//! # Canonical ↔ Gemini translation
//!
//! - System messages collect, in order, into `systemInstruction`.
//! - `assistant` maps to role `"model"`; `user` and `tool` map to `"user"`,
//!   tool messages becoming `functionResponse` parts.
//! - Image parts split by URI prefix: `data:` URIs become `inlineData`,
//!   anything else becomes `fileData`.
//! - Audio blobs become `inlineData`; video URLs ride as `fileData`; file
//!   refs without a URI are dropped.

use serde_json::Value;

use manifold_core::messages::{
    ChatMessage, ContentPart, FunctionCall, MessageContent, Role, StopSequences, ToolCall,
    ToolChoice, ToolDef,
};
use manifold_core::{ChatRequest, ChatResponse, Choice, FinishReason, Usage};

use crate::types::{
    Content, FunctionCallingConfig, FunctionDeclaration, GenerationConfig, GoogleFunctionResponse,
    GoogleRequest, GoogleResponse, GoogleTool, Part, ToolConfig,
};

// ─────────────────────────────────────────────────────────────────────────────
// Canonical → Gemini
// ─────────────────────────────────────────────────────────────────────────────

/// Translate a canonical request into a `generateContent` request.
pub fn to_google(request: &ChatRequest) -> GoogleRequest {
    let mut system_parts: Vec<Part> = Vec::new();
    let mut contents: Vec<Content> = Vec::new();

    for msg in &request.messages {
        match msg.role {
            Role::System => system_parts.push(Part::text(msg.content_text())),
            Role::Assistant => contents.push(Content {
                role: Some("model".into()),
                parts: assistant_parts(msg),
            }),
            Role::User => contents.push(Content {
                role: Some("user".into()),
                parts: user_parts(msg),
            }),
            Role::Tool => contents.push(Content {
                role: Some("user".into()),
                parts: vec![Part {
                    function_response: Some(GoogleFunctionResponse {
                        name: msg
                            .name
                            .clone()
                            .or_else(|| msg.tool_call_id.clone())
                            .unwrap_or_default(),
                        response: serde_json::json!({"result": msg.content_text()}),
                    }),
                    ..Part::default()
                }],
            }),
        }
    }

    let generation_config = build_generation_config(request);

    GoogleRequest {
        contents,
        system_instruction: (!system_parts.is_empty())
            .then_some(Content { role: None, parts: system_parts }),
        generation_config,
        tools: request.tools.as_ref().map(|tools| {
            vec![GoogleTool {
                function_declarations: tools.iter().map(declaration).collect(),
            }]
        }),
        tool_config: request.tool_choice.as_ref().map(tool_config),
    }
}

fn build_generation_config(request: &ChatRequest) -> Option<GenerationConfig> {
    if request.temperature.is_none()
        && request.top_p.is_none()
        && request.max_tokens.is_none()
        && request.stop.is_none()
    {
        return None;
    }
    Some(GenerationConfig {
        temperature: request.temperature,
        top_p: request.top_p,
        max_output_tokens: request.max_tokens,
        stop_sequences: request.stop.as_ref().map(StopSequences::to_vec),
    })
}

fn assistant_parts(msg: &ChatMessage) -> Vec<Part> {
    let mut parts: Vec<Part> = Vec::new();
    let text = msg.content_text();
    if !text.is_empty() {
        parts.push(Part::text(text));
    }
    if let Some(calls) = &msg.tool_calls {
        for call in calls {
            parts.push(Part {
                function_call: Some(crate::types::GoogleFunctionCall {
                    name: call.function.name.clone(),
                    args: serde_json::from_str(&call.function.arguments)
                        .unwrap_or(Value::Object(Default::default())),
                }),
                ..Part::default()
            });
        }
    }
    parts
}

fn user_parts(msg: &ChatMessage) -> Vec<Part> {
    match &msg.content {
        None => vec![],
        Some(MessageContent::Text(text)) => vec![Part::text(text.clone())],
        Some(MessageContent::Parts(parts)) => parts.iter().filter_map(convert_part).collect(),
    }
}

/// Convert one content part; unrepresentable parts drop to `None`.
fn convert_part(part: &ContentPart) -> Option<Part> {
    match part {
        ContentPart::Text { text } => Some(Part::text(text.clone())),
        ContentPart::ImageUrl { image_url } => Some(image_part(&image_url.url)),
        ContentPart::InputAudio { input_audio } => Some(Part::inline(
            format!("audio/{}", input_audio.format),
            input_audio.data.clone(),
        )),
        ContentPart::VideoUrl { video_url } => Some(Part::file(video_url.url.clone())),
        ContentPart::File { .. } => None,
    }
}

/// Split image URLs by prefix: `data:` URIs inline, the rest by reference.
pub fn image_part(url: &str) -> Part {
    if let Some(rest) = url.strip_prefix("data:") {
        if let Some((meta, data)) = rest.split_once(',') {
            let mime_type = meta.trim_end_matches(";base64");
            return Part::inline(
                if mime_type.is_empty() { "image/png" } else { mime_type },
                data,
            );
        }
    }
    Part::file(url)
}

/// Reconstruct the canonical image URL from a converted part.
///
/// Inline data folds back into a `data:` URI; file references return their
/// URI unchanged.
pub fn image_part_url(part: &Part) -> Option<String> {
    if let Some(inline) = &part.inline_data {
        return Some(format!("data:{};base64,{}", inline.mime_type, inline.data));
    }
    part.file_data.as_ref().map(|f| f.file_uri.clone())
}

fn declaration(tool: &ToolDef) -> FunctionDeclaration {
    FunctionDeclaration {
        name: tool.function.name.clone(),
        description: tool.function.description.clone(),
        parameters: tool.function.parameters.clone(),
    }
}

fn tool_config(choice: &ToolChoice) -> ToolConfig {
    let config = match choice {
        ToolChoice::Mode(mode) => FunctionCallingConfig {
            mode: match mode.as_str() {
                "none" => "NONE".into(),
                "required" => "ANY".into(),
                _ => "AUTO".into(),
            },
            allowed_function_names: None,
        },
        ToolChoice::Function { function, .. } => FunctionCallingConfig {
            mode: "ANY".into(),
            allowed_function_names: Some(vec![function.name.clone()]),
        },
    };
    ToolConfig { function_calling_config: config }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gemini → canonical
// ─────────────────────────────────────────────────────────────────────────────

/// Map a Gemini finish reason onto the canonical one.
pub fn map_finish_reason(reason: Option<&str>) -> Option<FinishReason> {
    match reason {
        Some("STOP") => Some(FinishReason::Stop),
        Some("MAX_TOKENS") => Some(FinishReason::Length),
        Some("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT") => {
            Some(FinishReason::ContentFilter)
        }
        _ => None,
    }
}

/// Concatenated text of a candidate's parts.
pub fn candidate_text(response: &GoogleResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

/// Translate a `generateContent` response into the canonical shape.
pub fn from_google_response(
    response: &GoogleResponse,
    completion_id: &str,
    created: i64,
    model: &str,
) -> ChatResponse {
    let text = candidate_text(response);

    let mut tool_calls: Vec<ToolCall> = Vec::new();
    if let Some(content) = response.candidates.first().and_then(|c| c.content.as_ref()) {
        for (i, part) in content.parts.iter().enumerate() {
            if let Some(call) = &part.function_call {
                tool_calls.push(ToolCall {
                    id: format!("call_{i}"),
                    call_type: "function".into(),
                    function: FunctionCall {
                        name: call.name.clone(),
                        arguments: call.args.to_string(),
                    },
                });
            }
        }
    }

    let finish_reason = response
        .candidates
        .first()
        .and_then(|c| map_finish_reason(c.finish_reason.as_deref()))
        .map(|r| if tool_calls.is_empty() { r } else { FinishReason::ToolCalls });

    let message = ChatMessage {
        role: Role::Assistant,
        content: if text.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(MessageContent::Text(text))
        },
        name: None,
        tool_call_id: None,
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
    };

    ChatResponse {
        id: completion_id.to_string(),
        object: "chat.completion".into(),
        created,
        model: response.model_version.clone().unwrap_or_else(|| model.to_string()),
        choices: vec![Choice { index: 0, message, finish_reason }],
        usage: response.usage_metadata.map(|u| {
            Usage::new(u.prompt_token_count, u.candidates_token_count)
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
