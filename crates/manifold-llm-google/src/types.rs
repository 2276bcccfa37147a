//! Gemini API wire types (camelCase).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Models advertised when the list endpoint is unreachable.
pub const FALLBACK_MODELS: &[&str] =
    &["gemini-2.5-pro", "gemini-2.5-flash", "gemini-2.0-flash"];

/// A `generateContent` request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleRequest {
    /// Conversation turns.
    pub contents: Vec<Content>,
    /// Collected system instructions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    /// Sampling parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    /// Tool declarations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<GoogleTool>>,
    /// Function-calling directive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<ToolConfig>,
}

/// One turn: a role and its parts.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Content {
    /// `"user"` or `"model"`; absent on system instructions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Ordered parts.
    pub parts: Vec<Part>,
}

/// One part of a turn. Exactly one field is set per part.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Inline binary data (from `data:` URIs).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
    /// Fetchable file reference (non-data URIs).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_data: Option<FileData>,
    /// A function call emitted by the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<GoogleFunctionCall>,
    /// A function result supplied by the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<GoogleFunctionResponse>,
}

impl Part {
    /// A text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::default() }
    }

    /// An inline-data part.
    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            inline_data: Some(InlineData { mime_type: mime_type.into(), data: data.into() }),
            ..Self::default()
        }
    }

    /// A file-reference part.
    pub fn file(uri: impl Into<String>) -> Self {
        Self { file_data: Some(FileData { file_uri: uri.into(), mime_type: None }), ..Self::default() }
    }
}

/// Inline binary payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// MIME type.
    pub mime_type: String,
    /// Base64 payload.
    pub data: String,
}

/// Fetchable file reference.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    /// The file URI.
    pub file_uri: String,
    /// MIME type, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Function call emitted by the model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GoogleFunctionCall {
    /// Function name.
    pub name: String,
    /// Arguments object.
    #[serde(default)]
    pub args: Value,
}

/// Function result supplied by the caller.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GoogleFunctionResponse {
    /// Function name.
    pub name: String,
    /// Result object.
    pub response: Value,
}

/// Sampling parameters.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Output token cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Stop sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

/// Tool declarations wrapper.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleTool {
    /// Declared functions.
    pub function_declarations: Vec<FunctionDeclaration>,
}

/// One declared function.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    /// Function name.
    pub name: String,
    /// Description shown to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for the arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Function-calling directive.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    /// The mode and allow-list.
    pub function_calling_config: FunctionCallingConfig,
}

/// Mode (`AUTO` / `ANY` / `NONE`) plus optional allow-list.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCallingConfig {
    /// Calling mode.
    pub mode: String,
    /// Restrict calls to these functions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_function_names: Option<Vec<String>>,
}

/// A `generateContent` response (also the per-frame stream shape).
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleResponse {
    /// Candidate completions.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Token accounting.
    pub usage_metadata: Option<UsageMetadata>,
    /// The serving model.
    pub model_version: Option<String>,
}

/// One candidate.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// The candidate content.
    pub content: Option<Content>,
    /// Why generation stopped (`STOP`, `MAX_TOKENS`, `SAFETY`, …).
    pub finish_reason: Option<String>,
}

/// Token accounting.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    /// Prompt tokens.
    #[serde(default)]
    pub prompt_token_count: u64,
    /// Completion tokens.
    #[serde(default)]
    pub candidates_token_count: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_camel_case() {
        let req = GoogleRequest {
            contents: vec![Content { role: Some("user".into()), parts: vec![Part::text("hi")] }],
            system_instruction: Some(Content { role: None, parts: vec![Part::text("sys")] }),
            generation_config: Some(GenerationConfig {
                max_output_tokens: Some(10),
                ..GenerationConfig::default()
            }),
            tools: None,
            tool_config: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("systemInstruction").is_some());
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 10);
    }

    #[test]
    fn part_single_field_serialization() {
        let json = serde_json::to_value(Part::text("x")).unwrap();
        assert_eq!(json, serde_json::json!({"text": "x"}));

        let json = serde_json::to_value(Part::inline("image/png", "AAAA")).unwrap();
        assert_eq!(json["inlineData"]["mimeType"], "image/png");

        let json = serde_json::to_value(Part::file("https://x/y.png")).unwrap();
        assert_eq!(json["fileData"]["fileUri"], "https://x/y.png");
    }

    #[test]
    fn response_deserializes() {
        let resp: GoogleResponse = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "hello"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2}
            }"#,
        )
        .unwrap();
        assert_eq!(resp.candidates.len(), 1);
        assert_eq!(resp.candidates[0].finish_reason.as_deref(), Some("STOP"));
        assert_eq!(resp.usage_metadata.unwrap().prompt_token_count, 4);
    }

    #[test]
    fn function_call_args_default_to_null() {
        let part: Part =
            serde_json::from_str(r#"{"functionCall":{"name":"f"}}"#).unwrap();
        assert_eq!(part.function_call.unwrap().name, "f");
    }
}
