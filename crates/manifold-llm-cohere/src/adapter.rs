//! Cohere adapter: translation plus HTTP against the v1 chat endpoint.
//!
//! Finish reasons map `COMPLETE` → `stop` and `MAX_TOKENS` → `length`;
//! anything else stays null.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::debug;

use manifold_core::ids;
use manifold_core::messages::{Capability, ChatMessage, MessageContent, ModelInfo, Role};
use manifold_core::{ChatRequest, ChatResponse, Choice, FinishReason, StreamChunk, Usage};
use manifold_llm::adapter::{AdapterError, AdapterResult, ChatAdapter, ChunkStream};
use manifold_llm::http::{get_json, send_json, HttpPolicy};
use manifold_llm::sse::{decode_frame, json_lines};

use crate::types::{
    CohereRequest, CohereResponse, CohereStreamEvent, CohereTurn, DEFAULT_BASE_URL,
    DEFAULT_CHAT_PATH, FALLBACK_MODELS,
};

const CAPABILITIES: &[Capability] = &[Capability::Chat, Capability::Streaming];

/// Adapter for the Cohere chat API.
pub struct CohereAdapter {
    api_key: String,
    base_url: String,
    chat_path: String,
    client: reqwest::Client,
    policy: HttpPolicy,
}

impl CohereAdapter {
    /// Create an adapter with the default endpoint and chat path.
    pub fn new(api_key: &str, base_url: Option<&str>) -> Self {
        Self::with_chat_path(api_key, base_url, DEFAULT_CHAT_PATH)
    }

    /// Create an adapter pinned to a specific chat endpoint path.
    pub fn with_chat_path(api_key: &str, base_url: Option<&str>, chat_path: &str) -> Self {
        let base_url = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string();
        debug!(base_url = %base_url, chat_path, "cohere adapter ready");
        Self {
            api_key: api_key.to_string(),
            base_url,
            chat_path: chat_path.to_string(),
            client: reqwest::Client::new(),
            policy: HttpPolicy::default(),
        }
    }

    fn headers(&self) -> AdapterResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let value = HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|_| {
            AdapterError::Auth { message: "API key contains invalid header characters".into() }
        })?;
        let _ = headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    fn chat_url(&self) -> String {
        format!("{}{}", self.base_url, self.chat_path)
    }
}

/// Translate a canonical request into the v1 chat shape: the trailing
/// user/tool message becomes `message`, system messages coalesce into
/// `preamble`, everything else becomes `chat_history`.
pub fn to_cohere(request: &ChatRequest, stream: bool) -> CohereRequest {
    let mut preamble_parts: Vec<String> = Vec::new();
    let mut history: Vec<CohereTurn> = Vec::new();
    let mut message = String::new();

    let last_index = request.messages.len().saturating_sub(1);
    for (i, msg) in request.messages.iter().enumerate() {
        if i == last_index && matches!(msg.role, Role::User | Role::Tool) {
            message = msg.content_text();
            continue;
        }
        match msg.role {
            Role::System => preamble_parts.push(msg.content_text()),
            Role::User => history.push(CohereTurn { role: "USER".into(), message: msg.content_text() }),
            Role::Assistant => {
                history.push(CohereTurn { role: "CHATBOT".into(), message: msg.content_text() });
            }
            Role::Tool => history.push(CohereTurn { role: "TOOL".into(), message: msg.content_text() }),
        }
    }

    CohereRequest {
        model: request.model.strip_prefix("cohere/").unwrap_or(&request.model).to_string(),
        message,
        chat_history: history,
        preamble: (!preamble_parts.is_empty()).then(|| preamble_parts.join("\n\n")),
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        p: request.top_p,
        stop_sequences: request.stop.as_ref().map(manifold_core::messages::StopSequences::to_vec),
        stream: stream.then_some(true),
    }
}

/// `COMPLETE` → stop, `MAX_TOKENS` → length, otherwise null.
pub fn map_finish_reason(reason: Option<&str>) -> Option<FinishReason> {
    match reason {
        Some("COMPLETE") => Some(FinishReason::Stop),
        Some("MAX_TOKENS") => Some(FinishReason::Length),
        _ => None,
    }
}

fn from_cohere_response(native: &CohereResponse, model: &str) -> ChatResponse {
    ChatResponse {
        id: ids::completion_id(),
        object: "chat.completion".into(),
        created: ids::unix_now(),
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChatMessage {
                role: Role::Assistant,
                content: Some(MessageContent::Text(native.text.clone())),
                name: None,
                tool_call_id: None,
                tool_calls: None,
            },
            finish_reason: map_finish_reason(native.finish_reason.as_deref()),
        }],
        usage: native
            .meta
            .and_then(|m| m.tokens)
            .map(|t| Usage::new(t.input_tokens, t.output_tokens)),
    }
}

/// `GET /v1/models` response body.
#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
}

#[async_trait]
impl ChatAdapter for CohereAdapter {
    fn provider_id(&self) -> &str {
        "cohere"
    }

    fn capabilities(&self) -> &[Capability] {
        CAPABILITIES
    }

    async fn chat(&self, request: &ChatRequest) -> AdapterResult<ChatResponse> {
        let native_req = to_cohere(request, false);
        let model = native_req.model.clone();
        let body = serde_json::to_value(&native_req)?;
        let response =
            send_json(&self.client, &self.chat_url(), self.headers()?, &body, &self.policy).await?;
        let native = response.json::<CohereResponse>().await?;
        Ok(from_cohere_response(&native, &model))
    }

    async fn chat_stream(&self, request: &ChatRequest) -> AdapterResult<ChunkStream> {
        let native_req = to_cohere(request, true);
        let model = native_req.model.clone();
        let body = serde_json::to_value(&native_req)?;
        let response =
            send_json(&self.client, &self.chat_url(), self.headers()?, &body, &self.policy).await?;

        let id = ids::completion_id();
        let created = ids::unix_now();

        let chunks = json_lines(response.bytes_stream())
            .scan(false, move |finished, line| {
                if *finished {
                    return std::future::ready(Some(vec![]));
                }
                let mut out: Vec<StreamChunk> = Vec::new();
                if let Some(event) = decode_frame::<CohereStreamEvent>(&line, "cohere") {
                    match event.event_type.as_str() {
                        "text-generation" => {
                            if let Some(text) = event.text.filter(|t| !t.is_empty()) {
                                out.push(StreamChunk::content(&id, created, &model, text));
                            }
                        }
                        "stream-end" => {
                            let reason = map_finish_reason(event.finish_reason.as_deref())
                                .unwrap_or(FinishReason::Stop);
                            out.push(StreamChunk::terminal(&id, created, &model, reason));
                            *finished = true;
                        }
                        _ => {}
                    }
                }
                std::future::ready(Some(out))
            })
            .flat_map(futures::stream::iter)
            .map(Ok);

        Ok(Box::pin(chunks))
    }

    async fn list_models(&self) -> AdapterResult<Vec<ModelInfo>> {
        let url = format!("{}/v1/models?endpoint=chat", self.base_url);
        match get_json(&self.client, &url, self.headers()?, &self.policy).await {
            Ok(response) if response.status().is_success() => {
                let list = response.json::<ModelList>().await?;
                Ok(list.models.into_iter().map(|m| ModelInfo::new(m.name, "cohere")).collect())
            }
            _ => Ok(FALLBACK_MODELS.iter().map(|m| ModelInfo::new(*m, "cohere")).collect()),
        }
    }

    async fn validate_key(&self) -> AdapterResult<bool> {
        let url = format!("{}/v1/models", self.base_url);
        let response = get_json(&self.client, &url, self.headers()?, &self.policy).await?;
        Ok(response.status() != reqwest::StatusCode::UNAUTHORIZED
            && response.status() != reqwest::StatusCode::FORBIDDEN)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest {
            model: "command-r".into(),
            messages,
            temperature: Some(0.2),
            max_tokens: Some(50),
            top_p: Some(0.8),
            stop: None,
            stream: None,
            tools: None,
            tool_choice: None,
            presence_penalty: None,
            frequency_penalty: None,
        }
    }

    // ── Translation ──────────────────────────────────────────────────────

    #[test]
    fn last_user_message_splits_from_history() {
        let req = request(vec![
            ChatMessage::text(Role::System, "be nice"),
            ChatMessage::text(Role::User, "first"),
            ChatMessage::text(Role::Assistant, "reply"),
            ChatMessage::text(Role::User, "second"),
        ]);
        let out = to_cohere(&req, false);
        assert_eq!(out.message, "second");
        assert_eq!(out.preamble.as_deref(), Some("be nice"));
        assert_eq!(
            out.chat_history,
            vec![
                CohereTurn { role: "USER".into(), message: "first".into() },
                CohereTurn { role: "CHATBOT".into(), message: "reply".into() },
            ]
        );
    }

    #[test]
    fn top_p_maps_to_p() {
        let req = request(vec![ChatMessage::text(Role::User, "hi")]);
        let out = to_cohere(&req, false);
        assert_eq!(out.p, Some(0.8));
        assert_eq!(out.max_tokens, Some(50));
    }

    #[test]
    fn finish_reason_mapping() {
        assert_eq!(map_finish_reason(Some("COMPLETE")), Some(FinishReason::Stop));
        assert_eq!(map_finish_reason(Some("MAX_TOKENS")), Some(FinishReason::Length));
        assert_eq!(map_finish_reason(Some("ERROR")), None);
        assert_eq!(map_finish_reason(None), None);
    }

    // ── HTTP ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn chat_roundtrip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .and(header("authorization", "Bearer co-key"))
            .and(body_partial_json(serde_json::json!({"message": "hi", "model": "command-r"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response_id": "r1",
                "text": "hello!",
                "finish_reason": "COMPLETE",
                "meta": {"tokens": {"input_tokens": 3, "output_tokens": 2}}
            })))
            .mount(&server)
            .await;

        let adapter = CohereAdapter::new("co-key", Some(&server.uri()));
        let resp =
            adapter.chat(&request(vec![ChatMessage::text(Role::User, "hi")])).await.unwrap();
        assert_eq!(resp.first_content(), "hello!");
        assert_eq!(resp.choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(resp.usage.unwrap().total_tokens, 5);
    }

    #[tokio::test]
    async fn stream_events_drive_chunks() {
        let lines = concat!(
            "{\"event_type\":\"stream-start\",\"generation_id\":\"g1\"}\n",
            "{\"event_type\":\"text-generation\",\"text\":\"cou\"}\n",
            "{\"event_type\":\"text-generation\",\"text\":\"cou\"}\n",
            "{\"event_type\":\"stream-end\",\"finish_reason\":\"COMPLETE\"}\n",
        );

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_string(lines))
            .mount(&server)
            .await;

        let adapter = CohereAdapter::new("k", Some(&server.uri()));
        let stream = adapter
            .chat_stream(&request(vec![ChatMessage::text(Role::User, "hi")]))
            .await
            .unwrap();
        let chunks: Vec<_> = stream.map(Result::unwrap).collect().await;

        let text: String = chunks.iter().filter_map(|c| c.content_delta()).collect();
        assert_eq!(text, "coucou");
        assert!(chunks.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn custom_chat_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/compat/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "ok", "finish_reason": "COMPLETE"
            })))
            .mount(&server)
            .await;

        let adapter = CohereAdapter::with_chat_path("k", Some(&server.uri()), "/compat/chat");
        let resp =
            adapter.chat(&request(vec![ChatMessage::text(Role::User, "hi")])).await.unwrap();
        assert_eq!(resp.first_content(), "ok");
    }

    #[tokio::test]
    async fn list_models_fallback() {
        let adapter = CohereAdapter::new("k", Some("http://127.0.0.1:9"));
        let models = adapter.list_models().await.unwrap();
        assert!(models.iter().any(|m| m.id.starts_with("command")));
    }
}
