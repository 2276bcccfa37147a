//! Anthropic adapter: HTTP calls against the Messages API.
//!
//! Auth is `x-api-key` plus the pinned `anthropic-version` header. Streaming
//! responses are folded through the [`stream`](crate::stream) state machine.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use tracing::debug;

use manifold_core::ids;
use manifold_core::messages::{Capability, ModelInfo};
use manifold_core::{ChatRequest, ChatResponse};
use manifold_llm::adapter::{AdapterError, AdapterResult, ChatAdapter, ChunkStream};
use manifold_llm::http::{get_json, send_json, HttpPolicy};
use manifold_llm::sse::{decode_frame, sse_data_lines};

use crate::convert::{from_anthropic_response, to_anthropic};
use crate::stream::{process_event, StreamState};
use crate::types::{
    AnthropicResponse, AnthropicStreamEvent, API_VERSION, DEFAULT_BASE_URL, FALLBACK_MODELS,
};

const CAPABILITIES: &[Capability] = &[
    Capability::Chat,
    Capability::Streaming,
    Capability::Vision,
    Capability::Tools,
];

/// Adapter for the Anthropic Messages API.
pub struct AnthropicAdapter {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    policy: HttpPolicy,
}

impl AnthropicAdapter {
    /// Create an adapter with the default endpoint.
    pub fn new(api_key: &str, base_url: Option<&str>) -> Self {
        let base_url = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "anthropic adapter ready");
        Self {
            api_key: api_key.to_string(),
            base_url,
            client: reqwest::Client::new(),
            policy: HttpPolicy::default(),
        }
    }

    fn headers(&self) -> AdapterResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let _ = headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        let key = HeaderValue::from_str(&self.api_key).map_err(|_| AdapterError::Auth {
            message: "API key contains invalid header characters".into(),
        })?;
        let _ = headers.insert("x-api-key", key);
        Ok(headers)
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

/// `GET /v1/models` response body.
#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

#[async_trait]
impl ChatAdapter for AnthropicAdapter {
    fn provider_id(&self) -> &str {
        "anthropic"
    }

    fn capabilities(&self) -> &[Capability] {
        CAPABILITIES
    }

    async fn chat(&self, request: &ChatRequest) -> AdapterResult<ChatResponse> {
        let body = serde_json::to_value(to_anthropic(request, false))?;
        let response =
            send_json(&self.client, &self.messages_url(), self.headers()?, &body, &self.policy)
                .await?;
        let native = response.json::<AnthropicResponse>().await?;
        Ok(from_anthropic_response(&native, &ids::completion_id(), ids::unix_now()))
    }

    async fn chat_stream(&self, request: &ChatRequest) -> AdapterResult<ChunkStream> {
        let body = serde_json::to_value(to_anthropic(request, true))?;
        let response =
            send_json(&self.client, &self.messages_url(), self.headers()?, &body, &self.policy)
                .await?;

        let state = StreamState::new(&ids::completion_id(), &request.model, ids::unix_now());
        let chunks = sse_data_lines(response.bytes_stream())
            .scan(state, |state, payload| {
                let events = decode_frame::<AnthropicStreamEvent>(&payload, "anthropic")
                    .map(|event| process_event(&event, state))
                    .unwrap_or_default();
                std::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter)
            .map(Ok);

        Ok(Box::pin(chunks))
    }

    async fn list_models(&self) -> AdapterResult<Vec<ModelInfo>> {
        let url = format!("{}/v1/models", self.base_url);
        let fallback = || {
            FALLBACK_MODELS
                .iter()
                .map(|m| ModelInfo::new(*m, "anthropic"))
                .collect::<Vec<_>>()
        };

        match get_json(&self.client, &url, self.headers()?, &self.policy).await {
            Ok(response) if response.status().is_success() => {
                let list = response.json::<ModelList>().await?;
                Ok(list.data.into_iter().map(|m| ModelInfo::new(m.id, "anthropic")).collect())
            }
            _ => Ok(fallback()),
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
    use manifold_core::messages::{ChatMessage, Role};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatRequest {
        ChatRequest {
            model: "claude-sonnet-4-5".into(),
            messages: vec![
                ChatMessage::text(Role::System, "be brief"),
                ChatMessage::text(Role::User, "hello"),
            ],
            temperature: None,
            max_tokens: Some(64),
            top_p: None,
            stop: None,
            stream: None,
            tools: None,
            tool_choice: None,
            presence_penalty: None,
            frequency_penalty: None,
        }
    }

    #[tokio::test]
    async fn chat_translates_and_normalizes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .and(header("anthropic-version", API_VERSION))
            .and(body_partial_json(serde_json::json!({
                "system": "be brief",
                "max_tokens": 64,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "model": "claude-sonnet-4-5",
                "content": [{"type": "text", "text": "hi there"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 9, "output_tokens": 3}
            })))
            .mount(&server)
            .await;

        let adapter = AnthropicAdapter::new("sk-ant-test", Some(&server.uri()));
        let resp = adapter.chat(&request()).await.unwrap();
        assert_eq!(resp.first_content(), "hi there");
        assert!(resp.id.starts_with("chatcmpl-"));
        assert_eq!(resp.usage.unwrap().total_tokens, 12);
        assert_eq!(resp.model, "claude-sonnet-4-5");
    }

    #[tokio::test]
    async fn chat_stream_folds_events() {
        let sse = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_s\",\"model\":\"claude-sonnet-4-5\",\"usage\":{\"input_tokens\":1,\"output_tokens\":0}}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"one \"}}\n\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"two\"}}\n\n",
            "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}\n\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&server)
            .await;

        let adapter = AnthropicAdapter::new("sk", Some(&server.uri()));
        let stream = adapter.chat_stream(&request()).await.unwrap();
        let chunks: Vec<_> = stream.map(Result::unwrap).collect().await;

        let text: String = chunks.iter().filter_map(|c| c.content_delta()).collect();
        assert_eq!(text, "one two");
        assert!(chunks.last().unwrap().is_terminal());
        assert!(chunks.iter().all(|c| c.id == "msg_s"));
    }

    #[tokio::test]
    async fn auth_error_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"type": "authentication_error", "message": "invalid x-api-key"}
            })))
            .mount(&server)
            .await;

        let adapter = AnthropicAdapter::new("bad", Some(&server.uri()));
        let err = adapter.chat(&request()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Auth { .. }));
    }

    #[tokio::test]
    async fn list_models_falls_back() {
        let adapter = AnthropicAdapter::new("sk", Some("http://127.0.0.1:9"));
        let models = adapter.list_models().await.unwrap();
        assert!(!models.is_empty());
        assert!(models.iter().all(|m| m.owned_by == "anthropic"));
    }
}
