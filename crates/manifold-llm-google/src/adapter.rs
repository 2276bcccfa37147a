//! Google adapter: HTTP calls against the Gemini API.
//!
//! Auth is the `x-goog-api-key` header (the key never appears in URLs or
//! logs). Streaming uses `:streamGenerateContent?alt=sse`, whose frames are
//! line-wise `data: …` carrying the same shape as the unary response.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use tracing::debug;

use manifold_core::ids;
use manifold_core::messages::{Capability, ModelInfo};
use manifold_core::{ChatRequest, ChatResponse, FinishReason, StreamChunk};
use manifold_llm::adapter::{AdapterError, AdapterResult, ChatAdapter, ChunkStream};
use manifold_llm::http::{get_json, send_json, HttpPolicy};
use manifold_llm::sse::{decode_frame, sse_data_lines};

use crate::convert::{candidate_text, from_google_response, map_finish_reason, to_google};
use crate::types::{GoogleResponse, DEFAULT_BASE_URL, FALLBACK_MODELS};

const CAPABILITIES: &[Capability] = &[
    Capability::Chat,
    Capability::Streaming,
    Capability::Vision,
    Capability::Tools,
];

/// Adapter for the Gemini `generateContent` API.
pub struct GoogleAdapter {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    policy: HttpPolicy,
}

impl GoogleAdapter {
    /// Create an adapter with the default endpoint.
    pub fn new(api_key: &str, base_url: Option<&str>) -> Self {
        let base_url = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "google adapter ready");
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
        let key = HeaderValue::from_str(&self.api_key).map_err(|_| AdapterError::Auth {
            message: "API key contains invalid header characters".into(),
        })?;
        let _ = headers.insert("x-goog-api-key", key);
        Ok(headers)
    }

    /// Strip any router prefix; the path segment wants the bare model id.
    fn bare_model(model: &str) -> &str {
        model.strip_prefix("google/").unwrap_or(model)
    }
}

/// `GET /v1beta/models` response body.
#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    /// Fully qualified name, `models/gemini-…`.
    name: String,
}

#[async_trait]
impl ChatAdapter for GoogleAdapter {
    fn provider_id(&self) -> &str {
        "google"
    }

    fn capabilities(&self) -> &[Capability] {
        CAPABILITIES
    }

    async fn chat(&self, request: &ChatRequest) -> AdapterResult<ChatResponse> {
        let model = Self::bare_model(&request.model);
        let url = format!("{}/v1beta/models/{model}:generateContent", self.base_url);
        let body = serde_json::to_value(to_google(request))?;
        let response = send_json(&self.client, &url, self.headers()?, &body, &self.policy).await?;
        let native = response.json::<GoogleResponse>().await?;
        Ok(from_google_response(&native, &ids::completion_id(), ids::unix_now(), model))
    }

    async fn chat_stream(&self, request: &ChatRequest) -> AdapterResult<ChunkStream> {
        let model = Self::bare_model(&request.model).to_string();
        let url = format!(
            "{}/v1beta/models/{model}:streamGenerateContent?alt=sse",
            self.base_url
        );
        let body = serde_json::to_value(to_google(request))?;
        let response = send_json(&self.client, &url, self.headers()?, &body, &self.policy).await?;

        let id = ids::completion_id();
        let created = ids::unix_now();

        let chunks = sse_data_lines(response.bytes_stream())
            .scan(false, move |finished, payload| {
                if *finished {
                    return std::future::ready(Some(vec![]));
                }
                let mut out: Vec<StreamChunk> = Vec::new();
                if let Some(frame) = decode_frame::<GoogleResponse>(&payload, "google") {
                    let text = candidate_text(&frame);
                    if !text.is_empty() {
                        out.push(StreamChunk::content(&id, created, &model, text));
                    }
                    let reason = frame
                        .candidates
                        .first()
                        .and_then(|c| map_finish_reason(c.finish_reason.as_deref()));
                    if let Some(reason) = reason {
                        out.push(StreamChunk::terminal(&id, created, &model, reason));
                        *finished = true;
                    }
                }
                std::future::ready(Some(out))
            })
            .flat_map(futures::stream::iter)
            .map(Ok);

        Ok(Box::pin(chunks))
    }

    async fn list_models(&self) -> AdapterResult<Vec<ModelInfo>> {
        let url = format!("{}/v1beta/models", self.base_url);
        match get_json(&self.client, &url, self.headers()?, &self.policy).await {
            Ok(response) if response.status().is_success() => {
                let list = response.json::<ModelList>().await?;
                Ok(list
                    .models
                    .into_iter()
                    .map(|m| {
                        let id = m.name.strip_prefix("models/").unwrap_or(&m.name).to_string();
                        ModelInfo::new(id, "google")
                    })
                    .collect())
            }
            _ => Ok(FALLBACK_MODELS.iter().map(|m| ModelInfo::new(*m, "google")).collect()),
        }
    }

    async fn validate_key(&self) -> AdapterResult<bool> {
        let url = format!("{}/v1beta/models", self.base_url);
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
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gemini-2.5-flash".into(),
            messages: vec![ChatMessage::text(Role::User, "hi")],
            temperature: None,
            max_tokens: None,
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
    async fn chat_hits_generate_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "bonjour"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 2, "candidatesTokenCount": 1}
            })))
            .mount(&server)
            .await;

        let adapter = GoogleAdapter::new("g-key", Some(&server.uri()));
        let resp = adapter.chat(&request()).await.unwrap();
        assert_eq!(resp.first_content(), "bonjour");
        assert_eq!(resp.model, "gemini-2.5-flash");
    }

    #[tokio::test]
    async fn chat_strips_provider_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-pro:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "ok"}]}, "finishReason": "STOP"}]
            })))
            .mount(&server)
            .await;

        let adapter = GoogleAdapter::new("k", Some(&server.uri()));
        let mut req = request();
        req.model = "google/gemini-2.5-pro".into();
        let resp = adapter.chat(&req).await.unwrap();
        assert_eq!(resp.first_content(), "ok");
    }

    #[tokio::test]
    async fn stream_yields_content_then_terminal() {
        let sse = concat!(
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"one\"}]}}]}\n\n",
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\" two\"}]},\"finishReason\":\"STOP\"}]}\n\n",
        );

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:streamGenerateContent"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&server)
            .await;

        let adapter = GoogleAdapter::new("k", Some(&server.uri()));
        let stream = adapter.chat_stream(&request()).await.unwrap();
        let chunks: Vec<_> = stream.map(Result::unwrap).collect().await;

        let text: String = chunks.iter().filter_map(|c| c.content_delta()).collect();
        assert_eq!(text, "one two");
        assert!(chunks.last().unwrap().is_terminal());
        assert_eq!(
            chunks.last().unwrap().choices[0].finish_reason,
            Some(FinishReason::Stop)
        );
    }

    #[tokio::test]
    async fn list_models_strips_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "models/gemini-2.5-pro"}, {"name": "models/gemini-2.5-flash"}]
            })))
            .mount(&server)
            .await;

        let adapter = GoogleAdapter::new("k", Some(&server.uri()));
        let models = adapter.list_models().await.unwrap();
        assert_eq!(models[0].id, "gemini-2.5-pro");
    }

    #[tokio::test]
    async fn list_models_fallback_when_down() {
        let adapter = GoogleAdapter::new("k", Some("http://127.0.0.1:9"));
        let models = adapter.list_models().await.unwrap();
        assert!(!models.is_empty());
    }
}
