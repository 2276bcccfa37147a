//! # Azure OpenAI adapter
//!
//! Azure serves the OpenAI wire format under a deployment-scoped path with
//! its own auth header:
//!
//! - URL: `{resource}/openai/deployments/{deployment}/chat/completions?api-version=…`
//! - Auth: `api-key: <key>` instead of a bearer token
//! - Body: `model` is replaced by the deployment id

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::Value;

use manifold_core::messages::{Capability, ModelInfo};
use manifold_core::{ChatRequest, ChatResponse, StreamChunk};

use crate::adapter::{AdapterError, AdapterResult, ChatAdapter, ChunkStream};
use crate::http::{send_json, HttpPolicy};
use crate::sse::{decode_frame, sse_data_lines};

/// Default Azure OpenAI API version.
pub const DEFAULT_API_VERSION: &str = "2024-06-01";

const AZURE_CAPABILITIES: &[Capability] = &[
    Capability::Chat,
    Capability::Streaming,
    Capability::Vision,
    Capability::Tools,
];

/// Adapter for Azure OpenAI deployments.
pub struct AzureAdapter {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    resource_url: String,
    /// Deployment id substituted for the model.
    deployment_id: String,
    api_version: String,
    api_key: String,
    client: reqwest::Client,
    policy: HttpPolicy,
}

impl AzureAdapter {
    /// Create an adapter for one deployment.
    pub fn new(
        resource_url: &str,
        deployment_id: &str,
        api_key: &str,
        api_version: Option<&str>,
    ) -> Self {
        Self {
            resource_url: resource_url.trim_end_matches('/').to_string(),
            deployment_id: deployment_id.to_string(),
            api_version: api_version.unwrap_or(DEFAULT_API_VERSION).to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
            policy: HttpPolicy::default(),
        }
    }

    fn chat_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.resource_url, self.deployment_id, self.api_version
        )
    }

    fn headers(&self) -> AdapterResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let value = HeaderValue::from_str(&self.api_key).map_err(|_| AdapterError::Auth {
            message: "API key contains invalid header characters".into(),
        })?;
        let _ = headers.insert("api-key", value);
        Ok(headers)
    }

    /// Azure ignores the client-supplied model; the deployment decides.
    fn build_body(&self, request: &ChatRequest, stream: bool) -> AdapterResult<Value> {
        let mut body = serde_json::to_value(request)?;
        body["model"] = Value::String(self.deployment_id.clone());
        body["stream"] = Value::Bool(stream);
        Ok(body)
    }
}

#[async_trait]
impl ChatAdapter for AzureAdapter {
    fn provider_id(&self) -> &str {
        "azure"
    }

    fn capabilities(&self) -> &[Capability] {
        AZURE_CAPABILITIES
    }

    async fn chat(&self, request: &ChatRequest) -> AdapterResult<ChatResponse> {
        let body = self.build_body(request, false)?;
        let response =
            send_json(&self.client, &self.chat_url(), self.headers()?, &body, &self.policy).await?;
        Ok(response.json::<ChatResponse>().await?)
    }

    async fn chat_stream(&self, request: &ChatRequest) -> AdapterResult<ChunkStream> {
        let body = self.build_body(request, true)?;
        let response =
            send_json(&self.client, &self.chat_url(), self.headers()?, &body, &self.policy).await?;

        let chunks = sse_data_lines(response.bytes_stream())
            .filter_map(|payload| {
                let chunk: Option<StreamChunk> = decode_frame(&payload, "azure");
                std::future::ready(chunk)
            })
            .map(Ok);
        Ok(Box::pin(chunks))
    }

    async fn list_models(&self) -> AdapterResult<Vec<ModelInfo>> {
        // A deployment serves exactly one model surface.
        Ok(vec![ModelInfo::new(self.deployment_id.clone(), "azure")])
    }

    async fn validate_key(&self) -> AdapterResult<bool> {
        let probe = ChatRequest {
            model: self.deployment_id.clone(),
            messages: vec![manifold_core::messages::ChatMessage::text(
                manifold_core::messages::Role::User,
                "ping",
            )],
            temperature: None,
            max_tokens: Some(1),
            top_p: None,
            stop: None,
            stream: None,
            tools: None,
            tool_choice: None,
            presence_penalty: None,
            frequency_penalty: None,
        };
        match self.chat(&probe).await {
            Ok(_) => Ok(true),
            Err(AdapterError::Auth { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
