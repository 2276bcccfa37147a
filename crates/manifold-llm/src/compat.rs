//! # OpenAI-compatible adapter family
//!
//! Most backends speak the OpenAI chat-completions wire format; only the
//! endpoint URL, auth header, and minor parameter mapping differ. One
//! adapter, parameterised by [`CompatProfile`], covers the whole family:
//! `openai`, `cerebras`, `glm`, `groq`, `deepseek`, `moonshot`, `qwen`,
//! `mistral`, `together`, `openrouter`, `ollama`, `vllm`, `lmstudio`,
//! `llamacpp`, and `custom`.
//!
//! The request body is forwarded nearly verbatim. The OpenAI profile applies
//! the model-generation rule: for `gpt-5*`, `gpt-4.1*`, `o3*`, and `o4*`
//! models, `max_tokens` becomes `max_completion_tokens` and `temperature` is
//! stripped (those models reject it).

use std::sync::LazyLock;

use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use manifold_core::messages::{Capability, ModelInfo};
use manifold_core::{ChatRequest, ChatResponse, StreamChunk};

use crate::adapter::{AdapterError, AdapterResult, ChatAdapter, ChunkStream};
use crate::http::{get_json, send_json, HttpPolicy};
use crate::sse::{decode_frame, sse_data_lines};

/// Models that take `max_completion_tokens` and reject `temperature`.
static REASONING_GENERATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(gpt-5|gpt-4\.1|o3|o4)").expect("static regex"));

/// Capabilities shared by the whole family.
const COMPAT_CAPABILITIES: &[Capability] = &[
    Capability::Chat,
    Capability::Streaming,
    Capability::Vision,
    Capability::Tools,
];

/// Static description of one family member.
struct ProfileSpec {
    provider_id: &'static str,
    base_url: &'static str,
    /// Models advertised when the backend has no reachable list endpoint.
    fallback_models: &'static [&'static str],
}

/// Known family members and their default endpoints.
const PROFILES: &[ProfileSpec] = &[
    ProfileSpec {
        provider_id: "openai",
        base_url: "https://api.openai.com/v1",
        fallback_models: &["gpt-4.1", "gpt-4.1-mini", "gpt-5", "o3", "o4-mini"],
    },
    ProfileSpec {
        provider_id: "cerebras",
        base_url: "https://api.cerebras.ai/v1",
        fallback_models: &["llama-3.3-70b", "llama3.1-8b"],
    },
    ProfileSpec {
        provider_id: "glm",
        base_url: "https://open.bigmodel.cn/api/paas/v4",
        fallback_models: &["glm-4", "glm-4-flash"],
    },
    ProfileSpec {
        provider_id: "groq",
        base_url: "https://api.groq.com/openai/v1",
        fallback_models: &["llama-3.3-70b-versatile", "llama-3.1-8b-instant"],
    },
    ProfileSpec {
        provider_id: "deepseek",
        base_url: "https://api.deepseek.com/v1",
        fallback_models: &["deepseek-chat", "deepseek-reasoner"],
    },
    ProfileSpec {
        provider_id: "moonshot",
        base_url: "https://api.moonshot.cn/v1",
        fallback_models: &["moonshot-v1-8k", "kimi-k2-0711-preview"],
    },
    ProfileSpec {
        provider_id: "qwen",
        base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1",
        fallback_models: &["qwen-max", "qwen-plus", "qwq-32b"],
    },
    ProfileSpec {
        provider_id: "mistral",
        base_url: "https://api.mistral.ai/v1",
        fallback_models: &["mistral-large-latest", "mistral-small-latest"],
    },
    ProfileSpec {
        provider_id: "together",
        base_url: "https://api.together.xyz/v1",
        fallback_models: &["meta-llama/Llama-3.3-70B-Instruct-Turbo"],
    },
    ProfileSpec {
        provider_id: "openrouter",
        base_url: "https://openrouter.ai/api/v1",
        fallback_models: &[],
    },
    ProfileSpec {
        provider_id: "ollama",
        base_url: "http://localhost:11434/v1",
        fallback_models: &[],
    },
    ProfileSpec {
        provider_id: "vllm",
        base_url: "http://localhost:8000/v1",
        fallback_models: &[],
    },
    ProfileSpec {
        provider_id: "lmstudio",
        base_url: "http://localhost:1234/v1",
        fallback_models: &[],
    },
    ProfileSpec {
        provider_id: "llamacpp",
        base_url: "http://localhost:8080/v1",
        fallback_models: &[],
    },
];

/// Endpoint and behavior parameters for one family member.
#[derive(Clone, Debug)]
pub struct CompatProfile {
    /// Provider identifier.
    pub provider_id: String,
    /// Base URL (ends without a trailing slash).
    pub base_url: String,
    /// Apply the OpenAI model-generation parameter rule.
    pub generation_rule: bool,
    /// Models advertised when the list endpoint is unreachable.
    pub fallback_models: Vec<String>,
}

impl CompatProfile {
    /// Profile for a known family member, with an optional base-URL override.
    ///
    /// Returns `None` for unknown provider ids — use [`CompatProfile::custom`]
    /// for ad-hoc endpoints.
    pub fn named(provider_id: &str, base_url: Option<&str>) -> Option<Self> {
        let spec = PROFILES.iter().find(|s| s.provider_id == provider_id)?;
        Some(Self {
            provider_id: spec.provider_id.to_string(),
            base_url: base_url.unwrap_or(spec.base_url).trim_end_matches('/').to_string(),
            generation_rule: spec.provider_id == "openai",
            fallback_models: spec.fallback_models.iter().map(|m| (*m).to_string()).collect(),
        })
    }

    /// Profile for a user-configured OpenAI-compatible endpoint.
    pub fn custom(base_url: &str) -> Self {
        Self {
            provider_id: "custom".to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            generation_rule: false,
            fallback_models: Vec::new(),
        }
    }

    /// All known family provider ids.
    pub fn known_ids() -> Vec<&'static str> {
        PROFILES.iter().map(|s| s.provider_id).collect()
    }
}

/// Adapter for any OpenAI-compatible backend.
pub struct OpenAiCompatAdapter {
    profile: CompatProfile,
    api_key: Option<String>,
    client: reqwest::Client,
    policy: HttpPolicy,
}

impl OpenAiCompatAdapter {
    /// Create an adapter for the given profile.
    pub fn new(profile: CompatProfile, api_key: Option<String>) -> Self {
        debug!(provider = %profile.provider_id, base_url = %profile.base_url, "compat adapter ready");
        Self {
            profile,
            api_key,
            client: reqwest::Client::new(),
            policy: HttpPolicy::default(),
        }
    }

    /// Create an adapter with a custom HTTP policy (tests, local engines).
    pub fn with_policy(profile: CompatProfile, api_key: Option<String>, policy: HttpPolicy) -> Self {
        Self {
            profile,
            api_key,
            client: reqwest::Client::new(),
            policy,
        }
    }

    fn headers(&self) -> AdapterResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
                AdapterError::Auth { message: "API key contains invalid header characters".into() }
            })?;
            let _ = headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Build the outgoing body: verbatim request with the stream flag set,
    /// the provider prefix stripped from the model id, and the generation
    /// rule applied where the profile requires it.
    fn build_body(&self, request: &ChatRequest, stream: bool) -> AdapterResult<Value> {
        let mut body = serde_json::to_value(request)?;

        let model = bare_model(&request.model, &self.profile.provider_id);
        body["model"] = Value::String(model.to_string());
        body["stream"] = Value::Bool(stream);

        if self.profile.generation_rule && REASONING_GENERATION.is_match(model) {
            if let Some(obj) = body.as_object_mut() {
                if let Some(max) = obj.remove("max_tokens") {
                    let _ = obj.insert("max_completion_tokens".to_string(), max);
                }
                let _ = obj.remove("temperature");
            }
        }

        Ok(body)
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.profile.base_url)
    }
}

/// Strip a `provider/` prefix from a model id when it names this provider.
fn bare_model<'a>(model: &'a str, provider_id: &str) -> &'a str {
    match model.split_once('/') {
        Some((prefix, rest)) if prefix == provider_id => rest,
        _ => model,
    }
}

/// `GET /models` response body.
#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelInfo>,
}

#[async_trait]
impl ChatAdapter for OpenAiCompatAdapter {
    fn provider_id(&self) -> &str {
        &self.profile.provider_id
    }

    fn capabilities(&self) -> &[Capability] {
        COMPAT_CAPABILITIES
    }

    async fn chat(&self, request: &ChatRequest) -> AdapterResult<ChatResponse> {
        let body = self.build_body(request, false)?;
        let response =
            send_json(&self.client, &self.chat_url(), self.headers()?, &body, &self.policy).await?;
        let completion = response.json::<ChatResponse>().await?;
        Ok(completion)
    }

    async fn chat_stream(&self, request: &ChatRequest) -> AdapterResult<ChunkStream> {
        let body = self.build_body(request, true)?;
        let response =
            send_json(&self.client, &self.chat_url(), self.headers()?, &body, &self.policy).await?;

        let provider = self.profile.provider_id.clone();
        let chunks = sse_data_lines(response.bytes_stream())
            .filter_map(move |payload| {
                let chunk: Option<StreamChunk> = decode_frame(&payload, &provider);
                std::future::ready(chunk)
            })
            .map(Ok);

        Ok(Box::pin(chunks))
    }

    async fn list_models(&self) -> AdapterResult<Vec<ModelInfo>> {
        let url = format!("{}/models", self.profile.base_url);
        let fallback = || {
            self.profile
                .fallback_models
                .iter()
                .map(|m| ModelInfo::new(m.clone(), self.profile.provider_id.clone()))
                .collect::<Vec<_>>()
        };

        match get_json(&self.client, &url, self.headers()?, &self.policy).await {
            Ok(response) if response.status().is_success() => {
                let list = response.json::<ModelList>().await?;
                Ok(list.data)
            }
            Ok(_) | Err(_) if !self.profile.fallback_models.is_empty() => Ok(fallback()),
            Ok(response) => Err(AdapterError::Api {
                status: response.status().as_u16(),
                message: "model listing failed".into(),
                code: None,
            }),
            Err(e) => Err(e),
        }
    }

    async fn validate_key(&self) -> AdapterResult<bool> {
        let url = format!("{}/models", self.profile.base_url);
        let response = get_json(&self.client, &url, self.headers()?, &self.policy).await?;
        Ok(response.status() != reqwest::StatusCode::UNAUTHORIZED
            && response.status() != reqwest::StatusCode::FORBIDDEN)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
