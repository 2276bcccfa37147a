//! # Adapter registry and model router
//!
//! Maps provider ids to registered adapters and resolves which backend
//! serves a given model id.
//!
//! Resolution order:
//! 1. Explicit prefix — `provider/model`, split on the first `/`, accepted
//!    when the prefix names a registered adapter
//! 2. Pattern table — model-id families (`gpt-*` → openai, `claude*` →
//!    anthropic, …)
//! 3. Fallback — `openai`
//!
//! Registration happens only during wiring; after startup the registry is
//! shared read-only (no post-init mutation).

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use manifold_core::{ChatRequest, ChatResponse};

use crate::adapter::{AdapterError, AdapterResult, ChatAdapter};

/// Model-id pattern → provider id.
static MODEL_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"^(gpt-|o1-|o3|o4|chatgpt-)", "openai"),
        (r"^claude", "anthropic"),
        (r"^(gemini|models/gemini)", "google"),
        (r"^(command|c4ai-)", "cohere"),
        (r"^deepseek", "deepseek"),
        (r"^(qwen|qwq)", "qwen"),
        (r"^(moonshot|kimi)", "moonshot"),
        (r"^(glm-|chatglm)", "glm"),
        (r"^(mistral|mixtral|codestral)", "mistral"),
        (r"^(llama|meta-llama)", "groq"),
    ]
    .into_iter()
    .map(|(pattern, provider)| (Regex::new(pattern).expect("static regex"), provider))
    .collect()
});

/// A resolved routing target: provider id plus the model id to forward.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteTarget {
    /// The provider to dispatch to.
    pub provider: String,
    /// The model id with any provider prefix stripped.
    pub model: String,
}

/// Match a bare model id against the pattern table.
pub fn match_model_pattern(model: &str) -> Option<&'static str> {
    let lower = model.to_lowercase();
    MODEL_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(&lower))
        .map(|(_, provider)| *provider)
}

/// Provider id → adapter, with a default for pattern misses.
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ChatAdapter>>,
    default_provider: String,
}

impl AdapterRegistry {
    /// Create an empty registry with the given default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            adapters: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register an adapter under its provider id. Wiring-time only.
    pub fn register(&mut self, adapter: Arc<dyn ChatAdapter>) {
        let id = adapter.provider_id().to_string();
        debug!(provider = %id, "adapter registered");
        let _ = self.adapters.insert(id, adapter);
    }

    /// The configured default provider id.
    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    /// Look up an adapter by provider id.
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn ChatAdapter>> {
        self.adapters.get(provider_id).cloned()
    }

    /// All registered provider ids, sorted.
    pub fn provider_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.adapters.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// All registered adapters.
    pub fn adapters(&self) -> Vec<Arc<dyn ChatAdapter>> {
        self.adapters.values().cloned().collect()
    }

    /// Resolve the backend for a model id.
    ///
    /// An explicit `provider/model` prefix wins when it names a registered
    /// adapter. Otherwise the pattern table decides, falling back to the
    /// registry default, then to `openai`.
    pub fn resolve(&self, model: &str) -> RouteTarget {
        if let Some((prefix, bare)) = model.split_once('/') {
            if self.adapters.contains_key(prefix) {
                return RouteTarget {
                    provider: prefix.to_string(),
                    model: bare.to_string(),
                };
            }
        }

        if let Some(provider) = match_model_pattern(model) {
            if self.adapters.contains_key(provider) {
                return RouteTarget {
                    provider: provider.to_string(),
                    model: model.to_string(),
                };
            }
        }

        let provider = if self.adapters.contains_key(&self.default_provider) {
            self.default_provider.clone()
        } else {
            "openai".to_string()
        };
        RouteTarget { provider, model: model.to_string() }
    }

    /// Resolve and fetch the adapter in one step.
    pub fn resolve_adapter(&self, model: &str) -> Option<(Arc<dyn ChatAdapter>, RouteTarget)> {
        let target = self.resolve(model);
        let adapter = self.get(&target.provider)?;
        Some((adapter, target))
    }

    /// Try providers in order, returning the first success or the last error.
    ///
    /// Cancellation is terminal; every other error moves on to the next
    /// provider in the list.
    pub async fn chat_with_fallback(
        &self,
        request: &ChatRequest,
        providers: &[&str],
    ) -> AdapterResult<ChatResponse> {
        let mut last_error = AdapterError::ModelNotFound { model: request.model.clone() };

        for provider in providers {
            let Some(adapter) = self.get(provider) else {
                last_error = AdapterError::Api {
                    status: 404,
                    message: format!("provider not registered: {provider}"),
                    code: None,
                };
                continue;
            };
            match adapter.chat(request).await {
                Ok(response) => return Ok(response),
                Err(AdapterError::Cancelled) => return Err(AdapterError::Cancelled),
                Err(e) => {
                    debug!(provider, error = %e, "fallback: provider failed, trying next");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use manifold_core::messages::{Capability, ChatMessage, ModelInfo, Role};
    use manifold_core::StreamChunk;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::adapter::ChunkStream;

    struct FakeAdapter {
        id: &'static str,
        fail: bool,
        calls: AtomicU32,
    }

    impl FakeAdapter {
        fn new(id: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self { id, fail, calls: AtomicU32::new(0) })
        }
    }

    #[async_trait]
    impl ChatAdapter for FakeAdapter {
        fn provider_id(&self) -> &str {
            self.id
        }

        fn capabilities(&self) -> &[Capability] {
            &[Capability::Chat]
        }

        async fn chat(&self, request: &ChatRequest) -> AdapterResult<ChatResponse> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AdapterError::Api {
                    status: 503,
                    message: "down".into(),
                    code: None,
                });
            }
            Ok(ChatResponse {
                id: "chatcmpl-1".into(),
                object: "chat.completion".into(),
                created: 0,
                model: request.model.clone(),
                choices: vec![manifold_core::messages::Choice {
                    index: 0,
                    message: ChatMessage::text(Role::Assistant, self.id),
                    finish_reason: Some(manifold_core::FinishReason::Stop),
                }],
                usage: None,
            })
        }

        async fn chat_stream(&self, _request: &ChatRequest) -> AdapterResult<ChunkStream> {
            let chunks: Vec<Result<StreamChunk, AdapterError>> = vec![];
            Ok(Box::pin(futures::stream::iter(chunks)))
        }

        async fn list_models(&self) -> AdapterResult<Vec<ModelInfo>> {
            Ok(vec![])
        }

        async fn validate_key(&self) -> AdapterResult<bool> {
            Ok(true)
        }
    }

    fn registry() -> AdapterRegistry {
        let mut reg = AdapterRegistry::new("openai");
        reg.register(FakeAdapter::new("openai", false));
        reg.register(FakeAdapter::new("anthropic", false));
        reg.register(FakeAdapter::new("google", false));
        reg.register(FakeAdapter::new("groq", false));
        reg
    }

    fn request(model: &str) -> ChatRequest {
        ChatRequest {
            model: model.into(),
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

    // ── Pattern table ────────────────────────────────────────────────────

    #[test]
    fn patterns_route_families() {
        assert_eq!(match_model_pattern("gpt-4.1"), Some("openai"));
        assert_eq!(match_model_pattern("o3-mini"), Some("openai"));
        assert_eq!(match_model_pattern("claude-sonnet-4-5"), Some("anthropic"));
        assert_eq!(match_model_pattern("gemini-2.5-flash"), Some("google"));
        assert_eq!(match_model_pattern("command-r-plus"), Some("cohere"));
        assert_eq!(match_model_pattern("deepseek-chat"), Some("deepseek"));
        assert_eq!(match_model_pattern("qwq-32b"), Some("qwen"));
        assert_eq!(match_model_pattern("kimi-k2"), Some("moonshot"));
        assert_eq!(match_model_pattern("glm-4"), Some("glm"));
        assert_eq!(match_model_pattern("mixtral-8x7b"), Some("mistral"));
        assert_eq!(match_model_pattern("llama-3.3-70b"), Some("groq"));
        assert_eq!(match_model_pattern("totally-unknown"), None);
    }

    #[test]
    fn patterns_are_case_insensitive() {
        assert_eq!(match_model_pattern("Claude-Opus-4"), Some("anthropic"));
        assert_eq!(match_model_pattern("GPT-4.1"), Some("openai"));
    }

    // ── Resolution ───────────────────────────────────────────────────────

    #[test]
    fn resolve_explicit_prefix() {
        let target = registry().resolve("anthropic/claude-sonnet-4-5");
        assert_eq!(target.provider, "anthropic");
        assert_eq!(target.model, "claude-sonnet-4-5");
    }

    #[test]
    fn resolve_unregistered_prefix_falls_through() {
        // "cohere/" prefix with no cohere adapter: pattern table sees the
        // full string, which matches nothing, so the default wins.
        let target = registry().resolve("cohere/command-r");
        assert_eq!(target.provider, "openai");
        assert_eq!(target.model, "cohere/command-r");
    }

    #[test]
    fn resolve_by_pattern() {
        let target = registry().resolve("claude-haiku-4-5");
        assert_eq!(target.provider, "anthropic");
        let target = registry().resolve("llama-3.3-70b");
        assert_eq!(target.provider, "groq");
    }

    #[test]
    fn resolve_unknown_uses_default() {
        let target = registry().resolve("some-house-model");
        assert_eq!(target.provider, "openai");
    }

    #[test]
    fn resolve_default_falls_back_to_openai() {
        let mut reg = AdapterRegistry::new("nonexistent");
        reg.register(FakeAdapter::new("openai", false));
        let target = reg.resolve("mystery-model");
        assert_eq!(target.provider, "openai");
    }

    #[test]
    fn resolve_pattern_hit_on_unregistered_provider_uses_default() {
        // Pattern says "deepseek", but no deepseek adapter is registered.
        let target = registry().resolve("deepseek-chat");
        assert_eq!(target.provider, "openai");
    }

    #[test]
    fn resolve_adapter_returns_pair() {
        let reg = registry();
        let (adapter, target) = reg.resolve_adapter("claude-opus-4").unwrap();
        assert_eq!(adapter.provider_id(), "anthropic");
        assert_eq!(target.provider, "anthropic");
    }

    #[test]
    fn provider_ids_sorted() {
        assert_eq!(registry().provider_ids(), vec!["anthropic", "google", "groq", "openai"]);
    }

    // ── Fallback ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn fallback_first_success_wins() {
        let reg = registry();
        let resp = reg
            .chat_with_fallback(&request("m"), &["openai", "anthropic"])
            .await
            .unwrap();
        assert_eq!(resp.first_content(), "openai");
    }

    #[tokio::test]
    async fn fallback_skips_failing_provider() {
        let mut reg = AdapterRegistry::new("a");
        let failing = FakeAdapter::new("a", true);
        let healthy = FakeAdapter::new("b", false);
        reg.register(failing.clone());
        reg.register(healthy.clone());

        let resp = reg.chat_with_fallback(&request("m"), &["a", "b"]).await.unwrap();
        assert_eq!(resp.first_content(), "b");
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fallback_returns_last_error() {
        let mut reg = AdapterRegistry::new("a");
        reg.register(FakeAdapter::new("a", true));
        reg.register(FakeAdapter::new("b", true));

        let err = reg.chat_with_fallback(&request("m"), &["a", "b"]).await.unwrap_err();
        assert!(matches!(err, AdapterError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn fallback_skips_unregistered() {
        let mut reg = AdapterRegistry::new("b");
        reg.register(FakeAdapter::new("b", false));
        let resp = reg.chat_with_fallback(&request("m"), &["ghost", "b"]).await.unwrap();
        assert_eq!(resp.first_content(), "b");
    }
}
