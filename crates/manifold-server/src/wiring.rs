//! # Config → adapter wiring
//!
//! Builds the frozen adapter registry from the provider list at startup.
//! The registry never mutates afterwards; runtime provider-key changes are
//! persisted to the config document and take effect on restart.

use std::sync::Arc;

use tracing::warn;

use manifold_llm::adapter::ChatAdapter;
use manifold_llm::azure::AzureAdapter;
use manifold_llm::compat::{CompatProfile, OpenAiCompatAdapter};
use manifold_llm::registry::AdapterRegistry;
use manifold_llm_anthropic::AnthropicAdapter;
use manifold_llm_cohere::CohereAdapter;
use manifold_llm_google::GoogleAdapter;

use crate::config::{GatewayConfig, ProviderConfig};

/// Build one adapter from a provider entry. Returns `None` (with a warning)
/// for entries that cannot be wired.
pub fn build_adapter(entry: &ProviderConfig) -> Option<Arc<dyn ChatAdapter>> {
    let api_key = entry.api_key.as_deref().filter(|k| !k.is_empty());
    let base_url = entry.base_url.as_deref();

    match entry.provider.as_str() {
        "anthropic" => Some(Arc::new(AnthropicAdapter::new(api_key.unwrap_or(""), base_url))),
        "google" => Some(Arc::new(GoogleAdapter::new(api_key.unwrap_or(""), base_url))),
        "cohere" => Some(Arc::new(match entry.chat_path.as_deref() {
            Some(path) => CohereAdapter::with_chat_path(api_key.unwrap_or(""), base_url, path),
            None => CohereAdapter::new(api_key.unwrap_or(""), base_url),
        })),
        "azure" => {
            let Some(resource) = base_url else {
                warn!("azure provider requires baseURL; skipping");
                return None;
            };
            let Some(deployment) = entry
                .deployment_id
                .as_deref()
                .or(entry.default_model.as_deref())
            else {
                warn!("azure provider requires deploymentId; skipping");
                return None;
            };
            Some(Arc::new(AzureAdapter::new(
                resource,
                deployment,
                api_key.unwrap_or(""),
                entry.api_version.as_deref(),
            )))
        }
        "custom" => {
            let Some(base) = base_url else {
                warn!("custom provider requires baseURL; skipping");
                return None;
            };
            Some(Arc::new(OpenAiCompatAdapter::new(
                CompatProfile::custom(base),
                api_key.map(String::from),
            )))
        }
        other => match CompatProfile::named(other, base_url) {
            Some(profile) => {
                Some(Arc::new(OpenAiCompatAdapter::new(profile, api_key.map(String::from))))
            }
            None => {
                warn!(provider = other, "unknown provider id; skipping");
                None
            }
        },
    }
}

/// Build the full registry from the configuration.
pub fn build_registry(config: &GatewayConfig) -> AdapterRegistry {
    let default_provider = config
        .default_provider
        .clone()
        .or_else(|| config.providers.first().map(|p| p.provider.clone()))
        .unwrap_or_else(|| "openai".to_string());

    let mut registry = AdapterRegistry::new(default_provider);
    for entry in &config.providers {
        if let Some(adapter) = build_adapter(entry) {
            registry.register(adapter);
        }
    }
    registry
}

/// Build a one-off adapter for a passthrough request, where the caller
/// supplies the backend's own API key. Bypasses queues and cache.
pub fn passthrough_adapter(provider: &str, api_key: &str) -> Option<Arc<dyn ChatAdapter>> {
    let entry = ProviderConfig {
        provider: provider.to_string(),
        api_key: Some(api_key.to_string()),
        base_url: None,
        default_model: None,
        deployment_id: None,
        api_version: None,
        chat_path: None,
    };
    build_adapter(&entry)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(provider: &str) -> ProviderConfig {
        ProviderConfig {
            provider: provider.into(),
            api_key: Some("key".into()),
            base_url: None,
            default_model: None,
            deployment_id: None,
            api_version: None,
            chat_path: None,
        }
    }

    #[test]
    fn wires_custom_protocol_adapters() {
        for id in ["anthropic", "google", "cohere"] {
            let adapter = build_adapter(&entry(id)).unwrap();
            assert_eq!(adapter.provider_id(), id);
        }
    }

    #[test]
    fn wires_compat_family() {
        for id in ["openai", "groq", "deepseek", "ollama"] {
            let adapter = build_adapter(&entry(id)).unwrap();
            assert_eq!(adapter.provider_id(), id);
        }
    }

    #[test]
    fn azure_requires_base_url_and_deployment() {
        assert!(build_adapter(&entry("azure")).is_none());

        let mut with_url = entry("azure");
        with_url.base_url = Some("https://res.openai.azure.com".into());
        assert!(build_adapter(&with_url).is_none());

        with_url.deployment_id = Some("dep-1".into());
        let adapter = build_adapter(&with_url).unwrap();
        assert_eq!(adapter.provider_id(), "azure");
    }

    #[test]
    fn custom_requires_base_url() {
        assert!(build_adapter(&entry("custom")).is_none());
        let mut with_url = entry("custom");
        with_url.base_url = Some("http://localhost:9/v1".into());
        assert!(build_adapter(&with_url).is_some());
    }

    #[test]
    fn unknown_provider_skipped() {
        assert!(build_adapter(&entry("not-a-provider")).is_none());
    }

    #[test]
    fn registry_default_provider_resolution() {
        let mut config = GatewayConfig::default();
        config.providers = vec![entry("groq"), entry("anthropic")];
        let registry = build_registry(&config);
        assert_eq!(registry.default_provider(), "groq");
        assert_eq!(registry.provider_ids(), vec!["anthropic", "groq"]);

        config.default_provider = Some("anthropic".into());
        let registry = build_registry(&config);
        assert_eq!(registry.default_provider(), "anthropic");
    }

    #[test]
    fn passthrough_builds_for_known_providers() {
        assert!(passthrough_adapter("anthropic", "sk").is_some());
        assert!(passthrough_adapter("openai", "sk").is_some());
        assert!(passthrough_adapter("azure", "sk").is_none()); // needs baseURL
    }
}
