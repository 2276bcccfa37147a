//! Preset admission limits per provider.
//!
//! Rate windows are requests per 60 seconds; concurrency caps reflect what
//! each backend tolerates. Local engines run one request at a time.

use std::time::Duration;

use crate::queue::{QueueConfig, RateWindow};

/// Default pending-list bound.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 100;

/// Default per-job timeout.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(60);

/// Rate window length shared by all presets.
const WINDOW: Duration = Duration::from_secs(60);

/// The preset queue configuration for a provider.
pub fn preset(provider: &str) -> QueueConfig {
    let (requests, max_concurrent) = match provider {
        "openai" | "azure" => (60, 5),
        "anthropic" => (50, 4),
        "groq" => (30, 8),
        "cerebras" => (100, 10),
        "ollama" | "lmstudio" | "llamacpp" | "vllm" => (10, 1),
        "openrouter" | "together" => (60, 5),
        _ => (60, 5),
    };

    QueueConfig {
        max_concurrent,
        max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
        rate: Some(RateWindow { requests, window: WINDOW }),
        timeout: DEFAULT_JOB_TIMEOUT,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_presets() {
        let openai = preset("openai");
        assert_eq!(openai.max_concurrent, 5);
        assert_eq!(openai.rate.unwrap().requests, 60);

        let anthropic = preset("anthropic");
        assert_eq!(anthropic.max_concurrent, 4);
        assert_eq!(anthropic.rate.unwrap().requests, 50);

        let groq = preset("groq");
        assert_eq!(groq.max_concurrent, 8);
        assert_eq!(groq.rate.unwrap().requests, 30);

        let cerebras = preset("cerebras");
        assert_eq!(cerebras.max_concurrent, 10);
        assert_eq!(cerebras.rate.unwrap().requests, 100);
    }

    #[test]
    fn local_engines_single_file() {
        for id in ["ollama", "lmstudio", "llamacpp", "vllm"] {
            let config = preset(id);
            assert_eq!(config.max_concurrent, 1, "{id}");
            assert_eq!(config.rate.unwrap().requests, 10, "{id}");
        }
    }

    #[test]
    fn unknown_provider_gets_defaults() {
        let config = preset("somebody-new");
        assert_eq!(config.max_concurrent, 5);
        assert_eq!(config.rate.unwrap().requests, 60);
        assert_eq!(config.max_queue_size, DEFAULT_MAX_QUEUE_SIZE);
        assert_eq!(config.timeout, DEFAULT_JOB_TIMEOUT);
    }
}
