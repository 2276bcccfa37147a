//! # Response cache
//!
//! Content-addressed memoization of non-streaming completions. The
//! fingerprint is a SHA-256 over a canonical serialization of the
//! semantically significant request fields: model, `(role, content)` pairs,
//! temperature, `max_tokens`, and the sorted tool-name set. The canonical
//! form is rebuilt from typed data, so reordering JSON object keys in the
//! incoming body cannot change the key.
//!
//! Entries are insertion-ordered; at capacity the oldest-created entry is
//! evicted. TTL is checked on read; streaming responses never enter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::json;
use sha2::{Digest, Sha256};

use manifold_core::messages::MessageContent;
use manifold_core::{ChatRequest, ChatResponse};

/// Cache tuning parameters.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Whether the cache participates at all.
    pub enabled: bool,
    /// Entry lifetime.
    pub ttl: Duration,
    /// Maximum entry count.
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true, ttl: Duration::from_secs(300), max_size: 1000 }
    }
}

/// Point-in-time cache statistics.
#[derive(Clone, Copy, Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Lookup hits.
    pub hits: u64,
    /// Lookup misses.
    pub misses: u64,
    /// `hits / (hits + misses)`, 0 when empty.
    pub hit_rate: f64,
    /// Live entry count.
    pub size: usize,
}

struct Entry {
    response: ChatResponse,
    created_at: Instant,
    expires_at: Instant,
    hits: u64,
}

struct CacheState {
    entries: HashMap<String, Entry>,
    /// Insertion order for oldest-first eviction.
    order: Vec<String>,
}

/// Fingerprint-keyed response cache.
pub struct ResponseCache {
    config: CacheConfig,
    state: Mutex<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Compute the cache fingerprint for a request resolved to a model.
///
/// Only fields that change the completion participate; tool names are
/// sorted so declaration order is irrelevant.
pub fn fingerprint(request: &ChatRequest, resolved_model: &str) -> String {
    let messages: Vec<serde_json::Value> = request
        .messages
        .iter()
        .map(|m| {
            let content = match &m.content {
                None => serde_json::Value::Null,
                Some(MessageContent::Text(t)) => json!(t),
                Some(MessageContent::Parts(parts)) => {
                    serde_json::to_value(parts).unwrap_or(serde_json::Value::Null)
                }
            };
            json!([m.role, content])
        })
        .collect();

    let mut tool_names: Vec<&str> = request
        .tools
        .iter()
        .flatten()
        .map(|t| t.function.name.as_str())
        .collect();
    tool_names.sort_unstable();

    let canonical = json!({
        "model": resolved_model,
        "messages": messages,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "tools": tool_names,
    });

    let digest = Sha256::digest(canonical.to_string().as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

impl ResponseCache {
    /// Create a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CacheState { entries: HashMap::new(), order: Vec::new() }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a fingerprint. Expired entries are evicted and count as
    /// misses.
    pub fn get(&self, key: &str) -> Option<ChatResponse> {
        if !self.config.enabled {
            return None;
        }

        let mut state = self.state.lock();
        let expired = state.entries.get(key).is_some_and(|e| e.expires_at <= Instant::now());
        if expired {
            let _ = state.entries.remove(key);
            state.order.retain(|k| k != key);
        }

        match state.entries.get_mut(key) {
            Some(entry) => {
                entry.hits += 1;
                let _ = self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.response.clone())
            }
            None => {
                let _ = self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a response, evicting the oldest entry when at capacity.
    pub fn set(&self, key: &str, response: ChatResponse, ttl: Option<Duration>) {
        if !self.config.enabled || self.config.max_size == 0 {
            return;
        }

        let now = Instant::now();
        let ttl = ttl.unwrap_or(self.config.ttl);
        let mut state = self.state.lock();

        // Replacing an existing key keeps its insertion-order slot.
        if !state.entries.contains_key(key) {
            while state.entries.len() >= self.config.max_size {
                let Some(oldest) = state.order.first().cloned() else {
                    break;
                };
                let _ = state.entries.remove(&oldest);
                let _ = state.order.remove(0);
            }
            state.order.push(key.to_string());
        }

        let _ = state.entries.insert(
            key.to_string(),
            Entry { response, created_at: now, expires_at: now + ttl, hits: 0 },
        );
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
    }

    /// Point-in-time statistics.
    #[allow(clippy::cast_precision_loss)] // counters never approach 2^52
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 { 0.0 } else { hits as f64 / total as f64 };
        CacheStats { hits, misses, hit_rate, size: self.state.lock().entries.len() }
    }

    /// Whether caching is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Age of the oldest entry, for diagnostics.
    pub fn oldest_age(&self) -> Option<Duration> {
        let state = self.state.lock();
        state
            .order
            .first()
            .and_then(|k| state.entries.get(k))
            .map(|e| e.created_at.elapsed())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use manifold_core::messages::{ChatMessage, Role};
    use manifold_core::{Choice, FinishReason};

    fn request(model: &str, text: &str) -> ChatRequest {
        ChatRequest {
            model: model.into(),
            messages: vec![ChatMessage::text(Role::User, text)],
            temperature: Some(0.7),
            max_tokens: Some(100),
            top_p: None,
            stop: None,
            stream: None,
            tools: None,
            tool_choice: None,
            presence_penalty: None,
            frequency_penalty: None,
        }
    }

    fn response(model: &str) -> ChatResponse {
        ChatResponse {
            id: "chatcmpl-c".into(),
            object: "chat.completion".into(),
            created: 0,
            model: model.into(),
            choices: vec![Choice {
                index: 0,
                message: ChatMessage::text(Role::Assistant, "cached"),
                finish_reason: Some(FinishReason::Stop),
            }],
            usage: None,
        }
    }

    // ── Fingerprints ─────────────────────────────────────────────────────

    #[test]
    fn identical_requests_share_fingerprint() {
        let a = fingerprint(&request("m", "hello"), "m");
        let b = fingerprint(&request("m", "hello"), "m");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_inputs_distinct_fingerprints() {
        let base = request("m", "hello");
        let fp = fingerprint(&base, "m");

        assert_ne!(fp, fingerprint(&request("m", "other"), "m"));
        assert_ne!(fp, fingerprint(&base, "other-model"));

        let mut hotter = base.clone();
        hotter.temperature = Some(1.5);
        assert_ne!(fp, fingerprint(&hotter, "m"));

        let mut longer = base.clone();
        longer.max_tokens = Some(999);
        assert_ne!(fp, fingerprint(&longer, "m"));
    }

    #[test]
    fn fingerprint_stable_under_json_key_order() {
        // Two bodies with reordered keys deserialize to the same request and
        // therefore the same fingerprint.
        let a: ChatRequest = serde_json::from_str(
            r#"{"model":"m","messages":[{"role":"user","content":"hi"}],"temperature":0.7,"max_tokens":10}"#,
        )
        .unwrap();
        let b: ChatRequest = serde_json::from_str(
            r#"{"max_tokens":10,"temperature":0.7,"messages":[{"content":"hi","role":"user"}],"model":"m"}"#,
        )
        .unwrap();
        assert_eq!(fingerprint(&a, "m"), fingerprint(&b, "m"));
    }

    #[test]
    fn tool_names_participate_sorted() {
        use manifold_core::messages::{FunctionDef, ToolDef};
        let tool = |name: &str| ToolDef {
            tool_type: "function".into(),
            function: FunctionDef { name: name.into(), description: None, parameters: None },
        };

        let mut with_ab = request("m", "hi");
        with_ab.tools = Some(vec![tool("a"), tool("b")]);
        let mut with_ba = request("m", "hi");
        with_ba.tools = Some(vec![tool("b"), tool("a")]);
        let plain = request("m", "hi");

        assert_eq!(fingerprint(&with_ab, "m"), fingerprint(&with_ba, "m"));
        assert_ne!(fingerprint(&with_ab, "m"), fingerprint(&plain, "m"));
    }

    // ── Get/set ──────────────────────────────────────────────────────────

    #[test]
    fn set_then_get() {
        let cache = ResponseCache::new(CacheConfig::default());
        cache.set("k1", response("m"), None);
        let hit = cache.get("k1").unwrap();
        assert_eq!(hit.first_content(), "cached");
        assert_eq!(hit.model, "m");
    }

    #[test]
    fn miss_on_unknown_key() {
        let cache = ResponseCache::new(CacheConfig::default());
        assert!(cache.get("nope").is_none());
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn ttl_expiry_evicts_on_read() {
        let cache = ResponseCache::new(CacheConfig {
            ttl: Duration::from_millis(0),
            ..CacheConfig::default()
        });
        cache.set("k1", response("m"), None);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k1").is_none());
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn per_entry_ttl_override() {
        let cache = ResponseCache::new(CacheConfig {
            ttl: Duration::from_millis(0),
            ..CacheConfig::default()
        });
        cache.set("k1", response("m"), Some(Duration::from_secs(60)));
        assert!(cache.get("k1").is_some());
    }

    #[test]
    fn capacity_evicts_oldest() {
        let cache = ResponseCache::new(CacheConfig { max_size: 2, ..CacheConfig::default() });
        cache.set("a", response("m"), None);
        cache.set("b", response("m"), None);
        cache.set("c", response("m"), None);

        assert!(cache.get("a").is_none(), "oldest evicted");
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn disabled_cache_is_inert() {
        let cache = ResponseCache::new(CacheConfig { enabled: false, ..CacheConfig::default() });
        cache.set("k1", response("m"), None);
        assert!(cache.get("k1").is_none());
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn stats_hit_rate() {
        let cache = ResponseCache::new(CacheConfig::default());
        cache.set("k1", response("m"), None);
        let _ = cache.get("k1");
        let _ = cache.get("k1");
        let _ = cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn clear_empties() {
        let cache = ResponseCache::new(CacheConfig::default());
        cache.set("k1", response("m"), None);
        cache.clear();
        assert!(cache.get("k1").is_none());
    }
}
