//! # Gateway configuration
//!
//! A JSON document with compiled defaults. Any string value equal to
//! `env:VAR_NAME` is substituted from the process environment before
//! deserialization, so API keys never live in the file itself.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Configuration load errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File read failed.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// JSON was malformed or mistyped.
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

/// One configured backend provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Provider id (`openai`, `anthropic`, `azure`, `custom`, …).
    pub provider: String,
    /// API key; usually written as `env:SOME_VAR`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Endpoint override.
    #[serde(default, rename = "baseURL")]
    pub base_url: Option<String>,
    /// Preferred model when the client names none of this provider's.
    #[serde(default)]
    pub default_model: Option<String>,
    /// Azure deployment id.
    #[serde(default)]
    pub deployment_id: Option<String>,
    /// Azure API version.
    #[serde(default)]
    pub api_version: Option<String>,
    /// Cohere chat endpoint path override.
    #[serde(default)]
    pub chat_path: Option<String>,
}

/// CORS settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorsConfig {
    /// Whether CORS headers are emitted.
    pub enabled: bool,
    /// Allowed origins; `["*"]` for any.
    pub origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self { enabled: true, origins: vec!["*".to_string()] }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Whether the subscriber is installed.
    pub enabled: bool,
    /// Filter level (`error` … `trace`).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { enabled: true, level: "info".to_string() }
    }
}

/// Response-cache settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSettings {
    /// Whether caching participates.
    pub enabled: bool,
    /// Entry lifetime in seconds.
    pub ttl_seconds: u64,
    /// Entry cap.
    pub max_size: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { enabled: true, ttl_seconds: 300, max_size: 1000 }
    }
}

/// Cost-tracking settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSettings {
    /// Warn at this month-to-date spend (USD).
    #[serde(default)]
    pub warning_threshold: Option<f64>,
    /// Budget cap (USD).
    #[serde(default)]
    pub limit_threshold: Option<f64>,
}

/// Top-level gateway configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Listen port (0 auto-assigns).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Listen host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Configured backends.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    /// Backend used when no pattern matches.
    #[serde(default)]
    pub default_provider: Option<String>,
    /// CORS settings.
    #[serde(default)]
    pub cors: CorsConfig,
    /// Global requests-per-minute hint for anonymous chat callers.
    #[serde(default)]
    pub rate_limit: Option<u32>,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Admin credential document path.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,
    /// Gateway-key document path.
    #[serde(default = "default_gateway_keys_path")]
    pub gateway_keys_path: String,
    /// Session lifetime in seconds.
    #[serde(default = "default_session_timeout")]
    pub session_timeout: u64,
    /// Statically configured gateway keys (accepted alongside the store).
    #[serde(default)]
    pub static_gateway_keys: Vec<String>,
    /// Desktop-embedded deployments only: every request is the admin.
    /// Unsafe on any network surface; off by default.
    #[serde(default)]
    pub embedded_mode: bool,
    /// Response-cache settings.
    #[serde(default)]
    pub cache: CacheSettings,
    /// Cost-tracking settings.
    #[serde(default)]
    pub cost: CostSettings,
}

fn default_port() -> u16 {
    8787
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_credentials_path() -> String {
    ".manifold/credentials.json".to_string()
}

fn default_gateway_keys_path() -> String {
    ".manifold/gateway-keys.json".to_string()
}

fn default_session_timeout() -> u64 {
    24 * 60 * 60
}

impl Default for GatewayConfig {
    fn default() -> Self {
        serde_json::from_value(Value::Object(serde_json::Map::new()))
            .expect("empty object satisfies defaults")
    }
}

/// Replace every string value of the form `env:VAR_NAME` with the variable's
/// content. Missing variables substitute to an empty string with a warning.
pub fn substitute_env(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Some(var) = s.strip_prefix("env:") {
                match std::env::var(var) {
                    Ok(resolved) => *s = resolved,
                    Err(_) => {
                        tracing::warn!(var, "config references unset environment variable");
                        s.clear();
                    }
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(substitute_env),
        Value::Object(map) => map.values_mut().for_each(substitute_env),
        _ => {}
    }
}

impl GatewayConfig {
    /// Load a config file, applying `env:` substitution.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parse a config document from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let mut value: Value = serde_json::from_str(raw)?;
        substitute_env(&mut value);
        Ok(serde_json::from_value(value)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
