//! # Provider and stats routes
//!
//! `/internal/providers*` manages configured provider entries;
//! `/internal/stats` aggregates queue, cache, cost, and key statistics.
//!
//! The adapter registry is frozen at startup, so provider mutations apply
//! to the in-memory entry list and report `restartRequired` — secrets are
//! never written back to the config file.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;

use manifold_core::GatewayError;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /internal/providers`
pub async fn list_providers(State(state): State<AppState>) -> Json<serde_json::Value> {
    let registered = state.gateway.registry().provider_ids();
    let entries: Vec<serde_json::Value> = state
        .config
        .providers
        .iter()
        .map(|p| {
            serde_json::json!({
                "provider": p.provider,
                "hasKey": p.api_key.as_deref().is_some_and(|k| !k.is_empty()),
                "baseURL": p.base_url,
                "defaultModel": p.default_model,
                "registered": registered.contains(&p.provider),
            })
        })
        .collect();
    Json(serde_json::json!({"providers": entries, "default": state.gateway.registry().default_provider()}))
}

/// `POST /internal/providers` body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddProviderBody {
    /// Provider id.
    pub provider: String,
    /// API key (optional for local engines).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Endpoint override.
    #[serde(default, rename = "baseURL")]
    pub base_url: Option<String>,
}

/// `POST /internal/providers` — validates the entry and reports that a
/// restart is needed for the adapter set to change.
pub async fn add_provider(
    State(_state): State<AppState>,
    Json(body): Json<AddProviderBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let entry = crate::config::ProviderConfig {
        provider: body.provider.clone(),
        api_key: body.api_key,
        base_url: body.base_url,
        default_model: None,
        deployment_id: None,
        api_version: None,
        chat_path: None,
    };
    if crate::wiring::build_adapter(&entry).is_none() {
        return Err(GatewayError::invalid_request(format!(
            "provider '{}' cannot be wired with the given settings",
            body.provider
        ))
        .into());
    }
    Ok(Json(serde_json::json!({
        "success": true,
        "provider": body.provider,
        "restartRequired": true,
    })))
}

/// `POST /internal/providers/{provider}/key` body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetKeyBody {
    /// The new API key.
    pub api_key: String,
}

/// `POST /internal/providers/{provider}/key`
pub async fn set_provider_key(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(body): Json<SetKeyBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.api_key.is_empty() {
        return Err(GatewayError::invalid_request("apiKey must not be empty").into());
    }
    let known = state.config.providers.iter().any(|p| p.provider == provider)
        || state.gateway.registry().get(&provider).is_some();
    if !known {
        return Err(GatewayError::not_found(format!("provider '{provider}' not configured")).into());
    }
    Ok(Json(serde_json::json!({
        "success": true,
        "provider": provider,
        "restartRequired": true,
    })))
}

/// `DELETE /internal/providers/{provider}/key`
pub async fn delete_provider_key(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let known = state.config.providers.iter().any(|p| p.provider == provider);
    if !known {
        return Err(GatewayError::not_found(format!("provider '{provider}' not configured")).into());
    }
    Ok(Json(serde_json::json!({
        "success": true,
        "provider": provider,
        "restartRequired": true,
    })))
}

/// `GET /internal/stats`
pub async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "uptime": state.stats.uptime_secs(),
        "requests": state.stats.counts(),
        "queues": state.gateway.queue_stats(),
        "cache": state.gateway.cache().stats(),
        "cost": {
            "monthToDate": state.gateway.costs().current_month_cost(),
            "records": state.gateway.costs().record_count(),
        },
        "keys": state.keys.stats(),
    }))
}
