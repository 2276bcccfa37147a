//! # Gateway-key routes
//!
//! `/internal/gateway-keys*`: CRUD, enable/disable/regenerate, stats.
//! All admin-only (enforced by the permission middleware). Responses carry
//! [`KeyView`] — the stored hash is never serialized out.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use manifold_auth::keys::{GatewayKey, KeyUpdate};
use manifold_core::GatewayError;

use crate::error::ApiError;
use crate::state::AppState;

/// Admin-facing view of a stored key: everything except the hash.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyView {
    /// Key id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Loggable prefix.
    pub prefix: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last successful verification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    /// Expiry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the key validates.
    pub enabled: bool,
    /// Granted scopes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    /// Per-key rate limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
    /// Verification count.
    pub usage_count: u64,
}

impl From<GatewayKey> for KeyView {
    fn from(key: GatewayKey) -> Self {
        Self {
            id: key.id,
            name: key.name,
            prefix: key.prefix,
            created_at: key.created_at,
            last_used_at: key.last_used_at,
            expires_at: key.expires_at,
            enabled: key.enabled,
            scopes: key.scopes,
            rate_limit: key.rate_limit,
            usage_count: key.usage_count,
        }
    }
}

/// `POST /internal/gateway-keys` body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyBody {
    /// Display name.
    pub name: String,
    /// Scopes to grant.
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    /// Requests-per-minute cap.
    #[serde(default)]
    pub rate_limit: Option<u32>,
    /// Expiry.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn not_found(id: &str) -> ApiError {
    GatewayError::not_found(format!("gateway key '{id}' not found")).into()
}

fn store_failure(e: manifold_auth::AuthError) -> ApiError {
    match e {
        manifold_auth::AuthError::KeyNotFound(id) => {
            GatewayError::not_found(format!("gateway key '{id}' not found")).into()
        }
        other => GatewayError::internal(format!("key store failure: {other}")).into(),
    }
}

/// `GET /internal/gateway-keys`
pub async fn list(State(state): State<AppState>) -> Json<Vec<KeyView>> {
    Json(state.keys.list().into_iter().map(KeyView::from).collect())
}

/// `POST /internal/gateway-keys` → 201 with the plaintext, this once.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateKeyBody>,
) -> Result<Response, ApiError> {
    if body.name.trim().is_empty() {
        return Err(GatewayError::invalid_request("key name must not be empty").into());
    }
    let created = state
        .keys
        .create(body.name.trim(), body.scopes, body.rate_limit, body.expires_at)
        .map_err(store_failure)?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

/// `GET /internal/gateway-keys/stats`
pub async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::to_value(state.keys.stats()).unwrap_or_default())
}

/// `GET /internal/gateway-keys/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<KeyView>, ApiError> {
    state.keys.get(&id).map(KeyView::from).map(Json).ok_or_else(|| not_found(&id))
}

/// `PUT`/`PATCH /internal/gateway-keys/{id}`
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<KeyUpdate>,
) -> Result<Json<KeyView>, ApiError> {
    state.keys.update(&id, body).map(KeyView::from).map(Json).map_err(store_failure)
}

/// `DELETE /internal/gateway-keys/{id}` — revoke.
pub async fn revoke(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.keys.revoke(&id).map_err(store_failure)?;
    Ok(Json(serde_json::json!({"success": true})))
}

/// `POST /internal/gateway-keys/{id}/enable`
pub async fn enable(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<KeyView>, ApiError> {
    state.keys.set_enabled(&id, true).map(KeyView::from).map(Json).map_err(store_failure)
}

/// `POST /internal/gateway-keys/{id}/disable`
pub async fn disable(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<KeyView>, ApiError> {
    state.keys.set_enabled(&id, false).map(KeyView::from).map(Json).map_err(store_failure)
}

/// `POST /internal/gateway-keys/{id}/regenerate` — new plaintext, shown
/// this once.
pub async fn regenerate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let created = state.keys.regenerate(&id).map_err(store_failure)?;
    Ok(Json(serde_json::to_value(created).unwrap_or_default()))
}
