//! # Auth routes
//!
//! `/internal/auth/*`: login, logout, change-password, me, status.

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::Json;
use axum::Extension;
use serde::Deserialize;

use manifold_auth::Principal;
use manifold_core::GatewayError;

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /internal/auth/login` body.
#[derive(Deserialize)]
pub struct LoginBody {
    /// Admin username.
    pub username: String,
    /// Admin password.
    pub password: String,
}

/// `POST /internal/auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = state
        .authenticator
        .login(&body.username, &body.password)
        .map_err(|_| GatewayError::authentication("invalid username or password"))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "token": outcome.token,
        "expiresAt": outcome.expires_at,
    })))
}

/// `POST /internal/auth/logout` — deletes the session named by the bearer
/// token.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    let removed = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| state.authenticator.logout(token));
    Json(serde_json::json!({"success": removed}))
}

/// `POST /internal/auth/change-password` body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordBody {
    /// The current password.
    pub current_password: String,
    /// The replacement password.
    pub new_password: String,
}

/// `POST /internal/auth/change-password`
pub async fn change_password(
    State(state): State<AppState>,
    Json(body): Json<ChangePasswordBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.new_password.len() < 8 {
        return Err(GatewayError::invalid_request(
            "new password must be at least 8 characters",
        )
        .into());
    }
    state
        .authenticator
        .credentials()
        .change_password(&body.current_password, &body.new_password)
        .map_err(|_| GatewayError::authentication("current password is incorrect"))?;
    Ok(Json(serde_json::json!({"success": true})))
}

/// `GET /internal/auth/me`
pub async fn me(Extension(principal): Extension<Principal>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "role": principal.role,
        "mode": principal.mode,
        "authenticated": principal.authenticated,
        "gatewayKey": principal.gateway_key.as_ref().map(|k| serde_json::json!({
            "id": k.id,
            "name": k.name,
            "prefix": k.prefix,
        })),
    }))
}

/// `GET /internal/auth/status`
pub async fn status(Extension(principal): Extension<Principal>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "authenticated": principal.authenticated,
        "role": principal.role,
        "mode": principal.mode,
    }))
}
