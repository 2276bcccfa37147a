//! # Principal derivation
//!
//! Turns the `Authorization` / `X-Auth-Mode` / `X-Provider` headers into a
//! [`Principal`], deterministically:
//!
//! 1. Embedded runtime → admin, always (unsafe outside a desktop-embedded
//!    deployment; off by default).
//! 2. No header → anonymous, unauthenticated.
//! 3. `Basic` → admin via the credential store, else anonymous.
//! 4. `Bearer` + `X-Auth-Mode: passthrough` → anonymous carrying the
//!    backend provider's own key.
//! 5. `Bearer` matching a statically configured key → gateway mode.
//! 6. `Bearer` matching a hashed key in the key store → gateway mode, key
//!    attached.
//! 7. `Bearer` matching a session id → the session's role.

use std::sync::Arc;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::credentials::CredentialStore;
use crate::errors::{AuthError, Result};
use crate::keys::{GatewayKey, GatewayKeyStore};
use crate::sessions::SessionStore;

/// Caller role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthRole {
    /// Full administrative access.
    Admin,
    /// Default role for API callers.
    Anonymous,
}

/// How the caller authenticated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// No bearer credential (anonymous or Basic admin).
    None,
    /// A gateway-issued key.
    Gateway,
    /// The caller supplied the backend provider's own key.
    Passthrough,
}

/// The authenticated identity attached to every request.
#[derive(Clone, Debug)]
pub struct Principal {
    /// Caller role.
    pub role: AuthRole,
    /// Authentication mode.
    pub mode: AuthMode,
    /// Whether any credential verified.
    pub authenticated: bool,
    /// Backend key supplied in passthrough mode.
    pub provider_api_key: Option<String>,
    /// Backend named by `X-Provider` in passthrough mode.
    pub target_provider: Option<String>,
    /// The gateway key that authenticated this caller.
    pub gateway_key: Option<GatewayKey>,
    /// The session that authenticated this caller.
    pub session_id: Option<String>,
}

impl Principal {
    /// Unauthenticated anonymous caller.
    pub fn anonymous() -> Self {
        Self {
            role: AuthRole::Anonymous,
            mode: AuthMode::None,
            authenticated: false,
            provider_api_key: None,
            target_provider: None,
            gateway_key: None,
            session_id: None,
        }
    }

    /// The implicit admin of an embedded deployment.
    pub fn embedded_admin() -> Self {
        Self {
            role: AuthRole::Admin,
            mode: AuthMode::None,
            authenticated: true,
            provider_api_key: None,
            target_provider: None,
            gateway_key: None,
            session_id: None,
        }
    }

    /// Whether this principal holds the admin role.
    pub fn is_admin(&self) -> bool {
        self.role == AuthRole::Admin
    }
}

/// Successful login result.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    /// The session token.
    pub token: String,
    /// Session expiry.
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Derives principals and owns the login/logout flow.
pub struct Authenticator {
    credentials: Arc<CredentialStore>,
    sessions: Arc<SessionStore>,
    keys: Arc<GatewayKeyStore>,
    /// Statically configured keys accepted alongside the hashed store.
    static_keys: Vec<String>,
    /// Embedded runtime: every request is the admin. Unsafe on a network
    /// surface; off unless explicitly configured.
    embedded_mode: bool,
}

impl Authenticator {
    /// Wire up an authenticator over the three stores.
    pub fn new(
        credentials: Arc<CredentialStore>,
        sessions: Arc<SessionStore>,
        keys: Arc<GatewayKeyStore>,
        static_keys: Vec<String>,
        embedded_mode: bool,
    ) -> Self {
        if embedded_mode {
            tracing::warn!(
                "embedded auth mode enabled: every request is treated as admin; \
                 never expose this surface on a network"
            );
        }
        Self { credentials, sessions, keys, static_keys, embedded_mode }
    }

    /// Derive the principal for a request.
    pub fn authenticate(
        &self,
        authorization: Option<&str>,
        auth_mode: Option<&str>,
        provider: Option<&str>,
    ) -> Principal {
        if self.embedded_mode {
            return Principal::embedded_admin();
        }

        let Some(authorization) = authorization else {
            return Principal::anonymous();
        };

        if let Some(encoded) = authorization.strip_prefix("Basic ") {
            return self.authenticate_basic(encoded);
        }

        if let Some(token) = authorization.strip_prefix("Bearer ") {
            return self.authenticate_bearer(token, auth_mode, provider);
        }

        Principal::anonymous()
    }

    fn authenticate_basic(&self, encoded: &str) -> Principal {
        let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded) else {
            return Principal::anonymous();
        };
        let Ok(pair) = String::from_utf8(decoded) else {
            return Principal::anonymous();
        };
        let Some((username, password)) = pair.split_once(':') else {
            return Principal::anonymous();
        };

        if self.credentials.verify(username, password) {
            Principal {
                role: AuthRole::Admin,
                mode: AuthMode::None,
                authenticated: true,
                provider_api_key: None,
                target_provider: None,
                gateway_key: None,
                session_id: None,
            }
        } else {
            Principal::anonymous()
        }
    }

    fn authenticate_bearer(
        &self,
        token: &str,
        auth_mode: Option<&str>,
        provider: Option<&str>,
    ) -> Principal {
        if auth_mode == Some("passthrough") {
            return Principal {
                role: AuthRole::Anonymous,
                mode: AuthMode::Passthrough,
                authenticated: false,
                provider_api_key: Some(token.to_string()),
                target_provider: provider.map(String::from),
                gateway_key: None,
                session_id: None,
            };
        }

        if self.static_keys.iter().any(|k| k == token) {
            return Principal {
                role: AuthRole::Anonymous,
                mode: AuthMode::Gateway,
                authenticated: true,
                provider_api_key: None,
                target_provider: None,
                gateway_key: None,
                session_id: None,
            };
        }

        let outcome = self.keys.verify(token);
        if outcome.valid {
            return Principal {
                role: AuthRole::Anonymous,
                mode: AuthMode::Gateway,
                authenticated: true,
                provider_api_key: None,
                target_provider: None,
                gateway_key: outcome.key,
                session_id: None,
            };
        }

        if let Some(session) = self.sessions.validate(token) {
            return Principal {
                role: session.role,
                mode: AuthMode::None,
                authenticated: true,
                provider_api_key: None,
                target_provider: None,
                gateway_key: None,
                session_id: Some(session.id),
            };
        }

        Principal::anonymous()
    }

    /// Verify admin credentials and open a session.
    pub fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        if !self.credentials.verify(username, password) {
            return Err(AuthError::InvalidCredentials);
        }
        let session = self.sessions.create(username, AuthRole::Admin);
        Ok(LoginOutcome { token: session.id, expires_at: session.expires_at })
    }

    /// Delete the session behind a token. Returns whether one existed.
    pub fn logout(&self, token: &str) -> bool {
        self.sessions.delete(token)
    }

    /// The session store (for `/internal/auth/me` lookups).
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// The credential store.
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
