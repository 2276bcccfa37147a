//! Auth store error types.

use thiserror::Error;

/// Errors from the credential, session, and key stores.
#[derive(Debug, Error)]
pub enum AuthError {
    /// File read/write failed.
    #[error("auth storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Persisted JSON was malformed.
    #[error("auth storage parse error: {0}")]
    Json(#[from] serde_json::Error),
    /// Username or password did not match.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// No key with the given id.
    #[error("gateway key not found: {0}")]
    KeyNotFound(String),
    /// Persisted document carries an unsupported version.
    #[error("unsupported storage version: {0}")]
    UnsupportedVersion(u32),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
