//! # Gateway error taxonomy
//!
//! One error enum spans the whole request pipeline. Each kind maps to an
//! HTTP status and a wire `type` string for the OpenAI-style error envelope
//! `{"error": {"message", "type", "code"}}`.
//!
//! Plaintext credentials never appear in error messages; callers attach key
//! prefixes at most.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors surfaced by the gateway pipeline.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GatewayError {
    /// Bad credentials, invalid or disabled gateway key.
    #[error("{message}")]
    Authentication {
        /// Error description.
        message: String,
    },

    /// Authenticated but the role lacks access.
    #[error("{message}")]
    PermissionDenied {
        /// Error description.
        message: String,
    },

    /// Request body or parameter validation failed.
    #[error("{message}")]
    InvalidRequest {
        /// Error description.
        message: String,
    },

    /// Unknown route, resource, or model.
    #[error("{message}")]
    NotFound {
        /// Error description.
        message: String,
    },

    /// Provider 429 after retries, or queue at capacity.
    #[error("{message}")]
    RateLimit {
        /// Error description.
        message: String,
        /// Suggested retry delay in seconds, when the provider supplied one.
        retry_after: Option<u64>,
    },

    /// Transport failure before a response was received.
    #[error("{message}")]
    Network {
        /// Error description.
        message: String,
    },

    /// Per-call or queue timeout.
    #[error("{message}")]
    Timeout {
        /// Error description.
        message: String,
    },

    /// Provider returned a non-retryable 4xx/5xx.
    #[error("{message}")]
    Upstream {
        /// Upstream HTTP status.
        status: u16,
        /// Error description.
        message: String,
        /// Provider-specific error code.
        code: Option<String>,
    },

    /// Unexpected internal failure.
    #[error("{message}")]
    Internal {
        /// Error description.
        message: String,
    },
}

impl GatewayError {
    /// Build an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication { message: message.into() }
    }

    /// Build a permission-denied error.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied { message: message.into() }
    }

    /// Build an invalid-request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest { message: message.into() }
    }

    /// Build a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    /// Build a rate-limit error.
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self::RateLimit { message: message.into(), retry_after }
    }

    /// Build a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout { message: message.into() }
    }

    /// Build an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// HTTP status this error surfaces as.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Authentication { .. } => 401,
            Self::PermissionDenied { .. } => 403,
            Self::InvalidRequest { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::RateLimit { .. } => 429,
            Self::Network { .. } => 502,
            Self::Timeout { .. } => 504,
            Self::Upstream { status, .. } => {
                // 4xx statuses from the backend pass through; everything
                // else surfaces as a bad gateway.
                if (400..500).contains(status) { *status } else { 502 }
            }
            Self::Internal { .. } => 500,
        }
    }

    /// Wire `type` string for the error envelope.
    pub fn wire_type(&self) -> &'static str {
        match self {
            Self::Authentication { .. } => "authentication_error",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::InvalidRequest { .. } => "invalid_request_error",
            Self::NotFound { .. } => "not_found_error",
            Self::RateLimit { .. } => "rate_limit_error",
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::Upstream { .. }
            | Self::Internal { .. } => "api_error",
        }
    }

    /// Provider-specific code, when present.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Upstream { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Render the OpenAI-style error envelope.
    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorBody {
                message: self.to_string(),
                error_type: self.wire_type().to_string(),
                code: self.code().map(String::from),
            },
        }
    }
}

/// Wire-format error envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error body.
    pub error: ErrorBody,
}

/// Error body inside the envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub message: String,
    /// Error kind string.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Provider-specific code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
