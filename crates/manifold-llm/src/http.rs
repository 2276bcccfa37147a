//! # Shared HTTP policy
//!
//! Every adapter issues requests through [`send_json`], which applies the
//! gateway's retry policy:
//!
//! - per-call timeout (default 30 s)
//! - HTTP 429: honor `Retry-After` (seconds), sleep, retry up to `max_retries`
//! - network errors: exponential backoff (2^attempt seconds), up to `max_retries`
//! - HTTP 401 → [`AdapterError::Auth`]; other non-success statuses are decoded
//!   through [`parse_api_error`] into [`AdapterError::Api`]

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapter::{AdapterError, AdapterResult};

/// Retry and timeout policy for adapter HTTP calls.
#[derive(Clone, Debug)]
pub struct HttpPolicy {
    /// Per-call timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for 429s and network errors.
    pub max_retries: u32,
}

impl Default for HttpPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// Sleep duration before retrying a 429, from the `Retry-After` header.
///
/// Falls back to exponential backoff when the header is absent or unparsable.
fn retry_after_secs(response: &Response, attempt: u32) -> u64 {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or_else(|| 2u64.saturating_pow(attempt))
}

/// POST a JSON body with the shared retry policy applied.
///
/// Returns the successful [`Response`] ready for body/stream consumption.
pub async fn send_json(
    client: &Client,
    url: &str,
    headers: HeaderMap,
    body: &Value,
    policy: &HttpPolicy,
) -> AdapterResult<Response> {
    let mut attempt = 0u32;

    loop {
        let result = client
            .post(url)
            .headers(headers.clone())
            .timeout(policy.timeout)
            .json(body)
            .send()
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) => {
                if e.is_timeout() {
                    return Err(AdapterError::Timeout { seconds: policy.timeout.as_secs() });
                }
                if attempt >= policy.max_retries {
                    return Err(AdapterError::Http(e));
                }
                let delay = 2u64.saturating_pow(attempt);
                warn!(attempt, delay_secs = delay, error = %e, "network error, backing off");
                tokio::time::sleep(Duration::from_secs(delay)).await;
                attempt += 1;
                continue;
            }
        };

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let delay = retry_after_secs(&response, attempt);
            if attempt >= policy.max_retries {
                let body_text = response.text().await.unwrap_or_default();
                let info = parse_api_error(&body_text, 429);
                return Err(AdapterError::RateLimited {
                    retry_after_secs: Some(delay),
                    message: info.message,
                });
            }
            debug!(attempt, delay_secs = delay, "429 from backend, sleeping");
            tokio::time::sleep(Duration::from_secs(delay)).await;
            attempt += 1;
            continue;
        }

        if status == StatusCode::UNAUTHORIZED {
            let body_text = response.text().await.unwrap_or_default();
            let info = parse_api_error(&body_text, 401);
            return Err(AdapterError::Auth { message: info.message });
        }

        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let info = parse_api_error(&body_text, status.as_u16());
            return Err(AdapterError::Api {
                status: status.as_u16(),
                message: info.message,
                code: info.code,
            });
        }

        return Ok(response);
    }
}

/// GET a URL with the per-call timeout (no retry loop; used for model
/// listings and key validation).
pub async fn get_json(
    client: &Client,
    url: &str,
    headers: HeaderMap,
    policy: &HttpPolicy,
) -> AdapterResult<Response> {
    let response = client
        .get(url)
        .headers(headers)
        .timeout(policy.timeout)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                AdapterError::Timeout { seconds: policy.timeout.as_secs() }
            } else {
                AdapterError::Http(e)
            }
        })?;
    Ok(response)
}

/// Structured error info decoded from a backend error body.
pub struct ApiErrorInfo {
    /// Human-readable message.
    pub message: String,
    /// Provider-specific code (e.g., `"overloaded_error"`, `"NOT_FOUND"`).
    pub code: Option<String>,
}

/// Decode a backend error body into [`ApiErrorInfo`].
///
/// Backends disagree on the envelope shape; the recognized forms are
/// `{"error":{"message","type"|"status"|"code"}}`, `{"detail": "..."}`,
/// `{"message","code"}`, and raw text.
pub fn parse_api_error(body: &str, status: u16) -> ApiErrorInfo {
    let fallback = || ApiErrorInfo {
        message: format!("HTTP {status}: {body}"),
        code: None,
    };

    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return fallback();
    };

    let nested = &json["error"];
    if let Some(message) = nested["message"].as_str() {
        let code = ["type", "status", "code"]
            .iter()
            .find_map(|k| nested[*k].as_str())
            .map(String::from);
        return ApiErrorInfo { message: message.to_string(), code };
    }

    if let Some(message) = json["detail"].as_str().or_else(|| json["message"].as_str()) {
        let code = json["code"]
            .as_str()
            .or_else(|| json["type"].as_str())
            .map(String::from);
        return ApiErrorInfo { message: message.to_string(), code };
    }

    fallback()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
