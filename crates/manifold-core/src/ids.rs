//! ID generation helpers.
//!
//! Completion, record, and key IDs are UUID v7 (time-ordered) so stored
//! records sort chronologically by ID.

use uuid::Uuid;

/// Generate a new UUID v7 string (time-ordered).
pub fn new_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Generate a completion ID in the OpenAI wire format (`chatcmpl-…`).
pub fn completion_id() -> String {
    format!("chatcmpl-{}", Uuid::now_v7().simple())
}

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Current unix time in milliseconds.
pub fn unix_now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
