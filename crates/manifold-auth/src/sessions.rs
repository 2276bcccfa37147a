//! # Session store
//!
//! In-memory map of opaque session tokens to `(role, expiry)`. Tokens carry
//! 256 bits of CSPRNG entropy. A background sweeper deletes expired entries
//! every 60 seconds; its lifecycle is bound to a `CancellationToken`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::RngCore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::principal::AuthRole;

/// Sweep interval.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Default session lifetime: 24 hours.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// One login session.
#[derive(Clone, Debug)]
pub struct Session {
    /// Opaque token (32 random bytes, hex).
    pub id: String,
    /// The user this session belongs to.
    pub user_id: String,
    /// Granted role.
    pub role: AuthRole,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Generate a fresh opaque session id (32 random bytes, hex-encoded).
fn new_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Concurrent in-memory session store.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    timeout: Duration,
}

impl SessionStore {
    /// Create a store with the given session lifetime.
    pub fn new(timeout: Duration) -> Self {
        Self { sessions: DashMap::new(), timeout }
    }

    /// Create a session for a user. Returns the full session including the
    /// freshly generated token.
    pub fn create(&self, user_id: &str, role: AuthRole) -> Session {
        let now = Utc::now();
        let session = Session {
            id: new_session_id(),
            user_id: user_id.to_string(),
            role,
            created_at: now,
            expires_at: now
                + chrono::Duration::from_std(self.timeout).unwrap_or(chrono::Duration::hours(24)),
        };
        let _ = self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    /// Validate a token. Expired entries are removed on the spot.
    pub fn validate(&self, id: &str) -> Option<Session> {
        let session = self.sessions.get(id)?.clone();
        if session.is_expired() {
            let _ = self.sessions.remove(id);
            return None;
        }
        Some(session)
    }

    /// Extend a session's expiry by the configured timeout.
    pub fn refresh(&self, id: &str) -> bool {
        let Some(mut entry) = self.sessions.get_mut(id) else {
            return false;
        };
        if entry.is_expired() {
            return false;
        }
        entry.expires_at = Utc::now()
            + chrono::Duration::from_std(self.timeout).unwrap_or(chrono::Duration::hours(24));
        true
    }

    /// Delete a session (logout). Returns whether it existed.
    pub fn delete(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Remove all expired sessions, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired());
        before - self.sessions.len()
    }

    /// Number of live (possibly expired, not yet swept) sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Spawn the background sweeper. Runs until the token is cancelled.
    pub fn start_sweeper(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let swept = store.sweep();
                        if swept > 0 {
                            debug!(swept, "expired sessions removed");
                        }
                    }
                    () = cancel.cancelled() => break,
                }
            }
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(Duration::from_secs(3600))
    }

    #[test]
    fn create_and_validate() {
        let s = store();
        let session = s.create("admin", AuthRole::Admin);
        assert_eq!(session.id.len(), 64); // 32 bytes hex
        let found = s.validate(&session.id).unwrap();
        assert_eq!(found.user_id, "admin");
        assert_eq!(found.role, AuthRole::Admin);
    }

    #[test]
    fn ids_are_unique_and_opaque() {
        let s = store();
        let a = s.create("u", AuthRole::Admin);
        let b = s.create("u", AuthRole::Admin);
        assert_ne!(a.id, b.id);
        assert!(a.id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn unknown_id_invalid() {
        let s = store();
        let _ = s.create("u", AuthRole::Admin);
        assert!(s.validate("deadbeef").is_none());
    }

    #[test]
    fn expired_session_invalid_and_removed() {
        let s = SessionStore::new(Duration::from_secs(0));
        let session = s.create("u", AuthRole::Admin);
        assert!(s.validate(&session.id).is_none());
        assert_eq!(s.len(), 0); // removed on validate
    }

    #[test]
    fn refresh_extends_expiry() {
        let s = store();
        let session = s.create("u", AuthRole::Admin);
        let before = s.validate(&session.id).unwrap().expires_at;
        std::thread::sleep(Duration::from_millis(5));
        assert!(s.refresh(&session.id));
        let after = s.validate(&session.id).unwrap().expires_at;
        assert!(after >= before);
    }

    #[test]
    fn refresh_unknown_is_false() {
        assert!(!store().refresh("nope"));
    }

    #[test]
    fn delete_removes() {
        let s = store();
        let session = s.create("u", AuthRole::Admin);
        assert!(s.delete(&session.id));
        assert!(!s.delete(&session.id));
        assert!(s.validate(&session.id).is_none());
    }

    #[test]
    fn sweep_removes_only_expired() {
        let short = SessionStore::new(Duration::from_secs(0));
        let _ = short.create("a", AuthRole::Admin);
        let _ = short.create("b", AuthRole::Anonymous);
        assert_eq!(short.sweep(), 2);
        assert!(short.is_empty());

        let long = store();
        let _ = long.create("c", AuthRole::Admin);
        assert_eq!(long.sweep(), 0);
        assert_eq!(long.len(), 1);
    }

    #[tokio::test]
    async fn sweeper_lifecycle() {
        let s = Arc::new(SessionStore::new(Duration::from_secs(0)));
        let cancel = CancellationToken::new();
        let handle = s.start_sweeper(cancel.clone());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("sweeper should stop on cancel")
            .unwrap();
    }
}
