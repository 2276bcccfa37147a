//! # Gateway-key store
//!
//! Long-lived bearer credentials issued by the admin. Plaintext keys are
//! `gw-` plus 48 base62 CSPRNG characters, returned exactly once at creation
//! (and on regeneration); only the SHA-256 digest is persisted. Lookup on
//! the hot path is a hash-index read.
//!
//! Usage counters update best-effort: `verify` bumps them in memory and
//! schedules a fire-and-forget persist. Losing a count to a race is
//! acceptable; treating a disabled key as valid is not, so enable/expiry
//! checks read the authoritative in-memory state under the lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::errors::{AuthError, Result};

/// Plaintext key prefix.
const KEY_PREFIX: &str = "gw-";

/// Random portion length.
const KEY_RANDOM_LEN: usize = 48;

/// Base62 alphabet for key generation.
const KEY_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Persisted document version.
const STORE_VERSION: u32 = 1;

/// One stored gateway key (hash only, never plaintext).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayKey {
    /// Key id (UUID v7).
    pub id: String,
    /// Display name.
    pub name: String,
    /// First six and last four characters of the plaintext.
    pub prefix: String,
    /// Hex SHA-256 of the plaintext.
    pub key_hash: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last successful verification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    /// Expiry; `None` means non-expiring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Disabled keys never validate.
    pub enabled: bool,
    /// Granted scopes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    /// Per-key rate limit (requests per minute).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
    /// Successful verification count.
    pub usage_count: u64,
}

impl GatewayKey {
    /// Whether the key has passed its expiry.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|t| t <= Utc::now())
    }

    /// `enabled ∧ not expired`.
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.is_expired()
    }
}

/// The persisted document.
#[derive(Debug, Serialize, Deserialize)]
struct KeyFile {
    version: u32,
    keys: Vec<GatewayKey>,
}

/// Result of creating or regenerating a key — the only carriers of
/// plaintext.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedKey {
    /// Key id.
    pub id: String,
    /// The plaintext key. Shown once; never stored.
    pub key: String,
    /// Loggable prefix.
    pub prefix: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Outcome of a verification attempt.
#[derive(Clone, Debug)]
pub struct VerifyOutcome {
    /// Whether the key is valid.
    pub valid: bool,
    /// The matched key, when valid.
    pub key: Option<GatewayKey>,
    /// Rejection reason, when invalid.
    pub reason: Option<&'static str>,
}

impl VerifyOutcome {
    fn rejected(reason: &'static str) -> Self {
        Self { valid: false, key: None, reason: Some(reason) }
    }
}

/// Mutable fields accepted by [`GatewayKeyStore::update`].
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New scope list.
    pub scopes: Option<Vec<String>>,
    /// New rate limit.
    pub rate_limit: Option<u32>,
    /// New expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Aggregate statistics.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyStats {
    /// All keys.
    pub total: usize,
    /// Enabled and unexpired.
    pub active: usize,
    /// Disabled.
    pub disabled: usize,
    /// Past expiry.
    pub expired: usize,
    /// Sum of usage counters.
    pub total_usage: u64,
}

struct KeyState {
    keys: Vec<GatewayKey>,
    /// key-hash → key id.
    by_hash: HashMap<String, String>,
}

impl KeyState {
    fn rebuild_index(&mut self) {
        self.by_hash =
            self.keys.iter().map(|k| (k.key_hash.clone(), k.id.clone())).collect();
    }

    fn find(&self, id: &str) -> Option<usize> {
        self.keys.iter().position(|k| k.id == id)
    }
}

/// Persistent store of hashed gateway keys.
pub struct GatewayKeyStore {
    path: PathBuf,
    state: Arc<RwLock<KeyState>>,
}

/// Hex SHA-256 of a plaintext key.
pub fn hash_key(plaintext: &str) -> String {
    let digest = Sha256::digest(plaintext.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Loggable prefix: first six and last four characters.
fn key_display_prefix(plaintext: &str) -> String {
    format!("{}...{}", &plaintext[..6], &plaintext[plaintext.len() - 4..])
}

fn generate_plaintext() -> String {
    let mut rng = rand::rng();
    let random: String = (0..KEY_RANDOM_LEN)
        .map(|_| KEY_CHARSET[rng.random_range(0..KEY_CHARSET.len())] as char)
        .collect();
    format!("{KEY_PREFIX}{random}")
}

impl GatewayKeyStore {
    /// Open the store, loading the persisted document when present.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let keys = match std::fs::read_to_string(&path) {
            Ok(data) => {
                let file: KeyFile = serde_json::from_str(&data)?;
                if file.version != STORE_VERSION {
                    return Err(AuthError::UnsupportedVersion(file.version));
                }
                file.keys
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(AuthError::Io(e)),
        };

        let mut state = KeyState { keys, by_hash: HashMap::new() };
        state.rebuild_index();
        Ok(Self { path, state: Arc::new(RwLock::new(state)) })
    }

    /// Create a new key. The returned [`CreatedKey`] is the only carrier of
    /// the plaintext.
    pub fn create(
        &self,
        name: &str,
        scopes: Option<Vec<String>>,
        rate_limit: Option<u32>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<CreatedKey> {
        let plaintext = generate_plaintext();
        let key = GatewayKey {
            id: manifold_core::ids::new_v7(),
            name: name.to_string(),
            prefix: key_display_prefix(&plaintext),
            key_hash: hash_key(&plaintext),
            created_at: Utc::now(),
            last_used_at: None,
            expires_at,
            enabled: true,
            scopes,
            rate_limit,
            usage_count: 0,
        };

        let created = CreatedKey {
            id: key.id.clone(),
            key: plaintext,
            prefix: key.prefix.clone(),
            created_at: key.created_at,
            expires_at: key.expires_at,
        };

        {
            let mut state = self.state.write();
            let _ = state.by_hash.insert(key.key_hash.clone(), key.id.clone());
            state.keys.push(key);
        }
        self.persist()?;
        tracing::info!(prefix = %created.prefix, "gateway key created");
        Ok(created)
    }

    /// Verify a plaintext key.
    ///
    /// On success, bumps `usage_count` / `last_used_at` in memory and
    /// schedules asynchronous persistence.
    pub fn verify(&self, plaintext: &str) -> VerifyOutcome {
        let hash = hash_key(plaintext);

        let outcome = {
            let mut state = self.state.write();
            let Some(id) = state.by_hash.get(&hash).cloned() else {
                return VerifyOutcome::rejected("unknown key");
            };
            let Some(index) = state.find(&id) else {
                return VerifyOutcome::rejected("unknown key");
            };
            let key = &mut state.keys[index];
            if !key.enabled {
                return VerifyOutcome::rejected("key disabled");
            }
            if key.is_expired() {
                return VerifyOutcome::rejected("key expired");
            }
            key.usage_count += 1;
            key.last_used_at = Some(Utc::now());
            VerifyOutcome { valid: true, key: Some(key.clone()), reason: None }
        };

        self.persist_async();
        outcome
    }

    /// All keys.
    pub fn list(&self) -> Vec<GatewayKey> {
        self.state.read().keys.clone()
    }

    /// Enabled, unexpired keys.
    pub fn list_active(&self) -> Vec<GatewayKey> {
        self.state.read().keys.iter().filter(|k| k.is_usable()).cloned().collect()
    }

    /// Fetch one key by id.
    pub fn get(&self, id: &str) -> Option<GatewayKey> {
        let state = self.state.read();
        state.find(id).map(|i| state.keys[i].clone())
    }

    /// Enable or disable a key.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<GatewayKey> {
        let updated = {
            let mut state = self.state.write();
            let index = state.find(id).ok_or_else(|| AuthError::KeyNotFound(id.to_string()))?;
            state.keys[index].enabled = enabled;
            state.keys[index].clone()
        };
        self.persist()?;
        Ok(updated)
    }

    /// Remove a key entirely. Its hash-index entry is dropped, so the
    /// plaintext stops validating immediately.
    pub fn revoke(&self, id: &str) -> Result<()> {
        {
            let mut state = self.state.write();
            let index = state.find(id).ok_or_else(|| AuthError::KeyNotFound(id.to_string()))?;
            let removed = state.keys.remove(index);
            let _ = state.by_hash.remove(&removed.key_hash);
        }
        self.persist()?;
        Ok(())
    }

    /// Update mutable key metadata.
    pub fn update(&self, id: &str, update: KeyUpdate) -> Result<GatewayKey> {
        let updated = {
            let mut state = self.state.write();
            let index = state.find(id).ok_or_else(|| AuthError::KeyNotFound(id.to_string()))?;
            let key = &mut state.keys[index];
            if let Some(name) = update.name {
                key.name = name;
            }
            if let Some(scopes) = update.scopes {
                key.scopes = Some(scopes);
            }
            if let Some(rate_limit) = update.rate_limit {
                key.rate_limit = Some(rate_limit);
            }
            if let Some(expires_at) = update.expires_at {
                key.expires_at = Some(expires_at);
            }
            key.clone()
        };
        self.persist()?;
        Ok(updated)
    }

    /// Rotate a key in place: new plaintext, new hash, counters reset. The
    /// old plaintext stops validating immediately.
    pub fn regenerate(&self, id: &str) -> Result<CreatedKey> {
        let plaintext = generate_plaintext();
        let created = {
            let mut state = self.state.write();
            let index = state.find(id).ok_or_else(|| AuthError::KeyNotFound(id.to_string()))?;

            let old_hash = state.keys[index].key_hash.clone();
            let _ = state.by_hash.remove(&old_hash);

            let key = &mut state.keys[index];
            key.key_hash = hash_key(&plaintext);
            key.prefix = key_display_prefix(&plaintext);
            key.usage_count = 0;
            key.last_used_at = None;

            let created = CreatedKey {
                id: key.id.clone(),
                key: plaintext,
                prefix: key.prefix.clone(),
                created_at: key.created_at,
                expires_at: key.expires_at,
            };
            let hash = key.key_hash.clone();
            let key_id = key.id.clone();
            let _ = state.by_hash.insert(hash, key_id);
            created
        };
        self.persist()?;
        tracing::info!(prefix = %created.prefix, "gateway key regenerated");
        Ok(created)
    }

    /// Aggregate statistics.
    pub fn stats(&self) -> KeyStats {
        let state = self.state.read();
        let total = state.keys.len();
        let disabled = state.keys.iter().filter(|k| !k.enabled).count();
        let expired = state.keys.iter().filter(|k| k.is_expired()).count();
        let active = state.keys.iter().filter(|k| k.is_usable()).count();
        let total_usage = state.keys.iter().map(|k| k.usage_count).sum();
        KeyStats { total, active, disabled, expired, total_usage }
    }

    /// Synchronous whole-file rewrite.
    fn persist(&self) -> Result<()> {
        let snapshot = { self.state.read().keys.clone() };
        write_keys(&self.path, snapshot)
    }

    /// Fire-and-forget persistence for hot-path counter updates. Errors are
    /// logged, never surfaced.
    fn persist_async(&self) {
        let snapshot = { self.state.read().keys.clone() };
        let path = self.path.clone();
        if tokio::runtime::Handle::try_current().is_ok() {
            let _ = tokio::task::spawn_blocking(move || {
                if let Err(e) = write_keys(&path, snapshot) {
                    warn!("gateway key usage persist failed: {e}");
                }
            });
        } else if let Err(e) = write_keys(&path, snapshot) {
            warn!("gateway key usage persist failed: {e}");
        }
    }
}

fn write_keys(path: &Path, keys: Vec<GatewayKey>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = KeyFile { version: STORE_VERSION, keys };
    std::fs::write(path, serde_json::to_string_pretty(&file)?)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        let _ = std::fs::set_permissions(path, perms);
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
