//! # Admin credential store
//!
//! A singleton `{username, passwordHash, salt, createdAt, updatedAt}` JSON
//! document. On first start the store generates a 16-character password and
//! a 32-character salt, persists `SHA-256(password ‖ salt)`, and returns the
//! plaintext exactly once. The file is written with 0600 permissions and
//! writes are serialized behind a mutex.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{AuthError, Result};

/// Characters used for generated passwords.
const PASSWORD_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";

/// Characters used for generated salts.
const SALT_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generated password length.
const PASSWORD_LEN: usize = 16;

/// Generated salt length.
const SALT_LEN: usize = 32;

/// The persisted credential document.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCredentials {
    /// Admin username (always `"admin"` on auto-init).
    pub username: String,
    /// Hex SHA-256 over `password ‖ salt`.
    pub password_hash: String,
    /// Hashing salt.
    pub salt: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last update timestamp (RFC 3339).
    pub updated_at: String,
}

/// Hex SHA-256 over `password ‖ salt`.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn random_string(charset: &[u8], len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| charset[rng.random_range(0..charset.len())] as char)
        .collect()
}

/// Store for the singleton admin credential document.
pub struct CredentialStore {
    path: PathBuf,
    state: Mutex<Option<AdminCredentials>>,
}

impl CredentialStore {
    /// Open the store at the given path without touching the filesystem.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), state: Mutex::new(None) }
    }

    /// Load existing credentials or create them.
    ///
    /// Returns `Some(plaintext)` exactly once, when the file was absent and
    /// a password was generated. Returns `None` when credentials already
    /// exist.
    pub fn initialize(&self) -> Result<Option<String>> {
        let mut state = self.state.lock();

        if let Some(existing) = load_file(&self.path)? {
            *state = Some(existing);
            return Ok(None);
        }

        let password = random_string(PASSWORD_CHARSET, PASSWORD_LEN);
        let salt = random_string(SALT_CHARSET, SALT_LEN);
        let now = chrono::Utc::now().to_rfc3339();
        let credentials = AdminCredentials {
            username: "admin".to_string(),
            password_hash: hash_password(&password, &salt),
            salt,
            created_at: now.clone(),
            updated_at: now,
        };
        write_file(&self.path, &credentials)?;
        *state = Some(credentials);
        tracing::info!("admin credentials initialized");
        Ok(Some(password))
    }

    /// Check a username/password pair.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let state = self.state.lock();
        let Some(credentials) = state.as_ref() else {
            return false;
        };
        credentials.username == username
            && credentials.password_hash == hash_password(password, &credentials.salt)
    }

    /// Change the admin password after verifying the current one.
    ///
    /// Re-salts and rehashes before rewriting the file.
    pub fn change_password(&self, current: &str, new_password: &str) -> Result<()> {
        let mut state = self.state.lock();
        let Some(credentials) = state.as_mut() else {
            return Err(AuthError::InvalidCredentials);
        };
        if credentials.password_hash != hash_password(current, &credentials.salt) {
            return Err(AuthError::InvalidCredentials);
        }

        credentials.salt = random_string(SALT_CHARSET, SALT_LEN);
        credentials.password_hash = hash_password(new_password, &credentials.salt);
        credentials.updated_at = chrono::Utc::now().to_rfc3339();
        write_file(&self.path, credentials)?;
        tracing::info!("admin password changed");
        Ok(())
    }

    /// The configured admin username, when initialized.
    pub fn username(&self) -> Option<String> {
        self.state.lock().as_ref().map(|c| c.username.clone())
    }
}

fn load_file(path: &Path) -> Result<Option<AdminCredentials>> {
    match std::fs::read_to_string(path) {
        Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AuthError::Io(e)),
    }
}

fn write_file(path: &Path, credentials: &AdminCredentials) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(credentials)?)?;

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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> CredentialStore {
        CredentialStore::new(dir.path().join("credentials.json"))
    }

    #[test]
    fn initialize_generates_password_once() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);

        let password = s.initialize().unwrap().expect("first init returns plaintext");
        assert_eq!(password.len(), 16);
        assert!(password.bytes().all(|b| PASSWORD_CHARSET.contains(&b)));

        // Second initialize (fresh store over the same file) returns None.
        let s2 = store(&dir);
        assert!(s2.initialize().unwrap().is_none());
    }

    #[test]
    fn verify_generated_password() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let password = s.initialize().unwrap().unwrap();

        assert!(s.verify("admin", &password));
        assert!(!s.verify("admin", "wrongpassword"));
        assert!(!s.verify("root", &password));
    }

    #[test]
    fn verify_before_initialize_is_false() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        assert!(!s.verify("admin", "anything"));
    }

    #[test]
    fn plaintext_never_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        let s = CredentialStore::new(&path);
        let password = s.initialize().unwrap().unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains(&password));
        assert!(raw.contains("passwordHash"));
        assert!(raw.contains("salt"));
    }

    #[test]
    fn change_password_rotates_salt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        let s = CredentialStore::new(&path);
        let old = s.initialize().unwrap().unwrap();

        s.change_password(&old, "new-password-123").unwrap();
        assert!(!s.verify("admin", &old));
        assert!(s.verify("admin", "new-password-123"));

        // Survives reload.
        let s2 = CredentialStore::new(&path);
        assert!(s2.initialize().unwrap().is_none());
        assert!(s2.verify("admin", "new-password-123"));
    }

    #[test]
    fn change_password_rejects_wrong_current() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let _ = s.initialize().unwrap();
        assert!(matches!(
            s.change_password("nope", "new"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn hash_is_salted() {
        assert_ne!(hash_password("pw", "salt-a"), hash_password("pw", "salt-b"));
        assert_eq!(hash_password("pw", "s"), hash_password("pw", "s"));
    }

    #[cfg(unix)]
    #[test]
    fn file_permissions_0600() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        let s = CredentialStore::new(&path);
        let _ = s.initialize().unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
