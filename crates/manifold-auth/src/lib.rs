//! # manifold-auth
//!
//! Authentication and authorization for the gateway:
//!
//! - [`credentials`] — admin password storage (salted SHA-256, JSON file)
//! - [`sessions`] — in-memory session tokens with a background sweeper
//! - [`keys`] — persistent hashed gateway keys with usage accounting
//! - [`principal`] — header → principal derivation, login/logout
//! - [`permissions`] — the route-permission table
//!
//! Plaintext keys and passwords are returned exactly once at creation and
//! never persisted or logged; stores keep salted/plain SHA-256 digests.

#![deny(unsafe_code)]

pub mod credentials;
pub mod errors;
pub mod keys;
pub mod permissions;
pub mod principal;
pub mod sessions;

pub use credentials::CredentialStore;
pub use errors::AuthError;
pub use keys::GatewayKeyStore;
pub use permissions::RouteTable;
pub use principal::{AuthMode, AuthRole, Authenticator, Principal};
pub use sessions::SessionStore;
