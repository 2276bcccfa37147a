//! # manifold-server
//!
//! The HTTP surface of the gateway:
//!
//! - [`config`] — JSON config with `env:VAR` substitution
//! - [`wiring`] — config → adapter registry construction
//! - [`server`] — axum router, auth middleware, CORS, listen/shutdown
//! - [`routes`] — OpenAI-compatible external routes plus the internal
//!   admin surface
//! - [`error`] — the wire error envelope as an axum response
//! - [`stats`] — request counters behind `/health`
//! - [`shutdown`] — graceful-drain coordination

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod stats;
pub mod wiring;

pub use config::GatewayConfig;
pub use server::GatewayServer;
