//! # manifold-llm
//!
//! Provider adapter abstraction and shared plumbing:
//! - The [`ChatAdapter`] trait every backend implements
//! - Shared HTTP request policy (timeouts, 429 `Retry-After`, backoff)
//! - Shared SSE / line-delimited-JSON stream parsers
//! - The OpenAI-compatible adapter family and the Azure variant
//! - The adapter registry and model router

#![deny(unsafe_code)]

pub mod adapter;
pub mod azure;
pub mod compat;
pub mod http;
pub mod registry;
pub mod sse;

pub use adapter::{AdapterError, AdapterResult, ChatAdapter, ChunkStream};
pub use compat::{CompatProfile, OpenAiCompatAdapter};
pub use http::HttpPolicy;
pub use registry::AdapterRegistry;
