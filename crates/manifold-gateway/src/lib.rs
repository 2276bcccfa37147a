//! # manifold-gateway
//!
//! The server-side request pipeline between the HTTP surface and the
//! provider adapters:
//!
//! - [`queue`] — bounded-concurrency per-provider work queues with sliding-
//!   window rate limiting, priority ordering, timeouts, and cancellation
//! - [`limits`] — preset rate windows and concurrency caps per provider
//! - [`cache`] — content-addressed response cache with TTL and size-bounded
//!   eviction
//! - [`cost`] — token-priced usage records with budget thresholds
//! - [`pipeline`] — the orchestrator binding adapters, queues, cache, and
//!   cost tracking together per request

#![deny(unsafe_code)]

pub mod cache;
pub mod cost;
pub mod limits;
pub mod pipeline;
pub mod queue;

pub use cache::{CacheConfig, ResponseCache};
pub use cost::{CostConfig, CostTracker};
pub use pipeline::Gateway;
pub use queue::{ProviderQueue, QueueConfig};
