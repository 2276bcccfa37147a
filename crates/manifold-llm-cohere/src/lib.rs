//! # manifold-llm-cohere
//!
//! Cohere chat adapter implementing [`ChatAdapter`](manifold_llm::ChatAdapter).
//!
//! Targets the v1 `/v1/chat` endpoint (one last-user `message` plus
//! `chat_history`; system messages coalesce into `preamble`). The endpoint
//! path is configurable for deployments pinned to a different chat surface.
//! Stream events are line-delimited JSON, not SSE: `text-generation` events
//! carry content, `stream-end` is terminal.

#![deny(unsafe_code)]

pub mod adapter;
pub mod types;

pub use adapter::CohereAdapter;
