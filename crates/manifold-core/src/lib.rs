//! # manifold-core
//!
//! Canonical types shared across the gateway:
//! - OpenAI-compatible chat request/response/stream-chunk types
//! - The gateway error taxonomy and its HTTP/wire mapping
//! - ID generation for completions, requests, and sessions

#![deny(unsafe_code)]

pub mod error;
pub mod ids;
pub mod messages;

pub use error::{GatewayError, GatewayResult};
pub use messages::{
    Capability, ChatMessage, ChatRequest, ChatResponse, Choice, ChunkChoice, ContentPart, Delta,
    FinishReason, MessageContent, ModelInfo, Role, StreamChunk, Usage,
};
