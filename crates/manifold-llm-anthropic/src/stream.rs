//! # SSE event state machine
//!
//! Folds Anthropic stream events into canonical chunks:
//!
//! - `message_start` seeds the chunk id and model
//! - `content_block_delta` of type `text_delta` yields content chunks
//! - `message_delta` records the stop reason
//! - `message_stop` yields the terminal chunk

use manifold_core::{FinishReason, StreamChunk};

use crate::convert::map_stop_reason;
use crate::types::{AnthropicStreamEvent, BlockDelta};

/// Mutable state carried across stream events.
pub struct StreamState {
    /// Chunk id, seeded by `message_start`.
    pub id: String,
    /// Serving model, seeded by `message_start`.
    pub model: String,
    /// Creation timestamp stamped on every chunk.
    pub created: i64,
    /// Stop reason recorded from `message_delta`.
    pub stop_reason: Option<String>,
    /// Set once the terminal chunk is emitted.
    pub finished: bool,
}

impl StreamState {
    /// Initial state; `id` and `model` are fallbacks until `message_start`
    /// arrives.
    pub fn new(fallback_id: &str, fallback_model: &str, created: i64) -> Self {
        Self {
            id: fallback_id.to_string(),
            model: fallback_model.to_string(),
            created,
            stop_reason: None,
            finished: false,
        }
    }
}

/// Fold one event into zero or more canonical chunks.
pub fn process_event(event: &AnthropicStreamEvent, state: &mut StreamState) -> Vec<StreamChunk> {
    if state.finished {
        return vec![];
    }

    match event {
        AnthropicStreamEvent::MessageStart { message } => {
            state.id = message.id.clone();
            state.model = message.model.clone();
            vec![]
        }
        AnthropicStreamEvent::ContentBlockDelta { delta, .. } => match delta {
            BlockDelta::TextDelta { text } if !text.is_empty() => {
                vec![StreamChunk::content(&state.id, state.created, &state.model, text.clone())]
            }
            _ => vec![],
        },
        AnthropicStreamEvent::MessageDelta { delta } => {
            if delta.stop_reason.is_some() {
                state.stop_reason.clone_from(&delta.stop_reason);
            }
            vec![]
        }
        AnthropicStreamEvent::MessageStop => {
            state.finished = true;
            let reason =
                map_stop_reason(state.stop_reason.as_deref()).unwrap_or(FinishReason::Stop);
            vec![StreamChunk::terminal(&state.id, state.created, &state.model, reason)]
        }
        AnthropicStreamEvent::ContentBlockStart { .. }
        | AnthropicStreamEvent::ContentBlockStop { .. }
        | AnthropicStreamEvent::Ping
        | AnthropicStreamEvent::Other => vec![],
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageDelta, MessageStart};

    fn state() -> StreamState {
        StreamState::new("chatcmpl-fallback", "model-fallback", 7)
    }

    fn start_event() -> AnthropicStreamEvent {
        AnthropicStreamEvent::MessageStart {
            message: MessageStart {
                id: "msg_abc".into(),
                model: "claude-sonnet-4-5".into(),
                usage: crate::types::AnthropicUsage::default(),
            },
        }
    }

    fn text_event(text: &str) -> AnthropicStreamEvent {
        AnthropicStreamEvent::ContentBlockDelta {
            index: 0,
            delta: BlockDelta::TextDelta { text: text.into() },
        }
    }

    #[test]
    fn message_start_seeds_identity() {
        let mut s = state();
        let out = process_event(&start_event(), &mut s);
        assert!(out.is_empty());
        assert_eq!(s.id, "msg_abc");
        assert_eq!(s.model, "claude-sonnet-4-5");
    }

    #[test]
    fn text_deltas_become_content_chunks() {
        let mut s = state();
        let _ = process_event(&start_event(), &mut s);
        let out = process_event(&text_event("Hel"), &mut s);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content_delta(), Some("Hel"));
        assert_eq!(out[0].id, "msg_abc");
        assert_eq!(out[0].created, 7);
    }

    #[test]
    fn empty_text_delta_skipped() {
        let mut s = state();
        assert!(process_event(&text_event(""), &mut s).is_empty());
    }

    #[test]
    fn message_stop_emits_terminal_stop() {
        let mut s = state();
        let out = process_event(&AnthropicStreamEvent::MessageStop, &mut s);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_terminal());
        assert_eq!(out[0].choices[0].finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn message_delta_stop_reason_carried_to_terminal() {
        let mut s = state();
        let _ = process_event(
            &AnthropicStreamEvent::MessageDelta {
                delta: MessageDelta { stop_reason: Some("max_tokens".into()) },
            },
            &mut s,
        );
        let out = process_event(&AnthropicStreamEvent::MessageStop, &mut s);
        assert_eq!(out[0].choices[0].finish_reason, Some(FinishReason::Length));
    }

    #[test]
    fn events_after_stop_ignored() {
        let mut s = state();
        let _ = process_event(&AnthropicStreamEvent::MessageStop, &mut s);
        assert!(process_event(&text_event("late"), &mut s).is_empty());
    }

    #[test]
    fn ping_and_unknown_ignored() {
        let mut s = state();
        assert!(process_event(&AnthropicStreamEvent::Ping, &mut s).is_empty());
        assert!(process_event(&AnthropicStreamEvent::Other, &mut s).is_empty());
    }

    #[test]
    fn full_sequence_concatenates() {
        let mut s = state();
        let mut chunks = Vec::new();
        chunks.extend(process_event(&start_event(), &mut s));
        chunks.extend(process_event(&text_event("Hello "), &mut s));
        chunks.extend(process_event(&text_event("world"), &mut s));
        chunks.extend(process_event(
            &AnthropicStreamEvent::MessageDelta {
                delta: MessageDelta { stop_reason: Some("end_turn".into()) },
            },
            &mut s,
        ));
        chunks.extend(process_event(&AnthropicStreamEvent::MessageStop, &mut s));

        let text: String = chunks.iter().filter_map(StreamChunk::content_delta).collect();
        assert_eq!(text, "Hello world");
        assert!(chunks.last().unwrap().is_terminal());
        assert!(chunks.iter().all(|c| c.id == "msg_abc"));
    }
}
