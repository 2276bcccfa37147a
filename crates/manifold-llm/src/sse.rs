//! # Stream frame parsers
//!
//! Shared parsers for the two streaming wire formats backends use:
//!
//! - **SSE** ([`sse_data_lines`]): byte stream → `data:` payload strings.
//!   Comments, empty lines, and non-`data` fields are skipped; `data: [DONE]`
//!   terminates the stream.
//! - **Line-delimited JSON** ([`json_lines`]): byte stream → one payload per
//!   newline-terminated line (Cohere's native stream events).
//!
//! A single malformed frame must never kill a stream: [`decode_frame`] logs
//! and drops undecodable payloads.

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio_stream::StreamExt;
use tracing::warn;

/// Split a byte line out of the buffer, trimming the trailing `\n` / `\r\n`.
fn take_line(buffer: &mut BytesMut) -> Option<BytesMut> {
    let newline = buffer.iter().position(|&b| b == b'\n')?;
    let mut line = buffer.split_to(newline + 1);
    line.truncate(line.len() - 1);
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
    Some(line)
}

/// Extract the payload of an SSE `data:` line.
///
/// Returns `None` for comments, blank lines, other SSE fields, empty
/// payloads, and the `[DONE]` marker.
fn sse_payload(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let payload = line
        .strip_prefix("data: ")
        .or_else(|| line.strip_prefix("data:"))?
        .trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    Some(payload)
}

/// Parse an SSE byte stream into `data:` payload strings.
///
/// The stream ends at EOF or at the first `data: [DONE]` marker. Any
/// trailing, newline-less buffer content is processed as a final line
/// (some backends omit the last newline).
pub fn sse_data_lines<S>(byte_stream: S) -> impl Stream<Item = String> + Send
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    async_stream::stream! {
        let mut byte_stream = byte_stream;
        let mut buffer = BytesMut::with_capacity(8 * 1024);

        'read: loop {
            while let Some(line) = take_line(&mut buffer) {
                let Ok(text) = std::str::from_utf8(&line) else {
                    continue; // skip invalid UTF-8 lines
                };
                if text.trim() == "data: [DONE]" || text.trim() == "data:[DONE]" {
                    break 'read;
                }
                if let Some(payload) = sse_payload(text) {
                    yield payload.to_string();
                }
            }

            match byte_stream.next().await {
                Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    warn!("SSE stream read error: {e}");
                    break;
                }
                None => {
                    // EOF — flush any trailing partial line.
                    if !buffer.is_empty() {
                        if let Ok(text) = std::str::from_utf8(&buffer) {
                            if let Some(payload) = sse_payload(text) {
                                yield payload.to_string();
                            }
                        }
                    }
                    break;
                }
            }
        }
    }
}

/// Parse a line-delimited JSON byte stream into payload strings.
///
/// Blank lines are skipped. Used by backends whose native stream events are
/// one JSON document per line rather than SSE frames.
pub fn json_lines<S>(byte_stream: S) -> impl Stream<Item = String> + Send
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    async_stream::stream! {
        let mut byte_stream = byte_stream;
        let mut buffer = BytesMut::with_capacity(8 * 1024);

        loop {
            while let Some(line) = take_line(&mut buffer) {
                let Ok(text) = std::str::from_utf8(&line) else {
                    continue;
                };
                let text = text.trim();
                if !text.is_empty() {
                    yield text.to_string();
                }
            }

            match byte_stream.next().await {
                Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    warn!("line stream read error: {e}");
                    break;
                }
                None => {
                    if !buffer.is_empty() {
                        if let Ok(text) = std::str::from_utf8(&buffer) {
                            let text = text.trim();
                            if !text.is_empty() {
                                yield text.to_string();
                            }
                        }
                    }
                    break;
                }
            }
        }
    }
}

/// Decode one stream frame, dropping malformed JSON with a warning.
pub fn decode_frame<T: serde::de::DeserializeOwned>(payload: &str, provider: &str) -> Option<T> {
    match serde_json::from_str(payload) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(provider, error = %e, "dropping malformed stream frame");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
