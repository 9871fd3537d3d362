//! Server-sent event decoding for chat-completion streams
//!
//! Bytes arrive in arbitrary pieces; only complete lines are decoded, so a
//! multi-byte character or a JSON payload split across reads is reassembled
//! before parsing.

use crate::error::{remote_code, GenerationError};
use futures::{Stream, StreamExt};
use std::collections::VecDeque;

/// One decoded item of a completion stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseItem {
    /// Text content delta
    Delta(String),
    /// In-band error payload (`data: {"error": {...}}`)
    Error { message: String, code: Option<u16> },
    /// `data: [DONE]`
    Done,
}

#[derive(Debug, serde::Deserialize)]
struct StreamChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct StreamChoice {
    delta: Option<StreamChunkDelta>,
}

#[derive(Debug, serde::Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

/// Incremental line decoder for an SSE body
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning the items completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseItem> {
        self.buffer.extend_from_slice(bytes);

        let mut items = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(item) = decode_line(&String::from_utf8_lossy(&line)) {
                items.push(item);
            }
        }
        items
    }

    /// Decode whatever is left once the body has ended
    pub fn finish(&mut self) -> Option<SseItem> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&String::from_utf8_lossy(&rest))
    }
}

/// Turn a raw body stream into decoded items.
///
/// A read error ends the stream with a single `Transport` error item.
pub fn decode_stream<S, B, E>(bytes: S) -> impl Stream<Item = Result<SseItem, GenerationError>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let state = (bytes, SseDecoder::new(), VecDeque::<SseItem>::new(), false);
    futures::stream::unfold(state, |(mut bytes, mut decoder, mut pending, mut ended)| async move {
        loop {
            if let Some(item) = pending.pop_front() {
                return Some((Ok(item), (bytes, decoder, pending, ended)));
            }
            if ended {
                return None;
            }
            match bytes.next().await {
                Some(Ok(chunk)) => pending.extend(decoder.push(chunk.as_ref())),
                Some(Err(e)) => {
                    let error = GenerationError::Transport {
                        message: format!("Stream read error: {}", e),
                    };
                    return Some((Err(error), (bytes, decoder, VecDeque::new(), true)));
                }
                None => {
                    ended = true;
                    pending.extend(decoder.finish());
                }
            }
        }
    })
}

fn decode_line(line: &str) -> Option<SseItem> {
    let line = line.trim();
    // Blank separators and `: OPENROUTER PROCESSING` style comments
    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseItem::Done);
    }

    let value: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(target: "llm", error = %e, "Skipping undecodable stream line");
            return None;
        }
    };

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| error.as_str())
            .unwrap_or("Stream returned an error")
            .to_string();
        return Some(SseItem::Error {
            message,
            code: remote_code(&value),
        });
    }

    let chunk: StreamChunk = serde_json::from_value(value).ok()?;
    let content: String = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.and_then(|d| d.content))
        .collect();

    if content.is_empty() {
        None
    } else {
        Some(SseItem::Delta(content))
    }
}
