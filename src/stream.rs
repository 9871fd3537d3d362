//! Streaming accumulation
//!
//! Deltas are appended to a running string and the whole string is handed
//! to the progress callback after every append. Each notification extends
//! the previous one; nothing already delivered is ever rewritten.

use crate::error::GenerationError;
use crate::provider::SseItem;
use futures::{Stream, StreamExt};

/// Drain `items`, notifying `on_progress` with the cumulative text.
///
/// Returns the full text once the stream ends or sends `[DONE]`. Any error
/// item, read failure or in-band, settles the call as
/// `GenerationError::Stream` carrying the text accumulated so far.
pub async fn accumulate<S, F>(items: S, mut on_progress: F) -> Result<String, GenerationError>
where
    S: Stream<Item = Result<SseItem, GenerationError>>,
    F: FnMut(&str),
{
    let mut items = std::pin::pin!(items);
    let mut text = String::new();

    while let Some(item) = items.next().await {
        match item {
            Ok(SseItem::Delta(delta)) => {
                text.push_str(&delta);
                on_progress(&text);
            }
            Ok(SseItem::Done) => break,
            Ok(SseItem::Error { message, code }) => {
                return Err(GenerationError::Stream {
                    message: format!("Stream failed: {}", message),
                    status: code,
                    partial: text,
                });
            }
            Err(error) => return Err(interrupted(error, text)),
        }
    }

    Ok(text)
}

fn interrupted(error: GenerationError, partial: String) -> GenerationError {
    match error {
        GenerationError::Stream { .. } => error,
        other => GenerationError::Stream {
            message: format!("Stream interrupted: {}", other),
            status: other.status_code(),
            partial,
        },
    }
}
