//! LLM Provider layer
//!
//! OpenAI-compatible provider that handles story generation, streamed or
//! single-shot, plus the model listing used to check credentials.

mod client;
mod config;
mod sse;

pub use client::*;
pub use config::*;
pub use sse::{decode_stream, SseDecoder, SseItem};
