//! Story Forge - streamed story generation over a hosted chat-completion API
//!
//! This crate provides:
//! - A client for OpenRouter (or any OpenAI-compatible endpoint) that
//!   delivers a story incrementally or in one piece
//! - Persisted settings for credential, model and system instructions
//! - A CLI front end

pub mod error;
pub mod events;
pub mod provider;
pub mod settings;
pub mod story;
pub mod stream;
pub mod telemetry;

pub use error::{ErrorKind, GenerationError};
pub use events::StoryEvent;
pub use provider::{CredentialCheck, ModelInfo, ProviderConfig, StoryClient};
pub use settings::{SettingKey, Settings, SettingsError, SettingsStore};
pub use story::{GenerationRequest, DEFAULT_INSTRUCTIONS};
pub use telemetry::Telemetry;
