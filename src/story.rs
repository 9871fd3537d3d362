//! Generation requests and the chat-completion body built from them

use crate::error::GenerationError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs,
};
use serde::{Deserialize, Serialize};

/// Persona used when a request carries no system instructions
pub const DEFAULT_INSTRUCTIONS: &str =
    "You are a creative storyteller. Create engaging, imaginative stories based on the user's prompt.";

/// One user action's worth of input. Built fresh per call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub instructions: String,
    pub model: String,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// System instructions, falling back to the built-in persona
    pub fn system_prompt(&self) -> &str {
        if self.instructions.trim().is_empty() {
            DEFAULT_INSTRUCTIONS
        } else {
            &self.instructions
        }
    }

    /// The system + user exchange sent to the model
    pub fn to_messages(&self) -> Result<Vec<ChatCompletionRequestMessage>, GenerationError> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(self.system_prompt())
            .build()
            .map_err(|e| GenerationError::unknown(format!("Failed to build request: {}", e)))?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(self.prompt.as_str())
            .build()
            .map_err(|e| GenerationError::unknown(format!("Failed to build request: {}", e)))?;

        Ok(vec![system.into(), user.into()])
    }

    /// Full request body. `default_model` applies when `model` is blank.
    pub(crate) fn to_body(
        &self,
        default_model: &str,
        stream: bool,
    ) -> Result<CreateChatCompletionRequest, GenerationError> {
        let model = if self.model.trim().is_empty() {
            default_model
        } else {
            self.model.as_str()
        };

        CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(self.to_messages()?)
            .stream(stream)
            .build()
            .map_err(|e| GenerationError::unknown(format!("Failed to build request: {}", e)))
    }
}
