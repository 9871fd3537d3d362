//! Provider configuration

use serde::{Deserialize, Serialize};

/// Endpoint settings for an OpenAI-compatible chat-completion service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Display name for the provider
    pub name: String,
    /// API base URL (e.g., "https://openrouter.ai/api/v1")
    pub base_url: String,
    /// Environment variable name for the API key
    pub api_key_env: String,
    /// Model used when a request names none
    pub default_model: String,
    /// Sent as `HTTP-Referer` (OpenRouter app attribution)
    pub referer: Option<String>,
    /// Sent as `X-Title` (OpenRouter app attribution)
    pub title: Option<String>,
}

impl ProviderConfig {
    /// Create an OpenRouter provider config
    pub fn openrouter() -> Self {
        Self {
            name: "OpenRouter".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            default_model: "deepseek/deepseek-chat".to_string(),
            referer: None,
            title: Some("Story Generator App".to_string()),
        }
    }

    /// Point this config at another base URL, keeping everything else
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::openrouter()
    }
}
