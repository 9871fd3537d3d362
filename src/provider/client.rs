//! Story generation client
//!
//! One chat-completion call per generation. Streaming goes over raw HTTP so
//! every delta can be republished the moment it arrives; the single-shot
//! path reads the whole body. Both settle into the same result shape.

use super::sse::decode_stream;
use super::ProviderConfig;
use crate::error::{remote_code, GenerationError};
use crate::events::StoryEvent;
use crate::story::GenerationRequest;
use crate::stream::accumulate;
use async_openai::types::CreateChatCompletionRequest;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Outcome of a credential check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialCheck {
    Valid,
    Invalid {
        error: String,
        status_code: Option<u16>,
    },
}

impl CredentialCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, CredentialCheck::Valid)
    }

    /// `{"valid": true}` or `{"valid": false, "error": ..., "statusCode": ...}`
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CredentialCheck::Valid => serde_json::json!({ "valid": true }),
            CredentialCheck::Invalid { error, status_code } => serde_json::json!({
                "valid": false,
                "error": error,
                "statusCode": status_code,
            }),
        }
    }
}

/// One entry of the provider's model listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub context_length: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

/// OpenAI-compatible story generation client
#[derive(Clone)]
pub struct StoryClient {
    config: ProviderConfig,
    http_client: reqwest::Client,
}

impl StoryClient {
    /// Create a new client from config
    pub fn new(config: ProviderConfig) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| GenerationError::unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Get the provider config
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Generate a story.
    ///
    /// With `on_progress` the response is streamed and the callback receives
    /// the cumulative text after every delta; without it a single blocking
    /// request is made. An empty credential fails before any request.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        credential: &str,
        on_progress: Option<&mut (dyn FnMut(&str) + Send)>,
    ) -> Result<String, GenerationError> {
        if credential.trim().is_empty() {
            tracing::warn!(target: "llm", "Story generation requested without an API key");
            return Err(GenerationError::MissingCredential);
        }

        let request_id = Uuid::new_v4();
        let streaming = on_progress.is_some();
        let start = Instant::now();
        tracing::info!(
            target: "llm",
            request_id = %request_id,
            provider = %self.config.name,
            model = self.model_for(request),
            streaming,
            prompt_chars = request.prompt.chars().count(),
            "Starting story generation"
        );

        let result = match on_progress {
            Some(on_progress) => self.stream_story(request, credential, on_progress).await,
            None => self.complete_story(request, credential).await,
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(story) => tracing::info!(
                target: "llm",
                request_id = %request_id,
                elapsed_ms,
                story_chars = story.chars().count(),
                "Story generation completed"
            ),
            Err(e) => tracing::error!(
                target: "llm",
                request_id = %request_id,
                elapsed_ms,
                kind = ?e.kind(),
                status = ?e.status_code(),
                error = %e,
                "Story generation failed"
            ),
        }

        result
    }

    /// Streaming generation with a progress callback
    pub async fn generate_streaming<F>(
        &self,
        request: &GenerationRequest,
        credential: &str,
        mut on_progress: F,
    ) -> Result<String, GenerationError>
    where
        F: FnMut(&str) + Send,
    {
        self.generate(request, credential, Some(&mut on_progress))
            .await
    }

    /// Single-shot generation, no progress notifications
    pub async fn generate_once(
        &self,
        request: &GenerationRequest,
        credential: &str,
    ) -> Result<String, GenerationError> {
        self.generate(request, credential, None).await
    }

    /// Streaming generation reported through a channel.
    ///
    /// Sends one `Progress` per delta and then exactly one terminal event.
    /// A dropped receiver does not abort the call.
    pub async fn generate_with_events(
        &self,
        request: &GenerationRequest,
        credential: &str,
        tx: mpsc::UnboundedSender<StoryEvent>,
    ) -> Result<String, GenerationError> {
        let progress_tx = tx.clone();
        let mut forward = move |text: &str| {
            let _ = progress_tx.send(StoryEvent::Progress {
                text: text.to_string(),
            });
        };

        let result = self.generate(request, credential, Some(&mut forward)).await;
        let _ = tx.send(StoryEvent::from(&result));
        result
    }

    /// Check that the remote service accepts `credential`
    pub async fn verify_credential(&self, credential: &str) -> CredentialCheck {
        match self.list_models(credential).await {
            Ok(models) => {
                tracing::info!(target: "llm", models = models.len(), "API key is valid");
                CredentialCheck::Valid
            }
            Err(e) => CredentialCheck::Invalid {
                error: e.to_string(),
                status_code: e.status_code(),
            },
        }
    }

    /// List the models offered by the provider
    pub async fn list_models(&self, credential: &str) -> Result<Vec<ModelInfo>, GenerationError> {
        if credential.trim().is_empty() {
            return Err(GenerationError::MissingCredential);
        }

        let builder = self
            .attribution(self.http_client.get(self.config.endpoint("models")))
            .bearer_auth(credential);
        let response = self.send(builder).await?;
        let status = response.status().as_u16();

        let list: ModelList = response.json().await.map_err(|e| GenerationError::Unknown {
            message: format!("Failed to parse model list: {}", e),
            status: Some(status),
        })?;

        tracing::debug!(target: "llm", models = list.data.len(), "Fetched model list");
        Ok(list.data)
    }

    async fn stream_story(
        &self,
        request: &GenerationRequest,
        credential: &str,
        on_progress: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String, GenerationError> {
        let body = request.to_body(&self.config.default_model, true)?;
        let response = self.send(self.chat_request(credential, &body)).await?;

        // A gateway may answer a stream request with a plain JSON body
        if !is_event_stream(&response) {
            tracing::debug!(target: "llm", "Stream request answered without SSE, reading JSON body");
            let story = read_completion(response).await?;
            if !story.is_empty() {
                on_progress(&story);
            }
            return Ok(story);
        }

        let mut deltas = 0usize;
        let result = accumulate(decode_stream(response.bytes_stream()), |text: &str| {
            deltas += 1;
            on_progress(text);
        })
        .await;
        tracing::info!(target: "llm", deltas, ok = result.is_ok(), "Stream drained");
        result
    }

    async fn complete_story(
        &self,
        request: &GenerationRequest,
        credential: &str,
    ) -> Result<String, GenerationError> {
        let body = request.to_body(&self.config.default_model, false)?;
        let response = self.send(self.chat_request(credential, &body)).await?;
        read_completion(response).await
    }

    fn chat_request(
        &self,
        credential: &str,
        body: &CreateChatCompletionRequest,
    ) -> reqwest::RequestBuilder {
        self.attribution(self.http_client.post(self.config.endpoint("chat/completions")))
            .bearer_auth(credential)
            .json(body)
    }

    fn attribution(&self, mut builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(referer) = &self.config.referer {
            builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.config.title {
            builder = builder.header("X-Title", title);
        }
        builder
    }

    /// Send and translate transport failures and non-success statuses
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, GenerationError> {
        let response = builder
            .send()
            .await
            .map_err(|e| GenerationError::from_transport(&e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(GenerationError::from_status(status, text));
        }

        Ok(response)
    }

    fn model_for<'a>(&'a self, request: &'a GenerationRequest) -> &'a str {
        if request.model.trim().is_empty() {
            &self.config.default_model
        } else {
            &request.model
        }
    }
}

fn is_event_stream(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/event-stream"))
}

/// Read a whole chat-completion body: `choices[0].message.content`
async fn read_completion(response: reqwest::Response) -> Result<String, GenerationError> {
    let status = response.status().as_u16();

    let response_body: serde_json::Value =
        response.json().await.map_err(|e| GenerationError::Unknown {
            message: format!("Failed to parse response: {}", e),
            status: Some(status),
        })?;

    // OpenRouter can report upstream failures inside a 200 body
    if response_body.get("error").is_some() {
        let code = remote_code(&response_body).unwrap_or(status);
        return Err(GenerationError::from_status(code, response_body.to_string()));
    }

    response_body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| GenerationError::Unknown {
            message: "No content in response".to_string(),
            status: Some(status),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> StoryClient {
        // Nothing listens on the discard port; the tests below must not reach it
        StoryClient::new(ProviderConfig::openrouter().with_base_url("http://127.0.0.1:9/api/v1"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_credential_fails_fast() {
        let request = GenerationRequest::new("a lighthouse keeper's last night");
        let mut calls = 0;

        let err = client()
            .generate_streaming(&request, "", |_: &str| calls += 1)
            .await
            .unwrap_err();

        assert_eq!(err, GenerationError::MissingCredential);
        assert_eq!(err.to_string(), "API key is required");
        assert_eq!(err.status_code(), None);
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_verify_without_credential() {
        let check = client().verify_credential("").await;
        assert_eq!(
            check,
            CredentialCheck::Invalid {
                error: "API key is required".to_string(),
                status_code: None
            }
        );
        assert_eq!(check.to_json()["valid"], false);
    }

    #[tokio::test]
    async fn test_events_end_with_single_terminal() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = client()
            .generate_with_events(&GenerationRequest::new("x"), "", tx)
            .await;
        assert!(result.is_err());

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StoryEvent::Failed { .. }));
    }

    #[test]
    fn test_model_for_falls_back_to_default() {
        let client = client();
        assert_eq!(
            client.model_for(&GenerationRequest::new("x")),
            "deepseek/deepseek-chat"
        );
        assert_eq!(
            client.model_for(&GenerationRequest::new("x").with_model("openai/gpt-4o")),
            "openai/gpt-4o"
        );
    }
}
