//! Generation errors
//!
//! Every failure of a remote call is translated into a `GenerationError`
//! before it leaves the client. Raw `reqwest` errors never cross that
//! boundary.

use serde::Serialize;

/// Message used whenever no credential was supplied
pub const MISSING_CREDENTIAL: &str = "API key is required";

/// Coarse classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingCredential,
    TransportFailure,
    AuthFailure,
    StreamFailure,
    UnknownFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// No credential supplied; no request was made
    #[error("{}", MISSING_CREDENTIAL)]
    MissingCredential,

    /// Network, DNS or connection-level failure
    #[error("{message}")]
    Transport { message: String },

    /// The remote service rejected the credential
    #[error("{message}")]
    Auth { message: String, status: u16 },

    /// The stream broke after it had started.
    ///
    /// `partial` holds whatever had been accumulated. It was already
    /// delivered through progress notifications but is not a result.
    #[error("{message}")]
    Stream {
        message: String,
        status: Option<u16>,
        partial: String,
    },

    /// Anything else the remote call produced
    #[error("{message}")]
    Unknown { message: String, status: Option<u16> },
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerationError::MissingCredential => ErrorKind::MissingCredential,
            GenerationError::Transport { .. } => ErrorKind::TransportFailure,
            GenerationError::Auth { .. } => ErrorKind::AuthFailure,
            GenerationError::Stream { .. } => ErrorKind::StreamFailure,
            GenerationError::Unknown { .. } => ErrorKind::UnknownFailure,
        }
    }

    /// HTTP status (or in-band error code) when the remote supplied one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GenerationError::MissingCredential | GenerationError::Transport { .. } => None,
            GenerationError::Auth { status, .. } => Some(*status),
            GenerationError::Stream { status, .. } | GenerationError::Unknown { status, .. } => {
                *status
            }
        }
    }

    /// Text received before an interrupted stream failed
    pub fn partial_text(&self) -> Option<&str> {
        match self {
            GenerationError::Stream { partial, .. } => Some(partial),
            _ => None,
        }
    }

    pub(crate) fn unknown(message: impl Into<String>) -> Self {
        GenerationError::Unknown {
            message: message.into(),
            status: None,
        }
    }

    /// Translate a failed `send()` / body read into a transport failure
    pub(crate) fn from_transport(error: &reqwest::Error) -> Self {
        GenerationError::Transport {
            message: format!("API request failed: {}", error),
        }
    }

    /// Translate a non-success HTTP response.
    ///
    /// `body` is the raw response text; an OpenAI-style
    /// `{"error": {"message": ...}}` envelope supplies the message when present.
    pub(crate) fn from_status(status: u16, body: impl AsRef<str>) -> Self {
        let remote = remote_message(body.as_ref());
        match status {
            401 | 403 => GenerationError::Auth {
                message: format!(
                    "Authentication failed ({}): {}",
                    status,
                    remote.as_deref().unwrap_or("the API key was rejected")
                ),
                status,
            },
            _ => GenerationError::Unknown {
                message: format!(
                    "API error {}: {}",
                    status,
                    remote.unwrap_or_else(|| body.as_ref().trim().to_string())
                ),
                status: Some(status),
            },
        }
    }
}

/// Extract `error.message` from an OpenAI-compatible error body
pub(crate) fn remote_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .map(|s| s.to_string())
}

/// Extract a numeric `error.code` from an OpenAI-compatible error body
pub(crate) fn remote_code(value: &serde_json::Value) -> Option<u16> {
    value
        .get("error")?
        .get("code")?
        .as_u64()
        .and_then(|c| u16::try_from(c).ok())
}
