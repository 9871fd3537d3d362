//! Story generation events
//!
//! Channel form of progress reporting: any number of `Progress` events
//! followed by exactly one terminal `Completed` or `Failed`.

use crate::error::{ErrorKind, GenerationError};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoryEvent {
    /// Cumulative text received so far
    Progress { text: String },
    /// The stream finished; `story` equals the last progress text
    Completed { story: String },
    /// The call failed
    Failed {
        error: String,
        kind: ErrorKind,
        #[serde(rename = "statusCode")]
        status_code: Option<u16>,
    },
}

impl StoryEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StoryEvent::Progress { .. })
    }
}

impl From<&Result<String, GenerationError>> for StoryEvent {
    fn from(result: &Result<String, GenerationError>) -> Self {
        match result {
            Ok(story) => StoryEvent::Completed {
                story: story.clone(),
            },
            Err(error) => StoryEvent::Failed {
                error: error.to_string(),
                kind: error.kind(),
                status_code: error.status_code(),
            },
        }
    }
}
