use thiserror::Error;

/// Errors from session and gateway operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Backend error: {0}")]
    Backend(#[from] story_api::Error),

    #[error("{0}")]
    MissingStoryData(&'static str),

    #[error("No story has been generated yet")]
    NoCurrentStory,

    #[error("Generation request {seq} was superseded by a newer request")]
    Superseded { seq: u64 },
}

impl SessionError {
    /// The message shown to a user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Backend(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}
