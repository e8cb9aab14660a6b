use thiserror::Error;
use uuid::Uuid;

use campus_types::error::ChatError;

/// Failures of a summary request. Kept apart from `ChatError` so nothing on
/// this path can be mistaken for a chat failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummaryError {
    #[error("class group {0} not found")]
    NotFound(Uuid),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("message store error: {0}")]
    Store(String),

    /// The service answered, but not with a usable summary.
    #[error("summary generation failed: {0}")]
    Generation(String),

    /// The service could not be reached at all.
    #[error("summary service unavailable: {0}")]
    Unavailable(String),
}

impl SummaryError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Store(_) => "store_error",
            Self::Generation(_) => "generation_failure",
            Self::Unavailable(_) => "unavailable_failure",
        }
    }
}

impl From<ChatError> for SummaryError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::NotFound(id) => Self::NotFound(id),
            ChatError::InvalidInput(msg) => Self::InvalidInput(msg),
            ChatError::Store(msg) => Self::Store(msg),
        }
    }
}
