use thiserror::Error;
use uuid::Uuid;

/// Failures on the chat path (directory, store, channel).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("class group {0} not found")]
    NotFound(Uuid),

    /// Caller-correctable; never reaches the store.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("message store error: {0}")]
    Store(String),
}

impl ChatError {
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }

    /// Short machine-readable tag, used on the gateway wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Store(_) => "store_error",
        }
    }
}
