//! Conversation error types

use crate::llm::LlmError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvoError {
    /// The model backend failed or returned an empty result. Also used for
    /// persistence and file-state failures, which abort the turn the same way.
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Unknown branch: {0}")]
    UnknownBranch(String),
    #[error("Unknown function requested: {0}")]
    UnknownFunctionRequested(String),
    #[error("Function {name} failed: {message}")]
    Handler { name: String, message: String },
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    #[error("Prompt rendering failed: {0}")]
    Prompt(String),
    #[error("User interaction failed: {0}")]
    Interaction(String),
}

impl ConvoError {
    pub fn persistence(message: impl Into<String>) -> Self {
        ConvoError::Backend(format!("persistence: {}", message.into()))
    }

    pub fn file_state(message: impl Into<String>) -> Self {
        ConvoError::Backend(format!("file state: {}", message.into()))
    }
}

impl From<LlmError> for ConvoError {
    fn from(e: LlmError) -> Self {
        ConvoError::Backend(e.message)
    }
}

pub type ConvoResult<T> = Result<T, ConvoError>;
