//! Text-completion collaborator.
//!
//! Peers turn an incoming message into a reply by calling a
//! [`CompletionBackend`] with the role-tagged history. The backend is a
//! black box: one call in, one text turn out, or a [`CompletionError`].
//! Calls are blocking and bounded by the backend's own timeout; nothing
//! in the core retries them.

mod http;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpCompletion;

/// Role of one turn in the history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Persona instructions
    System,
    /// Incoming message
    User,
    /// Previously generated reply
    Assistant,
}

/// One role-tagged text turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role tag
    pub role: Role,
    /// Text
    pub content: String,
}

impl ChatMessage {
    /// System turn
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Completion failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// The call exceeded its time bound
    #[error("completion timed out")]
    Timeout,

    /// Transport-level failure
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with an error
    #[error("service error {code}: {message}")]
    Service {
        /// Status or error code reported by the service
        code: u16,
        /// Service message
        message: String,
    },
}

impl CompletionError {
    /// Timeouts and network failures may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, CompletionError::Timeout | CompletionError::Network(_))
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CompletionError::Timeout
        } else if let Some(status) = err.status() {
            CompletionError::Service {
                code: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            CompletionError::Network(err.to_string())
        }
    }
}

/// Produces one text turn from a history.
pub trait CompletionBackend: Send {
    /// Generate the next turn
    fn complete(&self, history: &[ChatMessage]) -> Result<String, CompletionError>;
}

impl<T: CompletionBackend + Sync + ?Sized> CompletionBackend for std::sync::Arc<T> {
    fn complete(&self, history: &[ChatMessage]) -> Result<String, CompletionError> {
        (**self).complete(history)
    }
}

impl<T: CompletionBackend + ?Sized> CompletionBackend for Box<T> {
    fn complete(&self, history: &[ChatMessage]) -> Result<String, CompletionError> {
        (**self).complete(history)
    }
}
