//! Efficode error types.
//!
//! Every failure inside the core resolves to one of two things: an ERROR
//! packet handed back to the caller, or an aborted conversation with its
//! partial transcript intact. [`EfficodeError`] is the Rust-side carrier for
//! those failures and [`ErrorCode`] is the closed set of codes that travel on
//! the wire inside ERROR packets.
//!
//! The `Completion` variant keeps the collaborator's error as `#[source]` so
//! tools like `anyhow` can print the whole chain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::completion::CompletionError;

/// Efficode errors.
#[derive(Error, Debug)]
pub enum EfficodeError {
    /// Decode was handed an empty string.
    #[error("Empty message")]
    EmptyMessage,

    /// Packet is tagged with a compression method that is not registered.
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),

    /// Compression operation failed.
    #[error("Compression error: {0}")]
    Compression(String),

    /// Decompression operation failed.
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// Sender has not completed an identity exchange with the receiver.
    #[error("Authentication required for sender {0}")]
    AuthRequired(String),

    /// Identity exchange was rejected.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Peer produced no usable reply.
    #[error("Peer unresponsive: {0}")]
    PeerUnresponsive(String),

    /// Conversation was cancelled or has already ended.
    #[error("Conversation closed: {0}")]
    Closed(String),

    /// The completion collaborator failed.
    #[error("Completion error: {0}")]
    Completion(#[source] CompletionError),

    /// Transcript could not be written.
    #[error("Storage write failed: {0}")]
    StorageWriteFailed(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Efficode operations
pub type Result<T> = std::result::Result<T, EfficodeError>;

impl EfficodeError {
    /// Wire code reported in ERROR packets for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            EfficodeError::EmptyMessage | EfficodeError::Json(_) => ErrorCode::MalformedPacket,
            EfficodeError::UnsupportedCompression(_)
            | EfficodeError::Compression(_)
            | EfficodeError::Decompression(_) => ErrorCode::UnsupportedCompression,
            EfficodeError::AuthRequired(_) => ErrorCode::AuthRequired,
            EfficodeError::AuthFailed(_) => ErrorCode::AuthFailed,
            EfficodeError::PeerUnresponsive(_) | EfficodeError::Closed(_) => {
                ErrorCode::PeerUnresponsive
            },
            EfficodeError::Completion(CompletionError::Timeout) => ErrorCode::Timeout,
            EfficodeError::Completion(_) => ErrorCode::ServiceError,
            EfficodeError::StorageWriteFailed(_) | EfficodeError::Io(_) => {
                ErrorCode::StorageWriteFailed
            },
            EfficodeError::Config(_) => ErrorCode::ServiceError,
        }
    }
}

/// Error codes carried by ERROR packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input could not be understood as a packet
    MalformedPacket,
    /// Content is compressed with an algorithm this side cannot reverse
    UnsupportedCompression,
    /// Sender must complete the identity exchange first
    AuthRequired,
    /// Identity exchange rejected
    AuthFailed,
    /// Peer did not produce a usable reply
    PeerUnresponsive,
    /// Transcript persistence failed
    StorageWriteFailed,
    /// Completion call timed out
    Timeout,
    /// Completion service reported an error
    ServiceError,
    /// Packet kind is not accepted by a peer
    UnexpectedOpcode,
}

impl ErrorCode {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MalformedPacket => "MALFORMED_PACKET",
            ErrorCode::UnsupportedCompression => "UNSUPPORTED_COMPRESSION",
            ErrorCode::AuthRequired => "AUTH_REQUIRED",
            ErrorCode::AuthFailed => "AUTH_FAILED",
            ErrorCode::PeerUnresponsive => "PEER_UNRESPONSIVE",
            ErrorCode::StorageWriteFailed => "STORAGE_WRITE_FAILED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::ServiceError => "SERVICE_ERROR",
            ErrorCode::UnexpectedOpcode => "UNEXPECTED_OPCODE",
        }
    }

    /// Parse from wire representation
    pub fn parse(code: &str) -> Option<Self> {
        [
            ErrorCode::MalformedPacket,
            ErrorCode::UnsupportedCompression,
            ErrorCode::AuthRequired,
            ErrorCode::AuthFailed,
            ErrorCode::PeerUnresponsive,
            ErrorCode::StorageWriteFailed,
            ErrorCode::Timeout,
            ErrorCode::ServiceError,
            ErrorCode::UnexpectedOpcode,
        ]
        .into_iter()
        .find(|c| c.as_str() == code)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CompletionError> for EfficodeError {
    fn from(err: CompletionError) -> Self {
        EfficodeError::Completion(err)
    }
}

impl From<toml::de::Error> for EfficodeError {
    fn from(err: toml::de::Error) -> Self {
        EfficodeError::Config(err.to_string())
    }
}

impl From<base64::DecodeError> for EfficodeError {
    fn from(err: base64::DecodeError) -> Self {
        EfficodeError::Decompression(format!("Base64 decode error: {err}"))
    }
}
