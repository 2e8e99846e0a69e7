//! Error types for deskbot-core

use thiserror::Error;

/// Main error type for the deskbot-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (snapshot columns)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Catalog file error
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Malformed callback payload
    #[error("malformed callback payload: {0}")]
    Payload(String),

    /// Unknown device key
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Unknown model key for a known device
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Unknown serial number for a known model
    #[error("number not found: {0}")]
    NumberNotFound(String),

    /// Question text with no authored solution
    #[error("question not found: {0}")]
    QuestionNotFound(String),

    /// Token already consumed, never minted, or lost to a restart
    #[error("token not found: {0}")]
    TokenNotFound(String),

    /// User with no profile row
    #[error("user not found: {0}")]
    UserNotFound(i64),

    /// Non-admin caller on an admin command
    #[error("unauthorized: user {0}")]
    Unauthorized(i64),
}

impl Error {
    /// Whether this error is a recoverable "not found" that should be
    /// rendered as a user-facing message rather than propagated.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::DeviceNotFound(_)
                | Error::ModelNotFound(_)
                | Error::NumberNotFound(_)
                | Error::QuestionNotFound(_)
                | Error::TokenNotFound(_)
                | Error::UserNotFound(_)
        )
    }
}

/// Result type alias for deskbot-core
pub type Result<T> = std::result::Result<T, Error>;
