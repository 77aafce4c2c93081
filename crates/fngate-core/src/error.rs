//! Error types for parsing core values.

use thiserror::Error;

/// Result type alias for core parsing.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while parsing enums and topic names from user input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("unsupported function language pack {0}")]
    UnsupportedLanguage(String),

    #[error("unsupported trigger type {0}")]
    InvalidTriggerType(String),

    #[error("unsupported function status {0}")]
    InvalidStatus(String),

    #[error("invalid subscription type {0}")]
    InvalidSubscriptionType(String),

    #[error("invalid subscription initial position {0}")]
    InvalidInitialPosition(String),

    #[error("invalid persistence mode {0}")]
    InvalidPersistence(String),

    #[error("malformed topic full name {0}")]
    MalformedTopicName(String),
}
