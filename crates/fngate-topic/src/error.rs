//! Topic resolver error types.

use fngate_core::CoreError;
use thiserror::Error;

pub type TopicResult<T> = Result<T, TopicError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopicError {
    #[error("missing topic parts")]
    IncompleteTopicParts,

    #[error("invalid subscription type {0}")]
    InvalidSubscriptionType(String),

    #[error("invalid subscription initial position {0}")]
    InvalidInitialPosition(String),

    #[error("subscription name must be at least {min} characters, got {got:?}")]
    SubscriptionNameTooShort { min: usize, got: String },

    #[error("{0}")]
    Validation(String),
}

impl From<CoreError> for TopicError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidSubscriptionType(s) => TopicError::InvalidSubscriptionType(s),
            CoreError::InvalidInitialPosition(s) => TopicError::InvalidInitialPosition(s),
            other => TopicError::Validation(other.to_string()),
        }
    }
}
