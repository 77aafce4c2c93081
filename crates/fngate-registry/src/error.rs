//! Error types for the function registry.

use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no document found: {0}")]
    NotFound(String),

    #[error("document already existed: {0}")]
    AlreadyExists(String),

    #[error("failed to initialize registry backend: {0}")]
    Init(String),

    #[error("unsupported registry backend type {0}")]
    UnsupportedBackend(String),

    #[error("registry backend is closed")]
    Closed,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),
}
