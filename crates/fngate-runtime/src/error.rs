//! Runtime supervisor error types.

use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("unsupported function language pack {0}")]
    UnsupportedLanguage(String),

    #[error("port pool exhausted (ceiling {ceiling})")]
    PortPoolExhausted { ceiling: u16 },

    #[error("failed to spawn worker with {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("health check {url} failed after {attempts} attempt(s)")]
    WorkerUnhealthy { url: String, attempts: u32 },

    #[error("provisioning of {url} was cancelled")]
    Cancelled { url: String },

    #[error("source staging failed: {0}")]
    Staging(String),
}
