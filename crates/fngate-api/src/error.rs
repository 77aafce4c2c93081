//! API error type and its HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fngate_registry::RegistryError;
use fngate_runtime::RuntimeError;
use fngate_topic::TopicError;
use thiserror::Error;
use tracing::warn;

use crate::response::ApiResponse;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Topic(#[from] TopicError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) | ApiError::Topic(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Registry(RegistryError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Registry(RegistryError::AlreadyExists(_)) => StatusCode::CONFLICT,
            ApiError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Runtime(RuntimeError::UnsupportedLanguage(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Runtime(RuntimeError::PortPoolExhausted { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Runtime(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(%status, error = %self, "request failed");
        }
        (status, Json(ApiResponse::<()>::err(self.to_string()))).into_response()
    }
}
