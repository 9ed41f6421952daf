//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use delve_types::error::JobError;
use delve_types::llm::LlmError;

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Research job errors.
    Job(JobError),
    /// Completion provider errors.
    Llm(LlmError),
    /// Validation error.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<JobError> for AppError {
    fn from(e: JobError) -> Self {
        AppError::Job(e)
    }
}

impl From<LlmError> for AppError {
    fn from(e: LlmError) -> Self {
        AppError::Llm(e)
    }
}

impl AppError {
    /// HTTP status, machine-readable code, and message.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Job(JobError::NotFound) => (
                StatusCode::NOT_FOUND,
                "RESEARCH_NOT_FOUND",
                "Research not found".to_string(),
            ),
            AppError::Job(JobError::Validation(msg)) | AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Job(e @ (JobError::AlreadyFinished(_) | JobError::InvalidTransition { .. })) => {
                (StatusCode::CONFLICT, "CONFLICT", e.to_string())
            }
            AppError::Job(e @ JobError::QueueClosed) => {
                (StatusCode::SERVICE_UNAVAILABLE, "QUEUE_CLOSED", e.to_string())
            }
            AppError::Job(e) => (StatusCode::INTERNAL_SERVER_ERROR, "RESEARCH_ERROR", e.to_string()),
            AppError::Llm(LlmError::InvalidRequest(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Llm(e @ (LlmError::RateLimited { .. } | LlmError::Overloaded(_))) => {
                (StatusCode::SERVICE_UNAVAILABLE, "LLM_UNAVAILABLE", e.to_string())
            }
            AppError::Llm(e) => (StatusCode::INTERNAL_SERVER_ERROR, "LLM_ERROR", e.to_string()),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, %message, "request failed");
        }

        let body = ApiResponse::error(code, &message, uuid::Uuid::now_v7().to_string(), 0);
        (status, body).into_response()
    }
}
