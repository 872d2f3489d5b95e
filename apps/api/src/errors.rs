use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::avatar::pipeline::PipelineStep;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Store unavailable: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Avatar pipeline failed at {step}: {source}")]
    Pipeline {
        step: PipelineStep,
        #[source]
        source: Box<AppError>,
    },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Pipeline failures carry the failed step so the caller can tell which
        // side effects were already committed (no rollback happens).
        if let AppError::Pipeline { step, source } = &self {
            tracing::error!("Pipeline error at {step}: {source}");
            let body = Json(json!({
                "error": {
                    "code": "PIPELINE_ERROR",
                    "message": format!(
                        "Avatar pipeline failed at step '{step}'. Steps before it are committed; the avatar may be stale."
                    ),
                    "failed_step": step.as_str(),
                }
            }));
            return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
        }

        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::Store(e) => {
                tracing::error!("Store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_UNAVAILABLE",
                    "The data store is unavailable".to_string(),
                )
            }
            AppError::Generation(msg) => {
                tracing::error!("Generation error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "GENERATION_ERROR",
                    "A generation provider error occurred".to_string(),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "An object storage error occurred".to_string(),
                )
            }
            AppError::Pipeline { .. } => unreachable!("handled above"),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
