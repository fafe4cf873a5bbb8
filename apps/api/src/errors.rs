use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::batch::upload::UploadError;
use crate::batch::BatchError;
use crate::interview::StageError;
use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

fn store_status(e: &StoreError) -> (StatusCode, &'static str, String) {
    match e {
        StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
        StoreError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT", e.to_string()),
        StoreError::Database(_) | StoreError::Corrupt(_) => {
            tracing::error!("Storage error: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg.clone(),
            ),
            AppError::Batch(e) => match e {
                BatchError::InvalidSchema(_) | BatchError::Validation(_) | BatchError::Ranking(_) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
                }
                BatchError::JobAlreadyRunning { .. } => {
                    (StatusCode::CONFLICT, "JOB_ALREADY_RUNNING", e.to_string())
                }
                BatchError::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, "INVALID_TRANSITION", e.to_string())
                }
                BatchError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
                BatchError::Store(store) => store_status(store),
            },
            AppError::Stage(e) => match e {
                StageError::StagesComplete(_) => {
                    (StatusCode::CONFLICT, "STAGES_COMPLETE", e.to_string())
                }
                StageError::StageAlreadyInProgress(_) => {
                    (StatusCode::CONFLICT, "STAGE_ALREADY_IN_PROGRESS", e.to_string())
                }
                StageError::PriorStageIncomplete { .. } => {
                    (StatusCode::CONFLICT, "PRIOR_STAGE_INCOMPLETE", e.to_string())
                }
                StageError::StagesIncomplete { .. } => {
                    (StatusCode::CONFLICT, "STAGES_INCOMPLETE", e.to_string())
                }
                StageError::InvalidTransition(_) => {
                    (StatusCode::CONFLICT, "INVALID_TRANSITION", e.to_string())
                }
                StageError::Validation(_) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
                }
                StageError::Transcript(_) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "UNPARSEABLE_TRANSCRIPT",
                    e.to_string(),
                ),
                StageError::AnalysisFailed(_) => {
                    tracing::error!("{e}");
                    (StatusCode::BAD_GATEWAY, "ANALYSIS_FAILED", e.to_string())
                }
                StageError::Archive(_) => {
                    tracing::error!("{e}");
                    (
                        StatusCode::BAD_GATEWAY,
                        "S3_ERROR",
                        "A storage error occurred".to_string(),
                    )
                }
                StageError::Store(store) => store_status(store),
            },
            AppError::Store(e) => store_status(e),
            AppError::Upload(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                e.to_string(),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
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
