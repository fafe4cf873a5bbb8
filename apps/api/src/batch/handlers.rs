use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::batch::job::{BatchJob, JobPhase, RankedEntry, ResumeInput};
use crate::batch::upload::resume_from_file;
use crate::errors::AppError;
use crate::models::candidate::{ExtractionField, JobCriteria};
use crate::ranking::RankingWeights;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartJobRequest {
    pub tenant_id: Uuid,
    pub resumes: Vec<ResumeInput>,
    #[serde(default)]
    pub fields: Vec<ExtractionField>,
    #[serde(default)]
    pub criteria: JobCriteria,
}

#[derive(Debug, Serialize)]
pub struct StartJobResponse {
    pub job_id: Uuid,
    pub phase: JobPhase,
}

/// POST /api/v1/jobs
pub async fn handle_start_job(
    State(state): State<AppState>,
    Json(req): Json<StartJobRequest>,
) -> Result<Json<StartJobResponse>, AppError> {
    let job_id = state
        .orchestrator
        .start_extraction(req.tenant_id, req.resumes, req.fields, req.criteria)
        .await?;
    Ok(Json(StartJobResponse {
        job_id,
        phase: JobPhase::Extracting,
    }))
}

/// POST /api/v1/jobs/upload
///
/// Multipart form: `tenant_id`, `fields` (JSON array), optional `criteria`
/// (JSON object) and one or more `resumes` file parts.
pub async fn handle_upload_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<StartJobResponse>, AppError> {
    let mut tenant_id: Option<Uuid> = None;
    let mut fields: Vec<ExtractionField> = Vec::new();
    let mut criteria = JobCriteria::default();
    let mut resumes = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let part = field.name().unwrap_or_default().to_string();
        match part.as_str() {
            "tenant_id" => {
                let text = field.text().await.map_err(bad_part)?;
                tenant_id = Some(text.trim().parse().map_err(|_| {
                    AppError::Validation(format!("tenant_id '{text}' is not a UUID"))
                })?);
            }
            "fields" => {
                let text = field.text().await.map_err(bad_part)?;
                fields = serde_json::from_str(&text)
                    .map_err(|e| AppError::Validation(format!("fields: {e}")))?;
            }
            "criteria" => {
                let text = field.text().await.map_err(bad_part)?;
                criteria = serde_json::from_str(&text)
                    .map_err(|e| AppError::Validation(format!("criteria: {e}")))?;
            }
            "resumes" => {
                let file_name = field.file_name().unwrap_or("resume.txt").to_string();
                let bytes = field.bytes().await.map_err(bad_part)?;
                let resume =
                    tokio::task::spawn_blocking(move || resume_from_file(&file_name, &bytes))
                        .await
                        .map_err(|e| AppError::Internal(anyhow::anyhow!("PDF worker failed: {e}")))??;
                resumes.push(resume);
            }
            other => {
                tracing::debug!("Ignoring unknown multipart part '{other}'");
            }
        }
    }

    let tenant_id =
        tenant_id.ok_or_else(|| AppError::Validation("tenant_id is required".to_string()))?;
    let job_id = state
        .orchestrator
        .start_extraction(tenant_id, resumes, fields, criteria)
        .await?;
    Ok(Json(StartJobResponse {
        job_id,
        phase: JobPhase::Extracting,
    }))
}

fn bad_part(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("Unreadable multipart part: {e}"))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchJob>, AppError> {
    Ok(Json(state.orchestrator.poll(id).await?))
}

/// POST /api/v1/jobs/:id/confirm
pub async fn handle_confirm_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchJob>, AppError> {
    Ok(Json(state.orchestrator.confirm_scoring(id).await?))
}

/// POST /api/v1/jobs/:id/cancel
pub async fn handle_cancel_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchJob>, AppError> {
    Ok(Json(state.orchestrator.cancel(id).await?))
}

/// POST /api/v1/jobs/:id/rescore
pub async fn handle_rescore_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(weights): Json<RankingWeights>,
) -> Result<Json<Vec<RankedEntry>>, AppError> {
    Ok(Json(state.orchestrator.rescore(id, &weights).await?))
}
