//! Candidate and interview persistence.
//!
//! `PipelineStore` is the only seam the orchestrator and the stage machine write
//! through. `MemoryStore` backs tests and single-process runs without a
//! database; `PgStore` is selected when `DATABASE_URL` is set.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::candidate::{
    Candidate, CandidateScores, Decision, PipelineStatus, UnknownLabel,
};
use crate::models::interview::{
    Analytics, Interview, InterviewStatus, QuestionRecord, TranscriptTurn,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// A uniqueness rule was violated, or the row left the state the write expected.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<UnknownLabel> for StoreError {
    fn from(e: UnknownLabel) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

/// Everything `recordAnalytics` writes, applied as one unit. The interview must
/// still be active and the candidate undecided and unarchived.
#[derive(Debug, Clone)]
pub struct StageCompletion {
    pub interview: Interview,
    pub turns: Vec<TranscriptTurn>,
    pub analytics: Analytics,
    pub questions: Vec<QuestionRecord>,
    pub pipeline_status: PipelineStatus,
}

/// Candidate columns have one writer each: extraction inserts the row, scoring
/// owns the score columns, and the stage machine owns status, decision and
/// archive stamps. No method writes a whole candidate over an existing row.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// Fails with `Conflict` when the id already exists.
    async fn insert_candidate(&self, candidate: &Candidate) -> Result<(), StoreError>;

    async fn get_candidate(&self, id: Uuid) -> Result<Candidate, StoreError>;

    async fn candidates_for_job(&self, job_id: Uuid) -> Result<Vec<Candidate>, StoreError>;

    /// Writes the scoring columns only and returns the current row.
    async fn record_scores(
        &self,
        id: Uuid,
        scores: &CandidateScores,
    ) -> Result<Candidate, StoreError>;

    /// `Conflict` once the candidate is decided or archived.
    async fn set_pipeline_status(
        &self,
        id: Uuid,
        status: PipelineStatus,
    ) -> Result<(), StoreError>;

    /// `Conflict` when a decision already exists or the candidate is archived.
    async fn record_decision(
        &self,
        id: Uuid,
        decision: Decision,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Candidate, StoreError>;

    /// Stamps `archived_at`. `Conflict` when already archived or when the row
    /// changed after `seen_updated_at` was read.
    async fn mark_archived(
        &self,
        id: Uuid,
        seen_updated_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<Candidate, StoreError>;

    /// Fails with `Conflict` when the candidate already has a row for that stage.
    async fn insert_interview(&self, interview: &Interview) -> Result<(), StoreError>;

    /// Writes `interview` only if the stored row is still in `from`.
    async fn transition_interview(
        &self,
        interview: &Interview,
        from: InterviewStatus,
    ) -> Result<(), StoreError>;

    async fn get_interview(&self, id: Uuid) -> Result<Interview, StoreError>;

    /// All interviews of a candidate, in stage order.
    async fn interviews_for(&self, candidate_id: Uuid) -> Result<Vec<Interview>, StoreError>;

    /// Empty when the interview has no transcript yet.
    async fn transcript_for(&self, interview_id: Uuid) -> Result<Vec<TranscriptTurn>, StoreError>;

    /// Analytics of a candidate, in stage order.
    async fn analytics_for(&self, candidate_id: Uuid) -> Result<Vec<Analytics>, StoreError>;

    async fn questions_for(&self, candidate_id: Uuid) -> Result<Vec<QuestionRecord>, StoreError>;

    /// Writes transcript, analytics, question records, the completed interview and
    /// the candidate's new status together.
    async fn complete_stage(&self, completion: &StageCompletion) -> Result<(), StoreError>;
}
