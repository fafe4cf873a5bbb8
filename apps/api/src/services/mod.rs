//! External collaborators: résumé extraction, AI scoring and interview analytics.
//!
//! Each is a trait so the orchestrator and stage machine never see transport
//! details. `AppState` carries them as `Arc<dyn ...>`; production wires the
//! LLM-backed implementations from `llm.rs`, tests wire fakes.

use async_trait::async_trait;
use thiserror::Error;

use crate::interview::context::ContextBundle;
use crate::llm_client::LlmError;
use crate::models::candidate::{AiAssessment, AttributeMap, Candidate, ExtractionField, JobCriteria};
use crate::models::interview::{AnalyticsReport, Stage, TranscriptTurn};

pub mod llm;
pub mod prompts;

pub use llm::{LlmAnalyticsService, LlmExtractionService, LlmScoringService};

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The collaborator could not be reached or refused service. Counts toward
    /// a batch's systemic-failure threshold.
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },

    /// The collaborator answered but the answer is unusable for this input.
    #[error("{service} failed: {message}")]
    Failed {
        service: &'static str,
        message: String,
    },
}

impl ServiceError {
    pub fn from_llm(service: &'static str, err: LlmError) -> Self {
        let message = err.to_string();
        if err.is_systemic() {
            ServiceError::Unavailable { service, message }
        } else {
            ServiceError::Failed { service, message }
        }
    }

    pub fn is_systemic(&self) -> bool {
        matches!(self, ServiceError::Unavailable { .. })
    }
}

/// Everything the analytics collaborator sees about one finished interview.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub candidate: &'a Candidate,
    pub stage: Stage,
    pub turns: &'a [TranscriptTurn],
    pub context: &'a ContextBundle,
}

#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Reads one résumé against the job's field schema. Values come back loosely
    /// typed; the orchestrator coerces them before storage.
    async fn extract(
        &self,
        resume_text: &str,
        fields: &[ExtractionField],
    ) -> Result<AttributeMap, ServiceError>;
}

#[async_trait]
pub trait ScoringService: Send + Sync {
    async fn score(
        &self,
        candidate: &Candidate,
        criteria: &JobCriteria,
    ) -> Result<AiAssessment, ServiceError>;
}

#[async_trait]
pub trait AnalyticsService: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<AnalyticsReport, ServiceError>;
}
