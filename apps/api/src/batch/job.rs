use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::candidate::{Candidate, ExtractionField, JobCriteria, Tier};
use crate::ranking::RankedCandidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Extracting,
    WaitingConfirmation,
    Scoring,
    Complete,
    Error,
    Cancelled,
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobPhase::Complete | JobPhase::Error | JobPhase::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Extracting => "extracting",
            JobPhase::WaitingConfirmation => "waiting_confirmation",
            JobPhase::Scoring => "scoring",
            JobPhase::Complete => "complete",
            JobPhase::Error => "error",
            JobPhase::Cancelled => "cancelled",
        }
    }
}

/// One résumé submitted to a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeInput {
    pub name: String,
    pub text: String,
}

/// Immutable for the life of a batch.
#[derive(Debug, Clone, Default)]
pub struct JobSpec {
    pub fields: Vec<ExtractionField>,
    pub criteria: JobCriteria,
}

/// Point-in-time view of a batch. Replaced wholesale on every completed unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchJob {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub phase: JobPhase,
    pub total: usize,
    pub extracted: usize,
    pub extraction_failed: usize,
    pub scored: usize,
    pub scoring_failed: usize,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub candidates: Vec<Candidate>,
}

impl BatchJob {
    pub fn new(id: Uuid, tenant_id: Uuid, total: usize) -> Self {
        let now = Utc::now();
        Self {
            id,
            tenant_id,
            phase: JobPhase::Extracting,
            total,
            extracted: 0,
            extraction_failed: 0,
            scored: 0,
            scoring_failed: 0,
            error: None,
            created_at: now,
            updated_at: now,
            candidates: Vec::new(),
        }
    }

    pub fn set_phase(&mut self, phase: JobPhase) {
        self.phase = phase;
        self.updated_at = Utc::now();
    }

    /// Replaces the candidate with the same id, or appends it.
    pub fn fold_candidate(&mut self, candidate: Candidate) {
        match self.candidates.iter_mut().find(|c| c.id == candidate.id) {
            Some(existing) => *existing = candidate,
            None => self.candidates.push(candidate),
        }
        self.updated_at = Utc::now();
    }
}

/// A candidate's position under a particular set of ranking weights.
#[derive(Debug, Clone, Serialize)]
pub struct RankedEntry {
    pub candidate_id: Uuid,
    pub name: String,
    pub algo_score: Option<u8>,
    pub final_score: Option<u8>,
    pub tier: Option<Tier>,
    pub priority: f64,
    pub fired_boosts: Vec<String>,
}

impl From<RankedCandidate<'_>> for RankedEntry {
    fn from(r: RankedCandidate<'_>) -> Self {
        Self {
            candidate_id: r.candidate.id,
            name: r.candidate.name.clone(),
            algo_score: r.candidate.algo_score,
            final_score: r.candidate.final_score,
            tier: r.candidate.tier,
            priority: r.priority,
            fired_boosts: r.fired_boosts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_replaces_by_id() {
        let mut job = BatchJob::new(Uuid::new_v4(), Uuid::new_v4(), 2);
        let mut c = Candidate::new(job.id, job.tenant_id, "Ada");
        job.fold_candidate(c.clone());
        c.algo_score = Some(64);
        job.fold_candidate(c);
        assert_eq!(job.candidates.len(), 1);
        assert_eq!(job.candidates[0].algo_score, Some(64));
    }

    #[test]
    fn test_terminal_phases() {
        assert!(!JobPhase::WaitingConfirmation.is_terminal());
        assert!(JobPhase::Cancelled.is_terminal());
        assert_eq!(JobPhase::WaitingConfirmation.as_str(), "waiting_confirmation");
    }
}
