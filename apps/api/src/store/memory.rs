use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::candidate::{Candidate, CandidateScores, Decision, PipelineStatus};
use crate::models::interview::{
    Analytics, Interview, InterviewStatus, QuestionRecord, TranscriptTurn,
};
use crate::store::{PipelineStore, StageCompletion, StoreError};

#[derive(Default)]
struct Tables {
    candidates: HashMap<Uuid, Candidate>,
    interviews: HashMap<Uuid, Interview>,
    transcripts: HashMap<Uuid, Vec<TranscriptTurn>>,
    analytics: HashMap<Uuid, Analytics>,
    questions: Vec<QuestionRecord>,
}

/// In-process store. One lock over all tables so `complete_stage` is atomic.
impl Tables {
    fn candidate_mut(&mut self, id: Uuid) -> Result<&mut Candidate, StoreError> {
        self.candidates.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "candidate",
            id,
        })
    }

    /// Undecided and unarchived, the only state interview writes may touch.
    fn open_candidate_mut(&mut self, id: Uuid) -> Result<&mut Candidate, StoreError> {
        let candidate = self.candidate_mut(id)?;
        if candidate.final_decision.is_some() || candidate.archived_at.is_some() {
            return Err(StoreError::Conflict(format!(
                "candidate {id} is decided or archived"
            )));
        }
        Ok(candidate)
    }

    fn interview_in(&self, id: Uuid, from: InterviewStatus) -> Result<(), StoreError> {
        match self.interviews.get(&id) {
            None => Err(StoreError::NotFound {
                entity: "interview",
                id,
            }),
            Some(i) if i.status != from => Err(StoreError::Conflict(format!(
                "interview {id} is {}, not {}",
                i.status.as_str(),
                from.as_str()
            ))),
            Some(_) => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PipelineStore for MemoryStore {
    async fn insert_candidate(&self, candidate: &Candidate) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if t.candidates.contains_key(&candidate.id) {
            return Err(StoreError::Conflict(format!(
                "candidate {} already exists",
                candidate.id
            )));
        }
        t.candidates.insert(candidate.id, candidate.clone());
        Ok(())
    }

    async fn get_candidate(&self, id: Uuid) -> Result<Candidate, StoreError> {
        self.tables
            .read()
            .await
            .candidates
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "candidate",
                id,
            })
    }

    async fn candidates_for_job(&self, job_id: Uuid) -> Result<Vec<Candidate>, StoreError> {
        let t = self.tables.read().await;
        let mut out: Vec<Candidate> = t
            .candidates
            .values()
            .filter(|c| c.job_id == job_id)
            .cloned()
            .collect();
        out.sort_by_key(|c| (c.created_at, c.id));
        Ok(out)
    }

    async fn record_scores(
        &self,
        id: Uuid,
        scores: &CandidateScores,
    ) -> Result<Candidate, StoreError> {
        let mut t = self.tables.write().await;
        let candidate = t.candidate_mut(id)?;
        candidate.apply_scores(scores);
        Ok(candidate.clone())
    }

    async fn set_pipeline_status(
        &self,
        id: Uuid,
        status: PipelineStatus,
    ) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        let candidate = t.open_candidate_mut(id)?;
        candidate.pipeline_status = status;
        candidate.updated_at = Utc::now();
        Ok(())
    }

    async fn record_decision(
        &self,
        id: Uuid,
        decision: Decision,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Candidate, StoreError> {
        let mut t = self.tables.write().await;
        let candidate = t.open_candidate_mut(id)?;
        candidate.final_decision = Some(decision);
        candidate.decision_notes = notes.map(String::from);
        candidate.decided_at = Some(at);
        candidate.pipeline_status = decision.into();
        candidate.updated_at = at;
        Ok(candidate.clone())
    }

    async fn mark_archived(
        &self,
        id: Uuid,
        seen_updated_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<Candidate, StoreError> {
        let mut t = self.tables.write().await;
        let candidate = t.candidate_mut(id)?;
        if candidate.archived_at.is_some() || candidate.updated_at != seen_updated_at {
            return Err(StoreError::Conflict(format!(
                "candidate {id} changed or was archived while archiving"
            )));
        }
        candidate.archived_at = Some(at);
        candidate.updated_at = at;
        Ok(candidate.clone())
    }

    async fn insert_interview(&self, interview: &Interview) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        let taken = t
            .interviews
            .values()
            .any(|i| i.candidate_id == interview.candidate_id && i.stage == interview.stage);
        if taken {
            return Err(StoreError::Conflict(format!(
                "candidate {} already has a {} interview",
                interview.candidate_id,
                interview.stage.as_str()
            )));
        }
        t.interviews.insert(interview.id, interview.clone());
        Ok(())
    }

    async fn transition_interview(
        &self,
        interview: &Interview,
        from: InterviewStatus,
    ) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        t.interview_in(interview.id, from)?;
        t.interviews.insert(interview.id, interview.clone());
        Ok(())
    }

    async fn get_interview(&self, id: Uuid) -> Result<Interview, StoreError> {
        self.tables
            .read()
            .await
            .interviews
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "interview",
                id,
            })
    }

    async fn interviews_for(&self, candidate_id: Uuid) -> Result<Vec<Interview>, StoreError> {
        let t = self.tables.read().await;
        let mut out: Vec<Interview> = t
            .interviews
            .values()
            .filter(|i| i.candidate_id == candidate_id)
            .cloned()
            .collect();
        out.sort_by_key(|i| i.stage);
        Ok(out)
    }

    async fn transcript_for(&self, interview_id: Uuid) -> Result<Vec<TranscriptTurn>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .transcripts
            .get(&interview_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn analytics_for(&self, candidate_id: Uuid) -> Result<Vec<Analytics>, StoreError> {
        let t = self.tables.read().await;
        let mut out: Vec<Analytics> = t
            .analytics
            .values()
            .filter(|a| a.candidate_id == candidate_id)
            .cloned()
            .collect();
        out.sort_by_key(|a| a.stage);
        Ok(out)
    }

    async fn questions_for(&self, candidate_id: Uuid) -> Result<Vec<QuestionRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .questions
            .iter()
            .filter(|q| q.candidate_id == candidate_id)
            .cloned()
            .collect())
    }

    async fn complete_stage(&self, completion: &StageCompletion) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        let interview_id = completion.interview.id;
        t.interview_in(interview_id, InterviewStatus::Active)?;
        if t.analytics.contains_key(&interview_id) {
            return Err(StoreError::Conflict(format!(
                "interview {interview_id} already has analytics"
            )));
        }
        let candidate = t.open_candidate_mut(completion.interview.candidate_id)?;
        candidate.pipeline_status = completion.pipeline_status;
        candidate.updated_at = completion.analytics.created_at;

        t.interviews
            .insert(interview_id, completion.interview.clone());
        t.transcripts
            .insert(interview_id, completion.turns.clone());
        t.analytics
            .insert(interview_id, completion.analytics.clone());
        t.questions.extend(completion.questions.iter().cloned());
        Ok(())
    }
}
