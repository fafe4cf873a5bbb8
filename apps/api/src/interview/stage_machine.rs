//! Per-candidate interview progression: phone screen → technical → behavioral → decision.
//!
//! Stage order is fixed. A stage may start only after every earlier stage has a
//! completed interview with analytics, and the decision needs all three.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::interview::archive::{archive_key, build_dossier, ArchiveSink};
use crate::interview::context::{build_context, ContextBundle};
use crate::models::candidate::{Candidate, Decision, PipelineStatus};
use crate::models::interview::{
    Analytics, AnalyticsReport, Interview, InterviewStatus, QuestionRecord, Stage, TranscriptTurn,
};
use crate::services::{AnalysisRequest, AnalyticsService, ServiceError};
use crate::store::{PipelineStore, StageCompletion, StoreError};
use crate::transcript::{parse_transcript, KnownSpeakers, LiveTranscript, SpeechEvent, TranscriptError};

#[derive(Debug, Error)]
pub enum StageError {
    #[error("Candidate {0} has completed every interview stage")]
    StagesComplete(Uuid),

    #[error("A {} interview is already in progress", .0.as_str())]
    StageAlreadyInProgress(Stage),

    #[error("Cannot start {} before {} is complete", .stage.as_str(), .missing.as_str())]
    PriorStageIncomplete { stage: Stage, missing: Stage },

    #[error("Decision requires all three stages; {completed} completed")]
    StagesIncomplete { completed: usize },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    #[error("Interview analysis failed: {0}")]
    AnalysisFailed(#[from] ServiceError),

    #[error("Archive upload failed: {0}")]
    Archive(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the caller hands over when an interview ends.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordAnalyticsInput {
    /// Pasted free text; speakers are inferred.
    Transcript {
        raw_text: String,
        #[serde(default)]
        known_speakers: KnownSpeakers,
    },
    /// Turns already attributed by the caller.
    Turns { turns: Vec<TranscriptTurn> },
    /// Speech-to-text events captured during a live session.
    LiveEvents { events: Vec<SpeechEvent> },
    /// A finished report; the analytics service is not called. `turns` may be
    /// empty, but a supplied transcript obeys the same two-turn minimum.
    Report {
        report: AnalyticsReport,
        #[serde(default)]
        turns: Vec<TranscriptTurn>,
    },
}

/// First stage, in order, without a completed interview.
pub fn next_stage(interviews: &[Interview]) -> Option<Stage> {
    Stage::ORDER
        .into_iter()
        .find(|stage| !is_completed(interviews, *stage))
}

fn is_completed(interviews: &[Interview], stage: Stage) -> bool {
    interviews
        .iter()
        .any(|i| i.stage == stage && i.status == InterviewStatus::Completed)
}

fn status_for(stage: Stage) -> PipelineStatus {
    match stage {
        Stage::PhoneScreen => PipelineStatus::PhoneScreen,
        Stage::Technical => PipelineStatus::Technical,
        Stage::Behavioral => PipelineStatus::Behavioral,
    }
}

pub struct InterviewStageMachine {
    store: Arc<dyn PipelineStore>,
    analytics: Arc<dyn AnalyticsService>,
}

impl InterviewStageMachine {
    pub fn new(store: Arc<dyn PipelineStore>, analytics: Arc<dyn AnalyticsService>) -> Self {
        Self { store, analytics }
    }

    pub async fn next_stage(&self, candidate_id: Uuid) -> Result<Option<Stage>, StageError> {
        self.store.get_candidate(candidate_id).await?;
        let interviews = self.store.interviews_for(candidate_id).await?;
        Ok(next_stage(&interviews))
    }

    pub async fn interviews(&self, candidate_id: Uuid) -> Result<Vec<Interview>, StageError> {
        self.store.get_candidate(candidate_id).await?;
        Ok(self.store.interviews_for(candidate_id).await?)
    }

    /// Opens the requested stage (or the next one) and returns the context the
    /// interviewer should carry into it.
    pub async fn start_interview(
        &self,
        candidate_id: Uuid,
        requested: Option<Stage>,
    ) -> Result<(Interview, ContextBundle), StageError> {
        let candidate = self.store.get_candidate(candidate_id).await?;
        ensure_open(&candidate)?;

        let interviews = self.store.interviews_for(candidate_id).await?;
        let stage = match requested {
            Some(stage) => stage,
            None => next_stage(&interviews).ok_or(StageError::StagesComplete(candidate_id))?,
        };

        if is_completed(&interviews, stage) {
            return Err(StageError::InvalidTransition(format!(
                "{} is already complete",
                stage.as_str()
            )));
        }
        if interviews
            .iter()
            .any(|i| i.stage == stage && i.status.is_open())
        {
            return Err(StageError::StageAlreadyInProgress(stage));
        }
        if let Some(missing) = Stage::ORDER[..stage.index()]
            .iter()
            .copied()
            .find(|s| !is_completed(&interviews, *s))
        {
            return Err(StageError::PriorStageIncomplete { stage, missing });
        }

        let interview = match interviews
            .iter()
            .find(|i| i.stage == stage && i.status == InterviewStatus::Cancelled)
        {
            Some(cancelled) => {
                let mut reopened = cancelled.clone();
                reopened.status = InterviewStatus::Active;
                reopened.started_at = Some(Utc::now());
                reopened.cancelled_at = None;
                self.store
                    .transition_interview(&reopened, InterviewStatus::Cancelled)
                    .await
                    .map_err(|e| match e {
                        StoreError::Conflict(_) => StageError::StageAlreadyInProgress(stage),
                        other => StageError::Store(other),
                    })?;
                reopened
            }
            None => {
                let fresh = Interview::start(candidate_id, stage);
                self.store
                    .insert_interview(&fresh)
                    .await
                    .map_err(|e| match e {
                        StoreError::Conflict(_) => StageError::StageAlreadyInProgress(stage),
                        other => StageError::Store(other),
                    })?;
                fresh
            }
        };

        self.store
            .set_pipeline_status(candidate_id, status_for(stage))
            .await
            .map_err(lost_race)?;

        let context = self.context_for(&candidate, stage).await?;
        info!(
            "Candidate {candidate_id}: {} interview {} started",
            stage.as_str(),
            interview.id
        );
        Ok((interview, context))
    }

    /// Completes an active interview. Input is validated and analysed before
    /// anything is written; a failed analysis leaves the interview active.
    pub async fn record_analytics(
        &self,
        interview_id: Uuid,
        input: RecordAnalyticsInput,
    ) -> Result<Analytics, StageError> {
        let mut interview = self.store.get_interview(interview_id).await?;
        if interview.status != InterviewStatus::Active {
            return Err(StageError::InvalidTransition(format!(
                "interview {interview_id} is {}, not active",
                interview.status.as_str()
            )));
        }
        let candidate = self.store.get_candidate(interview.candidate_id).await?;

        let (turns, ready_report) = match input {
            RecordAnalyticsInput::Transcript {
                raw_text,
                mut known_speakers,
            } => {
                known_speakers.candidate.push(candidate.name.clone());
                (parse_transcript(&raw_text, &known_speakers)?, None)
            }
            RecordAnalyticsInput::Turns { turns } => (renumber(turns)?, None),
            RecordAnalyticsInput::LiveEvents { events } => {
                let mut live = LiveTranscript::new();
                for event in events {
                    live.push(event);
                }
                (live.finish()?, None)
            }
            RecordAnalyticsInput::Report { report, turns } => {
                if report.overall_score > 100 {
                    return Err(StageError::Validation(format!(
                        "overall_score must be 0-100, got {}",
                        report.overall_score
                    )));
                }
                let turns = if turns.is_empty() {
                    turns
                } else {
                    renumber(turns)?
                };
                (turns, Some(report))
            }
        };

        let report = match ready_report {
            Some(report) => report,
            None => {
                let context = self.context_for(&candidate, interview.stage).await?;
                self.analytics
                    .analyze(AnalysisRequest {
                        candidate: &candidate,
                        stage: interview.stage,
                        turns: &turns,
                        context: &context,
                    })
                    .await
                    .inspect_err(|e| {
                        warn!("Interview {interview_id}: analysis failed: {e}");
                    })?
            }
        };

        let now = Utc::now();
        interview.status = InterviewStatus::Completed;
        interview.completed_at = Some(now);

        let analytics = Analytics {
            interview_id,
            candidate_id: candidate.id,
            stage: interview.stage,
            report,
            created_at: now,
        };
        let questions: Vec<QuestionRecord> = analytics
            .report
            .question_breakdown
            .iter()
            .map(|q| QuestionRecord::from_assessment(&analytics, q))
            .collect();

        let mut interviews = self.store.interviews_for(candidate.id).await?;
        if let Some(current) = interviews.iter_mut().find(|i| i.id == interview_id) {
            *current = interview.clone();
        }
        let pipeline_status = match next_stage(&interviews) {
            None => PipelineStatus::DecisionPending,
            Some(_) => status_for(interview.stage),
        };

        // Commits only if the interview is still active; a cancel or archive
        // that landed during analysis wins.
        self.store
            .complete_stage(&StageCompletion {
                interview,
                turns,
                analytics: analytics.clone(),
                questions,
                pipeline_status,
            })
            .await
            .map_err(lost_race)?;

        info!(
            "Interview {interview_id}: {} analytics recorded (score {})",
            analytics.stage.as_str(),
            analytics.report.overall_score
        );
        Ok(analytics)
    }

    /// Sole writer of the final decision.
    pub async fn submit_decision(
        &self,
        candidate_id: Uuid,
        decision: Decision,
        notes: Option<String>,
    ) -> Result<Candidate, StageError> {
        let candidate = self.store.get_candidate(candidate_id).await?;
        ensure_open(&candidate)?;

        let interviews = self.store.interviews_for(candidate_id).await?;
        let completed = Stage::ORDER
            .iter()
            .filter(|s| is_completed(&interviews, **s))
            .count();
        if completed < Stage::ORDER.len() {
            return Err(StageError::StagesIncomplete { completed });
        }

        let candidate = self
            .store
            .record_decision(candidate_id, decision, notes.as_deref(), Utc::now())
            .await
            .map_err(lost_race)?;

        info!("Candidate {candidate_id}: decision {}", decision.as_str());
        Ok(candidate)
    }

    /// Cancels an open interview. The stage can be started again later.
    pub async fn cancel_interview(&self, interview_id: Uuid) -> Result<Interview, StageError> {
        let mut interview = self.store.get_interview(interview_id).await?;
        if !interview.status.is_open() {
            return Err(StageError::InvalidTransition(format!(
                "interview {interview_id} is {}",
                interview.status.as_str()
            )));
        }
        let from = interview.status;
        interview.status = InterviewStatus::Cancelled;
        interview.cancelled_at = Some(Utc::now());
        self.store
            .transition_interview(&interview, from)
            .await
            .map_err(lost_race)?;

        let candidate = self.store.get_candidate(interview.candidate_id).await?;
        if ensure_open(&candidate).is_ok()
            && candidate.pipeline_status == status_for(interview.stage)
        {
            let rolled_back = interview
                .stage
                .previous()
                .map(status_for)
                .unwrap_or(PipelineStatus::New);
            match self
                .store
                .set_pipeline_status(candidate.id, rolled_back)
                .await
            {
                // Decided or archived in the meantime; that status stands.
                Ok(()) | Err(StoreError::Conflict(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!("Interview {interview_id} cancelled");
        Ok(interview)
    }

    /// Uploads the candidate's dossier, then stamps `archived_at`. A failed
    /// upload leaves the candidate unarchived.
    pub async fn archive_candidate(
        &self,
        candidate_id: Uuid,
        sink: &dyn ArchiveSink,
    ) -> Result<Candidate, StageError> {
        let candidate = self.store.get_candidate(candidate_id).await?;
        if candidate.archived_at.is_some() {
            return Err(StageError::InvalidTransition(format!(
                "candidate {candidate_id} is already archived"
            )));
        }

        let now = Utc::now();
        let mut dossier = build_dossier(self.store.as_ref(), candidate_id, now).await?;
        let seen_updated_at = dossier.candidate.updated_at;
        dossier.candidate.archived_at = Some(now);
        dossier.candidate.updated_at = now;

        let body = serde_json::to_vec_pretty(&dossier)
            .map_err(|e| StageError::Archive(format!("dossier serialization: {e}")))?;
        let key = archive_key(&dossier.candidate);
        sink.put(&key, Bytes::from(body))
            .await
            .map_err(StageError::Archive)?;

        // A stage completed after the dossier was read makes this a conflict;
        // the next attempt overwrites the same key.
        let archived = self
            .store
            .mark_archived(candidate_id, seen_updated_at, now)
            .await
            .map_err(lost_race)?;
        info!("Candidate {candidate_id} archived to {key}");
        Ok(archived)
    }

    /// Context from every stage before `stage`.
    async fn context_for(
        &self,
        candidate: &Candidate,
        stage: Stage,
    ) -> Result<ContextBundle, StageError> {
        let prior: Vec<Analytics> = self
            .store
            .analytics_for(candidate.id)
            .await?
            .into_iter()
            .filter(|a| a.stage < stage)
            .collect();
        let records: Vec<QuestionRecord> = self
            .store
            .questions_for(candidate.id)
            .await?
            .into_iter()
            .filter(|q| q.stage < stage)
            .collect();
        let suggested = candidate
            .assessment
            .as_ref()
            .map(|a| a.interview_questions.as_slice())
            .unwrap_or_default();
        Ok(build_context(&prior, &records, suggested))
    }
}

/// A conditional store write found the row already moved on.
fn lost_race(e: StoreError) -> StageError {
    match e {
        StoreError::Conflict(msg) => StageError::InvalidTransition(msg),
        other => StageError::Store(other),
    }
}

/// Decided or archived candidates accept no further transitions.
fn ensure_open(candidate: &Candidate) -> Result<(), StageError> {
    if candidate.final_decision.is_some() || candidate.pipeline_status.is_terminal() {
        return Err(StageError::InvalidTransition(format!(
            "candidate {} already has a decision",
            candidate.id
        )));
    }
    if candidate.archived_at.is_some() {
        return Err(StageError::InvalidTransition(format!(
            "candidate {} is archived",
            candidate.id
        )));
    }
    Ok(())
}

fn renumber(mut turns: Vec<TranscriptTurn>) -> Result<Vec<TranscriptTurn>, TranscriptError> {
    turns.retain(|t| !t.text.trim().is_empty());
    if turns.len() < 2 {
        return Err(TranscriptError::Unparseable { turns: turns.len() });
    }
    for (i, turn) in turns.iter_mut().enumerate() {
        turn.position = i as u32;
    }
    Ok(turns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::candidate::AiAssessment;
    use crate::models::interview::Recommendation;
    use crate::store::MemoryStore;
    use crate::testing::{FakeAnalytics, MemoryArchive};
    use std::collections::BTreeMap;
    use std::time::Duration;

    struct Fixture {
        machine: InterviewStageMachine,
        store: Arc<MemoryStore>,
        candidate: Candidate,
    }

    async fn fixture(analytics: FakeAnalytics) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let mut candidate = Candidate::new(Uuid::new_v4(), Uuid::new_v4(), "Jordan Lee");
        candidate.algo_score = Some(70);
        candidate.apply_assessment(AiAssessment {
            ai_score: 80,
            interview_questions: vec![
                "Tell me about pricing negotiation?".to_string(),
                "What is your biggest deal?".to_string(),
            ],
            ..Default::default()
        });
        store.insert_candidate(&candidate).await.unwrap();
        Fixture {
            machine: InterviewStageMachine::new(store.clone(), Arc::new(analytics)),
            store,
            candidate,
        }
    }

    fn transcript(question: &str) -> RecordAnalyticsInput {
        RecordAnalyticsInput::Transcript {
            raw_text: format!("Interviewer: {question}\nJordan Lee: Happy to walk you through it."),
            known_speakers: KnownSpeakers::default(),
        }
    }

    async fn complete_stage(f: &Fixture, question: &str) -> Analytics {
        let (interview, _) = f.machine.start_interview(f.candidate.id, None).await.unwrap();
        f.machine
            .record_analytics(interview.id, transcript(question))
            .await
            .unwrap()
    }

    fn interview_with(stage: Stage, status: InterviewStatus) -> Interview {
        let mut i = Interview::start(Uuid::nil(), stage);
        i.status = status;
        i
    }

    #[test]
    fn test_next_stage_is_first_incomplete_for_every_subset() {
        for mask in 0u8..8 {
            let interviews: Vec<Interview> = Stage::ORDER
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, s)| interview_with(*s, InterviewStatus::Completed))
                .collect();
            let expected = Stage::ORDER
                .iter()
                .enumerate()
                .find(|(i, _)| mask & (1 << i) == 0)
                .map(|(_, s)| *s);
            assert_eq!(next_stage(&interviews), expected, "mask {mask:03b}");
        }
    }

    #[test]
    fn test_open_or_cancelled_interviews_do_not_count_as_complete() {
        let interviews = vec![
            interview_with(Stage::PhoneScreen, InterviewStatus::Active),
            interview_with(Stage::Technical, InterviewStatus::Cancelled),
        ];
        assert_eq!(next_stage(&interviews), Some(Stage::PhoneScreen));
    }

    #[tokio::test]
    async fn test_full_pipeline_carries_topics_between_stages() {
        let f = fixture(FakeAnalytics {
            topics_to_probe: vec!["pricing negotiation".to_string()],
            ..Default::default()
        })
        .await;

        let screen = complete_stage(&f, "Why are you leaving your role?").await;
        assert_eq!(screen.stage, Stage::PhoneScreen);

        let (technical, context) = f.machine.start_interview(f.candidate.id, None).await.unwrap();
        assert_eq!(technical.stage, Stage::Technical);
        assert!(context
            .topics_to_explore
            .contains(&"pricing negotiation".to_string()));
        assert_eq!(
            context.questions_to_avoid,
            vec!["Why are you leaving your role?".to_string()]
        );
        assert_eq!(context.prior_score_history.len(), 1);
        assert_eq!(
            context.prior_score_history[0].recommendation,
            Recommendation::Hire
        );

        f.machine
            .record_analytics(technical.id, transcript("Tell me about pricing negotiation?"))
            .await
            .unwrap();

        let (_, behavioral_ctx) = f.machine.start_interview(f.candidate.id, None).await.unwrap();
        // Technical answered the topic strongly, and re-raised it as a probe.
        assert_eq!(
            behavioral_ctx.topics_to_explore,
            vec!["pricing negotiation".to_string()]
        );
        assert!(!behavioral_ctx
            .suggested_questions
            .contains(&"Tell me about pricing negotiation?".to_string()));
        assert!(behavioral_ctx
            .suggested_questions
            .contains(&"What is your biggest deal?".to_string()));
    }

    #[tokio::test]
    async fn test_answered_topic_is_dropped_when_not_re_raised() {
        let f = fixture(FakeAnalytics::default()).await;
        let (screen, _) = f.machine.start_interview(f.candidate.id, None).await.unwrap();
        f.machine
            .record_analytics(
                screen.id,
                RecordAnalyticsInput::Report {
                    report: AnalyticsReport {
                        topics_to_probe: vec!["pricing negotiation".to_string()],
                        ..ready_report(70)
                    },
                    turns: vec![],
                },
            )
            .await
            .unwrap();

        let (technical, ctx) = f.machine.start_interview(f.candidate.id, None).await.unwrap();
        assert_eq!(ctx.topics_to_explore, vec!["pricing negotiation".to_string()]);
        f.machine
            .record_analytics(technical.id, transcript("Tell me about pricing negotiation?"))
            .await
            .unwrap();

        let (_, ctx) = f.machine.start_interview(f.candidate.id, None).await.unwrap();
        assert!(ctx.topics_to_explore.is_empty());
    }

    #[tokio::test]
    async fn test_stage_already_in_progress() {
        let f = fixture(FakeAnalytics::default()).await;
        f.machine.start_interview(f.candidate.id, None).await.unwrap();
        let err = f
            .machine
            .start_interview(f.candidate.id, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StageError::StageAlreadyInProgress(Stage::PhoneScreen)
        ));
    }

    #[tokio::test]
    async fn test_prior_stage_incomplete() {
        let f = fixture(FakeAnalytics::default()).await;
        let err = f
            .machine
            .start_interview(f.candidate.id, Some(Stage::Behavioral))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StageError::PriorStageIncomplete {
                stage: Stage::Behavioral,
                missing: Stage::PhoneScreen
            }
        ));

        // An active (not completed) screen still blocks the technical round.
        f.machine.start_interview(f.candidate.id, None).await.unwrap();
        let err = f
            .machine
            .start_interview(f.candidate.id, Some(Stage::Technical))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::PriorStageIncomplete { .. }));
    }

    #[tokio::test]
    async fn test_decision_requires_all_three_stages() {
        let f = fixture(FakeAnalytics::default()).await;
        for expected_completed in 0..3 {
            let err = f
                .machine
                .submit_decision(f.candidate.id, Decision::Accepted, None)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                StageError::StagesIncomplete { completed } if completed == expected_completed
            ));
            complete_stage(&f, "Tell me about your quota?").await;
        }

        let stored = f.store.get_candidate(f.candidate.id).await.unwrap();
        assert_eq!(stored.pipeline_status, PipelineStatus::DecisionPending);
        assert!(matches!(
            f.machine.start_interview(f.candidate.id, None).await,
            Err(StageError::StagesComplete(_))
        ));

        let decided = f
            .machine
            .submit_decision(f.candidate.id, Decision::Rejected, Some("Comp mismatch".into()))
            .await
            .unwrap();
        assert_eq!(decided.pipeline_status, PipelineStatus::Rejected);
        assert!(decided.decided_at.is_some());

        // Terminal: no second decision and no new interviews.
        assert!(matches!(
            f.machine
                .submit_decision(f.candidate.id, Decision::Accepted, None)
                .await,
            Err(StageError::InvalidTransition(_))
        ));
        assert!(matches!(
            f.machine.start_interview(f.candidate.id, None).await,
            Err(StageError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_analysis_leaves_interview_active() {
        let f = fixture(FakeAnalytics {
            fail: true,
            ..Default::default()
        })
        .await;
        let (interview, _) = f.machine.start_interview(f.candidate.id, None).await.unwrap();
        let err = f
            .machine
            .record_analytics(interview.id, transcript("Why sales?"))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::AnalysisFailed(_)));

        let stored = f.store.get_interview(interview.id).await.unwrap();
        assert_eq!(stored.status, InterviewStatus::Active);
        assert!(f.store.analytics_for(f.candidate.id).await.unwrap().is_empty());
        assert!(f.store.transcript_for(interview.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_transcript_is_rejected_before_any_write() {
        let f = fixture(FakeAnalytics::default()).await;
        let (interview, _) = f.machine.start_interview(f.candidate.id, None).await.unwrap();
        let err = f
            .machine
            .record_analytics(
                interview.id,
                RecordAnalyticsInput::Transcript {
                    raw_text: "   ".to_string(),
                    known_speakers: KnownSpeakers::default(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Transcript(_)));
        assert_eq!(
            f.store.get_interview(interview.id).await.unwrap().status,
            InterviewStatus::Active
        );
    }

    #[tokio::test]
    async fn test_recording_twice_is_rejected() {
        let f = fixture(FakeAnalytics::default()).await;
        let analytics = complete_stage(&f, "Why sales?").await;
        let err = f
            .machine
            .record_analytics(analytics.interview_id, transcript("Again?"))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_cancelled_interview_can_be_reopened() {
        let f = fixture(FakeAnalytics::default()).await;
        let (first, _) = f.machine.start_interview(f.candidate.id, None).await.unwrap();
        let cancelled = f.machine.cancel_interview(first.id).await.unwrap();
        assert_eq!(cancelled.status, InterviewStatus::Cancelled);
        assert_eq!(
            f.store.get_candidate(f.candidate.id).await.unwrap().pipeline_status,
            PipelineStatus::New
        );
        assert!(f.machine.cancel_interview(first.id).await.is_err());

        let (again, _) = f.machine.start_interview(f.candidate.id, None).await.unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.status, InterviewStatus::Active);
        assert_eq!(f.machine.interviews(f.candidate.id).await.unwrap().len(), 1);
    }

    fn ready_report(score: u8) -> AnalyticsReport {
        AnalyticsReport {
            overall_score: score,
            recommendation: Recommendation::LeanHire,
            question_breakdown: vec![],
            skill_evidence: vec![],
            behavioral_profile: BTreeMap::new(),
            topics_to_probe: vec![],
        }
    }

    fn slow_analytics() -> FakeAnalytics {
        FakeAnalytics {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_cancel_during_analysis_is_not_overwritten() {
        let f = fixture(slow_analytics()).await;
        let (interview, _) = f.machine.start_interview(f.candidate.id, None).await.unwrap();

        let (recorded, cancelled) = tokio::join!(
            f.machine.record_analytics(interview.id, transcript("Why sales?")),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                f.machine.cancel_interview(interview.id).await
            }
        );
        cancelled.unwrap();
        assert!(matches!(recorded, Err(StageError::InvalidTransition(_))));

        assert_eq!(
            f.store.get_interview(interview.id).await.unwrap().status,
            InterviewStatus::Cancelled
        );
        assert!(f.store.analytics_for(f.candidate.id).await.unwrap().is_empty());
        assert!(f.store.transcript_for(interview.id).await.unwrap().is_empty());
        assert_eq!(
            f.store.get_candidate(f.candidate.id).await.unwrap().pipeline_status,
            PipelineStatus::New
        );
    }

    #[tokio::test]
    async fn test_archive_during_analysis_blocks_completion() {
        let f = fixture(slow_analytics()).await;
        let (interview, _) = f.machine.start_interview(f.candidate.id, None).await.unwrap();
        let sink = MemoryArchive::default();

        let (recorded, archived) = tokio::join!(
            f.machine.record_analytics(interview.id, transcript("Why sales?")),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                f.machine.archive_candidate(f.candidate.id, &sink).await
            }
        );
        assert!(archived.unwrap().archived_at.is_some());
        assert!(matches!(recorded, Err(StageError::InvalidTransition(_))));

        // The uploaded dossier still describes the stored state.
        assert!(f.store.analytics_for(f.candidate.id).await.unwrap().is_empty());
        assert_eq!(
            f.store.get_interview(interview.id).await.unwrap().status,
            InterviewStatus::Active
        );
    }

    #[tokio::test]
    async fn test_ready_report_turns_need_at_least_two() {
        let f = fixture(FakeAnalytics::default()).await;
        let (interview, _) = f.machine.start_interview(f.candidate.id, None).await.unwrap();
        let lone_turn = TranscriptTurn {
            position: 7,
            role: crate::models::interview::SpeakerRole::Interviewer,
            speaker_label: None,
            text: "Tell me about churn?".to_string(),
            is_question: true,
            timestamp: None,
        };

        let err = f
            .machine
            .record_analytics(
                interview.id,
                RecordAnalyticsInput::Report {
                    report: ready_report(70),
                    turns: vec![lone_turn.clone()],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Transcript(_)));
        assert_eq!(
            f.store.get_interview(interview.id).await.unwrap().status,
            InterviewStatus::Active
        );

        let reply = TranscriptTurn {
            role: crate::models::interview::SpeakerRole::Candidate,
            text: "We cut it by half.".to_string(),
            is_question: false,
            ..lone_turn.clone()
        };
        f.machine
            .record_analytics(
                interview.id,
                RecordAnalyticsInput::Report {
                    report: ready_report(70),
                    turns: vec![lone_turn, reply],
                },
            )
            .await
            .unwrap();
        let stored = f.store.transcript_for(interview.id).await.unwrap();
        assert_eq!(
            stored.iter().map(|t| t.position).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[tokio::test]
    async fn test_live_events_complete_a_stage() {
        let f = fixture(FakeAnalytics::default()).await;
        let (interview, _) = f.machine.start_interview(f.candidate.id, None).await.unwrap();
        let events = vec![
            SpeechEvent {
                role: crate::models::interview::SpeakerRole::Interviewer,
                text: "Tell me about churn?".to_string(),
                is_final: true,
                timestamp: None,
            },
            SpeechEvent {
                role: crate::models::interview::SpeakerRole::Candidate,
                text: "We cut it by half.".to_string(),
                is_final: true,
                timestamp: None,
            },
        ];
        let analytics = f
            .machine
            .record_analytics(interview.id, RecordAnalyticsInput::LiveEvents { events })
            .await
            .unwrap();
        assert_eq!(analytics.report.question_breakdown[0].topic, "churn");
        assert_eq!(f.store.transcript_for(interview.id).await.unwrap().len(), 2);
        assert_eq!(
            f.machine.next_stage(f.candidate.id).await.unwrap(),
            Some(Stage::Technical)
        );
    }

    #[tokio::test]
    async fn test_archive_uploads_dossier_then_stamps() {
        let f = fixture(FakeAnalytics::default()).await;
        complete_stage(&f, "Tell me about your quota?").await;

        let sink = MemoryArchive::default();
        let archived = f
            .machine
            .archive_candidate(f.candidate.id, &sink)
            .await
            .unwrap();
        assert!(archived.archived_at.is_some());

        let objects = sink.objects.lock().unwrap();
        assert_eq!(objects.len(), 1);
        let (key, body) = &objects[0];
        assert_eq!(
            key,
            &format!("archives/{}/{}.json", f.candidate.tenant_id, f.candidate.id)
        );
        let dossier: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(dossier["interviews"].as_array().unwrap().len(), 1);
        assert_eq!(
            dossier["interviews"][0]["transcript"].as_array().unwrap().len(),
            2
        );
        assert_eq!(dossier["analytics"][0]["overall_score"], 75);
        drop(objects);

        assert!(matches!(
            f.machine.archive_candidate(f.candidate.id, &sink).await,
            Err(StageError::InvalidTransition(_))
        ));
        assert!(matches!(
            f.machine.start_interview(f.candidate.id, None).await,
            Err(StageError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_candidate_unarchived() {
        let f = fixture(FakeAnalytics::default()).await;
        let sink = MemoryArchive {
            fail: true,
            ..Default::default()
        };
        let err = f
            .machine
            .archive_candidate(f.candidate.id, &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Archive(_)));
        assert!(f
            .store
            .get_candidate(f.candidate.id)
            .await
            .unwrap()
            .archived_at
            .is_none());
    }

    #[test]
    fn test_record_input_wire_format() {
        let input: RecordAnalyticsInput = serde_json::from_str(
            r#"{"kind": "transcript", "raw_text": "Interviewer: Hi?\nCandidate: Hello."}"#,
        )
        .unwrap();
        assert!(matches!(input, RecordAnalyticsInput::Transcript { .. }));
    }
}
