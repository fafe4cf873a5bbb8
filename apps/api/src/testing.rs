//! Deterministic stand-ins for the external services, shared by unit tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::models::candidate::{
    AiAssessment, AttributeMap, AttributeValue, Candidate, ExtractionField, JobCriteria,
};
use crate::models::interview::{
    AnalyticsReport, AnswerQuality, QuestionAssessment, Recommendation, SpeakerRole,
};
use crate::interview::archive::ArchiveSink;
use crate::services::{
    AnalysisRequest, AnalyticsService, ExtractionService, ScoringService, ServiceError,
};

/// Reads `key=value` tokens from the résumé text. The words `garbled` and
/// `unavailable` trigger a per-candidate failure and an outage respectively.
#[derive(Default)]
pub struct FakeExtractor {
    delay: Option<Duration>,
}

impl FakeExtractor {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ExtractionService for FakeExtractor {
    async fn extract(
        &self,
        resume_text: &str,
        _fields: &[ExtractionField],
    ) -> Result<AttributeMap, ServiceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if resume_text.contains("unavailable") {
            return Err(ServiceError::Unavailable {
                service: "extraction",
                message: "503 from fake".to_string(),
            });
        }
        if resume_text.contains("garbled") {
            return Err(ServiceError::Failed {
                service: "extraction",
                message: "could not read résumé".to_string(),
            });
        }

        Ok(resume_text
            .split_whitespace()
            .filter_map(|token| token.split_once('='))
            .map(|(key, raw)| {
                let value = match raw {
                    "true" => AttributeValue::Bool(true),
                    "false" => AttributeValue::Bool(false),
                    _ => raw
                        .parse::<f64>()
                        .map(AttributeValue::Number)
                        .unwrap_or_else(|_| AttributeValue::Text(raw.to_string())),
                };
                (key.to_string(), value)
            })
            .collect())
    }
}

/// Scores every candidate 70 and suggests one screening question.
#[derive(Default)]
pub struct FakeScorer;

#[async_trait]
impl ScoringService for FakeScorer {
    async fn score(
        &self,
        candidate: &Candidate,
        _criteria: &JobCriteria,
    ) -> Result<AiAssessment, ServiceError> {
        Ok(AiAssessment {
            ai_score: 70,
            one_line_summary: format!("{} looks plausible", candidate.name),
            interview_questions: vec!["Tell me about pricing negotiation?".to_string()],
            ..Default::default()
        })
    }
}

/// Grades every interviewer question as strong. The topic is whatever follows
/// "about" in the question. `delay` holds the analysis open.
#[derive(Default)]
pub struct FakeAnalytics {
    pub topics_to_probe: Vec<String>,
    pub fail: bool,
    pub delay: Option<Duration>,
}

#[async_trait]
impl AnalyticsService for FakeAnalytics {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<AnalyticsReport, ServiceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ServiceError::Failed {
                service: "analytics",
                message: "model returned nonsense".to_string(),
            });
        }

        let question_breakdown = request
            .turns
            .iter()
            .filter(|t| t.role == SpeakerRole::Interviewer && t.is_question)
            .map(|t| QuestionAssessment {
                question: t.text.clone(),
                topic: t
                    .text
                    .split_once("about ")
                    .map(|(_, rest)| rest.trim_end_matches('?').trim().to_lowercase())
                    .unwrap_or_default(),
                answer_quality: AnswerQuality::Strong,
                notes: String::new(),
            })
            .collect();

        Ok(AnalyticsReport {
            overall_score: 75,
            recommendation: Recommendation::Hire,
            question_breakdown,
            skill_evidence: vec![],
            behavioral_profile: Default::default(),
            topics_to_probe: self.topics_to_probe.clone(),
        })
    }
}

/// Keeps uploaded dossiers in memory. `fail` rejects every upload.
#[derive(Default)]
pub struct MemoryArchive {
    pub objects: Mutex<Vec<(String, Bytes)>>,
    pub fail: bool,
}

#[async_trait]
impl ArchiveSink for MemoryArchive {
    async fn put(&self, key: &str, body: Bytes) -> Result<(), String> {
        if self.fail {
            return Err("bucket unreachable".to_string());
        }
        self.objects
            .lock()
            .unwrap()
            .push((key.to_string(), body));
        Ok(())
    }
}
