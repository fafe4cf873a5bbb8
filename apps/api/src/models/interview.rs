use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::candidate::UnknownLabel;

/// The fixed interview rounds, in the order they must be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PhoneScreen,
    Technical,
    Behavioral,
}

impl Stage {
    pub const ORDER: [Stage; 3] = [Stage::PhoneScreen, Stage::Technical, Stage::Behavioral];

    pub fn index(&self) -> usize {
        match self {
            Stage::PhoneScreen => 0,
            Stage::Technical => 1,
            Stage::Behavioral => 2,
        }
    }

    pub fn previous(&self) -> Option<Stage> {
        match self {
            Stage::PhoneScreen => None,
            Stage::Technical => Some(Stage::PhoneScreen),
            Stage::Behavioral => Some(Stage::Technical),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::PhoneScreen => "phone_screen",
            Stage::Technical => "technical",
            Stage::Behavioral => "behavioral",
        }
    }
}

impl FromStr for Stage {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "phone_screen" => Ok(Stage::PhoneScreen),
            "technical" => Ok(Stage::Technical),
            "behavioral" => Ok(Stage::Behavioral),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

impl InterviewStatus {
    /// Scheduled and active interviews block a second start of the same stage.
    pub fn is_open(&self) -> bool {
        matches!(self, InterviewStatus::Scheduled | InterviewStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStatus::Scheduled => "scheduled",
            InterviewStatus::Active => "active",
            InterviewStatus::Completed => "completed",
            InterviewStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for InterviewStatus {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(InterviewStatus::Scheduled),
            "active" => Ok(InterviewStatus::Active),
            "completed" => Ok(InterviewStatus::Completed),
            "cancelled" => Ok(InterviewStatus::Cancelled),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interview {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub stage: Stage,
    pub status: InterviewStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Interview {
    pub fn start(candidate_id: Uuid, stage: Stage) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            candidate_id,
            stage,
            status: InterviewStatus::Active,
            started_at: Some(now),
            completed_at: None,
            cancelled_at: None,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    Interviewer,
    Candidate,
}

impl SpeakerRole {
    pub fn other(&self) -> SpeakerRole {
        match self {
            SpeakerRole::Interviewer => SpeakerRole::Candidate,
            SpeakerRole::Candidate => SpeakerRole::Interviewer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub position: u32,
    pub role: SpeakerRole,
    /// The label as written in the source text, if there was one.
    pub speaker_label: Option<String>,
    pub text: String,
    #[serde(default)]
    pub is_question: bool,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongHire,
    Hire,
    LeanHire,
    LeanNoHire,
    NoHire,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::StrongHire => "strong_hire",
            Recommendation::Hire => "hire",
            Recommendation::LeanHire => "lean_hire",
            Recommendation::LeanNoHire => "lean_no_hire",
            Recommendation::NoHire => "no_hire",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerQuality {
    Strong,
    Adequate,
    Weak,
}

impl AnswerQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerQuality::Strong => "strong",
            AnswerQuality::Adequate => "adequate",
            AnswerQuality::Weak => "weak",
        }
    }
}

impl FromStr for AnswerQuality {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strong" => Ok(AnswerQuality::Strong),
            "adequate" => Ok(AnswerQuality::Adequate),
            "weak" => Ok(AnswerQuality::Weak),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAssessment {
    pub question: String,
    #[serde(default)]
    pub topic: String,
    pub answer_quality: AnswerQuality,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillEvidence {
    pub skill: String,
    pub evidence: String,
    /// 0.0 – 1.0
    pub strength: f32,
}

/// What the analytics service produces for one finished interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub overall_score: u8,
    pub recommendation: Recommendation,
    #[serde(default)]
    pub question_breakdown: Vec<QuestionAssessment>,
    #[serde(default)]
    pub skill_evidence: Vec<SkillEvidence>,
    /// trait name → 0.0 – 1.0
    #[serde(default)]
    pub behavioral_profile: BTreeMap<String, f32>,
    /// Follow-ups handed to the next stage's interviewer.
    #[serde(default)]
    pub topics_to_probe: Vec<String>,
}

/// An `AnalyticsReport` attached to its interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    pub interview_id: Uuid,
    pub candidate_id: Uuid,
    pub stage: Stage,
    #[serde(flatten)]
    pub report: AnalyticsReport,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: Uuid,
    pub interview_id: Uuid,
    pub candidate_id: Uuid,
    pub stage: Stage,
    pub question: String,
    pub topic: String,
    pub answer_quality: AnswerQuality,
    pub created_at: DateTime<Utc>,
}

impl QuestionRecord {
    pub fn from_assessment(analytics: &Analytics, assessment: &QuestionAssessment) -> Self {
        Self {
            id: Uuid::new_v4(),
            interview_id: analytics.interview_id,
            candidate_id: analytics.candidate_id,
            stage: analytics.stage,
            question: assessment.question.clone(),
            topic: assessment.topic.clone(),
            answer_quality: assessment.answer_quality,
            created_at: analytics.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_and_predecessors() {
        assert_eq!(Stage::ORDER[0], Stage::PhoneScreen);
        assert_eq!(Stage::Technical.previous(), Some(Stage::PhoneScreen));
        assert_eq!(Stage::PhoneScreen.previous(), None);
        for (i, stage) in Stage::ORDER.iter().enumerate() {
            assert_eq!(stage.index(), i);
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), *stage);
        }
    }

    #[test]
    fn test_analytics_report_deserializes_with_defaults() {
        let report: AnalyticsReport =
            serde_json::from_str(r#"{"overall_score": 72, "recommendation": "lean_hire"}"#)
                .unwrap();
        assert_eq!(report.recommendation, Recommendation::LeanHire);
        assert!(report.topics_to_probe.is_empty());
    }

    #[test]
    fn test_open_statuses() {
        assert!(InterviewStatus::Active.is_open());
        assert!(InterviewStatus::Scheduled.is_open());
        assert!(!InterviewStatus::Completed.is_open());
        assert!(!InterviewStatus::Cancelled.is_open());
    }
}
