use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single extracted attribute value. The schema decides which variant a field holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl AttributeValue {
    /// True when the value carries information (non-empty text/list, `true`, any number).
    pub fn is_populated(&self) -> bool {
        match self {
            AttributeValue::Bool(_) | AttributeValue::Number(_) => true,
            AttributeValue::Text(s) => !s.trim().is_empty(),
            AttributeValue::List(items) => items.iter().any(|i| !i.trim().is_empty()),
        }
    }

    /// Boolean reading used by boost signals and required-field matching.
    pub fn is_truthy(&self) -> bool {
        match self {
            AttributeValue::Bool(b) => *b,
            AttributeValue::Number(n) => *n > 0.0,
            other => other.is_populated(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Lowercased text fragments, for keyword matching.
    pub fn text_fragments(&self) -> Vec<String> {
        match self {
            AttributeValue::Text(s) => vec![s.to_lowercase()],
            AttributeValue::List(items) => items.iter().map(|i| i.to_lowercase()).collect(),
            _ => vec![],
        }
    }
}

/// Ordered map of field name → value. Ordered so serialized output is stable.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Boolean,
    Number,
    String,
    StringList,
}

/// One declared field of the per-job extraction schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionField {
    pub name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NumericThreshold {
    pub field: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// A boolean signal that adds `points` to a candidate's priority when it fires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoostRule {
    pub name: String,
    /// Every listed field must be truthy.
    #[serde(default)]
    pub when: Vec<String>,
    /// No listed field may be truthy.
    #[serde(default)]
    pub unless: Vec<String>,
    #[serde(default = "default_boost_points")]
    pub points: f64,
}

fn default_boost_points() -> f64 {
    10.0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobCriteria {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thresholds: Vec<NumericThreshold>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub boosts: Vec<BoostRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Weak,
    Moderate,
    Strong,
    Top,
}

impl Tier {
    pub fn from_final_score(score: u8) -> Self {
        match score {
            s if s >= 80 => Tier::Top,
            s if s >= 65 => Tier::Strong,
            s if s >= 50 => Tier::Moderate,
            _ => Tier::Weak,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Top => "top",
            Tier::Strong => "strong",
            Tier::Moderate => "moderate",
            Tier::Weak => "weak",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    New,
    PhoneScreen,
    Technical,
    Behavioral,
    DecisionPending,
    Accepted,
    Rejected,
}

impl PipelineStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStatus::Accepted | PipelineStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::New => "new",
            PipelineStatus::PhoneScreen => "phone_screen",
            PipelineStatus::Technical => "technical",
            PipelineStatus::Behavioral => "behavioral",
            PipelineStatus::DecisionPending => "decision_pending",
            PipelineStatus::Accepted => "accepted",
            PipelineStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accepted,
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accepted => "accepted",
            Decision::Rejected => "rejected",
        }
    }
}

impl From<Decision> for PipelineStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accepted => PipelineStatus::Accepted,
            Decision::Rejected => PipelineStatus::Rejected,
        }
    }
}

/// Unknown enum label read back from storage.
#[derive(Debug)]
pub struct UnknownLabel(pub String);

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown label '{}'", self.0)
    }
}

impl FromStr for PipelineStatus {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "new" => PipelineStatus::New,
            "phone_screen" => PipelineStatus::PhoneScreen,
            "technical" => PipelineStatus::Technical,
            "behavioral" => PipelineStatus::Behavioral,
            "decision_pending" => PipelineStatus::DecisionPending,
            "accepted" => PipelineStatus::Accepted,
            "rejected" => PipelineStatus::Rejected,
            other => return Err(UnknownLabel(other.to_string())),
        })
    }
}

impl FromStr for Decision {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accepted" => Ok(Decision::Accepted),
            "rejected" => Ok(Decision::Rejected),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

impl FromStr for Tier {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(Tier::Top),
            "strong" => Ok(Tier::Strong),
            "moderate" => Ok(Tier::Moderate),
            "weak" => Ok(Tier::Weak),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

/// Qualitative output of the AI scoring service, kept alongside the numeric score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiAssessment {
    pub ai_score: u8,
    #[serde(default)]
    pub one_line_summary: String,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub interview_questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Uuid,
    pub job_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub attributes: AttributeMap,
    pub algo_score: Option<u8>,
    pub ai_score: Option<u8>,
    pub final_score: Option<u8>,
    pub tier: Option<Tier>,
    pub assessment: Option<AiAssessment>,
    pub data_completeness: u8,
    pub pipeline_status: PipelineStatus,
    pub final_decision: Option<Decision>,
    pub decision_notes: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub extraction_error: Option<String>,
    pub scoring_error: Option<String>,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Candidate {
    pub fn new(job_id: Uuid, tenant_id: Uuid, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            job_id,
            tenant_id,
            name: name.into(),
            attributes: AttributeMap::new(),
            algo_score: None,
            ai_score: None,
            final_score: None,
            tier: None,
            assessment: None,
            data_completeness: 0,
            pipeline_status: PipelineStatus::New,
            final_decision: None,
            decision_notes: None,
            decided_at: None,
            extraction_error: None,
            scoring_error: None,
            archived_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Eligible for the scoring phase: extraction succeeded.
    pub fn is_extracted(&self) -> bool {
        self.extraction_error.is_none() && self.algo_score.is_some()
    }

    /// Records the AI assessment and derives `final_score` and `tier`.
    pub fn apply_assessment(&mut self, assessment: AiAssessment) {
        let ai_score = assessment.ai_score.min(100);
        self.ai_score = Some(ai_score);
        self.final_score = self
            .algo_score
            .map(|algo| ((algo as f64 + ai_score as f64) / 2.0).round() as u8);
        self.tier = self.final_score.map(Tier::from_final_score);
        self.assessment = Some(assessment);
        self.scoring_error = None;
        self.updated_at = Utc::now();
    }

    pub fn flag_scoring_failure(&mut self, reason: impl Into<String>) {
        self.ai_score = None;
        self.final_score = None;
        self.tier = None;
        self.scoring_error = Some(reason.into());
        self.updated_at = Utc::now();
    }

    pub fn scores(&self) -> CandidateScores {
        CandidateScores {
            ai_score: self.ai_score,
            final_score: self.final_score,
            tier: self.tier,
            assessment: self.assessment.clone(),
            scoring_error: self.scoring_error.clone(),
        }
    }

    pub fn apply_scores(&mut self, scores: &CandidateScores) {
        self.ai_score = scores.ai_score;
        self.final_score = scores.final_score;
        self.tier = scores.tier;
        self.assessment = scores.assessment.clone();
        self.scoring_error = scores.scoring_error.clone();
        self.updated_at = Utc::now();
    }
}

/// The columns the scoring phase owns. Interview status, decision and archive
/// stamps are written by the stage machine and never travel with these.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScores {
    pub ai_score: Option<u8>,
    pub final_score: Option<u8>,
    pub tier: Option<Tier>,
    pub assessment: Option<AiAssessment>,
    pub scoring_error: Option<String>,
}
