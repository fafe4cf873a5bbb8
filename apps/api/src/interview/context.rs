//! Cross-stage context handed to the interviewer when a stage starts.
//!
//! Pure fold over what earlier stages recorded. Nothing here is stored; the
//! bundle is rebuilt from analytics and question records on every start.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::interview::{Analytics, AnswerQuality, QuestionRecord, Recommendation, Stage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageScore {
    pub stage: Stage,
    pub overall_score: u8,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    /// Every question already asked in an earlier stage.
    pub questions_to_avoid: Vec<String>,
    /// Open follow-ups that no later stage has answered well yet.
    pub topics_to_explore: Vec<String>,
    pub prior_score_history: Vec<StageScore>,
    /// Screening questions from the AI assessment that nobody has asked yet.
    pub suggested_questions: Vec<String>,
}

/// Builds the bundle from prior analytics (any order), their question records
/// and the AI assessment's suggested questions.
pub fn build_context(
    analytics: &[Analytics],
    records: &[QuestionRecord],
    assessment_questions: &[String],
) -> ContextBundle {
    let mut ordered: Vec<&Analytics> = analytics.iter().collect();
    ordered.sort_by_key(|a| a.stage);

    let mut asked = HashSet::new();
    let mut questions_to_avoid = Vec::new();
    for record in records {
        if asked.insert(normalize(&record.question)) {
            questions_to_avoid.push(record.question.trim().to_string());
        }
    }

    let mut topics_to_explore: Vec<String> = Vec::new();
    for stage_analytics in &ordered {
        let answered: HashSet<String> = records
            .iter()
            .filter(|r| r.stage == stage_analytics.stage)
            .filter(|r| r.answer_quality != AnswerQuality::Weak)
            .map(|r| normalize(&r.topic))
            .filter(|t| !t.is_empty())
            .collect();
        topics_to_explore.retain(|t| !answered.contains(&normalize(t)));

        for topic in &stage_analytics.report.topics_to_probe {
            let key = normalize(topic);
            if key.is_empty() || topics_to_explore.iter().any(|t| normalize(t) == key) {
                continue;
            }
            topics_to_explore.push(topic.trim().to_string());
        }
    }

    let prior_score_history = ordered
        .iter()
        .map(|a| StageScore {
            stage: a.stage,
            overall_score: a.report.overall_score,
            recommendation: a.report.recommendation,
        })
        .collect();

    let mut suggested = HashSet::new();
    let suggested_questions = assessment_questions
        .iter()
        .filter(|q| {
            let key = normalize(q);
            !key.is_empty() && !asked.contains(&key) && suggested.insert(key)
        })
        .map(|q| q.trim().to_string())
        .collect();

    ContextBundle {
        questions_to_avoid,
        topics_to_explore,
        prior_score_history,
        suggested_questions,
    }
}

/// Lowercase, single-spaced, without trailing punctuation.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['?', '.', '!'])
        .to_lowercase()
}
