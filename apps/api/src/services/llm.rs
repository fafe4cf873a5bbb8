//! LLM-backed implementations of the three collaborator traits.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::llm_client::prompts::{system_prompt, EVIDENCE_INSTRUCTION};
use crate::llm_client::LlmClient;
use crate::models::candidate::{
    AiAssessment, AttributeMap, AttributeValue, Candidate, ExtractionField, FieldType, JobCriteria,
};
use crate::models::interview::{AnalyticsReport, SpeakerRole, TranscriptTurn};
use crate::services::prompts::{
    ANALYTICS_PROMPT_TEMPLATE, ANALYTICS_ROLE, EXTRACTION_PROMPT_TEMPLATE, EXTRACTION_ROLE,
    SCORING_PROMPT_TEMPLATE, SCORING_ROLE,
};
use crate::services::{
    AnalysisRequest, AnalyticsService, ExtractionService, ScoringService, ServiceError,
};

// ────────────────────────────────────────────────────────────────────────────
// Extraction
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmExtractionService(pub LlmClient);

#[async_trait]
impl ExtractionService for LlmExtractionService {
    async fn extract(
        &self,
        resume_text: &str,
        fields: &[ExtractionField],
    ) -> Result<AttributeMap, ServiceError> {
        let prompt = EXTRACTION_PROMPT_TEMPLATE
            .replace("{fields}", &render_fields(fields))
            .replace("{evidence_instruction}", EVIDENCE_INSTRUCTION)
            .replace("{resume_text}", resume_text);

        let raw: serde_json::Map<String, Value> = self
            .0
            .call_json(&prompt, &system_prompt(EXTRACTION_ROLE))
            .await
            .map_err(|e| ServiceError::from_llm("extraction", e))?;

        debug!("Extraction returned {} keys", raw.len());
        Ok(json_to_attributes(raw))
    }
}

fn render_fields(fields: &[ExtractionField]) -> String {
    fields
        .iter()
        .map(|f| {
            let type_name = match f.field_type {
                FieldType::Boolean => "boolean",
                FieldType::Number => "number",
                FieldType::String => "string",
                FieldType::StringList => "string_list",
            };
            let required = if f.required { " (required)" } else { "" };
            format!("- {} · {}{} · {}", f.name, type_name, required, f.description)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drops nulls; anything that is not one of the four attribute shapes is kept as
/// its JSON text so schema coercion can reject or accept it.
fn json_to_attributes(raw: serde_json::Map<String, Value>) -> AttributeMap {
    raw.into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let value = serde_json::from_value::<AttributeValue>(v.clone())
                .unwrap_or_else(|_| AttributeValue::Text(v.to_string()));
            (k, value)
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Scoring
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmScoringService(pub LlmClient);

#[async_trait]
impl ScoringService for LlmScoringService {
    async fn score(
        &self,
        candidate: &Candidate,
        criteria: &JobCriteria,
    ) -> Result<AiAssessment, ServiceError> {
        let attributes = serde_json::to_string_pretty(&candidate.attributes).map_err(|e| {
            ServiceError::Failed {
                service: "scoring",
                message: e.to_string(),
            }
        })?;
        let algo_score = candidate
            .algo_score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "n/a".to_string());

        let prompt = SCORING_PROMPT_TEMPLATE
            .replace("{job_title}", &criteria.title)
            .replace("{job_description}", &criteria.description)
            .replace("{candidate_name}", &candidate.name)
            .replace("{attributes}", &attributes)
            .replace("{algo_score}", &algo_score)
            .replace("{evidence_instruction}", EVIDENCE_INSTRUCTION);

        let mut assessment: AiAssessment = self
            .0
            .call_json(&prompt, &system_prompt(SCORING_ROLE))
            .await
            .map_err(|e| ServiceError::from_llm("scoring", e))?;
        assessment.ai_score = assessment.ai_score.min(100);
        Ok(assessment)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Interview analytics
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmAnalyticsService(pub LlmClient);

#[async_trait]
impl AnalyticsService for LlmAnalyticsService {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<AnalyticsReport, ServiceError> {
        let prior_scores = if request.context.prior_score_history.is_empty() {
            "None. This is the first round.".to_string()
        } else {
            request
                .context
                .prior_score_history
                .iter()
                .map(|s| {
                    format!(
                        "- {}: {}/100, {}",
                        s.stage.as_str(),
                        s.overall_score,
                        s.recommendation.as_str()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        let prompt = ANALYTICS_PROMPT_TEMPLATE
            .replace("{stage}", request.stage.as_str())
            .replace("{candidate_name}", &request.candidate.name)
            .replace("{prior_scores}", &prior_scores)
            .replace(
                "{topics_to_explore}",
                &bullet_list(&request.context.topics_to_explore),
            )
            .replace(
                "{questions_to_avoid}",
                &bullet_list(&request.context.questions_to_avoid),
            )
            .replace("{transcript}", &render_transcript(request.turns))
            .replace("{evidence_instruction}", EVIDENCE_INSTRUCTION);

        let mut report: AnalyticsReport = self
            .0
            .call_json(&prompt, &system_prompt(ANALYTICS_ROLE))
            .await
            .map_err(|e| ServiceError::from_llm("analytics", e))?;
        report.overall_score = report.overall_score.min(100);
        Ok(report)
    }
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- none".to_string();
    }
    items
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_transcript(turns: &[TranscriptTurn]) -> String {
    turns
        .iter()
        .map(|t| {
            let role = match t.role {
                SpeakerRole::Interviewer => "Interviewer",
                SpeakerRole::Candidate => "Candidate",
            };
            format!("{role}: {}", t.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_to_attributes_drops_nulls_and_keeps_odd_shapes_as_text() {
        let raw: serde_json::Map<String, Value> = serde_json::from_str(
            r#"{"years": 6, "founder": null, "skills": ["sales", "saas"], "team": {"size": 4}}"#,
        )
        .unwrap();
        let attrs = json_to_attributes(raw);
        assert_eq!(attrs.get("years"), Some(&AttributeValue::Number(6.0)));
        assert!(!attrs.contains_key("founder"));
        assert_eq!(
            attrs.get("skills"),
            Some(&AttributeValue::List(vec!["sales".into(), "saas".into()]))
        );
        assert_eq!(
            attrs.get("team"),
            Some(&AttributeValue::Text(r#"{"size":4}"#.into()))
        );
    }

    #[test]
    fn test_render_transcript_uses_roles_not_labels() {
        let turns = vec![TranscriptTurn {
            position: 0,
            role: SpeakerRole::Interviewer,
            speaker_label: Some("Dana (Recruiter)".to_string()),
            text: "Walk me through your last deal?".to_string(),
            is_question: true,
            timestamp: None,
        }];
        assert_eq!(
            render_transcript(&turns),
            "Interviewer: Walk me through your last deal?"
        );
    }
}
