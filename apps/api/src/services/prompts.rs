// Prompt constants for the extraction, scoring and analytics services.
// Templates are filled with `.replace("{placeholder}", ...)` before sending.

/// Role line for résumé extraction.
pub const EXTRACTION_ROLE: &str =
    "You are a meticulous recruiting coordinator. You read résumés and fill in \
    a fixed set of fields exactly as they are defined.";

/// Replace `{fields}` and `{resume_text}` before sending.
pub const EXTRACTION_PROMPT_TEMPLATE: &str = r#"Read the résumé below and fill in every field of this schema.

FIELDS (name · type · description):
{fields}

Return a JSON object whose keys are EXACTLY the field names above:
- boolean fields: true or false
- number fields: a single number (years as a number, e.g. 6)
- string fields: a short string
- string_list fields: an array of short strings
- use null when the résumé does not say

{evidence_instruction}

RÉSUMÉ:
{resume_text}"#;

/// Role line for candidate scoring.
pub const SCORING_ROLE: &str =
    "You are a senior hiring manager. You judge candidate fit for a specific role \
    and explain your judgement briefly and concretely.";

/// Replace `{job_title}`, `{job_description}`, `{candidate_name}`,
/// `{attributes}` and `{algo_score}` before sending.
pub const SCORING_PROMPT_TEMPLATE: &str = r#"Assess this candidate for the role.

ROLE: {job_title}
{job_description}

CANDIDATE: {candidate_name}
EXTRACTED PROFILE (JSON):
{attributes}

A rules-based screen scored this profile {algo_score}/100. Form your own view.

Return a JSON object with this EXACT schema:
{
  "ai_score": 0-100,
  "one_line_summary": "one sentence",
  "pros": ["..."],
  "cons": ["..."],
  "reasoning": "two or three sentences",
  "interview_questions": ["questions that would resolve the biggest open risks"]
}

{evidence_instruction}"#;

/// Role line for interview analytics.
pub const ANALYTICS_ROLE: &str =
    "You are an interview analyst. You read interview transcripts and produce a \
    structured, evidence-based assessment of the candidate.";

/// Replace `{stage}`, `{candidate_name}`, `{prior_scores}`,
/// `{topics_to_explore}`, `{questions_to_avoid}` and `{transcript}` before sending.
pub const ANALYTICS_PROMPT_TEMPLATE: &str = r#"Analyse this {stage} interview with {candidate_name}.

EARLIER ROUNDS:
{prior_scores}

TOPICS EARLIER ROUNDS ASKED TO PROBE:
{topics_to_explore}

QUESTIONS ALREADY ASKED IN EARLIER ROUNDS:
{questions_to_avoid}

TRANSCRIPT:
{transcript}

Return a JSON object with this EXACT schema:
{
  "overall_score": 0-100,
  "recommendation": "strong_hire" | "hire" | "lean_hire" | "lean_no_hire" | "no_hire",
  "question_breakdown": [
    {"question": "...", "topic": "short topic", "answer_quality": "strong" | "adequate" | "weak", "notes": "..."}
  ],
  "skill_evidence": [
    {"skill": "...", "evidence": "quote or paraphrase", "strength": 0.0-1.0}
  ],
  "behavioral_profile": {"trait": 0.0-1.0},
  "topics_to_probe": ["topics the next round should dig into"]
}

Reuse the topic wording from the list above when a question covers one of those topics.

{evidence_instruction}"#;
