// Shared prompt fragments. Each service keeps its own prompts next to it;
// only cross-cutting instructions live here.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to every prompt that reads candidate-supplied text.
pub const EVIDENCE_INSTRUCTION: &str = "\
    CRITICAL: Only report what the provided text actually states. \
    Do NOT infer, interpolate, or invent details. \
    If the text does not support a value, use null or omit it.";

/// Builds a system prompt from a role description plus the shared JSON rule.
pub fn system_prompt(role: &str) -> String {
    format!("{role}\n\n{JSON_ONLY_SYSTEM}")
}
