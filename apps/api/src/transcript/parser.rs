//! Heuristic transcript parser: arbitrary pasted conversation → speaker-attributed turns.
//!
//! Each line is tried against the speaker-line recognizers in priority order:
//! 1. `Label: text`
//! 2. `Label - text`
//! 3. `[00:12] Label: text`
//! 4. `Label 00:12` on its own line, text on the following lines
//!
//! A match starts a new turn; any other line continues the current one.
//! Attribution is best-effort. The only guarantee is an ordered sequence of at
//! least two turns, or `TranscriptError::Unparseable`.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::interview::{SpeakerRole, TranscriptTurn};
use crate::transcript::TranscriptError;

const LABEL: &str = r"[A-Za-z][A-Za-z.'\-]*(?:[ \t]+(?:[A-Za-z][A-Za-z.'\-]*|\d{1,3})){0,3}(?:[ \t]*\([^)]{1,40}\))?";
const TIMESTAMP: &str = r"\d{1,2}:\d{2}(?::\d{2})?";

static COLON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\s*(?P<label>{LABEL})\s*:\s*(?P<text>.*)$")).expect("valid regex")
});
static DASH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\s*(?P<label>{LABEL})\s+[-–—]\s+(?P<text>.+)$")).expect("valid regex")
});
static TIMESTAMP_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*[\[(]?(?P<ts>{TIMESTAMP})[\])]?\s*[-–—]?\s*(?P<label>{LABEL})\s*[:\-–—]\s*(?P<text>.*)$"
    ))
    .expect("valid regex")
});
static LABEL_TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*(?P<label>{LABEL})\s+[\[(]?(?P<ts>{TIMESTAMP})[\])]?\s*$"
    ))
    .expect("valid regex")
});

const INTERVIEWER_KEYWORDS: &[&str] = &["interviewer", "recruiter", "hiring manager", "you"];
const CANDIDATE_KEYWORDS: &[&str] = &["candidate", "applicant"];

/// Names the caller already knows, used before falling back to alternation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnownSpeakers {
    #[serde(default)]
    pub candidate: Vec<String>,
    #[serde(default)]
    pub interviewer: Vec<String>,
}

impl KnownSpeakers {
    pub fn for_candidate(name: &str) -> Self {
        Self {
            candidate: vec![name.to_string()],
            interviewer: vec![],
        }
    }

    fn role_of(&self, label: &str) -> Option<SpeakerRole> {
        let words = label_words(label);
        if name_keywords(&self.candidate)
            .iter()
            .any(|k| contains_phrase(&words, k))
        {
            return Some(SpeakerRole::Candidate);
        }
        let interviewer_names = name_keywords(&self.interviewer);
        if INTERVIEWER_KEYWORDS
            .iter()
            .map(|k| k.to_string())
            .chain(interviewer_names)
            .any(|k| contains_phrase(&words, &k))
        {
            return Some(SpeakerRole::Interviewer);
        }
        if CANDIDATE_KEYWORDS.iter().any(|k| contains_phrase(&words, k)) {
            return Some(SpeakerRole::Candidate);
        }
        None
    }
}

/// A recognized speaker line.
#[derive(Debug, PartialEq)]
struct SpeakerLine<'a> {
    label: &'a str,
    timestamp: Option<&'a str>,
    text: &'a str,
}

#[derive(Debug)]
struct PendingTurn {
    role: SpeakerRole,
    label: Option<String>,
    timestamp: Option<String>,
    lines: Vec<String>,
}

/// Parses raw transcript text into ordered turns.
pub fn parse_transcript(
    raw_text: &str,
    known: &KnownSpeakers,
) -> Result<Vec<TranscriptTurn>, TranscriptError> {
    let mut turns: Vec<TranscriptTurn> = Vec::new();
    let mut current: Option<PendingTurn> = None;
    let mut unknown_roles: HashMap<String, SpeakerRole> = HashMap::new();
    let mut matched_any = false;

    for line in raw_text.lines() {
        let Some(speaker) = recognize(line, known) else {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            current
                .get_or_insert_with(|| PendingTurn {
                    role: SpeakerRole::Interviewer,
                    label: None,
                    timestamp: None,
                    lines: vec![],
                })
                .lines
                .push(trimmed.to_string());
            continue;
        };

        matched_any = true;
        if let Some(done) = current.take() {
            push_turn(&mut turns, done);
        }

        let previous_role = turns.last().map(|t| t.role);
        let role = known.role_of(speaker.label).unwrap_or_else(|| {
            *unknown_roles
                .entry(speaker.label.to_lowercase())
                .or_insert_with(|| {
                    previous_role
                        .map(|r| r.other())
                        .unwrap_or(SpeakerRole::Interviewer)
                })
        });

        let mut lines = Vec::new();
        if !speaker.text.trim().is_empty() {
            lines.push(speaker.text.trim().to_string());
        }
        current = Some(PendingTurn {
            role,
            label: Some(speaker.label.trim().to_string()),
            timestamp: speaker.timestamp.map(String::from),
            lines,
        });
    }
    if let Some(done) = current.take() {
        push_turn(&mut turns, done);
    }

    if !matched_any {
        turns = alternate_blocks(raw_text);
    }

    if turns.len() < 2 {
        return Err(TranscriptError::Unparseable { turns: turns.len() });
    }
    Ok(turns)
}

fn recognize<'a>(line: &'a str, known: &KnownSpeakers) -> Option<SpeakerLine<'a>> {
    let accept = |label: &str| known.role_of(label).is_some() || looks_like_name(label);

    // A bare "Name 00:01:02" line would otherwise read as label "Name 00".
    let is_label_timestamp_line = LABEL_TIMESTAMP_RE.is_match(line);

    if !is_label_timestamp_line {
        if let Some(caps) = COLON_RE.captures(line) {
            let label = caps.name("label")?.as_str();
            let text = caps.name("text").map(|m| m.as_str()).unwrap_or("");
            if !text.starts_with("//") && accept(label) {
                return Some(SpeakerLine {
                    label,
                    timestamp: None,
                    text,
                });
            }
        }
    }

    if let Some(caps) = DASH_RE.captures(line) {
        let label = caps.name("label")?.as_str();
        if accept(label) {
            return Some(SpeakerLine {
                label,
                timestamp: None,
                text: caps.name("text").map(|m| m.as_str()).unwrap_or(""),
            });
        }
    }

    if let Some(caps) = TIMESTAMP_PREFIX_RE.captures(line) {
        let label = caps.name("label")?.as_str();
        if accept(label) {
            return Some(SpeakerLine {
                label,
                timestamp: caps.name("ts").map(|m| m.as_str()),
                text: caps.name("text").map(|m| m.as_str()).unwrap_or(""),
            });
        }
    }

    if let Some(caps) = LABEL_TIMESTAMP_RE.captures(line) {
        let label = caps.name("label")?.as_str();
        if accept(label) {
            return Some(SpeakerLine {
                label,
                timestamp: caps.name("ts").map(|m| m.as_str()),
                text: "",
            });
        }
    }

    None
}

fn push_turn(turns: &mut Vec<TranscriptTurn>, pending: PendingTurn) {
    let text = pending.lines.join(" ");
    if text.trim().is_empty() {
        return;
    }
    let is_question = pending.role == SpeakerRole::Interviewer && text.contains('?');
    turns.push(TranscriptTurn {
        position: turns.len() as u32,
        role: pending.role,
        speaker_label: pending.label,
        text,
        is_question,
        timestamp: pending.timestamp,
    });
}

/// No speaker labels anywhere: paragraphs (or lines) alternate, interviewer first.
/// A paragraph ends at a blank or whitespace-only line, whatever the line endings.
fn alternate_blocks(raw_text: &str) -> Vec<TranscriptTurn> {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut open: Vec<&str> = Vec::new();
    for line in raw_text.lines().map(str::trim) {
        if line.is_empty() {
            if !open.is_empty() {
                paragraphs.push(open.join(" "));
                open.clear();
            }
        } else {
            open.push(line);
        }
    }
    if !open.is_empty() {
        paragraphs.push(open.join(" "));
    }

    let blocks: Vec<String> = if paragraphs.len() > 1 {
        paragraphs
    } else {
        raw_text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()
    };

    let mut turns = Vec::new();
    let mut role = SpeakerRole::Interviewer;
    for text in blocks {
        push_turn(
            &mut turns,
            PendingTurn {
                role,
                label: None,
                timestamp: None,
                lines: vec![text],
            },
        );
        role = role.other();
    }
    turns
}

/// Every word starts with an uppercase letter or is a number: "Jane Doe", "Speaker 2".
fn looks_like_name(label: &str) -> bool {
    let head = label.split('(').next().unwrap_or(label);
    let mut words = head.split_whitespace().peekable();
    if words.peek().is_none() {
        return false;
    }
    words.all(|w| {
        w.chars()
            .next()
            .map(|c| c.is_uppercase() || c.is_ascii_digit())
            .unwrap_or(false)
    })
}

fn label_words(label: &str) -> Vec<String> {
    label
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// True when `phrase` appears in `words` as a run of whole words.
fn contains_phrase(words: &[String], phrase: &str) -> bool {
    let needle = label_words(phrase);
    if needle.is_empty() || needle.len() > words.len() {
        return false;
    }
    words.windows(needle.len()).any(|w| w == needle.as_slice())
}

/// Full names plus first names, so "Jane" also matches "Jane Doe".
fn name_keywords(names: &[String]) -> Vec<String> {
    let mut keywords = Vec::new();
    for name in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        keywords.push(name.to_lowercase());
        if let Some(first) = name.split_whitespace().next() {
            keywords.push(first.to_lowercase());
        }
    }
    keywords.sort();
    keywords.dedup();
    keywords
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(turns: &[TranscriptTurn]) -> Vec<SpeakerRole> {
        turns.iter().map(|t| t.role).collect()
    }

    #[test]
    fn test_two_labelled_lines() {
        let turns = parse_transcript(
            "Interviewer: Hi there\nCandidate: Hello",
            &KnownSpeakers::default(),
        )
        .unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(
            roles(&turns),
            vec![SpeakerRole::Interviewer, SpeakerRole::Candidate]
        );
        assert_eq!(turns[0].text, "Hi there");
        assert_eq!(turns[1].text, "Hello");
        assert_eq!(turns[1].position, 1);
    }

    #[test]
    fn test_single_unlabelled_line_is_unparseable() {
        let err = parse_transcript("just some notes", &KnownSpeakers::default()).unwrap_err();
        assert!(matches!(err, TranscriptError::Unparseable { turns: 1 }));
    }

    #[test]
    fn test_empty_input_is_unparseable() {
        let err = parse_transcript("  \n\n ", &KnownSpeakers::default()).unwrap_err();
        assert!(matches!(err, TranscriptError::Unparseable { turns: 0 }));
    }

    #[test]
    fn test_continuation_lines_join_current_turn() {
        let raw = "Recruiter: Tell me about your last role.\nTake your time.\nCandidate: I ran sales\nfor the mid-market team.";
        let turns = parse_transcript(raw, &KnownSpeakers::default()).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].text, "Tell me about your last role. Take your time.");
        assert_eq!(turns[1].text, "I ran sales for the mid-market team.");
    }

    #[test]
    fn test_timestamp_prefixed_labels_and_known_name() {
        let raw = "[00:01] Recruiter: What drew you to us?\n[00:15] Jane Doe: The product.";
        let turns = parse_transcript(raw, &KnownSpeakers::for_candidate("Jane Doe")).unwrap();
        assert_eq!(
            roles(&turns),
            vec![SpeakerRole::Interviewer, SpeakerRole::Candidate]
        );
        assert_eq!(turns[0].timestamp.as_deref(), Some("00:01"));
        assert!(turns[0].is_question);
        assert!(!turns[1].is_question);
    }

    #[test]
    fn test_label_then_timestamp_line_alternates_unknown_speakers() {
        let raw = "Alex Kim  00:00:03\nWelcome, thanks for joining.\nSam Lee 00:00:10\nHappy to be here.\nAlex Kim 00:00:20\nLet's start?";
        let turns = parse_transcript(raw, &KnownSpeakers::default()).unwrap();
        assert_eq!(
            roles(&turns),
            vec![
                SpeakerRole::Interviewer,
                SpeakerRole::Candidate,
                SpeakerRole::Interviewer
            ]
        );
        assert_eq!(turns[0].speaker_label.as_deref(), Some("Alex Kim"));
        assert_eq!(turns[1].timestamp.as_deref(), Some("00:00:10"));
        assert_eq!(turns[1].text, "Happy to be here.");
    }

    #[test]
    fn test_dash_labels_with_first_name() {
        let raw = "Interviewer - How big was the deal?\nJane - About 400k ARR.";
        let turns = parse_transcript(raw, &KnownSpeakers::for_candidate("Jane Doe")).unwrap();
        assert_eq!(
            roles(&turns),
            vec![SpeakerRole::Interviewer, SpeakerRole::Candidate]
        );
        assert_eq!(turns[1].text, "About 400k ARR.");
    }

    #[test]
    fn test_lowercase_sentence_with_colon_is_continuation() {
        let raw = "Interviewer: Walk me through it.\nCandidate: Sure.\nthe short answer is: we doubled pipeline";
        let turns = parse_transcript(raw, &KnownSpeakers::default()).unwrap();
        assert_eq!(turns.len(), 2);
        assert!(turns[1].text.ends_with("we doubled pipeline"));
    }

    #[test]
    fn test_url_is_not_a_speaker() {
        let raw = "Interviewer: See the deck.\nhttps://example.com/deck\nCandidate: Got it.";
        let turns = parse_transcript(raw, &KnownSpeakers::default()).unwrap();
        assert_eq!(turns.len(), 2);
        assert!(turns[0].text.contains("https://example.com/deck"));
    }

    #[test]
    fn test_unlabelled_paragraphs_alternate() {
        let raw = "Thanks for coming in.\nHow are you?\n\nDoing well, thanks.\n\nGreat, let's begin.";
        let turns = parse_transcript(raw, &KnownSpeakers::default()).unwrap();
        assert_eq!(
            roles(&turns),
            vec![
                SpeakerRole::Interviewer,
                SpeakerRole::Candidate,
                SpeakerRole::Interviewer
            ]
        );
        assert!(turns[0].is_question);
    }

    #[test]
    fn test_windows_line_endings_still_split_paragraphs() {
        let raw = "Thanks for coming in.\r\nHow are you?\r\n\r\nDoing well, thanks.\r\n \r\nGreat, let's begin.\r\n";
        let turns = parse_transcript(raw, &KnownSpeakers::default()).unwrap();
        assert_eq!(
            roles(&turns),
            vec![
                SpeakerRole::Interviewer,
                SpeakerRole::Candidate,
                SpeakerRole::Interviewer
            ]
        );
        assert_eq!(turns[0].text, "Thanks for coming in. How are you?");
        assert!(turns.iter().all(|t| !t.text.contains('\r')));
    }

    #[test]
    fn test_speaker_numbers_keep_their_roles() {
        let raw = "Speaker 1: Hello.\nSpeaker 2: Hi.\nSpeaker 1: Ready?\nSpeaker 2: Yes.";
        let turns = parse_transcript(raw, &KnownSpeakers::default()).unwrap();
        assert_eq!(
            roles(&turns),
            vec![
                SpeakerRole::Interviewer,
                SpeakerRole::Candidate,
                SpeakerRole::Interviewer,
                SpeakerRole::Candidate
            ]
        );
    }

    #[test]
    fn test_preamble_defaults_to_interviewer() {
        let raw = "quick intro before we start\nJordan: Hi!";
        let turns = parse_transcript(raw, &KnownSpeakers::default()).unwrap();
        assert_eq!(
            roles(&turns),
            vec![SpeakerRole::Interviewer, SpeakerRole::Candidate]
        );
        assert_eq!(turns[0].speaker_label, None);
    }

    #[test]
    fn test_hiring_manager_phrase_matches_interviewer() {
        let words = label_words("Hiring Manager (Priya)");
        assert!(contains_phrase(&words, "hiring manager"));
        assert!(!contains_phrase(&label_words("Young"), "you"));
    }
}
