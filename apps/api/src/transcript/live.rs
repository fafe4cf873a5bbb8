//! Live interview capture. The voice transport streams speech-to-text events;
//! only final events are kept and the finished turn list is handed to the
//! interview machine at end of session.

use serde::{Deserialize, Serialize};

use crate::models::interview::{SpeakerRole, TranscriptTurn};
use crate::transcript::TranscriptError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechEvent {
    pub role: SpeakerRole,
    pub text: String,
    /// Interim hypotheses are superseded by the final event for the same utterance.
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Default)]
pub struct LiveTranscript {
    turns: Vec<TranscriptTurn>,
}

impl LiveTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: SpeechEvent) {
        let text = event.text.trim();
        if !event.is_final || text.is_empty() {
            return;
        }

        match self.turns.last_mut() {
            Some(last) if last.role == event.role => {
                last.text.push(' ');
                last.text.push_str(text);
                last.is_question = last.role == SpeakerRole::Interviewer && last.text.contains('?');
            }
            _ => {
                self.turns.push(TranscriptTurn {
                    position: self.turns.len() as u32,
                    role: event.role,
                    speaker_label: None,
                    text: text.to_string(),
                    is_question: event.role == SpeakerRole::Interviewer && text.contains('?'),
                    timestamp: event.timestamp,
                });
            }
        }
    }

    /// End-of-session signal. Same minimum as pasted transcripts.
    pub fn finish(self) -> Result<Vec<TranscriptTurn>, TranscriptError> {
        if self.turns.len() < 2 {
            return Err(TranscriptError::Unparseable {
                turns: self.turns.len(),
            });
        }
        Ok(self.turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(role: SpeakerRole, text: &str, is_final: bool) -> SpeechEvent {
        SpeechEvent {
            role,
            text: text.to_string(),
            is_final,
            timestamp: None,
        }
    }

    #[test]
    fn test_interim_events_are_ignored_and_same_role_merges() {
        let mut live = LiveTranscript::new();
        live.push(event(SpeakerRole::Interviewer, "Tell me", false));
        live.push(event(SpeakerRole::Interviewer, "Tell me about", true));
        live.push(event(SpeakerRole::Interviewer, "your quota?", true));
        live.push(event(SpeakerRole::Candidate, "I hit 120%.", true));

        let turns = live.finish().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].text, "Tell me about your quota?");
        assert!(turns[0].is_question);
        assert_eq!(turns[1].position, 1);
    }

    #[test]
    fn test_one_sided_session_fails() {
        let mut live = LiveTranscript::new();
        live.push(event(SpeakerRole::Interviewer, "Hello?", true));
        assert!(matches!(
            live.finish(),
            Err(TranscriptError::Unparseable { turns: 1 })
        ));
    }
}
