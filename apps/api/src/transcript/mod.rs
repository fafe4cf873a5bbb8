// Transcript handling: pasted-text parsing and live-session capture.
// Both produce the same ordered `TranscriptTurn` sequence consumed by the interview machine.

pub mod live;
pub mod parser;

use thiserror::Error;

pub use live::{LiveTranscript, SpeechEvent};
pub use parser::{parse_transcript, KnownSpeakers};

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("Unparseable transcript: recovered {turns} turn(s), at least 2 are required")]
    Unparseable { turns: usize },
}
