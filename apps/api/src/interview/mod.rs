pub mod archive;
pub mod context;
pub mod handlers;
pub mod stage_machine;

pub use archive::{ArchiveSink, S3Archive};
pub use stage_machine::{InterviewStageMachine, StageError};
