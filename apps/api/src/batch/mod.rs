// Batch job orchestration: extraction → confirmation gate → scoring.

pub mod handlers;
pub mod job;
pub mod orchestrator;
pub mod schema;
pub mod upload;

pub use orchestrator::{BatchConfig, BatchError, BatchOrchestrator};
