use std::sync::Arc;

use crate::batch::BatchOrchestrator;
use crate::interview::{ArchiveSink, InterviewStageMachine};
use crate::store::PipelineStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PipelineStore>,
    pub orchestrator: Arc<BatchOrchestrator>,
    pub stages: Arc<InterviewStageMachine>,
    /// `None` when no bucket is configured; archive requests then fail with 503.
    pub archive: Option<Arc<dyn ArchiveSink>>,
}
