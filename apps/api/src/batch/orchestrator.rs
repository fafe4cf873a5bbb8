//! Two-phase batch runner: extraction, an operator confirmation gate, then scoring.
//!
//! Each job owns a `watch` channel holding its `BatchJob` snapshot. Workers fold
//! their result into the snapshot with `send_modify`, so a poll always sees a
//! consistent view. Phase changes that race with operator actions (confirm,
//! cancel) are decided inside the channel's lock with `send_if_modified`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{watch, RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::batch::job::{BatchJob, JobPhase, JobSpec, RankedEntry, ResumeInput};
use crate::batch::schema::{coerce_attributes, validate_schema, SchemaError};
use crate::models::candidate::{Candidate, ExtractionField, JobCriteria};
use crate::ranking::{compute_algo_score, data_completeness, rank, RankingError, RankingWeights};
use crate::services::{ExtractionService, ScoringService, ServiceError};
use crate::store::{PipelineStore, StoreError};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Invalid field schema: {0}")]
    InvalidSchema(#[from] SchemaError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Tenant {tenant_id} already has a batch in progress")]
    JobAlreadyRunning { tenant_id: Uuid },

    #[error("Cannot move job from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition { from: JobPhase, to: JobPhase },

    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Ranking(#[from] RankingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    pub max_concurrency: usize,
    /// Consecutive `Unavailable` failures that halt a phase.
    pub systemic_failure_threshold: usize,
    /// How long a finished job stays in the registry. Candidates outlive it in the store.
    pub job_retention: chrono::Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            systemic_failure_threshold: 3,
            job_retention: chrono::Duration::hours(24),
        }
    }
}

struct JobHandle {
    spec: JobSpec,
    status: watch::Sender<BatchJob>,
    cancelled: AtomicBool,
}

impl JobHandle {
    fn snapshot(&self) -> BatchJob {
        self.status.borrow().clone()
    }
}

pub struct BatchOrchestrator {
    jobs: RwLock<HashMap<Uuid, Arc<JobHandle>>>,
    extractor: Arc<dyn ExtractionService>,
    scorer: Arc<dyn ScoringService>,
    store: Arc<dyn PipelineStore>,
    config: BatchConfig,
}

impl BatchOrchestrator {
    pub fn new(
        extractor: Arc<dyn ExtractionService>,
        scorer: Arc<dyn ScoringService>,
        store: Arc<dyn PipelineStore>,
        config: BatchConfig,
    ) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            extractor,
            scorer,
            store,
            config,
        }
    }

    /// Validates the batch, registers it and starts extraction in the background.
    pub async fn start_extraction(
        &self,
        tenant_id: Uuid,
        resumes: Vec<ResumeInput>,
        fields: Vec<ExtractionField>,
        criteria: JobCriteria,
    ) -> Result<Uuid, BatchError> {
        validate_schema(&fields)?;
        if resumes.is_empty() {
            return Err(BatchError::Validation(
                "A batch needs at least one résumé".to_string(),
            ));
        }
        if let Some(blank) = resumes.iter().position(|r| r.name.trim().is_empty()) {
            return Err(BatchError::Validation(format!(
                "Résumé #{blank} has no candidate name"
            )));
        }
        RankingWeights::default().validate(&criteria.boosts)?;

        let job_id = Uuid::new_v4();
        let handle = {
            let mut jobs = self.jobs.write().await;
            self.evict_expired(&mut jobs);
            let busy = jobs.values().any(|h| {
                let job = h.status.borrow();
                job.tenant_id == tenant_id && !job.phase.is_terminal()
            });
            if busy {
                return Err(BatchError::JobAlreadyRunning { tenant_id });
            }

            let (status, _) = watch::channel(BatchJob::new(job_id, tenant_id, resumes.len()));
            let handle = Arc::new(JobHandle {
                spec: JobSpec { fields, criteria },
                status,
                cancelled: AtomicBool::new(false),
            });
            jobs.insert(job_id, handle.clone());
            handle
        };

        info!(
            "Job {job_id}: extracting {} résumé(s) for tenant {tenant_id}",
            resumes.len()
        );
        let runner = self.runner(handle);
        tokio::spawn(runner.run_extraction(resumes));
        Ok(job_id)
    }

    /// Snapshot with candidates in default ranking order. Never changes job state.
    pub async fn poll(&self, job_id: Uuid) -> Result<BatchJob, BatchError> {
        let handle = self.handle(job_id).await?;
        let mut job = handle.snapshot();
        job.candidates = self.current_candidates(&job).await?;
        let order: Vec<Uuid> = rank(
            &job.candidates,
            &handle.spec.criteria.boosts,
            &RankingWeights::default(),
        )?
        .iter()
        .map(|r| r.candidate.id)
        .collect();

        let mut by_id: HashMap<Uuid, Candidate> =
            job.candidates.drain(..).map(|c| (c.id, c)).collect();
        job.candidates = order.iter().filter_map(|id| by_id.remove(id)).collect();
        Ok(job)
    }

    /// The gate: only a job waiting for confirmation moves on to scoring.
    pub async fn confirm_scoring(&self, job_id: Uuid) -> Result<BatchJob, BatchError> {
        let handle = self.handle(job_id).await?;

        let mut current = JobPhase::WaitingConfirmation;
        let started = handle.status.send_if_modified(|job| {
            current = job.phase;
            if job.phase != JobPhase::WaitingConfirmation {
                return false;
            }
            job.set_phase(JobPhase::Scoring);
            true
        });
        if !started {
            return Err(BatchError::InvalidTransition {
                from: current,
                to: JobPhase::Scoring,
            });
        }

        info!("Job {job_id}: scoring confirmed");
        let snapshot = handle.snapshot();
        tokio::spawn(self.runner(handle).run_scoring());
        Ok(snapshot)
    }

    /// Stops a job. Waiting jobs end at once; running jobs finish their in-flight
    /// units first and then settle in `cancelled`.
    pub async fn cancel(&self, job_id: Uuid) -> Result<BatchJob, BatchError> {
        let handle = self.handle(job_id).await?;

        let mut refused = None;
        handle.status.send_if_modified(|job| match job.phase {
            phase if phase.is_terminal() => {
                refused = Some(phase);
                false
            }
            JobPhase::WaitingConfirmation => {
                handle.cancelled.store(true, Ordering::SeqCst);
                job.set_phase(JobPhase::Cancelled);
                true
            }
            _ => {
                handle.cancelled.store(true, Ordering::SeqCst);
                false
            }
        });
        if let Some(from) = refused {
            return Err(BatchError::InvalidTransition {
                from,
                to: JobPhase::Cancelled,
            });
        }

        info!("Job {job_id}: cancellation requested");
        Ok(handle.snapshot())
    }

    /// Ranks the batch under operator weights. Stored scores are untouched.
    pub async fn rescore(
        &self,
        job_id: Uuid,
        weights: &RankingWeights,
    ) -> Result<Vec<RankedEntry>, BatchError> {
        let handle = self.handle(job_id).await?;
        let job = handle.snapshot();
        let candidates = self.current_candidates(&job).await?;
        let ranked = rank(&candidates, &handle.spec.criteria.boosts, weights)?;
        Ok(ranked.into_iter().map(RankedEntry::from).collect())
    }

    pub async fn subscribe(&self, job_id: Uuid) -> Result<watch::Receiver<BatchJob>, BatchError> {
        Ok(self.handle(job_id).await?.status.subscribe())
    }

    /// The snapshot's candidates with the stored rows laid over them. Decisions,
    /// interview status and archive stamps are written outside this job and
    /// only reach a poll through the store.
    async fn current_candidates(&self, job: &BatchJob) -> Result<Vec<Candidate>, BatchError> {
        let mut stored: HashMap<Uuid, Candidate> = self
            .store
            .candidates_for_job(job.id)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        Ok(job
            .candidates
            .iter()
            .map(|c| stored.remove(&c.id).unwrap_or_else(|| c.clone()))
            .collect())
    }

    /// Drops finished jobs older than the retention window.
    fn evict_expired(&self, jobs: &mut HashMap<Uuid, Arc<JobHandle>>) {
        let now = chrono::Utc::now();
        let retention = self.config.job_retention;
        let before = jobs.len();
        jobs.retain(|_, h| {
            let job = h.status.borrow();
            !(job.phase.is_terminal() && now - job.updated_at >= retention)
        });
        let evicted = before - jobs.len();
        if evicted > 0 {
            info!("Evicted {evicted} finished job(s) from the registry");
        }
    }

    async fn handle(&self, job_id: Uuid) -> Result<Arc<JobHandle>, BatchError> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or(BatchError::NotFound(job_id))
    }

    fn runner(&self, handle: Arc<JobHandle>) -> PhaseRunner {
        PhaseRunner {
            handle,
            extractor: self.extractor.clone(),
            scorer: self.scorer.clone(),
            store: self.store.clone(),
            config: self.config,
            unavailable_streak: Arc::new(AtomicUsize::new(0)),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Background phase execution
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct PhaseRunner {
    handle: Arc<JobHandle>,
    extractor: Arc<dyn ExtractionService>,
    scorer: Arc<dyn ScoringService>,
    store: Arc<dyn PipelineStore>,
    config: BatchConfig,
    unavailable_streak: Arc<AtomicUsize>,
}

enum UnitOutcome {
    Succeeded,
    Failed,
}

impl PhaseRunner {
    fn job_id(&self) -> Uuid {
        self.handle.status.borrow().id
    }

    fn halted(&self) -> bool {
        self.handle.cancelled.load(Ordering::SeqCst)
            || self.handle.status.borrow().phase == JobPhase::Error
    }

    /// Runs `units` under the concurrency bound. Stops handing out new units as
    /// soon as the job is cancelled or has failed.
    async fn run_units<T, F, Fut>(&self, units: Vec<T>, work: F)
    where
        T: Send + 'static,
        F: Fn(PhaseRunner, T) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for unit in units {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            if self.halted() {
                break;
            }
            let fut = work(self.clone(), unit);
            tasks.spawn(async move {
                let _permit = permit;
                fut.await;
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Job {}: worker task panicked: {e}", self.job_id());
            }
        }
    }

    async fn run_extraction(self, resumes: Vec<ResumeInput>) {
        let threshold = self.threshold_for(resumes.len());
        self.run_units(resumes, move |runner, resume| async move {
            runner.extract_one(resume, threshold).await;
        })
        .await;

        let cancelled = &self.handle.cancelled;
        self.handle.status.send_if_modified(|job| {
            if job.phase != JobPhase::Extracting {
                return false;
            }
            if cancelled.load(Ordering::SeqCst) {
                job.set_phase(JobPhase::Cancelled);
            } else {
                job.set_phase(JobPhase::WaitingConfirmation);
            }
            true
        });

        let job = self.handle.snapshot();
        info!(
            "Job {}: extraction finished in phase {} ({} extracted, {} failed)",
            job.id,
            job.phase.as_str(),
            job.extracted,
            job.extraction_failed
        );
    }

    async fn extract_one(&self, resume: ResumeInput, threshold: usize) {
        let (job_id, tenant_id) = {
            let job = self.handle.status.borrow();
            (job.id, job.tenant_id)
        };
        let fields = &self.handle.spec.fields;
        let mut candidate = Candidate::new(job_id, tenant_id, resume.name.trim());

        let outcome = if resume.text.trim().is_empty() {
            candidate.extraction_error = Some("Résumé text is empty".to_string());
            UnitOutcome::Failed
        } else {
            match self.extractor.extract(&resume.text, fields).await {
                Ok(raw) => {
                    self.unavailable_streak.store(0, Ordering::SeqCst);
                    match coerce_attributes(raw, fields) {
                        Ok(attributes) => {
                            candidate.data_completeness = data_completeness(&attributes, fields);
                            candidate.algo_score = Some(compute_algo_score(
                                &attributes,
                                fields,
                                &self.handle.spec.criteria,
                            ));
                            candidate.attributes = attributes;
                            UnitOutcome::Succeeded
                        }
                        Err(e) => {
                            candidate.extraction_error = Some(e.to_string());
                            UnitOutcome::Failed
                        }
                    }
                }
                Err(e) => {
                    candidate.extraction_error = Some(e.to_string());
                    self.note_service_failure(&e, threshold);
                    UnitOutcome::Failed
                }
            }
        };

        if let UnitOutcome::Failed = outcome {
            warn!(
                "Job {job_id}: extraction failed for '{}': {}",
                candidate.name,
                candidate.extraction_error.as_deref().unwrap_or_default()
            );
        }

        if let Err(e) = self.store.insert_candidate(&candidate).await {
            self.fail(format!("Could not persist candidate '{}': {e}", candidate.name));
            return;
        }

        self.handle.status.send_modify(|job| {
            match outcome {
                UnitOutcome::Succeeded => job.extracted += 1,
                UnitOutcome::Failed => job.extraction_failed += 1,
            }
            job.fold_candidate(candidate);
        });
    }

    async fn run_scoring(self) {
        let eligible: Vec<Candidate> = self
            .handle
            .snapshot()
            .candidates
            .into_iter()
            .filter(Candidate::is_extracted)
            .collect();
        let threshold = self.threshold_for(eligible.len());

        self.run_units(eligible, move |runner, candidate| async move {
            runner.score_one(candidate, threshold).await;
        })
        .await;

        let cancelled = &self.handle.cancelled;
        self.handle.status.send_if_modified(|job| {
            if job.phase != JobPhase::Scoring {
                return false;
            }
            if cancelled.load(Ordering::SeqCst) {
                job.set_phase(JobPhase::Cancelled);
            } else {
                job.set_phase(JobPhase::Complete);
            }
            true
        });

        let job = self.handle.snapshot();
        info!(
            "Job {}: scoring finished in phase {} ({} scored, {} failed)",
            job.id,
            job.phase.as_str(),
            job.scored,
            job.scoring_failed
        );
    }

    async fn score_one(&self, mut candidate: Candidate, threshold: usize) {
        let outcome = match self
            .scorer
            .score(&candidate, &self.handle.spec.criteria)
            .await
        {
            Ok(assessment) => {
                self.unavailable_streak.store(0, Ordering::SeqCst);
                candidate.apply_assessment(assessment);
                UnitOutcome::Succeeded
            }
            Err(e) => {
                warn!(
                    "Job {}: scoring failed for '{}': {e}",
                    candidate.job_id, candidate.name
                );
                candidate.flag_scoring_failure(e.to_string());
                self.note_service_failure(&e, threshold);
                UnitOutcome::Failed
            }
        };

        // Only the score columns are written; the stage machine may have moved
        // this candidate on since the snapshot was taken.
        let stored = match self.store.record_scores(candidate.id, &candidate.scores()).await {
            Ok(stored) => stored,
            Err(e) => {
                self.fail(format!("Could not persist candidate '{}': {e}", candidate.name));
                return;
            }
        };

        self.handle.status.send_modify(|job| {
            match outcome {
                UnitOutcome::Succeeded => job.scored += 1,
                UnitOutcome::Failed => job.scoring_failed += 1,
            }
            job.fold_candidate(stored);
        });
    }

    /// With fewer units than the configured threshold, every unit failing counts.
    fn threshold_for(&self, units: usize) -> usize {
        self.config
            .systemic_failure_threshold
            .max(1)
            .min(units.max(1))
    }

    fn note_service_failure(&self, err: &ServiceError, threshold: usize) {
        if !err.is_systemic() {
            self.unavailable_streak.store(0, Ordering::SeqCst);
            return;
        }
        let streak = self.unavailable_streak.fetch_add(1, Ordering::SeqCst) + 1;
        if streak >= threshold {
            self.fail(format!(
                "Stopped after {streak} consecutive service outages: {err}"
            ));
        }
    }

    fn fail(&self, message: String) {
        let failed = self.handle.status.send_if_modified(|job| {
            if job.phase.is_terminal() {
                return false;
            }
            job.error = Some(message.clone());
            job.set_phase(JobPhase::Error);
            true
        });
        if failed {
            error!("Job {}: {message}", self.job_id());
        }
    }
}
