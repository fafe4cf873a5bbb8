use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::candidate::{
    AiAssessment, AttributeMap, Candidate, CandidateScores, Decision, PipelineStatus,
};
use crate::models::interview::{
    Analytics, AnalyticsReport, Interview, InterviewStatus, QuestionRecord, TranscriptTurn,
};
use crate::store::{PipelineStore, StageCompletion, StoreError};

// ────────────────────────────────────────────────────────────────────────────
// Row types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, FromRow)]
struct CandidateRow {
    id: Uuid,
    job_id: Uuid,
    tenant_id: Uuid,
    name: String,
    attributes: Json<AttributeMap>,
    algo_score: Option<i16>,
    ai_score: Option<i16>,
    final_score: Option<i16>,
    tier: Option<String>,
    assessment: Option<Json<AiAssessment>>,
    data_completeness: i16,
    pipeline_status: String,
    final_decision: Option<String>,
    decision_notes: Option<String>,
    decided_at: Option<DateTime<Utc>>,
    extraction_error: Option<String>,
    scoring_error: Option<String>,
    archived_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CandidateRow> for Candidate {
    type Error = StoreError;

    fn try_from(row: CandidateRow) -> Result<Self, Self::Error> {
        Ok(Candidate {
            id: row.id,
            job_id: row.job_id,
            tenant_id: row.tenant_id,
            name: row.name,
            attributes: row.attributes.0,
            algo_score: row.algo_score.map(score_from_db),
            ai_score: row.ai_score.map(score_from_db),
            final_score: row.final_score.map(score_from_db),
            tier: row.tier.as_deref().map(str::parse).transpose()?,
            assessment: row.assessment.map(|a| a.0),
            data_completeness: score_from_db(row.data_completeness),
            pipeline_status: row.pipeline_status.parse()?,
            final_decision: row.final_decision.as_deref().map(str::parse).transpose()?,
            decision_notes: row.decision_notes,
            decided_at: row.decided_at,
            extraction_error: row.extraction_error,
            scoring_error: row.scoring_error,
            archived_at: row.archived_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct InterviewRow {
    id: Uuid,
    candidate_id: Uuid,
    stage: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<InterviewRow> for Interview {
    type Error = StoreError;

    fn try_from(row: InterviewRow) -> Result<Self, Self::Error> {
        Ok(Interview {
            id: row.id,
            candidate_id: row.candidate_id,
            stage: row.stage.parse()?,
            status: row.status.parse()?,
            started_at: row.started_at,
            completed_at: row.completed_at,
            cancelled_at: row.cancelled_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct AnalyticsRow {
    interview_id: Uuid,
    candidate_id: Uuid,
    stage: String,
    report: Json<AnalyticsReport>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AnalyticsRow> for Analytics {
    type Error = StoreError;

    fn try_from(row: AnalyticsRow) -> Result<Self, Self::Error> {
        Ok(Analytics {
            interview_id: row.interview_id,
            candidate_id: row.candidate_id,
            stage: row.stage.parse()?,
            report: row.report.0,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct QuestionRow {
    id: Uuid,
    interview_id: Uuid,
    candidate_id: Uuid,
    stage: String,
    question: String,
    topic: String,
    answer_quality: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<QuestionRow> for QuestionRecord {
    type Error = StoreError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(QuestionRecord {
            id: row.id,
            interview_id: row.interview_id,
            candidate_id: row.candidate_id,
            stage: row.stage.parse()?,
            question: row.question,
            topic: row.topic,
            answer_quality: row.answer_quality.parse()?,
            created_at: row.created_at,
        })
    }
}

fn score_from_db(v: i16) -> u8 {
    v.clamp(0, 100) as u8
}

/// Maps a unique-key violation to `Conflict`; everything else stays a database error.
fn conflict_or_db(e: sqlx::Error, what: impl FnOnce() -> String) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Conflict(what());
        }
    }
    StoreError::Database(e)
}

// ────────────────────────────────────────────────────────────────────────────
// PgStore
// ────────────────────────────────────────────────────────────────────────────

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Writes the interview's lifecycle columns if its stored status is still `from`.
async fn transition_interview_in(
    conn: &mut PgConnection,
    i: &Interview,
    from: InterviewStatus,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE interviews
        SET status = $2, started_at = $3, completed_at = $4, cancelled_at = $5
        WHERE id = $1 AND status = $6
        "#,
    )
    .bind(i.id)
    .bind(i.status.as_str())
    .bind(i.started_at)
    .bind(i.completed_at)
    .bind(i.cancelled_at)
    .bind(from.as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(missing_or_conflict(
            &mut *conn,
            "interviews",
            "interview",
            i.id,
            format!("interview {} is no longer {}", i.id, from.as_str()),
        )
        .await);
    }
    Ok(())
}

/// A conditional write touched no row: `NotFound` when the row is gone,
/// otherwise `Conflict` because it left the state the write expected.
async fn missing_or_conflict<'e>(
    exec: impl PgExecutor<'e>,
    table: &'static str,
    entity: &'static str,
    id: Uuid,
    conflict: String,
) -> StoreError {
    let sql = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = $1)");
    match sqlx::query_scalar::<_, bool>(&sql)
        .bind(id)
        .fetch_one(exec)
        .await
    {
        Ok(true) => StoreError::Conflict(conflict),
        Ok(false) => StoreError::NotFound { entity, id },
        Err(e) => StoreError::Database(e),
    }
}

async fn candidate_or_conflict(
    pool: &PgPool,
    row: Option<CandidateRow>,
    id: Uuid,
    conflict: impl FnOnce() -> String,
) -> Result<Candidate, StoreError> {
    match row {
        Some(row) => row.try_into(),
        None => Err(missing_or_conflict(pool, "candidates", "candidate", id, conflict()).await),
    }
}

#[async_trait]
impl PipelineStore for PgStore {
    async fn insert_candidate(&self, c: &Candidate) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO candidates
                (id, job_id, tenant_id, name, attributes, algo_score, ai_score, final_score,
                 tier, assessment, data_completeness, pipeline_status, final_decision,
                 decision_notes, decided_at, extraction_error, scoring_error, archived_at,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(c.id)
        .bind(c.job_id)
        .bind(c.tenant_id)
        .bind(&c.name)
        .bind(Json(&c.attributes))
        .bind(c.algo_score.map(i16::from))
        .bind(c.ai_score.map(i16::from))
        .bind(c.final_score.map(i16::from))
        .bind(c.tier.map(|t| t.as_str()))
        .bind(c.assessment.as_ref().map(Json))
        .bind(i16::from(c.data_completeness))
        .bind(c.pipeline_status.as_str())
        .bind(c.final_decision.map(|d| d.as_str()))
        .bind(&c.decision_notes)
        .bind(c.decided_at)
        .bind(&c.extraction_error)
        .bind(&c.scoring_error)
        .bind(c.archived_at)
        .bind(c.created_at)
        .bind(c.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, || format!("candidate {} already exists", c.id)))?;
        Ok(())
    }

    async fn get_candidate(&self, id: Uuid) -> Result<Candidate, StoreError> {
        sqlx::query_as::<_, CandidateRow>("SELECT * FROM candidates WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "candidate",
                id,
            })?
            .try_into()
    }

    async fn candidates_for_job(&self, job_id: Uuid) -> Result<Vec<Candidate>, StoreError> {
        sqlx::query_as::<_, CandidateRow>(
            "SELECT * FROM candidates WHERE job_id = $1 ORDER BY created_at, id",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Candidate::try_from)
        .collect()
    }

    async fn record_scores(
        &self,
        id: Uuid,
        scores: &CandidateScores,
    ) -> Result<Candidate, StoreError> {
        sqlx::query_as::<_, CandidateRow>(
            r#"
            UPDATE candidates
            SET ai_score = $2, final_score = $3, tier = $4, assessment = $5,
                scoring_error = $6, updated_at = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(scores.ai_score.map(i16::from))
        .bind(scores.final_score.map(i16::from))
        .bind(scores.tier.map(|t| t.as_str()))
        .bind(scores.assessment.as_ref().map(Json))
        .bind(&scores.scoring_error)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound {
            entity: "candidate",
            id,
        })?
        .try_into()
    }

    async fn set_pipeline_status(
        &self,
        id: Uuid,
        status: PipelineStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE candidates SET pipeline_status = $2, updated_at = $3
            WHERE id = $1 AND final_decision IS NULL AND archived_at IS NULL
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(missing_or_conflict(
                &self.pool,
                "candidates",
                "candidate",
                id,
                format!("candidate {id} is decided or archived"),
            )
            .await);
        }
        Ok(())
    }

    async fn record_decision(
        &self,
        id: Uuid,
        decision: Decision,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Candidate, StoreError> {
        let row = sqlx::query_as::<_, CandidateRow>(
            r#"
            UPDATE candidates
            SET final_decision = $2, decision_notes = $3, decided_at = $4,
                pipeline_status = $5, updated_at = $4
            WHERE id = $1 AND final_decision IS NULL AND archived_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(decision.as_str())
        .bind(notes)
        .bind(at)
        .bind(PipelineStatus::from(decision).as_str())
        .fetch_optional(&self.pool)
        .await?;
        candidate_or_conflict(&self.pool, row, id, || {
            format!("candidate {id} is decided or archived")
        })
        .await
    }

    async fn mark_archived(
        &self,
        id: Uuid,
        seen_updated_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<Candidate, StoreError> {
        let row = sqlx::query_as::<_, CandidateRow>(
            r#"
            UPDATE candidates SET archived_at = $3, updated_at = $3
            WHERE id = $1 AND archived_at IS NULL AND updated_at = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(seen_updated_at)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        candidate_or_conflict(&self.pool, row, id, || {
            format!("candidate {id} changed or was archived while archiving")
        })
        .await
    }

    async fn insert_interview(&self, interview: &Interview) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO interviews
                (id, candidate_id, stage, status, started_at, completed_at, cancelled_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(interview.id)
        .bind(interview.candidate_id)
        .bind(interview.stage.as_str())
        .bind(interview.status.as_str())
        .bind(interview.started_at)
        .bind(interview.completed_at)
        .bind(interview.cancelled_at)
        .bind(interview.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_or_db(e, || {
                format!(
                    "candidate {} already has a {} interview",
                    interview.candidate_id,
                    interview.stage.as_str()
                )
            })
        })?;
        Ok(())
    }

    async fn transition_interview(
        &self,
        interview: &Interview,
        from: InterviewStatus,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        transition_interview_in(&mut conn, interview, from).await
    }

    async fn get_interview(&self, id: Uuid) -> Result<Interview, StoreError> {
        sqlx::query_as::<_, InterviewRow>("SELECT * FROM interviews WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "interview",
                id,
            })?
            .try_into()
    }

    async fn interviews_for(&self, candidate_id: Uuid) -> Result<Vec<Interview>, StoreError> {
        let rows = sqlx::query_as::<_, InterviewRow>(
            "SELECT * FROM interviews WHERE candidate_id = $1",
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;

        let mut out = rows
            .into_iter()
            .map(Interview::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        out.sort_by_key(|i| i.stage);
        Ok(out)
    }

    async fn transcript_for(&self, interview_id: Uuid) -> Result<Vec<TranscriptTurn>, StoreError> {
        let turns: Option<Json<Vec<TranscriptTurn>>> =
            sqlx::query_scalar("SELECT turns FROM transcripts WHERE interview_id = $1")
                .bind(interview_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(turns.map(|t| t.0).unwrap_or_default())
    }

    async fn analytics_for(&self, candidate_id: Uuid) -> Result<Vec<Analytics>, StoreError> {
        let rows = sqlx::query_as::<_, AnalyticsRow>(
            r#"
            SELECT interview_id, candidate_id, stage, report, created_at
            FROM analytics
            WHERE candidate_id = $1
            "#,
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;

        let mut out = rows
            .into_iter()
            .map(Analytics::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        out.sort_by_key(|a| a.stage);
        Ok(out)
    }

    async fn questions_for(&self, candidate_id: Uuid) -> Result<Vec<QuestionRecord>, StoreError> {
        sqlx::query_as::<_, QuestionRow>(
            "SELECT * FROM question_records WHERE candidate_id = $1 ORDER BY created_at, id",
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(QuestionRecord::try_from)
        .collect()
    }

    async fn complete_stage(&self, completion: &StageCompletion) -> Result<(), StoreError> {
        let interview_id = completion.interview.id;
        let mut tx = self.pool.begin().await?;

        transition_interview_in(&mut *tx, &completion.interview, InterviewStatus::Active).await?;

        sqlx::query("INSERT INTO transcripts (interview_id, turns) VALUES ($1, $2)")
            .bind(interview_id)
            .bind(Json(&completion.turns))
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                conflict_or_db(e, || format!("interview {interview_id} already has a transcript"))
            })?;

        let a = &completion.analytics;
        sqlx::query(
            r#"
            INSERT INTO analytics (interview_id, candidate_id, stage, overall_score, report, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(a.interview_id)
        .bind(a.candidate_id)
        .bind(a.stage.as_str())
        .bind(i16::from(a.report.overall_score))
        .bind(Json(&a.report))
        .bind(a.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            conflict_or_db(e, || format!("interview {interview_id} already has analytics"))
        })?;

        for q in &completion.questions {
            sqlx::query(
                r#"
                INSERT INTO question_records
                    (id, interview_id, candidate_id, stage, question, topic, answer_quality, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(q.id)
            .bind(q.interview_id)
            .bind(q.candidate_id)
            .bind(q.stage.as_str())
            .bind(&q.question)
            .bind(&q.topic)
            .bind(q.answer_quality.as_str())
            .bind(q.created_at)
            .execute(&mut *tx)
            .await?;
        }

        let candidate_id = completion.interview.candidate_id;
        let result = sqlx::query(
            r#"
            UPDATE candidates SET pipeline_status = $2, updated_at = $3
            WHERE id = $1 AND final_decision IS NULL AND archived_at IS NULL
            "#,
        )
        .bind(candidate_id)
        .bind(completion.pipeline_status.as_str())
        .bind(completion.analytics.created_at)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            // Dropping `tx` rolls back the interview and analytics writes.
            return Err(missing_or_conflict(
                &mut *tx,
                "candidates",
                "candidate",
                candidate_id,
                format!("candidate {candidate_id} is decided or archived"),
            )
            .await);
        }

        tx.commit().await?;
        Ok(())
    }
}
