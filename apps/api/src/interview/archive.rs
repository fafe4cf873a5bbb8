use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::models::candidate::Candidate;
use crate::models::interview::{Analytics, Interview, TranscriptTurn};
use crate::store::{PipelineStore, StoreError};

/// Destination for archived candidate dossiers.
#[async_trait]
pub trait ArchiveSink: Send + Sync {
    async fn put(&self, key: &str, body: Bytes) -> Result<(), String>;
}

/// Writes dossiers to an S3 (or MinIO) bucket.
pub struct S3Archive {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Archive {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ArchiveSink for S3Archive {
    async fn put(&self, key: &str, body: Bytes) -> Result<(), String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| format!("S3 upload failed: {e}"))?;

        info!("Uploaded dossier to s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct InterviewRecord {
    #[serde(flatten)]
    pub interview: Interview,
    pub transcript: Vec<TranscriptTurn>,
}

/// Everything recorded about one candidate.
#[derive(Debug, Serialize)]
pub struct Dossier {
    pub candidate: Candidate,
    pub interviews: Vec<InterviewRecord>,
    pub analytics: Vec<Analytics>,
    pub archived_at: DateTime<Utc>,
}

pub fn archive_key(candidate: &Candidate) -> String {
    format!("archives/{}/{}.json", candidate.tenant_id, candidate.id)
}

pub async fn build_dossier(
    store: &dyn PipelineStore,
    candidate_id: Uuid,
    archived_at: DateTime<Utc>,
) -> Result<Dossier, StoreError> {
    let candidate = store.get_candidate(candidate_id).await?;
    let mut interviews = Vec::new();
    for interview in store.interviews_for(candidate_id).await? {
        let transcript = store.transcript_for(interview.id).await?;
        interviews.push(InterviewRecord {
            interview,
            transcript,
        });
    }
    let analytics = store.analytics_for(candidate_id).await?;

    Ok(Dossier {
        candidate,
        interviews,
        analytics,
        archived_at,
    })
}
