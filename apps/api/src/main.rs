mod batch;
mod config;
mod db;
mod errors;
mod interview;
mod llm_client;
mod models;
mod ranking;
mod routes;
mod services;
mod state;
mod store;
#[cfg(test)]
mod testing;
mod transcript;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::batch::{BatchConfig, BatchOrchestrator};
use crate::config::{Config, S3Config};
use crate::db::create_pool;
use crate::interview::{ArchiveSink, InterviewStageMachine, S3Archive};
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::services::{LlmAnalyticsService, LlmExtractionService, LlmScoringService};
use crate::state::AppState;
use crate::store::{MemoryStore, PgStore, PipelineStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting hiring API v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn PipelineStore> = match &config.database_url {
        Some(url) => Arc::new(PgStore::new(create_pool(url).await?)),
        None => {
            info!("DATABASE_URL not set; using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let archive: Option<Arc<dyn ArchiveSink>> = match &config.s3 {
        Some(s3) => {
            let client = build_s3_client(s3).await;
            info!("S3 archive enabled (bucket: {})", s3.bucket);
            Some(Arc::new(S3Archive::new(client, s3.bucket.clone())))
        }
        None => {
            info!("S3_BUCKET not set; archiving disabled");
            None
        }
    };

    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let batch_config = BatchConfig {
        max_concurrency: config.extraction_concurrency,
        systemic_failure_threshold: config.systemic_failure_threshold,
        job_retention: chrono::Duration::hours(config.job_retention_hours),
    };
    let orchestrator = Arc::new(BatchOrchestrator::new(
        Arc::new(LlmExtractionService(llm.clone())),
        Arc::new(LlmScoringService(llm.clone())),
        store.clone(),
        batch_config,
    ));
    let stages = Arc::new(InterviewStageMachine::new(
        store.clone(),
        Arc::new(LlmAnalyticsService(llm)),
    ));
    info!(
        "Batch orchestrator ready (concurrency {}, systemic threshold {})",
        batch_config.max_concurrency, batch_config.systemic_failure_threshold
    );

    let state = AppState {
        store,
        orchestrator,
        stages,
        archive,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the recruiter UI has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client for MinIO (explicit endpoint and keys) or AWS
/// (default credential chain).
async fn build_s3_client(s3: &S3Config) -> aws_sdk_s3::Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(s3.region.clone()));

    if let (Some(key_id), Some(secret)) = (&s3.access_key_id, &s3.secret_access_key) {
        loader = loader.credentials_provider(Credentials::new(
            key_id,
            secret,
            None,
            None,
            "hiring-static",
        ));
    }
    if let Some(endpoint) = &s3.endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    let shared = loader.load().await;
    // MinIO serves buckets under the path, not a subdomain.
    let s3_config = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(s3.endpoint.is_some())
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
