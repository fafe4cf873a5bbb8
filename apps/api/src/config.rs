use anyhow::{Context, Result};

/// S3 / MinIO settings for the candidate archive.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres store when set; in-memory store otherwise.
    pub database_url: Option<String>,
    /// Archiving is disabled when `S3_BUCKET` is unset.
    pub s3: Option<S3Config>,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub extraction_concurrency: usize,
    pub systemic_failure_threshold: usize,
    /// Hours a finished batch stays pollable.
    pub job_retention_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let s3 = optional_env("S3_BUCKET").map(|bucket| S3Config {
            bucket,
            endpoint: optional_env("S3_ENDPOINT"),
            region: optional_env("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            access_key_id: optional_env("AWS_ACCESS_KEY_ID"),
            secret_access_key: optional_env("AWS_SECRET_ACCESS_KEY"),
        });

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            s3,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            extraction_concurrency: parse_env("EXTRACTION_CONCURRENCY", 4)
                .context("EXTRACTION_CONCURRENCY must be a positive integer")?
                .max(1),
            systemic_failure_threshold: parse_env("SYSTEMIC_FAILURE_THRESHOLD", 3)
                .context("SYSTEMIC_FAILURE_THRESHOLD must be a positive integer")?
                .max(1),
            job_retention_hours: parse_env("JOB_RETENTION_HOURS", 24)
                .context("JOB_RETENTION_HOURS must be an integer")?
                .max(0),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("'{key}' has invalid value '{raw}'")),
        None => Ok(default),
    }
}
