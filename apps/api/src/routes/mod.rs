pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::batch::handlers as jobs;
use crate::interview::handlers as interviews;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Batch jobs
        .route("/api/v1/jobs", post(jobs::handle_start_job))
        .route("/api/v1/jobs/upload", post(jobs::handle_upload_job))
        .route("/api/v1/jobs/:id", get(jobs::handle_get_job))
        .route("/api/v1/jobs/:id/confirm", post(jobs::handle_confirm_job))
        .route("/api/v1/jobs/:id/cancel", post(jobs::handle_cancel_job))
        .route("/api/v1/jobs/:id/rescore", post(jobs::handle_rescore_job))
        // Candidates and interview stages
        .route(
            "/api/v1/candidates/:id",
            get(interviews::handle_get_candidate),
        )
        .route(
            "/api/v1/candidates/:id/next-stage",
            get(interviews::handle_next_stage),
        )
        .route(
            "/api/v1/candidates/:id/interviews",
            get(interviews::handle_list_interviews).post(interviews::handle_start_interview),
        )
        .route(
            "/api/v1/candidates/:id/decision",
            patch(interviews::handle_submit_decision),
        )
        .route(
            "/api/v1/candidates/:id/archive",
            post(interviews::handle_archive_candidate),
        )
        .route(
            "/api/v1/interviews/:id/analytics",
            post(interviews::handle_record_analytics),
        )
        .route(
            "/api/v1/interviews/:id/cancel",
            post(interviews::handle_cancel_interview),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::batch::{BatchConfig, BatchOrchestrator};
    use crate::interview::{ArchiveSink, InterviewStageMachine};
    use crate::store::{MemoryStore, PipelineStore};
    use crate::testing::{FakeAnalytics, FakeExtractor, FakeScorer, MemoryArchive};

    fn test_state(with_archive: bool) -> AppState {
        let store: Arc<dyn PipelineStore> = Arc::new(MemoryStore::new());
        AppState {
            orchestrator: Arc::new(BatchOrchestrator::new(
                Arc::new(FakeExtractor::default()),
                Arc::new(FakeScorer),
                store.clone(),
                BatchConfig::default(),
            )),
            stages: Arc::new(InterviewStageMachine::new(
                store.clone(),
                Arc::new(FakeAnalytics::default()),
            )),
            archive: with_archive
                .then(|| Arc::new(MemoryArchive::default()) as Arc<dyn ArchiveSink>),
            store,
        }
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn wait_for_phase(app: &Router, job_id: &str, phase: &str) -> Value {
        for _ in 0..200 {
            let (_, job) = send(app, Method::GET, &format!("/api/v1/jobs/{job_id}"), None).await;
            if job["phase"] == phase {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {job_id} never reached {phase}");
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(test_state(false));
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "hiring-api");
    }

    #[tokio::test]
    async fn test_job_flow_over_http() {
        let app = build_router(test_state(false));
        let tenant = Uuid::new_v4();
        let (status, started) = send(
            &app,
            Method::POST,
            "/api/v1/jobs",
            Some(json!({
                "tenant_id": tenant,
                "fields": [{"name": "years", "field_type": "number", "required": true}],
                "resumes": [
                    {"name": "Ada", "text": "years=9"},
                    {"name": "Grace", "text": "years=3"}
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let job_id = started["job_id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/jobs",
            Some(json!({"tenant_id": tenant, "resumes": [{"name": "Alan", "text": "years=1"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "JOB_ALREADY_RUNNING");

        wait_for_phase(&app, &job_id, "waiting_confirmation").await;
        let (status, _) = send(&app, Method::POST, &format!("/api/v1/jobs/{job_id}/confirm"), None).await;
        assert_eq!(status, StatusCode::OK);
        let job = wait_for_phase(&app, &job_id, "complete").await;
        assert_eq!(job["scored"], 2);

        let candidate_id = job["candidates"][0]["id"].as_str().unwrap().to_string();
        let (status, stage) = send(
            &app,
            Method::GET,
            &format!("/api/v1/candidates/{candidate_id}/next-stage"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stage["next_stage"], "phone_screen");

        let (status, started) = send(
            &app,
            Method::POST,
            &format!("/api/v1/candidates/{candidate_id}/interviews"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(started["interview"]["stage"], "phone_screen");
        assert_eq!(
            started["context"]["suggested_questions"][0],
            "Tell me about pricing negotiation?"
        );

        let (status, body) = send(
            &app,
            Method::PATCH,
            &format!("/api/v1/candidates/{candidate_id}/decision"),
            Some(json!({"decision": "accepted"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "STAGES_INCOMPLETE");
    }

    #[tokio::test]
    async fn test_unknown_ids_are_404() {
        let app = build_router(test_state(false));
        let missing = Uuid::new_v4();
        for uri in [
            format!("/api/v1/jobs/{missing}"),
            format!("/api/v1/candidates/{missing}"),
        ] {
            let (status, body) = send(&app, Method::GET, &uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["error"]["code"], "NOT_FOUND");
        }
    }

    #[tokio::test]
    async fn test_invalid_weights_are_rejected() {
        let app = build_router(test_state(false));
        let tenant = Uuid::new_v4();
        let (_, started) = send(
            &app,
            Method::POST,
            "/api/v1/jobs",
            Some(json!({"tenant_id": tenant, "resumes": [{"name": "Ada", "text": "years=9"}]})),
        )
        .await;
        let job_id = started["job_id"].as_str().unwrap().to_string();
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/v1/jobs/{job_id}/rescore"),
            Some(json!({"boosts": {"missing": 1.5}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_archive_without_bucket_is_503() {
        let app = build_router(test_state(false));
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/v1/candidates/{}/archive", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let app = build_router(test_state(true));
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/v1/candidates/{}/archive", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
