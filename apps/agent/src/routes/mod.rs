pub mod dashboard;
pub mod health;
pub mod jobs;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Dashboard
        .route("/", get(dashboard::handle_dashboard))
        .route("/run_now", post(dashboard::handle_run_now))
        .route("/applications", get(dashboard::handle_applications))
        // JSON API
        .route("/api/v1/jobs", get(jobs::handle_list_jobs))
        .route("/api/v1/jobs/status", post(jobs::handle_set_status))
        .route("/api/v1/applications", get(jobs::handle_list_applications))
        .with_state(state)
}

#[cfg(test)]
pub mod testing {
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Response;
    use serde_json::Value;
    use std::sync::Arc;

    use crate::apply::{ApplyExecutor, ApplyOutcome};
    use crate::cycle::{ApplyMode, CycleSettings, Orchestrator};
    use crate::llm_client::{CoverDraft, CoverLetterGenerator};
    use crate::models::JobRow;
    use crate::state::AppState;
    use crate::store::testing::memory_store;

    struct Offline;

    #[async_trait]
    impl CoverLetterGenerator for Offline {
        async fn generate(&self, prompt: &str) -> CoverDraft {
            CoverDraft::stub(prompt)
        }
    }

    #[async_trait]
    impl ApplyExecutor for Offline {
        async fn attempt(&self, _job: &JobRow) -> ApplyOutcome {
            ApplyOutcome::no_url()
        }
    }

    /// In-memory store and an orchestrator with no sources and no inbox.
    pub async fn test_state() -> AppState {
        let store = memory_store().await;
        let orchestrator = Orchestrator::new(
            store.clone(),
            Vec::new(),
            Arc::new(Offline),
            Arc::new(Offline),
            None,
            CycleSettings {
                mode: ApplyMode::Manual,
                resume_path: "./resume/my_resume.pdf".to_string(),
                reply_lookback_days: 7,
            },
        );
        AppState {
            store,
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub async fn body_json(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
