use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::models::{ApplicationRow, JobRow, JobStatus};
use crate::state::AppState;
use crate::store::{JobFilter, Order};

pub const DEFAULT_LIMIT: u32 = 200;
pub const MAX_LIMIT: u32 = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct JobsQuery {
    pub status: Option<JobStatus>,
    pub limit: Option<u32>,
    pub order: Option<Order>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
    pub order: Option<Order>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub job_id: String,
    pub status: JobStatus,
    /// Replaces the job's notes when present.
    pub notes: Option<String>,
}

fn checked_limit(limit: Option<u32>) -> Result<u32, AppError> {
    match limit.unwrap_or(DEFAULT_LIMIT) {
        0 => Err(AppError::Validation("limit must be at least 1".to_string())),
        n if n > MAX_LIMIT => Err(AppError::Validation(format!(
            "limit must be at most {MAX_LIMIT}"
        ))),
        n => Ok(n),
    }
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobsQuery>,
) -> Result<Json<Vec<JobRow>>, AppError> {
    let limit = checked_limit(params.limit)?;
    let filter = JobFilter {
        status: params.status,
    };
    let jobs = state
        .store
        .list_jobs(filter, limit, params.order.unwrap_or_default())
        .await?;
    Ok(Json(jobs))
}

/// GET /api/v1/applications
pub async fn handle_list_applications(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<ApplicationRow>>, AppError> {
    let limit = checked_limit(params.limit)?;
    let applications = state
        .store
        .list_applications(limit, params.order.unwrap_or_default())
        .await?;
    Ok(Json(applications))
}

/// POST /api/v1/jobs/status
///
/// Operator-driven move, e.g. `replied → hired`. Only forward transitions
/// are accepted.
pub async fn handle_set_status(
    State(state): State<AppState>,
    Json(req): Json<StatusChange>,
) -> Result<Json<JobRow>, AppError> {
    let job = state
        .store
        .get_job(&req.job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", req.job_id)))?;

    if !job.status.can_transition_to(req.status) {
        return Err(AppError::UnprocessableEntity(format!(
            "cannot move job from {} to {}",
            job.status, req.status
        )));
    }

    let notes = req.notes.unwrap_or(job.notes);
    state.store.set_status(&job.job_id, req.status, &notes).await?;
    info!(job_id = %job.job_id, from = %job.status, to = %req.status, "Operator changed job status");

    let updated = state
        .store
        .get_job(&job.job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job.job_id)))?;
    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::models::JobStatus;
    use crate::routes::build_router;
    use crate::routes::testing::{body_json, test_state};
    use crate::store::testing::new_job;

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_jobs_filters_by_status() {
        let state = test_state().await;
        let a = new_job("Acme", "SWE", "https://x/1");
        let b = new_job("Globex", "SRE", "https://x/2");
        state.store.upsert(&a).await.unwrap();
        state.store.upsert(&b).await.unwrap();
        state.store.set_status(&b.job_id, JobStatus::Applied, "").await.unwrap();

        let response = build_router(state)
            .oneshot(Request::get("/api/v1/jobs?status=applied").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let jobs = body_json(response).await;
        assert_eq!(jobs.as_array().unwrap().len(), 1);
        assert_eq!(jobs[0]["company"], "Globex");
        assert_eq!(jobs[0]["status"], "applied");
    }

    #[tokio::test]
    async fn test_list_jobs_rejects_zero_limit() {
        let response = build_router(test_state().await)
            .oneshot(Request::get("/api/v1/jobs?limit=0").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_operator_can_mark_replied_job_hired() {
        let state = test_state().await;
        let job = new_job("Acme", "SWE", "https://x/1");
        state.store.upsert(&job).await.unwrap();
        state.store.set_status(&job.job_id, JobStatus::Replied, "Email matched").await.unwrap();

        let response = build_router(state.clone())
            .oneshot(post_json(
                "/api/v1/jobs/status",
                json!({ "job_id": job.job_id, "status": "hired", "notes": "offer accepted" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "hired");

        let row = state.store.get_job(&job.job_id).await.unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Hired);
        assert_eq!(row.notes, "offer accepted");
    }

    #[tokio::test]
    async fn test_backward_transition_is_unprocessable() {
        let state = test_state().await;
        let job = new_job("Acme", "SWE", "https://x/1");
        state.store.upsert(&job).await.unwrap();
        state.store.set_status(&job.job_id, JobStatus::Closed, "").await.unwrap();

        let response = build_router(state.clone())
            .oneshot(post_json(
                "/api/v1/jobs/status",
                json!({ "job_id": job.job_id, "status": "new" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let row = state.store.get_job(&job.job_id).await.unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Closed);
    }

    #[tokio::test]
    async fn test_status_change_for_unknown_job_is_not_found() {
        let response = build_router(test_state().await)
            .oneshot(post_json(
                "/api/v1/jobs/status",
                json!({ "job_id": "nobody|nothing|", "status": "closed" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
