use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Liveness plus a `SELECT 1` round-trip to the job database.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database_ok = sqlx::query("SELECT 1")
        .execute(state.store.pool())
        .await
        .map_err(|e| tracing::warn!("Health check failed: {e}"))
        .is_ok();

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if database_ok { "ok" } else { "degraded" },
            "version": env!("CARGO_PKG_VERSION"),
            "service": env!("CARGO_PKG_NAME"),
            "database": database_ok,
            "cycle_running": state.orchestrator.is_running(),
        })),
    )
}
