use std::sync::Arc;

use crate::cycle::Orchestrator;
use crate::store::JobStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: JobStore,
    /// Same orchestrator the scheduler drives, so `run_now` shares its guard.
    pub orchestrator: Arc<Orchestrator>,
}
