//! Apply Executor: automated submission against a job page.
//!
//! Every attempt is classified into the fixed `ApplyResult` vocabulary;
//! nothing raised inside the browser flow reaches the orchestrator.

pub mod webdriver;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::{ApplicationResult, JobRow, JobStatus};

pub use webdriver::{WebDriverConfig, WebDriverExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyResult {
    Applied,
    ManualRequired,
    NoUrl,
    AutomationError,
}

impl ApplyResult {
    /// Status a `new` job moves to after an automated attempt.
    pub fn job_status(self) -> JobStatus {
        match self {
            ApplyResult::Applied => JobStatus::Applied,
            ApplyResult::ManualRequired => JobStatus::QueuedManual,
            ApplyResult::NoUrl => JobStatus::Error,
            ApplyResult::AutomationError => JobStatus::AutomationError,
        }
    }
}

impl From<ApplyResult> for ApplicationResult {
    fn from(result: ApplyResult) -> Self {
        match result {
            ApplyResult::Applied => ApplicationResult::Applied,
            ApplyResult::ManualRequired => ApplicationResult::ManualRequired,
            ApplyResult::NoUrl => ApplicationResult::NoUrl,
            ApplyResult::AutomationError => ApplicationResult::AutomationError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    pub result: ApplyResult,
    pub detail: String,
}

impl ApplyOutcome {
    pub fn new(result: ApplyResult, detail: impl Into<String>) -> Self {
        Self {
            result,
            detail: detail.into(),
        }
    }

    pub fn no_url() -> Self {
        Self::new(ApplyResult::NoUrl, "job has no url")
    }
}

/// Attempts one automated application. Slow; callers run it sequentially.
#[async_trait]
pub trait ApplyExecutor: Send + Sync {
    async fn attempt(&self, job: &JobRow) -> ApplyOutcome;
}
