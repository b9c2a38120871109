use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Outcome vocabulary recorded on every application attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ApplicationResult {
    Applied,
    ManualRequired,
    NoUrl,
    AutomationError,
    QueuedForManual,
}

impl ApplicationResult {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationResult::Applied => "applied",
            ApplicationResult::ManualRequired => "manual_required",
            ApplicationResult::NoUrl => "no_url",
            ApplicationResult::AutomationError => "automation_error",
            ApplicationResult::QueuedForManual => "queued_for_manual",
        }
    }
}

impl fmt::Display for ApplicationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one attempt (automated or queued) to apply to a job.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationRow {
    pub id: i64,
    pub job_id: String,
    pub cover: String,
    pub resume_path: String,
    pub attempt_time: DateTime<Utc>,
    pub result: ApplicationResult,
    pub detail: String,
}

/// Write-side shape of an application row.
#[derive(Debug, Clone)]
pub struct NewApplication<'a> {
    pub job_id: &'a str,
    pub cover: &'a str,
    pub resume_path: &'a str,
    pub result: ApplicationResult,
    pub detail: &'a str,
}
