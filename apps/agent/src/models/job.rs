use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Upper bound on the length of a job fingerprint, in characters.
pub const JOB_ID_MAX_CHARS: usize = 200;

/// Lifecycle of a tracked posting.
///
/// The machine only moves forward: nothing ever returns to `New`, and
/// `Replied`/`Hired`/`Closed` are never rescanned by the reply matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum JobStatus {
    New,
    QueuedManual,
    Applied,
    Error,
    AutomationError,
    Replied,
    Hired,
    Closed,
}

impl JobStatus {
    /// Jobs in these states are excluded from reply matching.
    pub const REPLY_TERMINAL: [JobStatus; 3] =
        [JobStatus::Replied, JobStatus::Hired, JobStatus::Closed];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::New => "new",
            JobStatus::QueuedManual => "queued_manual",
            JobStatus::Applied => "applied",
            JobStatus::Error => "error",
            JobStatus::AutomationError => "automation_error",
            JobStatus::Replied => "replied",
            JobStatus::Hired => "hired",
            JobStatus::Closed => "closed",
        }
    }

    /// Whether `self → next` is a legal forward move.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (New, QueuedManual | Applied | Error | AutomationError | Replied) => true,
            (QueuedManual, Applied | Replied | Closed) => true,
            (Applied | Error | AutomationError, Replied | Closed) => true,
            (Replied, Hired | Closed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: i64,
    pub job_id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub url: Option<String>,
    pub posted_date: NaiveDate,
    pub status: JobStatus,
    pub applied_at: Option<DateTime<Utc>>,
    pub notes: String,
}

/// A posting as it enters the store. Status and notes are owned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub job_id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub url: Option<String>,
    pub posted_date: NaiveDate,
}

/// Deterministic dedup key: `company|title|url`, truncated on a char boundary.
pub fn job_fingerprint(company: &str, title: &str, url: &str) -> String {
    format!("{company}|{title}|{url}")
        .chars()
        .take(JOB_ID_MAX_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVERY_STATUS: [JobStatus; 8] = [
        JobStatus::New,
        JobStatus::QueuedManual,
        JobStatus::Applied,
        JobStatus::Error,
        JobStatus::AutomationError,
        JobStatus::Replied,
        JobStatus::Hired,
        JobStatus::Closed,
    ];

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = job_fingerprint("Acme", "SWE", "https://x/1");
        let b = job_fingerprint("Acme", "SWE", "https://x/1");
        assert_eq!(a, b);
        assert_eq!(a, "Acme|SWE|https://x/1");
    }

    #[test]
    fn test_fingerprint_differs_on_url() {
        assert_ne!(
            job_fingerprint("Acme", "SWE", "https://x/1"),
            job_fingerprint("Acme", "SWE", "https://x/2")
        );
    }

    #[test]
    fn test_fingerprint_truncates_on_char_boundary() {
        let long_title = "é".repeat(500);
        let id = job_fingerprint("Acme", &long_title, "https://x/1");
        assert_eq!(id.chars().count(), JOB_ID_MAX_CHARS);
        assert!(id.starts_with("Acme|é"));
    }

    #[test]
    fn test_status_wire_name_matches_display() {
        for status in EVERY_STATUS {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.to_string());
            assert_eq!(serde_json::from_value::<JobStatus>(json).unwrap(), status);
        }
        assert!(serde_json::from_str::<JobStatus>("\"selenium_error\"").is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::QueuedManual).unwrap();
        assert_eq!(json, "\"queued_manual\"");
    }

    #[test]
    fn test_nothing_transitions_back_to_new() {
        for from in EVERY_STATUS {
            assert!(!from.can_transition_to(JobStatus::New), "{from} -> new");
        }
    }

    #[test]
    fn test_terminal_states_have_no_exit_except_replied_outcomes() {
        assert!(JobStatus::Replied.can_transition_to(JobStatus::Hired));
        assert!(JobStatus::Replied.can_transition_to(JobStatus::Closed));
        for next in EVERY_STATUS {
            assert!(!JobStatus::Hired.can_transition_to(next));
            assert!(!JobStatus::Closed.can_transition_to(next));
        }
    }

    #[test]
    fn test_every_open_state_can_reach_replied() {
        for from in [
            JobStatus::New,
            JobStatus::QueuedManual,
            JobStatus::Applied,
            JobStatus::Error,
            JobStatus::AutomationError,
        ] {
            assert!(!JobStatus::REPLY_TERMINAL.contains(&from));
            assert!(from.can_transition_to(JobStatus::Replied));
        }
    }
}
