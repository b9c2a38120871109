//! Reply matcher: correlates inbox messages with open jobs and marks them `replied`.
//!
//! Matching is a plain case-insensitive substring test of the company name
//! against `From + " " + Subject`. Short or generic company names can
//! over-match; that is an accepted limitation of the heuristic.
//!
//! Messages are processed in order and the eligible set is re-read per
//! message, so a job updated by one message drops out for the rest.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::inbox::{Inbox, InboxError, InboxMessage};
use crate::models::JobStatus;
use crate::store::{JobStore, StoreError};

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Aborts the reconcile pass; updates already written stay written.
    #[error("inbox unavailable: {0}")]
    Inbox(#[from] InboxError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub struct ReplyMatcher {
    store: JobStore,
    inbox: Arc<dyn Inbox>,
}

impl ReplyMatcher {
    pub fn new(store: JobStore, inbox: Arc<dyn Inbox>) -> Self {
        Self { store, inbox }
    }

    /// Marks every open job whose company appears in a message received on or
    /// after `since`. Returns the number of jobs moved to `replied`.
    pub async fn reconcile(&self, since: NaiveDate) -> Result<usize, ReconcileError> {
        info!("Checking inbox for replies since {since}");
        let messages = self.inbox.fetch_since(since).await?;
        if messages.is_empty() {
            info!("No messages found.");
            return Ok(0);
        }

        let mut updated = HashSet::new();
        for message in &messages {
            for job in self.store.reply_candidates().await? {
                if !company_matches(&job.company, message) {
                    continue;
                }
                info!(job_id = %job.job_id, company = %job.company, "Matched email -> updating job");
                self.store
                    .set_status(&job.job_id, JobStatus::Replied, &reply_note(message))
                    .await?;
                updated.insert(job.job_id);
            }
        }

        debug!(messages = messages.len(), updated = updated.len(), "Reconcile finished");
        Ok(updated.len())
    }
}

/// Case-insensitive substring test; an empty company never matches.
pub fn company_matches(company: &str, message: &InboxMessage) -> bool {
    let company = company.trim().to_lowercase();
    if company.is_empty() {
        return false;
    }
    let haystack = format!("{} {}", message.from, message.subject).to_lowercase();
    haystack.contains(&company)
}

fn reply_note(message: &InboxMessage) -> String {
    format!("Email matched: {} from {}", message.subject, message.from)
}
