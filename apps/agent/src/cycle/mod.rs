//! Cycle Orchestrator.
//!
//! One cycle runs `INGEST → UPSERT → DRAFT_AND_APPLY → RECONCILE`. External
//! failures degrade inside their stage; storage failures abort the cycle.
//! Cycles never overlap: every entry point goes through `trigger`, which
//! claims the shared `CycleGuard` first.

pub mod guard;
pub mod scheduler;

use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::apply::ApplyExecutor;
use crate::inbox::Inbox;
use crate::listing::{self, ListingSource};
use crate::llm_client::prompts::cover_letter_prompt;
use crate::llm_client::{CoverLetterGenerator, DraftOrigin};
use crate::matcher::{ReconcileError, ReplyMatcher};
use crate::models::{ApplicationResult, JobRow, JobStatus, NewApplication};
use crate::store::{JobStore, StoreError, UpsertOutcome};

pub use guard::CycleGuard;
pub use scheduler::spawn_scheduler;

pub const MANUAL_APPROVAL_NOTE: &str = "Awaiting manual approval to apply";

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("storage failure, cycle aborted: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    Auto,
    Manual,
}

impl ApplyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplyMode::Auto => "auto",
            ApplyMode::Manual => "manual",
        }
    }
}

impl fmt::Display for ApplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ApplyMode::Auto),
            "manual" => Ok(ApplyMode::Manual),
            other => Err(format!("unknown apply mode '{other}', expected 'auto' or 'manual'")),
        }
    }
}

/// Who asked for the cycle. Logged only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Scheduled,
    Manual,
    Cli,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriggerSource::Scheduled => "scheduled",
            TriggerSource::Manual => "manual",
            TriggerSource::Cli => "cli",
        })
    }
}

#[derive(Debug)]
pub enum TriggerOutcome {
    Completed(CycleReport),
    Failed(String),
    /// Coalesced into the cycle already in flight.
    AlreadyRunning,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub listings_fetched: usize,
    pub listings_discarded: usize,
    pub failed_sources: Vec<String>,
    pub jobs_inserted: usize,
    pub jobs_refreshed: usize,
    pub drafts: usize,
    pub fallback_drafts: usize,
    /// Target status → number of jobs moved there this cycle.
    pub transitions: BTreeMap<String, usize>,
    pub applications_recorded: usize,
    pub replies_matched: usize,
    pub reconcile_error: Option<String>,
}

impl CycleReport {
    fn record_transition(&mut self, status: JobStatus) {
        *self.transitions.entry(status.as_str().to_string()).or_default() += 1;
    }
}

#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub mode: ApplyMode,
    pub resume_path: String,
    pub reply_lookback_days: u32,
}

pub struct Orchestrator {
    store: JobStore,
    sources: Vec<Arc<dyn ListingSource>>,
    generator: Arc<dyn CoverLetterGenerator>,
    executor: Arc<dyn ApplyExecutor>,
    matcher: Option<ReplyMatcher>,
    settings: CycleSettings,
    guard: CycleGuard,
}

impl Orchestrator {
    pub fn new(
        store: JobStore,
        sources: Vec<Arc<dyn ListingSource>>,
        generator: Arc<dyn CoverLetterGenerator>,
        executor: Arc<dyn ApplyExecutor>,
        inbox: Option<Arc<dyn Inbox>>,
        settings: CycleSettings,
    ) -> Self {
        let matcher = inbox.map(|inbox| ReplyMatcher::new(store.clone(), inbox));
        Self {
            store,
            sources,
            generator,
            executor,
            matcher,
            settings,
            guard: CycleGuard::new(),
        }
    }

    pub fn mode(&self) -> ApplyMode {
        self.settings.mode
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    /// Runs one cycle unless one is already in flight.
    pub async fn trigger(&self, source: TriggerSource) -> TriggerOutcome {
        let Some(permit) = self.guard.try_start_cycle() else {
            info!(trigger = %source, "Cycle already running, trigger coalesced");
            return TriggerOutcome::AlreadyRunning;
        };

        info!(trigger = %source, mode = %self.settings.mode, "Starting cycle");
        let outcome = match self.run_cycle().await {
            Ok(report) => {
                info!(
                    inserted = report.jobs_inserted,
                    applications = report.applications_recorded,
                    replies = report.replies_matched,
                    "Cycle finished"
                );
                TriggerOutcome::Completed(report)
            }
            Err(e) => {
                error!(error = %e, "Cycle aborted");
                TriggerOutcome::Failed(e.to_string())
            }
        };
        permit.cycle_finished();
        outcome
    }

    async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let today = Utc::now().date_naive();
        let mut report = CycleReport::default();

        // ── INGEST ────────────────────────────────────────────────────────────
        let harvest = listing::harvest(&self.sources, today).await;
        report.listings_fetched = harvest.fetched;
        report.listings_discarded = harvest.discarded;
        report.failed_sources = harvest.failed_sources;

        // ── UPSERT ────────────────────────────────────────────────────────────
        for job in &harvest.jobs {
            match self.store.upsert(job).await? {
                UpsertOutcome::Inserted => report.jobs_inserted += 1,
                UpsertOutcome::Refreshed => report.jobs_refreshed += 1,
            }
        }
        info!(
            inserted = report.jobs_inserted,
            refreshed = report.jobs_refreshed,
            discarded = report.listings_discarded,
            "Listings stored"
        );

        // ── DRAFT_AND_APPLY ───────────────────────────────────────────────────
        for job in self.store.jobs_with_status(JobStatus::New).await? {
            self.draft_and_apply(&job, &mut report).await?;
        }

        // ── RECONCILE ─────────────────────────────────────────────────────────
        self.reconcile(reply_window_start(today, self.settings.reply_lookback_days), &mut report)
            .await?;

        Ok(report)
    }

    /// Exactly one application row and one status change per job.
    async fn draft_and_apply(
        &self,
        job: &JobRow,
        report: &mut CycleReport,
    ) -> Result<(), CycleError> {
        let prompt = cover_letter_prompt(&job.title, &job.company, &self.settings.resume_path);
        let draft = self.generator.generate(&prompt).await;
        report.drafts += 1;
        if draft.origin == DraftOrigin::Fallback {
            report.fallback_drafts += 1;
        }

        let (result, detail, status) = match self.settings.mode {
            ApplyMode::Manual => (
                ApplicationResult::QueuedForManual,
                MANUAL_APPROVAL_NOTE.to_string(),
                JobStatus::QueuedManual,
            ),
            ApplyMode::Auto => {
                let outcome = self.executor.attempt(job).await;
                (outcome.result.into(), outcome.detail, outcome.result.job_status())
            }
        };

        self.store
            .record_application(
                &NewApplication {
                    job_id: &job.job_id,
                    cover: &draft.text,
                    resume_path: &self.settings.resume_path,
                    result,
                    detail: &detail,
                },
                status,
                &detail,
            )
            .await?;

        info!(job_id = %job.job_id, %result, %status, "Processed job");
        report.applications_recorded += 1;
        report.record_transition(status);
        Ok(())
    }

    async fn reconcile(&self, since: NaiveDate, report: &mut CycleReport) -> Result<(), CycleError> {
        let Some(matcher) = &self.matcher else {
            info!("Inbox not configured, skipping reply check");
            return Ok(());
        };

        match matcher.reconcile(since).await {
            Ok(updated) => {
                report.replies_matched = updated;
                if updated > 0 {
                    report.transitions.insert(JobStatus::Replied.as_str().to_string(), updated);
                }
                Ok(())
            }
            Err(ReconcileError::Storage(e)) => Err(e.into()),
            Err(e @ ReconcileError::Inbox(_)) => {
                warn!(error = %e, "Reply check failed");
                report.reconcile_error = Some(e.to_string());
                Ok(())
            }
        }
    }
}

/// Clamps to the earliest representable date when the lookback reaches past it.
fn reply_window_start(today: NaiveDate, lookback_days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(lookback_days)))
        .unwrap_or(NaiveDate::MIN)
}
