//! Operator dashboard: the HTML job table, the Run Now trigger and the
//! legacy applications feed.

use axum::{extract::State, response::Html, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;

use crate::cycle::{CycleReport, TriggerOutcome, TriggerSource};
use crate::errors::AppError;
use crate::models::{ApplicationResult, JobRow};
use crate::routes::jobs::DEFAULT_LIMIT;
use crate::state::AppState;
use crate::store::{JobFilter, Order};

#[derive(Debug, Serialize)]
pub struct RunNowResponse {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<CycleReport>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationView {
    pub job_id: String,
    pub cover: String,
    pub resume: String,
    pub time: DateTime<Utc>,
    pub result: ApplicationResult,
    pub detail: String,
}

/// GET /
pub async fn handle_dashboard(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let jobs = state
        .store
        .list_jobs(JobFilter::default(), DEFAULT_LIMIT, Order::NewestFirst)
        .await?;
    Ok(Html(render_dashboard(
        &jobs,
        state.orchestrator.mode().as_str(),
        state.orchestrator.is_running(),
    )))
}

/// POST /run_now
///
/// Always acknowledges; partial failures show up in the report and per-job notes.
pub async fn handle_run_now(State(state): State<AppState>) -> Json<RunNowResponse> {
    let (message, report) = match state.orchestrator.trigger(TriggerSource::Manual).await {
        TriggerOutcome::Completed(report) => ("Run finished".to_string(), Some(report)),
        TriggerOutcome::Failed(reason) => (format!("Run aborted: {reason}"), None),
        TriggerOutcome::AlreadyRunning => ("A run is already in progress".to_string(), None),
    };
    Json(RunNowResponse {
        ok: true,
        message,
        report,
    })
}

/// GET /applications
pub async fn handle_applications(
    State(state): State<AppState>,
) -> Result<Json<Vec<ApplicationView>>, AppError> {
    let rows = state
        .store
        .list_applications(DEFAULT_LIMIT, Order::NewestFirst)
        .await?;
    Ok(Json(
        rows.into_iter()
            .map(|row| ApplicationView {
                job_id: row.job_id,
                cover: row.cover,
                resume: row.resume_path,
                time: row.attempt_time,
                result: row.result,
                detail: row.detail,
            })
            .collect(),
    ))
}

fn render_dashboard(jobs: &[JobRow], apply_mode: &str, running: bool) -> String {
    let mut html = String::from(
        "<html><head><title>AI Job Agent Dashboard</title></head><body>\n\
         <h1>AI Job Agent Dashboard</h1>\n\
         <form action=\"/run_now\" method=\"post\"><button type=\"submit\">Run Now</button></form>\n",
    );
    if running {
        html.push_str("<p><em>A run is in progress.</em></p>\n");
    }
    html.push_str(
        "<table border=\"1\" cellpadding=\"6\" cellspacing=\"0\">\n\
         <tr><th>Job ID</th><th>Title</th><th>Company</th><th>Location</th>\
         <th>Posted</th><th>Status</th><th>Notes</th></tr>\n",
    );
    for job in jobs {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&job.job_id),
            escape_html(&job.title),
            escape_html(&job.company),
            escape_html(&job.location),
            job.posted_date,
            job.status,
            escape_html(&job.notes),
        );
    }
    let _ = write!(
        html,
        "</table>\n<p>Apply mode: <strong>{}</strong></p>\n</body></html>\n",
        escape_html(apply_mode)
    );
    html
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
