//! Job Store: the only owner of persisted jobs and applications.
//!
//! Every other component works on row copies and writes back through the
//! operations below, never through the pool directly.

use chrono::Utc;
use serde::Deserialize;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, SqlitePool};
use thiserror::Error;
use tracing::debug;

use crate::models::{ApplicationRow, JobRow, JobStatus, NewApplication, NewJob};

/// Storage failures are fatal to the calling operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("job_id must not be empty")]
    EmptyJobId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Refreshed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl Order {
    fn sql(self) -> &'static str {
        match self {
            Order::NewestFirst => "DESC",
            Order::OldestFirst => "ASC",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
}

#[derive(Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Inserts a new job as `new`, or refreshes the descriptive fields of a
    /// known one. Status and notes of an existing job are never touched.
    ///
    /// Each statement is atomic, so concurrent upserts of the same job_id
    /// resolve last-writer-wins without interleaved fields.
    pub async fn upsert(&self, job: &NewJob) -> Result<UpsertOutcome, StoreError> {
        if job.job_id.is_empty() {
            return Err(StoreError::EmptyJobId);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO jobs (job_id, title, company, location, url, posted_date, status, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, '')
            ON CONFLICT(job_id) DO NOTHING
            "#,
        )
        .bind(&job.job_id)
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.url)
        .bind(job.posted_date)
        .bind(JobStatus::New)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 1 {
            debug!(job_id = %job.job_id, "Inserted job");
            return Ok(UpsertOutcome::Inserted);
        }

        sqlx::query(
            r#"
            UPDATE jobs
            SET title = ?, company = ?, location = ?, url = ?, posted_date = ?
            WHERE job_id = ?
            "#,
        )
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.url)
        .bind(job.posted_date)
        .bind(&job.job_id)
        .execute(&self.pool)
        .await?;

        debug!(job_id = %job.job_id, "Refreshed job");
        Ok(UpsertOutcome::Refreshed)
    }

    /// Unconditionally overwrites status and notes. Absent job_id is a no-op;
    /// the return value says whether a row was touched.
    ///
    /// The first move to `applied` also stamps `applied_at`.
    pub async fn set_status(
        &self,
        job_id: &str,
        status: JobStatus,
        notes: &str,
    ) -> Result<bool, StoreError> {
        let affected = status_update(job_id, status, notes)
            .execute(&self.pool)
            .await?
            .rows_affected();

        debug!(job_id, %status, affected, "Set job status");
        Ok(affected > 0)
    }

    /// Appends the application row and moves the job to `status` in one
    /// transaction: either both land or neither does.
    ///
    /// No referential check against `jobs`; an unknown job_id still gets its
    /// application row.
    pub async fn record_application(
        &self,
        application: &NewApplication<'_>,
        status: JobStatus,
        notes: &str,
    ) -> Result<i64, StoreError> {
        if application.job_id.is_empty() {
            return Err(StoreError::EmptyJobId);
        }

        let mut tx = self.pool.begin().await?;
        let id = sqlx::query(
            r#"
            INSERT INTO applications (job_id, cover, resume_path, attempt_time, result, detail)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(application.job_id)
        .bind(application.cover)
        .bind(application.resume_path)
        .bind(Utc::now())
        .bind(application.result)
        .bind(application.detail)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        status_update(application.job_id, status, notes)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(job_id = application.job_id, result = %application.result, %status, "Recorded application");
        Ok(id)
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Option<JobRow>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE job_id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_jobs(
        &self,
        filter: JobFilter,
        limit: u32,
        order: Order,
    ) -> Result<Vec<JobRow>, StoreError> {
        let direction = order.sql();
        let rows = match filter.status {
            Some(status) => {
                let sql = format!(
                    "SELECT * FROM jobs WHERE status = ? ORDER BY posted_date {direction}, id {direction} LIMIT ?"
                );
                sqlx::query_as::<_, JobRow>(&sql)
                    .bind(status)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT * FROM jobs ORDER BY posted_date {direction}, id {direction} LIMIT ?"
                );
                sqlx::query_as::<_, JobRow>(&sql)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows)
    }

    pub async fn list_applications(
        &self,
        limit: u32,
        order: Order,
    ) -> Result<Vec<ApplicationRow>, StoreError> {
        let direction = order.sql();
        let sql = format!(
            "SELECT * FROM applications ORDER BY attempt_time {direction}, id {direction} LIMIT ?"
        );
        let rows = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Unbounded snapshot of every job currently in `status`, oldest first.
    pub async fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<JobRow>, StoreError> {
        let rows = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE status = ? ORDER BY id")
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Jobs still eligible for reply matching.
    pub async fn reply_candidates(&self) -> Result<Vec<JobRow>, StoreError> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM jobs
            WHERE status NOT IN (?, ?, ?)
            ORDER BY id
            "#,
        )
        .bind(JobStatus::REPLY_TERMINAL[0])
        .bind(JobStatus::REPLY_TERMINAL[1])
        .bind(JobStatus::REPLY_TERMINAL[2])
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

fn status_update<'q>(
    job_id: &'q str,
    status: JobStatus,
    notes: &'q str,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    sqlx::query(
        r#"
        UPDATE jobs
        SET status = ?,
            notes = ?,
            applied_at = CASE
                WHEN ? = 'applied' AND applied_at IS NULL THEN ?
                ELSE applied_at
            END
        WHERE job_id = ?
        "#,
    )
    .bind(status)
    .bind(notes)
    .bind(status)
    .bind(Utc::now())
    .bind(job_id)
}

#[cfg(test)]
pub mod testing {
    use chrono::NaiveDate;

    use super::{JobStore, StoreError};
    use crate::models::{job_fingerprint, ApplicationRow, NewJob};

    impl JobStore {
        pub async fn applications_for(
            &self,
            job_id: &str,
        ) -> Result<Vec<ApplicationRow>, StoreError> {
            let rows = sqlx::query_as::<_, ApplicationRow>(
                "SELECT * FROM applications WHERE job_id = ? ORDER BY id",
            )
            .bind(job_id)
            .fetch_all(self.pool())
            .await?;
            Ok(rows)
        }
    }

    pub async fn memory_store() -> JobStore {
        JobStore::new(crate::db::testing::memory_pool().await)
    }

    pub fn new_job(company: &str, title: &str, url: &str) -> NewJob {
        NewJob {
            job_id: job_fingerprint(company, title, url),
            title: title.to_string(),
            company: company.to_string(),
            location: "India".to_string(),
            url: Some(url.to_string()),
            posted_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        }
    }
}
