//! SQLite-backed job registry.
//!
//! WAL mode for concurrent readers; the `pending -> running` claim is a
//! conditional UPDATE, which is the concurrency primitive preventing two
//! workers from picking the same job.

use chrono::Utc;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use serde_json::Value;
use tracing::{debug, info};

use super::{Job, JobKind, JobStatus};
use crate::error::{ServiceError, ServiceResult};

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    status TEXT NOT NULL,
    progress INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    metadata TEXT NOT NULL,
    result TEXT,
    error TEXT
);
CREATE INDEX IF NOT EXISTS idx_jobs_status_created ON jobs(status, created_at);
";

#[derive(Clone)]
pub struct JobRegistry {
    pool: SqlitePool,
}

impl JobRegistry {
    /// Open (or create) the registry database at `db_path`.
    pub async fn open(db_path: &Path) -> ServiceResult<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ServiceError::StorageError(format!("create job db dir: {e}")))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;
        info!(path = %db_path.display(), "job registry opened");
        Ok(Self { pool })
    }

    /// Create a pending job and return its id.
    pub async fn create(&self, kind: JobKind, metadata: Value) -> ServiceResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO jobs (id, kind, status, progress, created_at, updated_at, metadata)
             VALUES (?, ?, 'pending', 0, ?, ?, ?)",
        )
        .bind(&id)
        .bind(kind.as_str())
        .bind(&now)
        .bind(&now)
        .bind(metadata.to_string())
        .execute(&self.pool)
        .await?;
        debug!(job_id = %id, kind = kind.as_str(), "job created");
        Ok(id)
    }

    /// Fetch a job by id.
    pub async fn get(&self, id: &str) -> ServiceResult<Option<Job>> {
        let row = sqlx::query(
            "SELECT id, kind, status, progress, created_at, updated_at, metadata, result, error
             FROM jobs WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_job).transpose()
    }

    /// List jobs, optionally restricted to one status, newest first.
    pub async fn list(&self, status: Option<JobStatus>) -> ServiceResult<Vec<Job>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT id, kind, status, progress, created_at, updated_at, metadata, result, error
                     FROM jobs WHERE status = ? ORDER BY created_at DESC",
                )
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, kind, status, progress, created_at, updated_at, metadata, result, error
                     FROM jobs ORDER BY created_at DESC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(row_to_job).collect()
    }

    /// Claim the oldest pending job, transitioning it to running.
    ///
    /// The conditional UPDATE is the CAS: when two workers race, exactly
    /// one sees a row change and wins the job.
    pub async fn claim_next_pending(&self) -> ServiceResult<Option<Job>> {
        loop {
            let candidate: Option<(String,)> = sqlx::query_as(
                "SELECT id FROM jobs WHERE status = 'pending' ORDER BY created_at LIMIT 1",
            )
            .fetch_optional(&self.pool)
            .await?;

            let Some((id,)) = candidate else {
                return Ok(None);
            };

            let claimed = sqlx::query(
                "UPDATE jobs SET status = 'running', updated_at = ?
                 WHERE id = ? AND status = 'pending'",
            )
            .bind(Utc::now().to_rfc3339())
            .bind(&id)
            .execute(&self.pool)
            .await?;

            if claimed.rows_affected() == 1 {
                debug!(job_id = %id, "job claimed");
                return self.get(&id).await;
            }
            // Lost the race for this id; try the next pending job.
        }
    }

    /// Update progress on a running job.
    pub async fn update_progress(&self, id: &str, progress: u8) -> ServiceResult<()> {
        let updated = sqlx::query(
            "UPDATE jobs SET progress = ?, updated_at = ? WHERE id = ? AND status = 'running'",
        )
        .bind(i64::from(progress.min(100)))
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(self.transition_error(id, JobStatus::Running).await);
        }
        Ok(())
    }

    /// Transition a running job to completed with its result.
    pub async fn complete(&self, id: &str, result: Value) -> ServiceResult<()> {
        let updated = sqlx::query(
            "UPDATE jobs SET status = 'completed', progress = 100, result = ?, updated_at = ?
             WHERE id = ? AND status = 'running'",
        )
        .bind(result.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(self.transition_error(id, JobStatus::Completed).await);
        }
        info!(job_id = %id, "job completed");
        Ok(())
    }

    /// Transition a running job to failed with its error.
    pub async fn fail(&self, id: &str, error: &str) -> ServiceResult<()> {
        let updated = sqlx::query(
            "UPDATE jobs SET status = 'failed', error = ?, updated_at = ?
             WHERE id = ? AND status = 'running'",
        )
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(self.transition_error(id, JobStatus::Failed).await);
        }
        info!(job_id = %id, error, "job failed");
        Ok(())
    }

    /// Distinguish "no such job" from "illegal transition" after a
    /// conditional update matched nothing.
    async fn transition_error(&self, id: &str, target: JobStatus) -> ServiceError {
        match self.get(id).await {
            Ok(Some(job)) => ServiceError::IllegalTransition {
                from: job.status.as_str().to_string(),
                to: target.as_str().to_string(),
            },
            Ok(None) => ServiceError::JobNotFound(id.to_string()),
            Err(e) => e,
        }
    }
}

fn row_to_job(row: sqlx::sqlite::SqliteRow) -> ServiceResult<Job> {
    let kind_raw: String = row.get("kind");
    let status_raw: String = row.get("status");
    let metadata_raw: String = row.get("metadata");
    let result_raw: Option<String> = row.get("result");
    let created_raw: String = row.get("created_at");
    let updated_raw: String = row.get("updated_at");

    let parse_time = |raw: &str| {
        chrono::DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| ServiceError::StorageError(format!("bad timestamp in job row: {e}")))
    };

    Ok(Job {
        id: row.get("id"),
        kind: JobKind::parse(&kind_raw)
            .ok_or_else(|| ServiceError::StorageError(format!("unknown job kind: {kind_raw}")))?,
        status: JobStatus::parse(&status_raw).ok_or_else(|| {
            ServiceError::StorageError(format!("unknown job status: {status_raw}"))
        })?,
        progress: row.get::<i64, _>("progress").clamp(0, 100) as u8,
        created_at: parse_time(&created_raw)?,
        updated_at: parse_time(&updated_raw)?,
        metadata: serde_json::from_str(&metadata_raw)
            .map_err(|e| ServiceError::StorageError(format!("bad job metadata: {e}")))?,
        result: result_raw
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| ServiceError::StorageError(format!("bad job result: {e}")))?,
        error: row.get("error"),
    })
}
