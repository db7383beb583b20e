//! Postgres-backed job store.
//!
//! One row per job in the `jobs` table (see `migrations/0001_create_jobs.sql`).
//! Optimistic concurrency is enforced by the `version` column: every write is
//! an `UPDATE ... WHERE id = $1 AND version = $2`, and zero affected rows
//! means somebody else wrote first.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `AlreadyExists` / `Concurrency` |
//! | Database (check constraint violation) | `23514` | `Storage` |
//! | Anything else | N/A | `Storage` |
//!
//! ## Sync bridge
//!
//! [`JobStore`] is synchronous and is called from plain worker threads, so the
//! store keeps a `tokio::runtime::Handle` and `block_on`s its async queries.
//! It must therefore not be called from inside an async task on that runtime.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tokio::runtime::Handle;
use tracing::instrument;

use evalrun_core::{ExpectedVersion, JobId, JobKind, JobRecord, JobStatus, LeaseToken};

use super::{JobStore, StoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_create_jobs.sql");

const SELECT_COLUMNS: &str = r#"
    id, kind, status, checkpoint, total_count, completed_count, failed_count,
    progress_percentage, resume_count, pause_reason, pause_time, error_message,
    owner_lease, interrupt_requested, last_activity_time, created_at, started_at,
    completed_at, version
"#;

#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: Arc<PgPool>,
    runtime: Handle,
}

impl PostgresJobStore {
    /// Create a store over `pool`, driving queries on `runtime`.
    pub fn new(pool: PgPool, runtime: Handle) -> Self {
        Self {
            pool: Arc::new(pool),
            runtime,
        }
    }

    /// Create the `jobs` table and its indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, status = %job.status), err)]
    pub async fn insert_job(&self, mut job: JobRecord) -> Result<JobRecord, StoreError> {
        job.version = 1;
        let resume_count = to_i32("resume_count", job.resume_count)?;
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, kind, status, checkpoint, total_count, completed_count, failed_count,
                progress_percentage, resume_count, pause_reason, pause_time, error_message,
                owner_lease, interrupt_requested, last_activity_time, created_at, started_at,
                completed_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.kind.as_str())
        .bind(job.status.as_str())
        .bind(job.checkpoint.map(to_i64))
        .bind(to_i64(job.total_count))
        .bind(to_i64(job.completed_count))
        .bind(to_i64(job.failed_count))
        .bind(job.progress_percentage)
        .bind(resume_count)
        .bind(job.pause_reason.as_deref())
        .bind(job.pause_time)
        .bind(job.error_message.as_deref())
        .bind(job.owner_lease.map(|l| *l.as_uuid()))
        .bind(job.interrupt_requested)
        .bind(job.last_activity_time)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(to_i64(job.version))
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if unique_violation(&e) {
                StoreError::AlreadyExists(job.id)
            } else {
                map_sqlx_error("insert_job", e)
            }
        })?;

        Ok(job)
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    pub async fn load_job(&self, job_id: JobId) -> Result<Option<JobRecord>, StoreError> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(job_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_job", e))?;

        row.as_ref().map(decode_row).transpose()
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, status = %job.status), err)]
    pub async fn update_job(
        &self,
        job: &JobRecord,
        expected: ExpectedVersion,
    ) -> Result<JobRecord, StoreError> {
        let expected_version = match expected {
            ExpectedVersion::Any => None,
            ExpectedVersion::Exact(v) => Some(to_i64(v)),
        };
        let resume_count = to_i32("resume_count", job.resume_count)?;

        let row = sqlx::query(
            r#"
            UPDATE jobs SET
                status = $3,
                checkpoint = $4,
                total_count = $5,
                completed_count = $6,
                failed_count = $7,
                progress_percentage = $8,
                resume_count = $9,
                pause_reason = $10,
                pause_time = $11,
                error_message = $12,
                owner_lease = $13,
                interrupt_requested = $14,
                last_activity_time = $15,
                started_at = $16,
                completed_at = $17,
                version = version + 1
            WHERE id = $1 AND ($2::BIGINT IS NULL OR version = $2)
            RETURNING version
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(expected_version)
        .bind(job.status.as_str())
        .bind(job.checkpoint.map(to_i64))
        .bind(to_i64(job.total_count))
        .bind(to_i64(job.completed_count))
        .bind(to_i64(job.failed_count))
        .bind(job.progress_percentage)
        .bind(resume_count)
        .bind(job.pause_reason.as_deref())
        .bind(job.pause_time)
        .bind(job.error_message.as_deref())
        .bind(job.owner_lease.map(|l| *l.as_uuid()))
        .bind(job.interrupt_requested)
        .bind(job.last_activity_time)
        .bind(job.started_at)
        .bind(job.completed_at)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_job", e))?;

        match row {
            Some(row) => {
                let version: i64 = row
                    .try_get("version")
                    .map_err(|e| StoreError::Decode(format!("version: {e}")))?;
                let mut stored = job.clone();
                stored.version = version as u64;
                Ok(stored)
            }
            None => match self.load_job(job.id).await? {
                None => Err(StoreError::NotFound(job.id)),
                Some(current) => Err(StoreError::Concurrency(format!(
                    "job {} is at version {}, expected {:?}",
                    job.id, current.version, expected
                ))),
            },
        }
    }

    #[instrument(skip(self), err)]
    pub async fn list_jobs(
        &self,
        statuses: &[JobStatus],
        limit: usize,
    ) -> Result<Vec<JobRecord>, StoreError> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM jobs WHERE status = ANY($1) ORDER BY created_at ASC LIMIT $2"
        ))
        .bind(&statuses)
        .bind(limit.min(i64::MAX as usize) as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_jobs", e))?;

        rows.iter().map(decode_row).collect()
    }
}

impl JobStore for PostgresJobStore {
    fn insert(&self, job: JobRecord) -> Result<JobRecord, StoreError> {
        self.runtime.block_on(self.insert_job(job))
    }

    fn get(&self, job_id: JobId) -> Result<Option<JobRecord>, StoreError> {
        self.runtime.block_on(self.load_job(job_id))
    }

    fn update(&self, job: &JobRecord, expected: ExpectedVersion) -> Result<JobRecord, StoreError> {
        self.runtime.block_on(self.update_job(job, expected))
    }

    fn list_by_status(&self, statuses: &[JobStatus], limit: usize) -> Result<Vec<JobRecord>, StoreError> {
        self.runtime.block_on(self.list_jobs(statuses, limit))
    }
}

fn to_i64(v: u64) -> i64 {
    v.min(i64::MAX as u64) as i64
}

fn to_i32(column: &str, v: u32) -> Result<i32, StoreError> {
    i32::try_from(v).map_err(|_| StoreError::Storage(format!("{column} out of range: {v}")))
}

fn to_u64(column: &str, v: i64) -> Result<u64, StoreError> {
    u64::try_from(v).map_err(|_| StoreError::Decode(format!("{column} is negative: {v}")))
}

fn decode_row(row: &sqlx::postgres::PgRow) -> Result<JobRecord, StoreError> {
    fn col<'r, T>(row: &'r sqlx::postgres::PgRow, name: &str) -> Result<T, StoreError>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    {
        row.try_get(name)
            .map_err(|e| StoreError::Decode(format!("{name}: {e}")))
    }

    let kind: String = col(row, "kind")?;
    let status: String = col(row, "status")?;
    let checkpoint: Option<i64> = col(row, "checkpoint")?;
    let resume_count: i32 = col(row, "resume_count")?;
    let owner_lease: Option<uuid::Uuid> = col(row, "owner_lease")?;

    Ok(JobRecord {
        id: JobId::from_uuid(col(row, "id")?),
        kind: JobKind::from_str(&kind).map_err(|e| StoreError::Decode(e.to_string()))?,
        status: JobStatus::from_str(&status).map_err(|e| StoreError::Decode(e.to_string()))?,
        checkpoint: checkpoint.map(|c| to_u64("checkpoint", c)).transpose()?,
        total_count: to_u64("total_count", col(row, "total_count")?)?,
        completed_count: to_u64("completed_count", col(row, "completed_count")?)?,
        failed_count: to_u64("failed_count", col(row, "failed_count")?)?,
        progress_percentage: col(row, "progress_percentage")?,
        resume_count: u32::try_from(resume_count)
            .map_err(|_| StoreError::Decode(format!("resume_count is negative: {resume_count}")))?,
        pause_reason: col(row, "pause_reason")?,
        pause_time: col::<Option<DateTime<Utc>>>(row, "pause_time")?,
        error_message: col(row, "error_message")?,
        owner_lease: owner_lease.map(LeaseToken::from_uuid),
        interrupt_requested: col(row, "interrupt_requested")?,
        last_activity_time: col(row, "last_activity_time")?,
        created_at: col(row, "created_at")?,
        started_at: col(row, "started_at")?,
        completed_at: col(row, "completed_at")?,
        version: to_u64("version", col(row, "version")?)?,
    })
}

fn unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            StoreError::Concurrency(format!("{operation}: {}", db.message()))
        }
        sqlx::Error::Database(db) => StoreError::Storage(format!(
            "{operation}: database error {}: {}",
            db.code().as_deref().unwrap_or("?"),
            db.message()
        )),
        sqlx::Error::PoolClosed => StoreError::Storage(format!("{operation}: connection pool closed")),
        _ => StoreError::Storage(format!("{operation}: {err}")),
    }
}
