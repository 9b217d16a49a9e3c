use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::db::StoreError;
use crate::models::job::{JobStatus, OcrJob};

const JOB_COLUMNS: &str = "id, stamp_id, status, error, created_at, started_at, completed_at";

fn job_from_row(row: &PgRow) -> Result<OcrJob, StoreError> {
    let status: String = row.try_get("status")?;
    let status = JobStatus::from_str(&status)
        .map_err(|_| StoreError::Corrupt(format!("unknown job status '{status}'")))?;

    Ok(OcrJob {
        id: row.try_get("id")?,
        stamp_id: row.try_get("stamp_id")?,
        status,
        error: row.try_get("error")?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

/// Insert a new pending job
pub async fn create_job(pool: &PgPool, stamp_id: Uuid) -> Result<OcrJob, StoreError> {
    let row = sqlx::query(&format!(
        "INSERT INTO ocr_jobs (stamp_id, status) VALUES ($1, 'pending') RETURNING {JOB_COLUMNS}"
    ))
    .bind(stamp_id)
    .fetch_one(pool)
    .await?;

    job_from_row(&row)
}

/// Get a job by ID
pub async fn get_job(pool: &PgPool, job_id: Uuid) -> Result<Option<OcrJob>, StoreError> {
    let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM ocr_jobs WHERE id = $1"))
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Claim the oldest pending job in one statement.
///
/// `FOR UPDATE SKIP LOCKED` keeps concurrent workers from selecting the same row.
pub async fn claim_next_pending(pool: &PgPool) -> Result<Option<OcrJob>, StoreError> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE ocr_jobs
        SET status = 'processing', error = NULL, started_at = NOW()
        WHERE id = (
            SELECT id FROM ocr_jobs
            WHERE status = 'pending'
            ORDER BY created_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING {JOB_COLUMNS}
        "#
    ))
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Move a specific pending job to processing
pub async fn mark_processing(pool: &PgPool, job_id: Uuid) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE ocr_jobs
        SET status = 'processing', error = NULL, started_at = NOW()
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Finish a processing job successfully
pub async fn mark_completed(
    pool: &PgPool,
    job_id: Uuid,
    at: DateTime<Utc>,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE ocr_jobs
        SET status = 'completed', completed_at = $2
        WHERE id = $1 AND status = 'processing'
        "#,
    )
    .bind(job_id)
    .bind(at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::InvalidTransition {
            id: job_id,
            to: JobStatus::Completed,
        });
    }
    Ok(())
}

/// Finish a processing job with an error message
pub async fn mark_failed(pool: &PgPool, job_id: Uuid, error: &str) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE ocr_jobs
        SET status = 'failed', error = $2, completed_at = NULL
        WHERE id = $1 AND status = 'processing'
        "#,
    )
    .bind(job_id)
    .bind(error)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::InvalidTransition {
            id: job_id,
            to: JobStatus::Failed,
        });
    }
    Ok(())
}

/// Count jobs waiting to be claimed
pub async fn pending_count(pool: &PgPool) -> Result<i64, StoreError> {
    let row = sqlx::query("SELECT COUNT(*) AS pending FROM ocr_jobs WHERE status = 'pending'")
        .fetch_one(pool)
        .await?;

    Ok(row.try_get("pending")?)
}

/// Fail jobs left processing by a worker that went away
pub async fn fail_stale_processing(
    pool: &PgPool,
    started_before: DateTime<Utc>,
    error: &str,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE ocr_jobs
        SET status = 'failed', error = $2
        WHERE status = 'processing' AND started_at < $1
        "#,
    )
    .bind(started_before)
    .bind(error)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
