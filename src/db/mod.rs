use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use uuid::Uuid;

use crate::models::extraction::MergedExtraction;
use crate::models::job::{JobStatus, OcrJob};
use crate::models::stamp::{NewStamp, Stamp};

pub mod memory;
pub mod queries;
pub mod stamp_queries;

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Durable queue of extraction jobs.
///
/// After creation only the worker changes a job's status, error or
/// completion time.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a PENDING job for a stamp.
    async fn insert(&self, stamp_id: Uuid) -> Result<OcrJob, StoreError>;

    async fn find(&self, job_id: Uuid) -> Result<Option<OcrJob>, StoreError>;

    /// Atomically move the oldest PENDING job to PROCESSING and return it.
    ///
    /// Must be a single conditional update so concurrent workers never
    /// claim the same job.
    async fn claim_next_pending(&self) -> Result<Option<OcrJob>, StoreError>;

    /// Move one specific job from PENDING to PROCESSING. Returns `false` when
    /// the job was not pending.
    async fn mark_processing(&self, job_id: Uuid) -> Result<bool, StoreError>;

    async fn mark_completed(&self, job_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn mark_failed(&self, job_id: Uuid, error: &str) -> Result<(), StoreError>;

    async fn pending_count(&self) -> Result<i64, StoreError>;

    /// Fail jobs stuck in PROCESSING since before `started_before`.
    async fn fail_stale_processing(
        &self,
        started_before: DateTime<Utc>,
        error: &str,
    ) -> Result<u64, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Stamp records, consumed only through lookups and extraction writes.
#[async_trait]
pub trait StampStore: Send + Sync {
    async fn create(&self, stamp: NewStamp) -> Result<Stamp, StoreError>;

    async fn find_by_id(&self, stamp_id: Uuid) -> Result<Option<Stamp>, StoreError>;

    /// Overwrite the extraction fields. `name` is only filled when the stamp
    /// has none.
    async fn update_extraction_fields(
        &self,
        stamp_id: Uuid,
        extraction: &MergedExtraction,
    ) -> Result<Stamp, StoreError>;
}

/// PostgreSQL-backed job and stamp storage.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn insert(&self, stamp_id: Uuid) -> Result<OcrJob, StoreError> {
        queries::create_job(&self.pool, stamp_id).await
    }

    async fn find(&self, job_id: Uuid) -> Result<Option<OcrJob>, StoreError> {
        queries::get_job(&self.pool, job_id).await
    }

    async fn claim_next_pending(&self) -> Result<Option<OcrJob>, StoreError> {
        queries::claim_next_pending(&self.pool).await
    }

    async fn mark_processing(&self, job_id: Uuid) -> Result<bool, StoreError> {
        queries::mark_processing(&self.pool, job_id).await
    }

    async fn mark_completed(&self, job_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        queries::mark_completed(&self.pool, job_id, at).await
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str) -> Result<(), StoreError> {
        queries::mark_failed(&self.pool, job_id, error).await
    }

    async fn pending_count(&self) -> Result<i64, StoreError> {
        queries::pending_count(&self.pool).await
    }

    async fn fail_stale_processing(
        &self,
        started_before: DateTime<Utc>,
        error: &str,
    ) -> Result<u64, StoreError> {
        queries::fail_stale_processing(&self.pool, started_before, error).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl StampStore for PgStore {
    async fn create(&self, stamp: NewStamp) -> Result<Stamp, StoreError> {
        stamp_queries::create_stamp(&self.pool, &stamp).await
    }

    async fn find_by_id(&self, stamp_id: Uuid) -> Result<Option<Stamp>, StoreError> {
        stamp_queries::get_stamp(&self.pool, stamp_id).await
    }

    async fn update_extraction_fields(
        &self,
        stamp_id: Uuid,
        extraction: &MergedExtraction,
    ) -> Result<Stamp, StoreError> {
        stamp_queries::update_extraction_fields(&self.pool, stamp_id, extraction).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Job {id} cannot become {to}: it is not processing")]
    InvalidTransition { id: Uuid, to: JobStatus },

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}
