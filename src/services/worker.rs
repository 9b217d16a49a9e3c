use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use uuid::Uuid;

use crate::db::{JobStore, StampStore, StoreError};
use crate::models::extraction::MergedExtraction;
use crate::models::job::OcrJob;
use crate::services::extraction::{ExtractOptions, ExtractionError, StampExtractor};
use crate::services::storage::{ImageSource, StorageError};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

/// Error recorded on jobs found stuck in processing at startup.
pub const ABANDONED_JOB_ERROR: &str = "abandoned: worker stopped while processing";

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sleep between polls while the queue is empty.
    pub poll_interval: Duration,
    /// Jobs processing longer than this at startup are failed. `None` disables the sweep.
    pub stale_after: Option<Duration>,
    pub extract: ExtractOptions,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            stale_after: Some(Duration::from_secs(900)),
            extract: ExtractOptions::default(),
        }
    }
}

/// Single sequential worker draining the extraction job queue.
pub struct OcrWorker {
    jobs: Arc<dyn JobStore>,
    stamps: Arc<dyn StampStore>,
    images: Arc<dyn ImageSource>,
    extractor: StampExtractor,
    config: WorkerConfig,
}

/// Handle for stopping a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the worker and wait for the loop to exit. An in-flight job is
    /// finished first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::error!(error = ?e, "Worker task panicked");
        }
    }
}

impl OcrWorker {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        stamps: Arc<dyn StampStore>,
        images: Arc<dyn ImageSource>,
        extractor: StampExtractor,
        config: WorkerConfig,
    ) -> Self {
        Self {
            jobs,
            stamps,
            images,
            extractor,
            config,
        }
    }

    /// Spawn the processing loop.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });
        WorkerHandle { shutdown_tx, task }
    }

    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            vision_enabled = self.extractor.has_classifier(),
            "OCR worker started"
        );

        if let Err(e) = self.recover_stale_jobs().await {
            tracing::error!(error = %e, "Failed to sweep stale jobs");
        }

        loop {
            if !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty)) {
                break;
            }

            let idle = match self.process_next_job().await {
                Ok(true) => {
                    tracing::debug!("Job processed, checking for next job");
                    false
                }
                Ok(false) => {
                    tracing::trace!("No jobs available, sleeping");
                    true
                }
                Err(e) => {
                    tracing::error!(error = %e, "Job queue error, will retry");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = sleep(self.config.poll_interval) => {}
                }
            }
        }

        tracing::info!("OCR worker stopped");
    }

    /// Fail jobs a previous worker left in processing. They are not retried.
    pub async fn recover_stale_jobs(&self) -> Result<u64, StoreError> {
        let Some(stale_after) = self.config.stale_after else {
            return Ok(0);
        };
        let stale_after = chrono::Duration::from_std(stale_after)
            .unwrap_or_else(|_| chrono::Duration::days(1));

        let failed = self
            .jobs
            .fail_stale_processing(Utc::now() - stale_after, ABANDONED_JOB_ERROR)
            .await?;

        if failed > 0 {
            tracing::warn!(failed, "Failed jobs abandoned in processing");
            metrics::counter!("ocr_jobs_failed_total").increment(failed);
        }
        Ok(failed)
    }

    /// Claim and run one job.
    ///
    /// Returns `Ok(true)` if a job was claimed, `Ok(false)` if the queue was
    /// empty. Extraction and persistence failures, including a failed
    /// completion write, end up on the job as FAILED. Only claim errors and
    /// errors recording the failure are returned.
    pub async fn process_next_job(&self) -> Result<bool, StoreError> {
        let Some(job) = self.jobs.claim_next_pending().await? else {
            return Ok(false);
        };

        tracing::info!(job_id = %job.id, stamp_id = %job.stamp_id, "Processing extraction job");
        let start = Instant::now();

        let failure = match self.process_job_inner(&job).await {
            Ok(merged) => match self.jobs.mark_completed(job.id, Utc::now()).await {
                Ok(()) => {
                    metrics::counter!("ocr_jobs_completed_total").increment(1);
                    metrics::histogram!("ocr_job_processing_seconds")
                        .record(start.elapsed().as_secs_f64());

                    tracing::info!(
                        job_id = %job.id,
                        stamp_id = %job.stamp_id,
                        needs_review = merged.needs_review,
                        theme = ?merged.theme,
                        "Job completed successfully"
                    );
                    None
                }
                Err(e) => {
                    tracing::error!(job_id = %job.id, error = %e, "Failed to record job completion");
                    Some(format!("Failed to record completion: {e}"))
                }
            },
            Err(e) => Some(e.to_string()),
        };

        if let Some(message) = failure {
            self.jobs.mark_failed(job.id, &message).await?;

            metrics::counter!("ocr_jobs_failed_total").increment(1);

            tracing::warn!(job_id = %job.id, stamp_id = %job.stamp_id, error = %message, "Job failed");
        }

        Ok(true)
    }

    async fn process_job_inner(&self, job: &OcrJob) -> Result<MergedExtraction, JobError> {
        let stamp = self
            .stamps
            .find_by_id(job.stamp_id)
            .await?
            .ok_or(JobError::StampNotFound(job.stamp_id))?;

        tracing::debug!(job_id = %job.id, image_path = %stamp.image_path, "Reading stamp image");
        let image_bytes = self.images.read(&stamp.image_path).await?;

        let merged = self
            .extractor
            .extract(&image_bytes, self.config.extract)
            .await?;

        self.stamps
            .update_extraction_fields(stamp.id, &merged)
            .await?;

        Ok(merged)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Stamp {0} not found")]
    StampNotFound(Uuid),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
