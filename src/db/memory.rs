//! In-process job and stamp storage.
//!
//! A single mutex guards all state, so `claim_next_pending` is atomic across
//! every worker sharing one `MemoryStore`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{JobStore, StampStore, StoreError};
use crate::models::extraction::MergedExtraction;
use crate::models::job::{JobStatus, OcrJob};
use crate::models::stamp::{NewStamp, Stamp};

#[derive(Default)]
struct MemoryState {
    stamps: HashMap<Uuid, Stamp>,
    /// Insertion order doubles as creation order.
    jobs: Vec<OcrJob>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn start_processing(job: &mut OcrJob) {
    job.status = JobStatus::Processing;
    job.error = None;
    job.started_at = Some(Utc::now());
}

fn processing_job(
    state: &mut MemoryState,
    job_id: Uuid,
    to: JobStatus,
) -> Result<&mut OcrJob, StoreError> {
    match state.jobs.iter_mut().find(|j| j.id == job_id) {
        Some(job) if job.status == JobStatus::Processing => Ok(job),
        Some(_) => Err(StoreError::InvalidTransition { id: job_id, to }),
        None => Err(StoreError::NotFound {
            entity: "job",
            id: job_id,
        }),
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert(&self, stamp_id: Uuid) -> Result<OcrJob, StoreError> {
        let mut state = self.lock();
        if !state.stamps.contains_key(&stamp_id) {
            return Err(StoreError::NotFound {
                entity: "stamp",
                id: stamp_id,
            });
        }

        let job = OcrJob {
            id: Uuid::new_v4(),
            stamp_id,
            status: JobStatus::Pending,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        state.jobs.push(job.clone());
        Ok(job)
    }

    async fn find(&self, job_id: Uuid) -> Result<Option<OcrJob>, StoreError> {
        Ok(self.lock().jobs.iter().find(|j| j.id == job_id).cloned())
    }

    async fn claim_next_pending(&self) -> Result<Option<OcrJob>, StoreError> {
        let mut state = self.lock();
        let next = state
            .jobs
            .iter_mut()
            .filter(|j| j.status == JobStatus::Pending)
            .min_by_key(|j| j.created_at);

        Ok(next.map(|job| {
            start_processing(job);
            job.clone()
        }))
    }

    async fn mark_processing(&self, job_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.lock();
        match state.jobs.iter_mut().find(|j| j.id == job_id) {
            Some(job) if job.status == JobStatus::Pending => {
                start_processing(job);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_completed(&self, job_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.lock();
        let job = processing_job(&mut state, job_id, JobStatus::Completed)?;
        job.status = JobStatus::Completed;
        job.completed_at = Some(at);
        Ok(())
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        let job = processing_job(&mut state, job_id, JobStatus::Failed)?;
        job.status = JobStatus::Failed;
        job.error = Some(error.to_string());
        job.completed_at = None;
        Ok(())
    }

    async fn pending_count(&self) -> Result<i64, StoreError> {
        let state = self.lock();
        Ok(state
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .count() as i64)
    }

    async fn fail_stale_processing(
        &self,
        started_before: DateTime<Utc>,
        error: &str,
    ) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let mut failed = 0;
        for job in state.jobs.iter_mut().filter(|j| {
            j.status == JobStatus::Processing && j.started_at.is_some_and(|t| t < started_before)
        }) {
            job.status = JobStatus::Failed;
            job.error = Some(error.to_string());
            failed += 1;
        }
        Ok(failed)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl StampStore for MemoryStore {
    async fn create(&self, stamp: NewStamp) -> Result<Stamp, StoreError> {
        let now = Utc::now();
        let record = Stamp {
            id: Uuid::new_v4(),
            name: stamp.name,
            image_path: stamp.image_path,
            scott_number: None,
            scott_number_confidence: 0.0,
            face_value: None,
            face_value_confidence: 0.0,
            theme: None,
            theme_confidence: 0.0,
            dominant_colors: Vec::new(),
            colors_confidence: 0.0,
            needs_review: true,
            created_at: now,
            updated_at: now,
        };
        self.lock().stamps.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, stamp_id: Uuid) -> Result<Option<Stamp>, StoreError> {
        Ok(self.lock().stamps.get(&stamp_id).cloned())
    }

    async fn update_extraction_fields(
        &self,
        stamp_id: Uuid,
        extraction: &MergedExtraction,
    ) -> Result<Stamp, StoreError> {
        let mut state = self.lock();
        let stamp = state.stamps.get_mut(&stamp_id).ok_or(StoreError::NotFound {
            entity: "stamp",
            id: stamp_id,
        })?;

        stamp.scott_number = extraction.scott_number.clone();
        stamp.scott_number_confidence = extraction.scott_number_confidence;
        stamp.face_value = extraction.face_value.clone();
        stamp.face_value_confidence = extraction.face_value_confidence;
        stamp.theme = extraction.theme;
        stamp.theme_confidence = extraction.theme_confidence;
        stamp.dominant_colors = extraction.colors.clone();
        stamp.colors_confidence = extraction.colors_confidence;
        stamp.needs_review = extraction.needs_review;
        if stamp.name.is_none() {
            stamp.name = extraction.name.clone();
        }
        stamp.updated_at = Utc::now();

        Ok(stamp.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_stamp() -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let stamp = store
            .create(NewStamp {
                name: None,
                image_path: "/uploads/a.jpg".to_string(),
            })
            .await
            .unwrap();
        (store, stamp.id)
    }

    #[tokio::test]
    async fn test_claims_oldest_first() {
        let (store, stamp_id) = store_with_stamp().await;
        let first = store.insert(stamp_id).await.unwrap();
        let second = store.insert(stamp_id).await.unwrap();

        let claimed = store.claim_next_pending().await.unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.status, JobStatus::Processing);
        assert!(claimed.started_at.is_some());

        let claimed = store.claim_next_pending().await.unwrap().unwrap();
        assert_eq!(claimed.id, second.id);
        assert!(store.claim_next_pending().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_requires_existing_stamp() {
        let store = MemoryStore::new();
        let result = store.insert(Uuid::new_v4()).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_terminal_states_are_final() {
        let (store, stamp_id) = store_with_stamp().await;
        let job = store.insert(stamp_id).await.unwrap();

        // Cannot finish a job nobody claimed.
        assert!(matches!(
            store.mark_completed(job.id, Utc::now()).await,
            Err(StoreError::InvalidTransition { .. })
        ));

        assert!(store.mark_processing(job.id).await.unwrap());
        assert!(!store.mark_processing(job.id).await.unwrap());
        store.mark_failed(job.id, "boom").await.unwrap();

        assert!(store.mark_completed(job.id, Utc::now()).await.is_err());
        assert!(store.mark_failed(job.id, "again").await.is_err());

        let job = store.find(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert!(job.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_stale_processing_jobs_fail() {
        let (store, stamp_id) = store_with_stamp().await;
        let stuck = store.insert(stamp_id).await.unwrap();
        let waiting = store.insert(stamp_id).await.unwrap();
        store.claim_next_pending().await.unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(store.fail_stale_processing(cutoff, "abandoned").await.unwrap(), 1);

        assert_eq!(store.find(stuck.id).await.unwrap().unwrap().status, JobStatus::Failed);
        assert_eq!(store.find(waiting.id).await.unwrap().unwrap().status, JobStatus::Pending);
        assert_eq!(store.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_name_only_filled_when_missing() {
        let (store, stamp_id) = store_with_stamp().await;
        let extraction = MergedExtraction {
            name: Some("Moon Landing".to_string()),
            needs_review: true,
            ..MergedExtraction::default()
        };
        let stamp = store.update_extraction_fields(stamp_id, &extraction).await.unwrap();
        assert_eq!(stamp.name.as_deref(), Some("Moon Landing"));

        let renamed = MergedExtraction {
            name: Some("Something Else".to_string()),
            ..extraction
        };
        let stamp = store.update_extraction_fields(stamp_id, &renamed).await.unwrap();
        assert_eq!(stamp.name.as_deref(), Some("Moon Landing"));
    }
}
