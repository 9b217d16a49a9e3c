//! Stand-ins for the worker's external dependencies.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use stamp_ocr::db::memory::MemoryStore;
use stamp_ocr::db::StampStore;
use stamp_ocr::models::extraction::{ExtractionCandidate, FieldGuess, StampColor, Theme};
use stamp_ocr::models::stamp::{NewStamp, Stamp};
use stamp_ocr::services::extraction::StampExtractor;
use stamp_ocr::services::ocr::{OcrError, TextRecognizer};
use stamp_ocr::services::storage::{ImageSource, StorageError};
use stamp_ocr::services::vision::{StampClassifier, VisionError};
use stamp_ocr::services::worker::{OcrWorker, WorkerConfig};

/// Serves the same bytes for every known path.
#[derive(Default)]
pub struct StubImages {
    images: HashMap<String, Vec<u8>>,
}

impl StubImages {
    pub fn with(mut self, path: &str, bytes: &[u8]) -> Self {
        self.images.insert(path.to_string(), bytes.to_vec());
        self
    }
}

#[async_trait]
impl ImageSource for StubImages {
    async fn read(&self, image_path: &str) -> Result<Vec<u8>, StorageError> {
        self.images.get(image_path).cloned().ok_or_else(|| StorageError::Read {
            path: image_path.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such image"),
        })
    }
}

/// Recognizer returning a fixed transcript.
pub struct FixedText(pub &'static str);

#[async_trait]
impl TextRecognizer for FixedText {
    async fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        Ok(self.0.to_string())
    }
}

/// Classifier returning a canned answer and counting calls.
pub struct FixedClassifier {
    pub answer: Option<ExtractionCandidate>,
    pub calls: AtomicUsize,
    pub delay: Duration,
}

impl FixedClassifier {
    pub fn new(answer: Option<ExtractionCandidate>) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn slow(answer: Option<ExtractionCandidate>, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(answer)
        }
    }
}

#[async_trait]
impl StampClassifier for FixedClassifier {
    async fn classify(
        &self,
        _image_bytes: &[u8],
        _ocr_text: &str,
    ) -> Result<Option<ExtractionCandidate>, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.answer.clone())
    }
}

/// Classifier whose upstream always answers with a server error.
pub struct FailingClassifier;

#[async_trait]
impl StampClassifier for FailingClassifier {
    async fn classify(
        &self,
        _image_bytes: &[u8],
        _ocr_text: &str,
    ) -> Result<Option<ExtractionCandidate>, VisionError> {
        Err(VisionError::Api {
            status: 500,
            body: "upstream exploded".to_string(),
        })
    }
}

/// A confident vision answer for a space-themed stamp.
pub fn moon_candidate() -> ExtractionCandidate {
    ExtractionCandidate {
        scott_number: FieldGuess::found("C76".to_string(), 0.6),
        face_value: FieldGuess::missing(),
        theme: FieldGuess::found(Theme::Space, 0.93),
        colors: vec![StampColor::Blue, StampColor::White],
        colors_confidence: 0.81,
        name: Some("Moon Landing".to_string()),
    }
}

pub async fn seed_stamp(store: &MemoryStore, image_path: &str) -> Stamp {
    store
        .create(NewStamp {
            name: None,
            image_path: image_path.to_string(),
        })
        .await
        .expect("seed stamp")
}

pub fn fast_config() -> WorkerConfig {
    WorkerConfig {
        poll_interval: Duration::from_millis(20),
        ..WorkerConfig::default()
    }
}

pub fn worker(
    store: &MemoryStore,
    images: StubImages,
    recognizer: Option<Arc<dyn TextRecognizer>>,
    classifier: Option<Arc<dyn StampClassifier>>,
) -> OcrWorker {
    let store = Arc::new(store.clone());
    OcrWorker::new(
        store.clone(),
        store,
        Arc::new(images),
        StampExtractor::new(recognizer, classifier),
        fast_config(),
    )
}
