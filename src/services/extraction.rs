use std::sync::Arc;
use std::time::Instant;

use crate::models::extraction::MergedExtraction;
use crate::services::merge::merge_candidates;
use crate::services::ocr::TextRecognizer;
use crate::services::text_parser::parse_text;
use crate::services::vision::{StampClassifier, VisionError};

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Skip the OCR pass; the vision model then sees no text hint.
    pub skip_ocr: bool,
}

/// Runs both extraction sources over one image and merges the results.
#[derive(Clone, Default)]
pub struct StampExtractor {
    recognizer: Option<Arc<dyn TextRecognizer>>,
    classifier: Option<Arc<dyn StampClassifier>>,
}

impl StampExtractor {
    pub fn new(
        recognizer: Option<Arc<dyn TextRecognizer>>,
        classifier: Option<Arc<dyn StampClassifier>>,
    ) -> Self {
        Self {
            recognizer,
            classifier,
        }
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    pub async fn extract(
        &self,
        image_bytes: &[u8],
        options: ExtractOptions,
    ) -> Result<MergedExtraction, ExtractionError> {
        let raw_text = if options.skip_ocr {
            String::new()
        } else {
            self.recognize(image_bytes).await
        };

        let heuristic = parse_text(&raw_text);

        let vision = match &self.classifier {
            Some(classifier) => {
                let start = Instant::now();
                let candidate = classifier.classify(image_bytes, &raw_text).await?;
                tracing::info!(
                    duration_ms = start.elapsed().as_millis() as u64,
                    usable = candidate.is_some(),
                    "Vision classification complete"
                );
                candidate
            }
            None => None,
        };

        Ok(merge_candidates(&heuristic, vision.as_ref()))
    }

    /// Recognition failures degrade to empty text instead of failing the job.
    async fn recognize(&self, image_bytes: &[u8]) -> String {
        let Some(recognizer) = &self.recognizer else {
            return String::new();
        };

        match recognizer.recognize(image_bytes).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "OCR pass failed, continuing without text");
                String::new()
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Vision classification failed: {0}")]
    Vision(#[from] VisionError),
}
