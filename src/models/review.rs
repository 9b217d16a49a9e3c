use std::collections::HashSet;

use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::extraction::{
    normalize_face_value, normalize_scott_number, MergedExtraction, StampColor, Theme,
};
use crate::models::job::{JobStatus, OcrJob};

/// Manual correction of a stamp's extraction fields.
///
/// Absent fields are cleared. Accepted reviews are fully trusted.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ExtractionReview {
    #[garde(custom(valid_scott_number))]
    #[serde(default)]
    pub scott_number: Option<String>,

    #[garde(length(min = 1, max = 32), custom(non_blank))]
    #[serde(default)]
    pub face_value: Option<String>,

    #[garde(skip)]
    #[serde(default)]
    pub theme: Option<Theme>,

    #[garde(length(max = 5), custom(distinct_colors))]
    #[serde(default)]
    pub dominant_colors: Vec<StampColor>,
}

fn valid_scott_number(value: &Option<String>, _ctx: &()) -> garde::Result {
    match value {
        Some(raw) if normalize_scott_number(raw).is_none() => Err(garde::Error::new(
            "must be 1-20 characters of A-Z, 0-9 or '-'",
        )),
        _ => Ok(()),
    }
}

fn non_blank(value: &Option<String>, _ctx: &()) -> garde::Result {
    match value {
        Some(raw) if raw.trim().is_empty() => Err(garde::Error::new("must not be blank")),
        _ => Ok(()),
    }
}

fn distinct_colors(value: &Vec<StampColor>, _ctx: &()) -> garde::Result {
    let mut seen = HashSet::new();
    if value.iter().all(|color| seen.insert(*color)) {
        Ok(())
    } else {
        Err(garde::Error::new("colors must not repeat"))
    }
}

impl ExtractionReview {
    /// Convert a validated review into the extraction written to the stamp.
    pub fn into_extraction(self) -> MergedExtraction {
        let scott_number = self.scott_number.as_deref().and_then(normalize_scott_number);
        let face_value = self.face_value.as_deref().and_then(normalize_face_value);
        let trusted = |present: bool| if present { 1.0 } else { 0.0 };

        MergedExtraction {
            scott_number_confidence: trusted(scott_number.is_some()),
            scott_number,
            face_value_confidence: trusted(face_value.is_some()),
            face_value,
            theme_confidence: trusted(self.theme.is_some()),
            theme: self.theme,
            colors_confidence: trusted(!self.dominant_colors.is_empty()),
            colors: self.dominant_colors,
            name: None,
            needs_review: false,
        }
    }
}

/// Response after enqueuing an extraction job.
#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// Response for querying job status.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub stamp_id: Uuid,
    pub status: JobStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<OcrJob> for JobStatusResponse {
    fn from(job: OcrJob) -> Self {
        Self {
            job_id: job.id,
            stamp_id: job.stamp_id,
            status: job.status,
            error: job.error,
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}
