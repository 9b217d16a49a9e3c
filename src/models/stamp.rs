use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::extraction::{StampColor, Theme};

/// Catalog record for one stamp image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stamp {
    pub id: Uuid,
    pub name: Option<String>,
    /// Web-style path of the stored image, e.g. `/uploads/123-abc.jpg`.
    pub image_path: String,
    pub scott_number: Option<String>,
    pub scott_number_confidence: f64,
    pub face_value: Option<String>,
    pub face_value_confidence: f64,
    pub theme: Option<Theme>,
    pub theme_confidence: f64,
    pub dominant_colors: Vec<StampColor>,
    pub colors_confidence: f64,
    pub needs_review: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to register a stamp whose image is already stored.
#[derive(Debug, Clone)]
pub struct NewStamp {
    pub name: Option<String>,
    pub image_path: String,
}
