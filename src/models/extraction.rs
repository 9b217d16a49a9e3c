use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, VariantArray};

/// Face value recorded for any "forever" stamp (current first-class rate).
pub const FOREVER_FACE_VALUE: &str = "78c";

/// Theme taxonomy. Declaration order is the order keyword scanning uses.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
    VariantArray,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Theme {
    Animals,
    Flowers,
    Historical,
    Architecture,
    Transport,
    Holidays,
    Space,
    Sports,
}

impl Theme {
    /// Lowercase keywords that identify this theme in recognized text.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Theme::Animals => &["animal", "bird", "cat", "dog", "horse", "wildlife", "fauna"],
            Theme::Flowers => &["flower", "rose", "tulip", "orchid", "flora", "botanical"],
            Theme::Historical => &[
                "historic",
                "history",
                "president",
                "war",
                "founder",
                "anniversary",
            ],
            Theme::Architecture => &["building", "bridge", "cathedral", "architecture", "monument"],
            Theme::Transport => &[
                "train",
                "car",
                "ship",
                "plane",
                "transport",
                "locomotive",
                "rail",
            ],
            Theme::Holidays => &[
                "christmas",
                "holiday",
                "new year",
                "easter",
                "festive",
                "celebration",
            ],
            Theme::Space => &["space", "moon", "mars", "rocket", "astronaut", "galaxy"],
            Theme::Sports => &["sport", "olympic", "soccer", "baseball", "basketball", "tennis"],
        }
    }
}

/// Fixed color palette for dominant-color labels.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
    VariantArray,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StampColor {
    Black,
    White,
    Gray,
    Brown,
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Pink,
    Gold,
    Silver,
}

/// Maximum number of dominant colors kept for one stamp.
pub const MAX_COLORS: usize = 5;

/// One source's guess for a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldGuess<T> {
    pub value: Option<T>,
    pub confidence: f64,
}

impl<T> FieldGuess<T> {
    pub fn found(value: T, confidence: f64) -> Self {
        Self {
            value: Some(value),
            confidence,
        }
    }

    pub fn missing() -> Self {
        Self {
            value: None,
            confidence: 0.0,
        }
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }
}

impl<T> Default for FieldGuess<T> {
    fn default() -> Self {
        Self::missing()
    }
}

/// Candidate field values produced independently by the text parser or the
/// vision classifier.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractionCandidate {
    pub scott_number: FieldGuess<String>,
    pub face_value: FieldGuess<String>,
    pub theme: FieldGuess<Theme>,
    /// Ordered by prominence, no duplicates, at most [`MAX_COLORS`].
    pub colors: Vec<StampColor>,
    pub colors_confidence: f64,
    /// Display title suggested by the vision model.
    pub name: Option<String>,
}

/// Confidence at or above which a field no longer needs a human look.
pub const REVIEW_THRESHOLD: f64 = 0.75;

/// Reconciled extraction written onto a stamp record.
///
/// A field's confidence is `0.0` whenever its value is `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MergedExtraction {
    pub scott_number: Option<String>,
    pub scott_number_confidence: f64,
    pub face_value: Option<String>,
    pub face_value_confidence: f64,
    pub theme: Option<Theme>,
    pub theme_confidence: f64,
    pub colors: Vec<StampColor>,
    pub colors_confidence: f64,
    pub name: Option<String>,
    pub needs_review: bool,
}

/// Trim and uppercase a catalog number, rejecting anything outside
/// `[A-Z0-9-]{1,20}`.
pub fn normalize_scott_number(raw: &str) -> Option<String> {
    let value = raw.trim().to_uppercase();
    let valid = (1..=20).contains(&value.len())
        && value
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-');
    valid.then_some(value)
}

/// Trim a face value; anything mentioning "forever" collapses to
/// [`FOREVER_FACE_VALUE`].
pub fn normalize_face_value(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if value.to_lowercase().contains("forever") {
        return Some(FOREVER_FACE_VALUE.to_string());
    }
    Some(value.to_string())
}
