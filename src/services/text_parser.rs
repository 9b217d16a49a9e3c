//! Heuristic field recognition over raw OCR text.
//!
//! Every confidence here is a fixed score per matching rule. Colors are never
//! produced from text.

use std::sync::LazyLock;

use regex::Regex;
use strum::VariantArray;

use crate::models::extraction::{
    normalize_scott_number, ExtractionCandidate, FieldGuess, Theme, FOREVER_FACE_VALUE,
};

const EXPLICIT_SCOTT_CONFIDENCE: f64 = 0.84;
const BARE_SCOTT_CONFIDENCE: f64 = 0.72;
const FOREVER_CONFIDENCE: f64 = 0.90;
const CURRENCY_CONFIDENCE: f64 = 0.82;
const THEME_KEYWORD_CONFIDENCE: f64 = 0.80;

// Catalog patterns are ASCII-only: `\d` and `\b` would otherwise accept
// fullwidth and Arabic-Indic digits.
static EXPLICIT_SCOTT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i-u)\bscott\s*#?\s*([a-z]{0,3}[0-9]{1,4}[a-z]{0,3})\b").expect("valid regex")
});

static BARE_SCOTT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i-u)\b([a-z]{0,2}[0-9]{1,4}[a-z]{0,2})\b").expect("valid regex")
});

static FOREVER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bforever\b").expect("valid regex"));

static CURRENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$\s?[0-9]+(?:\.[0-9]{1,2})?|(?-u:\b)[0-9]+\s?(?:cents?(?-u:\b)|dollars?(?-u:\b)|c(?-u:\b)|¢)")
        .expect("valid regex")
});

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Parse recognized text into a candidate. Pure function of `text`.
pub fn parse_text(text: &str) -> ExtractionCandidate {
    ExtractionCandidate {
        scott_number: parse_scott_number(text),
        face_value: parse_face_value(text),
        theme: parse_theme(text),
        ..ExtractionCandidate::default()
    }
}

/// Look for a "Scott #123a" label first, then the first bare catalog-like token.
pub fn parse_scott_number(text: &str) -> FieldGuess<String> {
    if let Some(caps) = EXPLICIT_SCOTT_RE.captures(text) {
        return match normalize_scott_number(&caps[1]) {
            Some(token) => FieldGuess::found(token, EXPLICIT_SCOTT_CONFIDENCE),
            None => FieldGuess::missing(),
        };
    }

    let Some(token) = BARE_SCOTT_RE
        .captures(text)
        .and_then(|caps| normalize_scott_number(&caps[1]))
    else {
        return FieldGuess::missing();
    };

    // Plain years and tiny numbers are too ambiguous to be catalog numbers.
    let all_digits = token.chars().all(|c| c.is_ascii_digit());
    if all_digits && (token.len() == 4 || token.len() <= 2) {
        return FieldGuess::missing();
    }

    FieldGuess::found(token, BARE_SCOTT_CONFIDENCE)
}

pub fn parse_face_value(text: &str) -> FieldGuess<String> {
    if FOREVER_RE.is_match(text) {
        return FieldGuess::found(FOREVER_FACE_VALUE.to_string(), FOREVER_CONFIDENCE);
    }

    match CURRENCY_RE.find(text) {
        Some(m) => {
            let value = WHITESPACE_RE.replace_all(m.as_str(), " ").trim().to_string();
            FieldGuess::found(value, CURRENCY_CONFIDENCE)
        }
        None => FieldGuess::missing(),
    }
}

pub fn parse_theme(text: &str) -> FieldGuess<Theme> {
    let normalized = normalize_text(text);

    Theme::VARIANTS
        .iter()
        .find(|theme| {
            theme
                .keywords()
                .iter()
                .any(|keyword| normalized.contains(keyword))
        })
        .map(|theme| FieldGuess::found(*theme, THEME_KEYWORD_CONFIDENCE))
        .unwrap_or_else(FieldGuess::missing)
}

fn normalize_text(text: &str) -> String {
    WHITESPACE_RE
        .replace_all(&text.to_lowercase(), " ")
        .trim()
        .to_string()
}
