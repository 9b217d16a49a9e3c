//! Reconciles the text-parser candidate with the optional vision candidate.

use crate::models::extraction::{ExtractionCandidate, FieldGuess, MergedExtraction, REVIEW_THRESHOLD};

/// Merge both sources field by field.
///
/// - Catalog number and face value: the text value wins when present.
/// - Theme: vision wins when it is at least as confident as the text parser.
/// - Colors: only vision reports them.
pub fn merge_candidates(
    heuristic: &ExtractionCandidate,
    vision: Option<&ExtractionCandidate>,
) -> MergedExtraction {
    let empty = ExtractionCandidate::default();
    let vision = vision.unwrap_or(&empty);

    let scott_number = prefer_present(&heuristic.scott_number, &vision.scott_number);
    let face_value = prefer_present(&heuristic.face_value, &vision.face_value);
    let theme = pick_theme(&heuristic.theme, &vision.theme);

    let colors = vision.colors.clone();
    let colors_confidence = if colors.is_empty() {
        0.0
    } else {
        vision.colors_confidence
    };

    let mut merged = MergedExtraction {
        scott_number_confidence: confidence_of(&scott_number),
        scott_number: scott_number.value,
        face_value_confidence: confidence_of(&face_value),
        face_value: face_value.value,
        theme_confidence: confidence_of(&theme),
        theme: theme.value,
        colors,
        colors_confidence,
        name: vision.name.clone(),
        needs_review: false,
    };
    merged.needs_review = needs_review(&merged);
    merged
}

/// True when any of catalog number, face value or theme is missing or below
/// [`REVIEW_THRESHOLD`]. Colors never gate review.
pub fn needs_review(merged: &MergedExtraction) -> bool {
    merged.scott_number.is_none()
        || merged.face_value.is_none()
        || merged.theme.is_none()
        || merged.scott_number_confidence < REVIEW_THRESHOLD
        || merged.face_value_confidence < REVIEW_THRESHOLD
        || merged.theme_confidence < REVIEW_THRESHOLD
}

fn prefer_present<T: Clone>(primary: &FieldGuess<T>, fallback: &FieldGuess<T>) -> FieldGuess<T> {
    if primary.is_present() {
        primary.clone()
    } else if fallback.is_present() {
        fallback.clone()
    } else {
        FieldGuess::missing()
    }
}

fn pick_theme<T: Clone>(heuristic: &FieldGuess<T>, vision: &FieldGuess<T>) -> FieldGuess<T> {
    if vision.is_present() && vision.confidence >= heuristic.confidence {
        vision.clone()
    } else if !heuristic.is_present() && vision.is_present() {
        vision.clone()
    } else {
        heuristic.clone()
    }
}

fn confidence_of<T>(guess: &FieldGuess<T>) -> f64 {
    if guess.is_present() {
        guess.confidence
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::extraction::{StampColor, Theme};

    fn heuristic(
        scott: Option<(&str, f64)>,
        face: Option<(&str, f64)>,
        theme: Option<(Theme, f64)>,
    ) -> ExtractionCandidate {
        ExtractionCandidate {
            scott_number: scott
                .map(|(v, c)| FieldGuess::found(v.to_string(), c))
                .unwrap_or_default(),
            face_value: face
                .map(|(v, c)| FieldGuess::found(v.to_string(), c))
                .unwrap_or_default(),
            theme: theme.map(|(v, c)| FieldGuess::found(v, c)).unwrap_or_default(),
            ..ExtractionCandidate::default()
        }
    }

    #[test]
    fn test_text_and_vision_scenario() {
        let text = heuristic(Some(("C10", 0.84)), Some(("25c", 0.82)), None);
        let vision = ExtractionCandidate {
            theme: FieldGuess::found(Theme::Animals, 0.91),
            colors: vec![StampColor::Blue, StampColor::Gold],
            colors_confidence: 0.88,
            ..ExtractionCandidate::default()
        };

        let merged = merge_candidates(&text, Some(&vision));

        assert_eq!(merged.scott_number.as_deref(), Some("C10"));
        assert_eq!(merged.scott_number_confidence, 0.84);
        assert_eq!(merged.face_value.as_deref(), Some("25c"));
        assert_eq!(merged.face_value_confidence, 0.82);
        assert_eq!(merged.theme, Some(Theme::Animals));
        assert_eq!(merged.theme_confidence, 0.91);
        assert_eq!(merged.colors, vec![StampColor::Blue, StampColor::Gold]);
        assert_eq!(merged.colors_confidence, 0.88);
        assert!(!merged.needs_review);
    }

    #[test]
    fn test_everything_missing() {
        let empty = ExtractionCandidate::default();
        let merged = merge_candidates(&empty, Some(&empty));

        assert_eq!(
            merged,
            MergedExtraction {
                needs_review: true,
                ..MergedExtraction::default()
            }
        );
        assert_eq!(merge_candidates(&empty, None), merged);
    }

    #[test]
    fn test_text_value_beats_vision_value() {
        let text = heuristic(Some(("834", 0.72)), None, None);
        let vision = heuristic(Some(("835", 0.99)), Some(("$1", 0.6)), None);

        let merged = merge_candidates(&text, Some(&vision));
        assert_eq!(merged.scott_number.as_deref(), Some("834"));
        assert_eq!(merged.scott_number_confidence, 0.72);
        assert_eq!(merged.face_value.as_deref(), Some("$1"));
        assert_eq!(merged.face_value_confidence, 0.6);
    }

    #[test]
    fn test_theme_only_from_text() {
        let text = heuristic(None, None, Some((Theme::Sports, 0.8)));
        let merged = merge_candidates(&text, Some(&ExtractionCandidate::default()));
        assert_eq!(merged.theme, Some(Theme::Sports));
        assert_eq!(merged.theme_confidence, 0.8);
    }

    #[test]
    fn test_theme_only_from_vision_even_when_weak() {
        let vision = heuristic(None, None, Some((Theme::Space, 0.3)));
        let merged = merge_candidates(&ExtractionCandidate::default(), Some(&vision));
        assert_eq!(merged.theme, Some(Theme::Space));
        assert_eq!(merged.theme_confidence, 0.3);
    }

    #[test]
    fn test_theme_tie_goes_to_vision() {
        let text = heuristic(None, None, Some((Theme::Transport, 0.8)));
        let vision = heuristic(None, None, Some((Theme::Architecture, 0.8)));
        let merged = merge_candidates(&text, Some(&vision));
        assert_eq!(merged.theme, Some(Theme::Architecture));
    }

    #[test]
    fn test_less_confident_vision_theme_loses() {
        let text = heuristic(None, None, Some((Theme::Transport, 0.8)));
        let vision = heuristic(None, None, Some((Theme::Architecture, 0.79)));
        let merged = merge_candidates(&text, Some(&vision));
        assert_eq!(merged.theme, Some(Theme::Transport));
        assert_eq!(merged.theme_confidence, 0.8);
    }

    #[test]
    fn test_reported_color_confidence_ignored_without_colors() {
        let vision = ExtractionCandidate {
            colors_confidence: 0.95,
            ..ExtractionCandidate::default()
        };
        let merged = merge_candidates(&ExtractionCandidate::default(), Some(&vision));
        assert!(merged.colors.is_empty());
        assert_eq!(merged.colors_confidence, 0.0);
    }

    #[test]
    fn test_low_confidence_field_needs_review() {
        let text = heuristic(
            Some(("C10", 0.72)),
            Some(("25c", 0.82)),
            Some((Theme::Animals, 0.8)),
        );
        assert!(merge_candidates(&text, None).needs_review);

        let confident = heuristic(
            Some(("C10", 0.84)),
            Some(("25c", 0.82)),
            Some((Theme::Animals, 0.8)),
        );
        assert!(!merge_candidates(&confident, None).needs_review);
    }

    #[test]
    fn test_colors_do_not_gate_review() {
        let text = heuristic(
            Some(("C10", 0.84)),
            Some(("78c", 0.9)),
            Some((Theme::Flowers, 0.8)),
        );
        let vision = ExtractionCandidate {
            colors: vec![StampColor::Red],
            colors_confidence: 0.1,
            ..ExtractionCandidate::default()
        };
        assert!(!merge_candidates(&text, Some(&vision)).needs_review);
    }

    #[test]
    fn test_merge_is_deterministic() {
        let text = heuristic(Some(("C10", 0.84)), None, Some((Theme::Space, 0.8)));
        let vision = ExtractionCandidate {
            face_value: FieldGuess::found("78c".to_string(), 0.7),
            theme: FieldGuess::found(Theme::Space, 0.93),
            colors: vec![StampColor::Black],
            colors_confidence: 0.5,
            name: Some("Moon Landing".to_string()),
            ..ExtractionCandidate::default()
        };

        let first = merge_candidates(&text, Some(&vision));
        let second = merge_candidates(&text, Some(&vision));
        assert_eq!(first, second);
        assert_eq!(first.name.as_deref(), Some("Moon Landing"));
    }
}
