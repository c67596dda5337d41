//! Character-level accuracy scoring
//!
//! Compares OCR output against ground truth using Levenshtein edit distance
//! over Unicode scalar values, so each CJK character counts as one unit.

use serde::{Deserialize, Serialize};

/// Accuracy of one hypothesis against one reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyResult {
    /// `correct / total * 100`, rounded to 2 decimals
    pub percentage: f64,
    /// `total - edit_distance`
    pub correct: usize,
    /// Character count of the longer string
    pub total: usize,
    /// Literal string equality
    pub exact_match: bool,
    pub edit_distance: usize,
}

impl AccuracyResult {
    /// Score given when there is no ground truth
    pub const NO_REFERENCE: AccuracyResult = AccuracyResult {
        percentage: 0.0,
        correct: 0,
        total: 0,
        exact_match: false,
        edit_distance: 0,
    };
}

/// Unit-cost Levenshtein distance counted in `char`s
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Round to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Score `hypothesis` against `reference`. A missing or empty reference
/// scores zero rather than being skipped.
pub fn score(hypothesis: &str, reference: Option<&str>) -> AccuracyResult {
    let reference = match reference {
        Some(reference) if !reference.is_empty() => reference,
        _ => return AccuracyResult::NO_REFERENCE,
    };

    let distance = edit_distance(hypothesis, reference);
    let total = hypothesis.chars().count().max(reference.chars().count());
    let correct = total - distance;
    let percentage = if total > 0 {
        round2(correct as f64 / total as f64 * 100.0)
    } else {
        0.0
    };

    AccuracyResult {
        percentage,
        correct,
        total,
        exact_match: hypothesis == reference,
        edit_distance: distance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "",
        "a",
        "kitten",
        "sitting",
        "什么",
        "什2么",
        "为什么不敢动",
        "abcabc",
        "cba",
        "电梯里",
    ];

    #[test]
    fn test_concrete_scenario() {
        let result = score("什2么", Some("什么"));
        assert_eq!(result.edit_distance, 1);
        assert_eq!(result.total, 3);
        assert_eq!(result.correct, 2);
        assert_eq!(result.percentage, 66.67);
        assert!(!result.exact_match);
    }

    #[test]
    fn test_identical_strings() {
        for s in SAMPLES.iter().filter(|s| !s.is_empty()) {
            let result = score(s, Some(*s));
            assert!(result.exact_match);
            assert_eq!(result.percentage, 100.0);
            assert_eq!(result.edit_distance, 0);
        }
    }

    #[test]
    fn test_missing_reference() {
        for s in SAMPLES {
            for reference in [None, Some("")] {
                let result = score(s, reference);
                assert_eq!(result.total, 0);
                assert_eq!(result.percentage, 0.0);
                assert!(!result.exact_match);
            }
        }
    }

    #[test]
    fn test_empty_hypothesis() {
        let result = score("", Some("什么"));
        assert_eq!(result.edit_distance, 2);
        assert_eq!(result.total, 2);
        assert_eq!(result.correct, 0);
        assert_eq!(result.percentage, 0.0);
    }

    #[test]
    fn test_multibyte_counted_as_characters() {
        // 3 chars, 9 bytes each side
        let result = score("电梯里", Some("电榜里"));
        assert_eq!(result.total, 3);
        assert_eq!(result.edit_distance, 1);
    }

    #[test]
    fn test_edit_distance_known_values() {
        assert_eq!(edit_distance("", ""), 0);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_edit_distance_symmetric() {
        for a in SAMPLES {
            for b in SAMPLES {
                assert_eq!(
                    edit_distance(a, b),
                    edit_distance(b, a),
                    "{a:?} vs {b:?}"
                );
            }
        }
    }

    #[test]
    fn test_edit_distance_triangle_inequality() {
        for a in SAMPLES {
            for b in SAMPLES {
                for c in SAMPLES {
                    let ac = edit_distance(a, c);
                    let ab = edit_distance(a, b);
                    let bc = edit_distance(b, c);
                    assert!(ac <= ab + bc, "{a:?} {b:?} {c:?}");
                }
            }
        }
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(66.666_666), 66.67);
        assert_eq!(round2(50.0), 50.0);
        assert_eq!(round2(33.333), 33.33);
    }
}
