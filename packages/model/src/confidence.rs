//! Selector confidence policy.
//!
//! The constants are empirical. A selector that already needed fallbacks
//! scores below a clean selector; a fingerprint floors the score.

use serde::{Deserialize, Serialize};

pub const MIN_CONFIDENCE: f64 = 0.25;
pub const MAX_CONFIDENCE: f64 = 1.0;
pub const SELECTOR_ONLY: f64 = 1.0;
pub const NO_SIGNAL: f64 = 0.5;
pub const FALLBACKS_ONLY: f64 = 0.72;
pub const SELECTOR_AND_FALLBACKS: f64 = 0.9;
pub const FINGERPRINT_FLOOR: f64 = 0.75;

/// Below this a map counts as low-confidence in preflight
pub const LOW_CONFIDENCE: f64 = 0.70;
pub const HIGH_CONFIDENCE: f64 = 0.85;

/// Identity signal available for one element map after an upsert
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceInputs {
    pub has_selector: bool,
    pub fallback_count: usize,
    pub has_fingerprint: bool,
}

pub fn compute_confidence(inputs: ConfidenceInputs) -> f64 {
    let has_fallbacks = inputs.fallback_count > 0;
    let mut confidence = match (inputs.has_selector, has_fallbacks) {
        (true, false) => SELECTOR_ONLY,
        (true, true) => SELECTOR_AND_FALLBACKS,
        (false, true) => FALLBACKS_ONLY,
        (false, false) => NO_SIGNAL,
    };

    if inputs.has_fingerprint {
        confidence = confidence.max(FINGERPRINT_FLOOR);
    }

    confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBucket {
    High,
    Medium,
    Low,
}

impl ConfidenceBucket {
    pub fn of(confidence: f64) -> Self {
        if confidence >= HIGH_CONFIDENCE {
            ConfidenceBucket::High
        } else if confidence >= LOW_CONFIDENCE {
            ConfidenceBucket::Medium
        } else {
            ConfidenceBucket::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(has_selector: bool, fallback_count: usize, has_fingerprint: bool) -> ConfidenceInputs {
        ConfidenceInputs {
            has_selector,
            fallback_count,
            has_fingerprint,
        }
    }

    #[test]
    fn test_policy_table() {
        assert_eq!(compute_confidence(inputs(true, 0, false)), 1.0);
        assert_eq!(compute_confidence(inputs(true, 3, false)), 0.9);
        assert_eq!(compute_confidence(inputs(true, 3, true)), 0.9);
        assert_eq!(compute_confidence(inputs(false, 0, false)), 0.5);
        assert_eq!(compute_confidence(inputs(false, 2, false)), 0.72);
        assert_eq!(compute_confidence(inputs(false, 0, true)), 0.75);
        assert_eq!(compute_confidence(inputs(false, 2, true)), 0.75);
    }

    #[test]
    fn test_fingerprint_floor_holds_everywhere() {
        for has_selector in [true, false] {
            for fallback_count in [0, 1, 12] {
                let c = compute_confidence(inputs(has_selector, fallback_count, true));
                assert!(c >= FINGERPRINT_FLOOR, "{has_selector} {fallback_count} -> {c}");
            }
        }
    }

    #[test]
    fn test_more_signal_never_lowers_confidence() {
        let base = compute_confidence(inputs(false, 0, false));
        let with_fallbacks = compute_confidence(inputs(false, 1, false));
        let with_selector = compute_confidence(inputs(true, 1, false));
        assert!(base <= with_fallbacks);
        assert!(with_fallbacks <= with_selector);
    }

    #[test]
    fn test_buckets() {
        assert_eq!(ConfidenceBucket::of(0.9), ConfidenceBucket::High);
        assert_eq!(ConfidenceBucket::of(0.85), ConfidenceBucket::High);
        assert_eq!(ConfidenceBucket::of(0.72), ConfidenceBucket::Medium);
        assert_eq!(ConfidenceBucket::of(0.70), ConfidenceBucket::Medium);
        assert_eq!(ConfidenceBucket::of(0.5), ConfidenceBucket::Low);
    }
}
