//! Payoff to fitness transforms.

use ludus_data::FitnessMapKind;
use serde::{Deserialize, Serialize};

/// Selection strength used when a non-positive value is configured.
pub const DEFAULT_SELECTION: f64 = 1.0;
/// Baseline used by the exponential map when a non-positive value is configured.
pub const DEFAULT_BASELINE: f64 = 1.0;

/// `(kind, baseline, selection strength)`; immutable during a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessMap {
    pub kind: FitnessMapKind,
    pub baseline: f64,
    pub selection: f64,
}

impl Default for FitnessMap {
    fn default() -> Self {
        Self {
            kind: FitnessMapKind::Static,
            baseline: 1.0,
            selection: DEFAULT_SELECTION,
        }
    }
}

impl FitnessMap {
    /// Creates a map, replacing parameters the kind cannot use.
    ///
    /// Returns the map together with a description of every replacement so
    /// that the caller can report it.
    #[must_use]
    pub fn new(kind: FitnessMapKind, baseline: f64, selection: f64) -> (Self, Vec<String>) {
        let mut notes = Vec::new();
        let selection = if selection > 0.0 && selection.is_finite() {
            selection
        } else {
            notes.push(format!(
                "selection strength {selection} must be positive, using {DEFAULT_SELECTION}"
            ));
            DEFAULT_SELECTION
        };
        let baseline = if !baseline.is_finite() {
            notes.push(format!(
                "baseline fitness {baseline} is not finite, using {DEFAULT_BASELINE}"
            ));
            DEFAULT_BASELINE
        } else if kind == FitnessMapKind::Exponential && baseline <= 0.0 {
            notes.push(format!(
                "exponential map needs a positive baseline, {baseline} replaced by {DEFAULT_BASELINE}"
            ));
            DEFAULT_BASELINE
        } else {
            baseline
        };
        (
            Self {
                kind,
                baseline,
                selection,
            },
            notes,
        )
    }

    /// Fitness of `payoff`; `NaN` stays `NaN`.
    #[must_use]
    pub fn map(&self, payoff: f64) -> f64 {
        let (b, w) = (self.baseline, self.selection);
        match self.kind {
            FitnessMapKind::None => payoff,
            FitnessMapKind::Static => b + w * payoff,
            FitnessMapKind::Convex => b + w * (payoff - b),
            FitnessMapKind::Exponential => b * (w * payoff).exp(),
        }
    }

    /// Payoff that maps to `fitness`.
    #[must_use]
    pub fn invmap(&self, fitness: f64) -> f64 {
        let (b, w) = (self.baseline, self.selection);
        match self.kind {
            FitnessMapKind::None => fitness,
            FitnessMapKind::Static => (fitness - b) / w,
            FitnessMapKind::Convex => b + (fitness - b) / w,
            FitnessMapKind::Exponential => (fitness / b).ln() / w,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_kinds() {
        let (map, _) = FitnessMap::new(FitnessMapKind::Convex, 1.0, 0.5);
        assert_eq!(map.map(3.0), 2.0);
        let (map, _) = FitnessMap::new(FitnessMapKind::Static, 1.0, 0.5);
        assert_eq!(map.map(3.0), 2.5);
        let (map, _) = FitnessMap::new(FitnessMapKind::None, 7.0, 0.5);
        assert_eq!(map.map(3.0), 3.0);
    }

    #[test]
    fn test_non_positive_selection_replaced() {
        let (map, notes) = FitnessMap::new(FitnessMapKind::Static, 1.0, -2.0);
        assert_eq!(map.selection, DEFAULT_SELECTION);
        assert_eq!(notes.len(), 1);
        let (map, notes) = FitnessMap::new(FitnessMapKind::Exponential, 0.0, 0.0);
        assert_eq!(map.baseline, DEFAULT_BASELINE);
        assert_eq!(notes.len(), 2);
    }

    #[test]
    fn test_nan_passes_through() {
        let map = FitnessMap::default();
        assert!(map.map(f64::NAN).is_nan());
    }

    proptest! {
        #[test]
        fn test_inverse_round_trip(
            kind in prop_oneof![
                Just(FitnessMapKind::None),
                Just(FitnessMapKind::Static),
                Just(FitnessMapKind::Convex),
                Just(FitnessMapKind::Exponential),
            ],
            baseline in 0.1f64..5.0,
            selection in 0.01f64..2.0,
            payoff in -5.0f64..5.0,
        ) {
            let (map, notes) = FitnessMap::new(kind, baseline, selection);
            prop_assert!(notes.is_empty());
            let back = map.invmap(map.map(payoff));
            prop_assert!((back - payoff).abs() < 1e-9, "{:?}: {} -> {}", kind, payoff, back);
        }

        #[test]
        fn test_map_non_decreasing(
            baseline in 0.1f64..5.0,
            selection in 0.01f64..2.0,
            a in -5.0f64..5.0,
            b in -5.0f64..5.0,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            for kind in [
                FitnessMapKind::None,
                FitnessMapKind::Static,
                FitnessMapKind::Convex,
                FitnessMapKind::Exponential,
            ] {
                let (map, _) = FitnessMap::new(kind, baseline, selection);
                prop_assert!(map.map(lo) <= map.map(hi));
            }
        }
    }
}
