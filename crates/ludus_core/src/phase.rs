//! Pre-binned histograms and simplex phase mapping for plotting consumers.

use crate::error::{CoreError, Result};
use ludus_data::PopulationSnapshot;
use serde::{Deserialize, Serialize};

/// Fixed-width histogram over `[min, max]`; values outside the range land
/// in the edge bins and `NaN` values are skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    pub bins: Vec<u64>,
    pub skipped: u64,
}

impl Histogram {
    pub fn new(bins: usize, min: f64, max: f64) -> Result<Self> {
        if bins == 0 || !(min.is_finite() && max.is_finite()) || min > max {
            return Err(CoreError::config(format!(
                "invalid histogram: {bins} bins over [{min}, {max}]"
            )));
        }
        Ok(Self {
            min,
            max,
            bins: vec![0; bins],
            skipped: 0,
        })
    }

    pub fn add(&mut self, value: f64) {
        if value.is_nan() {
            self.skipped += 1;
            return;
        }
        let n = self.bins.len();
        let width = self.max - self.min;
        let bin = if width <= 0.0 {
            0
        } else {
            let x = ((value - self.min) / width * n as f64).floor();
            x.clamp(0.0, (n - 1) as f64) as usize
        };
        self.bins[bin] += 1;
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.bins.iter().sum()
    }

    /// Bin frequencies summing to one (all zero for an empty histogram).
    #[must_use]
    pub fn normalized(&self) -> Vec<f64> {
        let total = self.total();
        if total == 0 {
            return vec![0.0; self.bins.len()];
        }
        self.bins.iter().map(|&c| c as f64 / total as f64).collect()
    }

    /// Lower edge of bin `bin`.
    #[must_use]
    pub fn edge(&self, bin: usize) -> f64 {
        self.min + (self.max - self.min) * bin as f64 / self.bins.len() as f64
    }
}

/// Histogram of the finite fitness values of a snapshot over their range.
pub fn fitness_histogram(snapshot: &PopulationSnapshot, bins: usize) -> Result<Histogram> {
    let finite = snapshot.fitness.iter().copied().filter(|x| x.is_finite());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
        (lo.min(x), hi.max(x))
    });
    let (min, max) = if min.is_finite() { (min, max) } else { (0.0, 0.0) };
    let mut histogram = Histogram::new(bins, min, max)?;
    for &x in &snapshot.fitness {
        histogram.add(x);
    }
    Ok(histogram)
}

/// Histogram of real values over fixed bounds, e.g. one component of
/// continuous traits.
pub fn value_histogram(values: &[f64], bins: usize, min: f64, max: f64) -> Result<Histogram> {
    let mut histogram = Histogram::new(bins, min, max)?;
    for &x in values {
        histogram.add(x);
    }
    Ok(histogram)
}

const SQRT3_2: f64 = 0.866_025_403_784_438_6;

/// Maps densities of two or three traits to plot coordinates.
///
/// Two traits map to `(x_1, 0)`; three traits to barycentric coordinates
/// in the triangle with corners `(0, 0)`, `(1, 0)` and `(1/2, sqrt(3)/2)`.
pub fn simplex_to_plane(state: &[f64]) -> Result<(f64, f64)> {
    let total: f64 = state.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(CoreError::invariant("state must have positive finite mass"));
    }
    match state.len() {
        2 => Ok((state[1] / total, 0.0)),
        3 => {
            let (b, c) = (state[1] / total, state[2] / total);
            Ok((b + 0.5 * c, SQRT3_2 * c))
        }
        n => Err(CoreError::unsupported(format!(
            "simplex projection of {n} traits"
        ))),
    }
}

/// Inverse of [`simplex_to_plane`]; points outside the simplex are projected
/// onto it by clamping negative densities and renormalising.
pub fn plane_to_simplex(point: (f64, f64), n_traits: usize) -> Result<Vec<f64>> {
    let (x, y) = point;
    let raw = match n_traits {
        2 => vec![1.0 - x, x],
        3 => {
            let c = y / SQRT3_2;
            let b = x - 0.5 * c;
            vec![1.0 - b - c, b, c]
        }
        n => {
            return Err(CoreError::unsupported(format!(
                "simplex projection of {n} traits"
            )))
        }
    };
    let clamped: Vec<f64> = raw.iter().map(|v| v.max(0.0)).collect();
    let total: f64 = clamped.iter().sum();
    if total <= 0.0 {
        return Err(CoreError::invariant("point maps to an empty state"));
    }
    Ok(clamped.into_iter().map(|v| v / total).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ludus_data::ConvergenceState;

    #[test]
    fn test_histogram_binning() {
        let mut h = Histogram::new(4, 0.0, 1.0).unwrap();
        for x in [0.0, 0.1, 0.3, 0.99, 1.0, 7.0, -1.0, f64::NAN] {
            h.add(x);
        }
        assert_eq!(h.bins, vec![3, 1, 0, 3]);
        assert_eq!(h.skipped, 1);
        assert_eq!(h.edge(2), 0.5);
        assert!((h.normalized().iter().sum::<f64>() - 1.0).abs() < 1e-12);

        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(serde_json::from_str::<Histogram>(&json).unwrap(), h);
    }

    #[test]
    fn test_fitness_histogram_skips_vacant() {
        let snapshot = PopulationSnapshot {
            time: 0.0,
            events: 0,
            state: ConvergenceState::Running,
            traits: vec![0, 1, 2],
            fitness: vec![1.0, 3.0, f64::NAN],
            trait_counts: vec![1, 1, 1],
            deme_counts: None,
        };
        let h = fitness_histogram(&snapshot, 2).unwrap();
        assert_eq!(h.bins, vec![1, 1]);
        assert_eq!(h.skipped, 1);
    }

    #[test]
    fn test_simplex_round_trip() {
        let state = [0.2, 0.3, 0.5];
        let point = simplex_to_plane(&state).unwrap();
        let back = plane_to_simplex(point, 3).unwrap();
        for (a, b) in state.iter().zip(&back) {
            assert!((a - b).abs() < 1e-12);
        }
        assert_eq!(simplex_to_plane(&[1.0, 0.0, 0.0]).unwrap(), (0.0, 0.0));
    }

    #[test]
    fn test_outside_point_projected() {
        let state = plane_to_simplex((1.5, 0.0), 2).unwrap();
        assert_eq!(state, vec![0.0, 1.0]);
        assert!(simplex_to_plane(&[0.25; 4]).is_err());
    }
}
