//! Mutation kernels for discrete and continuous traits.

use ludus_data::{ContinuousKernel, MutationKernel, TraitIndex};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Resampling attempts before a continuous mutant is clamped into bounds.
const MAX_RESAMPLES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    /// Per-event probability.
    pub rate: f64,
    pub kernel: MutationKernel,
    /// Half-width of the `range` kernel, in trait indices.
    pub range: usize,
}

impl Default for Mutation {
    fn default() -> Self {
        Self {
            rate: 0.0,
            kernel: MutationKernel::All,
            range: 1,
        }
    }
}

impl Mutation {
    #[must_use]
    pub fn new(rate: f64, kernel: MutationKernel, range: usize) -> (Self, Vec<String>) {
        let mut notes = Vec::new();
        let rate = if (0.0..=1.0).contains(&rate) {
            rate
        } else {
            notes.push(format!("mutation rate {rate} outside [0, 1], mutations disabled"));
            0.0
        };
        let range = if kernel == MutationKernel::Range && range == 0 {
            notes.push("range kernel needs a positive range, using 1".to_string());
            1
        } else {
            range
        };
        (Self { rate, kernel, range }, notes)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.rate > 0.0
    }

    /// Whether a mutation happens this event. Draws one uniform iff the
    /// rate is positive.
    pub fn occurs<R: Rng>(&self, rng: &mut R) -> bool {
        self.rate > 0.0 && rng.gen::<f64>() < self.rate
    }

    /// Mutant of `current` among the `active` traits (sorted, vacant trait
    /// excluded). Traits not in `active` are returned unchanged.
    pub fn mutate<R: Rng>(
        &self,
        current: TraitIndex,
        active: &[TraitIndex],
        rng: &mut R,
    ) -> TraitIndex {
        let Ok(pos) = active.binary_search(&current) else {
            return current;
        };
        let n = active.len();
        match self.kernel {
            MutationKernel::All => active[rng.gen_range(0..n)],
            MutationKernel::Other => {
                if n < 2 {
                    return current;
                }
                let pick = rng.gen_range(0..n - 1);
                active[if pick >= pos { pick + 1 } else { pick }]
            }
            MutationKernel::Range => {
                let lo = pos.saturating_sub(self.range);
                let hi = (pos + self.range).min(n - 1);
                active[rng.gen_range(lo..=hi)]
            }
        }
    }
}

/// Mutation of real-valued trait vectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContinuousMutation {
    pub rate: f64,
    pub kernel: ContinuousKernel,
    /// Half-width for `uniform`, standard deviation for `gaussian`.
    pub scale: f64,
}

impl Default for ContinuousMutation {
    fn default() -> Self {
        Self {
            rate: 0.0,
            kernel: ContinuousKernel::Uniform,
            scale: 0.01,
        }
    }
}

impl ContinuousMutation {
    #[must_use]
    pub fn new(rate: f64, kernel: ContinuousKernel, scale: f64) -> (Self, Vec<String>) {
        let defaults = Self::default();
        let mut notes = Vec::new();
        let rate = if (0.0..=1.0).contains(&rate) {
            rate
        } else {
            notes.push(format!("mutation rate {rate} outside [0, 1], mutations disabled"));
            0.0
        };
        let scale = if scale > 0.0 && scale.is_finite() {
            scale
        } else {
            notes.push(format!(
                "mutation scale {scale} must be positive, using {}",
                defaults.scale
            ));
            defaults.scale
        };
        (Self { rate, kernel, scale }, notes)
    }

    pub fn occurs<R: Rng>(&self, rng: &mut R) -> bool {
        self.rate > 0.0 && rng.gen::<f64>() < self.rate
    }

    /// Perturbs every component of `trait_value` around its current value,
    /// resampling until it lies within `bounds[i]`.
    pub fn mutate<R: Rng>(&self, trait_value: &mut [f64], bounds: &[(f64, f64)], rng: &mut R) {
        for (x, &(lo, hi)) in trait_value.iter_mut().zip(bounds) {
            let centre = *x;
            let normal = Normal::new(centre, self.scale).ok();
            let mut accepted = None;
            for _ in 0..MAX_RESAMPLES {
                let candidate = match (self.kernel, &normal) {
                    (ContinuousKernel::Gaussian, Some(normal)) => normal.sample(rng),
                    _ => centre + rng.gen_range(-self.scale..=self.scale),
                };
                if (lo..=hi).contains(&candidate) {
                    accepted = Some(candidate);
                    break;
                }
            }
            *x = accepted.unwrap_or_else(|| centre.clamp(lo, hi));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_other_never_returns_current() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let (m, _) = Mutation::new(1.0, MutationKernel::Other, 1);
        let active = [0, 1, 2, 3];
        for _ in 0..200 {
            assert_ne!(m.mutate(2, &active, &mut rng), 2);
        }
    }

    #[test]
    fn test_all_can_return_current() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let (m, _) = Mutation::new(1.0, MutationKernel::All, 1);
        let hits = (0..300).filter(|_| m.mutate(1, &[0, 1, 2], &mut rng) == 1).count();
        assert!(hits > 50 && hits < 150);
    }

    #[test]
    fn test_vacant_trait_skips_mutation() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let (m, _) = Mutation::new(1.0, MutationKernel::All, 1);
        assert_eq!(m.mutate(3, &[0, 1, 2], &mut rng), 3);
    }

    #[test]
    fn test_inactive_rate_draws_nothing() {
        let mut a = ChaCha8Rng::seed_from_u64(5);
        let mut b = ChaCha8Rng::seed_from_u64(5);
        assert!(!Mutation::default().occurs(&mut a));
        assert_eq!(a.gen::<u32>(), b.gen::<u32>());
    }

    #[test]
    fn test_invalid_parameters_replaced() {
        let (m, notes) = Mutation::new(1.5, MutationKernel::Range, 0);
        assert_eq!(m.rate, 0.0);
        assert_eq!(m.range, 1);
        assert_eq!(notes.len(), 2);
    }

    #[test]
    fn test_continuous_stays_in_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        for kernel in [ContinuousKernel::Uniform, ContinuousKernel::Gaussian] {
            let (m, _) = ContinuousMutation::new(1.0, kernel, 0.5);
            let mut x = [0.05, 0.95];
            for _ in 0..200 {
                m.mutate(&mut x, &[(0.0, 1.0), (0.0, 1.0)], &mut rng);
                assert!(x.iter().all(|v| (0.0..=1.0).contains(v)));
            }
        }
    }

    proptest! {
        #[test]
        fn test_range_kernel_within_bounds(
            n_traits in 1usize..20,
            current in 0usize..20,
            range in 1usize..30,
            seed in any::<u64>(),
        ) {
            let current = current % n_traits;
            let active: Vec<usize> = (0..n_traits).collect();
            let (m, _) = Mutation::new(1.0, MutationKernel::Range, range);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            for _ in 0..20 {
                let t = m.mutate(current, &active, &mut rng);
                prop_assert!(t < n_traits);
                prop_assert!(t + range >= current && t <= current + range);
            }
        }
    }
}
