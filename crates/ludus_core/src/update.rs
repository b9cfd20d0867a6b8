//! Stochastic trait revision rules.
//!
//! A rule turns the fitness of a focal agent and of its reference into an
//! adoption probability. The probability is clamped by the error rate and a
//! uniform number is drawn only when the outcome is actually uncertain.

use crate::error::Result;
use crate::game::Game;
use ludus_data::{TraitIndex, UpdateRuleKind};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_NOISE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpdateRule {
    pub kind: UpdateRuleKind,
    pub noise: f64,
    pub error: f64,
}

impl Default for UpdateRule {
    fn default() -> Self {
        Self {
            kind: UpdateRuleKind::Thermal,
            noise: DEFAULT_NOISE,
            error: 0.0,
        }
    }
}

/// Logistic adoption probability `1 / (1 + exp(-advantage / noise))`.
///
/// `advantage` is the reference's fitness minus the focal's fitness, so the
/// focal is more likely to switch the better the reference does. The
/// probability of keeping the focal trait is `fermi(focal - reference)`.
/// Exactly 0.5 at zero advantage.
#[must_use]
pub fn fermi(advantage: f64, noise: f64) -> f64 {
    let x = advantage / noise;
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

impl UpdateRule {
    /// Creates a rule, replacing parameters outside their domain. Returns
    /// a note per replacement.
    #[must_use]
    pub fn new(kind: UpdateRuleKind, noise: f64, error: f64) -> (Self, Vec<String>) {
        let mut notes = Vec::new();
        let needs_noise = matches!(
            kind,
            UpdateRuleKind::Thermal | UpdateRuleKind::Imitate | UpdateRuleKind::ImitateBetter
        );
        let noise = if needs_noise && !(noise > 0.0 && noise.is_finite()) {
            notes.push(format!(
                "update rule {kind} needs positive noise, {noise} replaced by {DEFAULT_NOISE}"
            ));
            DEFAULT_NOISE
        } else {
            noise
        };
        let error = if (0.0..=0.5).contains(&error) {
            error
        } else {
            let clamped = if error.is_nan() { 0.0 } else { error.clamp(0.0, 0.5) };
            notes.push(format!("error rate {error} outside [0, 0.5], using {clamped}"));
            clamped
        };
        (Self { kind, noise, error }, notes)
    }

    /// Probability that the focal adopts the reference's trait.
    ///
    /// Fitness values are `NaN` for vacant sites: a vacant reference never
    /// spreads, while an active reference always fills a vacant focal (up to
    /// the error rate). `span` is the range of attainable fitness used to
    /// scale the imitation rules.
    #[must_use]
    pub fn adoption_probability(&self, focal: f64, reference: f64, span: f64) -> f64 {
        if reference.is_nan() {
            return 0.0;
        }
        if focal.is_nan() {
            return self.clamp_error(1.0);
        }
        let delta = reference - focal;
        let span = if span > 0.0 && span.is_finite() { span } else { 1.0 };
        let p = match self.kind {
            UpdateRuleKind::Best | UpdateRuleKind::BestResponse => {
                if delta > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            UpdateRuleKind::BestRandom => {
                if delta > 0.0 {
                    1.0
                } else if delta < 0.0 {
                    0.0
                } else {
                    0.5
                }
            }
            UpdateRuleKind::Imitate => {
                let scale = self.noise * span;
                ((delta + scale) / (2.0 * scale)).clamp(0.0, 1.0)
            }
            UpdateRuleKind::ImitateBetter => {
                if delta <= 0.0 {
                    0.0
                } else {
                    (delta / (self.noise * span)).clamp(0.0, 1.0)
                }
            }
            UpdateRuleKind::Thermal => fermi(delta, self.noise),
            UpdateRuleKind::Proportional => {
                let (f, r) = (focal.max(0.0), reference.max(0.0));
                if f + r <= 0.0 {
                    0.5
                } else {
                    r / (f + r)
                }
            }
        };
        self.clamp_error(p)
    }

    #[must_use]
    pub fn clamp_error(&self, p: f64) -> f64 {
        p.clamp(self.error, 1.0 - self.error)
    }

    /// Decides an adoption. Draws one uniform only when `0 < p < 1`.
    pub fn adopts<R: Rng>(p: f64, rng: &mut R) -> bool {
        if p <= 0.0 {
            false
        } else if p >= 1.0 {
            true
        } else {
            rng.gen::<f64>() < p
        }
    }
}

/// Trait with the highest mean-field payoff against `counts` with the
/// focal removed. Keeps `current` when it is among the best, otherwise the
/// lowest-index best trait.
pub fn best_response(
    game: &dyn Game,
    counts: &[usize],
    current: TraitIndex,
) -> Result<TraitIndex> {
    let desc = game.descriptor();
    desc.check_len("trait counts", counts.len())?;
    let others: usize = counts.iter().sum::<usize>().saturating_sub(1);
    let mut densities = vec![0.0; counts.len()];
    if others > 0 {
        for (t, density) in densities.iter_mut().enumerate() {
            let c = if t == current { counts[t].saturating_sub(1) } else { counts[t] };
            *density = c as f64 / others as f64;
        }
    }
    let mut scores = vec![0.0; counts.len()];
    game.mean_field_scores(&densities, desc.group_size(), &mut scores)?;
    let active = desc.active_traits();
    let best = active
        .iter()
        .map(|&t| scores[t])
        .fold(f64::NEG_INFINITY, f64::max);
    if desc.is_active(current) && scores[current] >= best {
        return Ok(current);
    }
    Ok(active
        .into_iter()
        .find(|&t| scores[t] >= best)
        .unwrap_or(current))
}

/// Index into `weights` picked with probability proportional to the weight,
/// using the single uniform `u`. Negative and `NaN` weights count as zero;
/// if every weight is zero the pick is uniform.
#[must_use]
pub fn pick_weighted(weights: &[f64], u: f64) -> usize {
    pick_weighted_by(0..weights.len(), |i| weights[i], u).unwrap_or(0)
}

/// Weighted pick among `candidates`, see [`pick_weighted`]. `None` if there
/// are no candidates.
pub fn pick_weighted_by<I, F>(candidates: I, weight: F, u: f64) -> Option<usize>
where
    I: Iterator<Item = usize> + Clone,
    F: Fn(usize) -> f64,
{
    let clean = |w: f64| if w > 0.0 { w } else { 0.0 };
    let (len, total) = candidates
        .clone()
        .fold((0usize, 0.0f64), |(n, sum), c| (n + 1, sum + clean(weight(c))));
    if len == 0 {
        return None;
    }
    if total <= 0.0 || !total.is_finite() {
        let k = ((u * len as f64) as usize).min(len - 1);
        return candidates.clone().nth(k);
    }
    let mut target = u * total;
    let mut last = None;
    for c in candidates {
        let w = clean(weight(c));
        if w <= 0.0 {
            continue;
        }
        last = Some(c);
        if target < w {
            return Some(c);
        }
        target -= w;
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::MatrixGame;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rule(kind: UpdateRuleKind) -> UpdateRule {
        UpdateRule::new(kind, 0.5, 0.0).0
    }

    #[test]
    fn test_fermi_half_at_equality() {
        for noise in [1e-3, 0.1, 1.0, 50.0] {
            assert_eq!(fermi(0.0, noise), 0.5);
        }
        assert_eq!(rule(UpdateRuleKind::Thermal).adoption_probability(2.0, 2.0, 1.0), 0.5);
    }

    #[test]
    fn test_fermi_uses_reference_advantage() {
        let thermal = rule(UpdateRuleKind::Thermal);
        let p = thermal.adoption_probability(1.0, 3.0, 1.0);
        assert_eq!(p, fermi(2.0, thermal.noise));
        assert!(p > 0.5);
        let keep = 1.0 - thermal.adoption_probability(3.0, 1.0, 1.0);
        assert!((keep - p).abs() < 1e-12);
    }

    #[test]
    fn test_deterministic_rules() {
        let best = rule(UpdateRuleKind::Best);
        assert_eq!(best.adoption_probability(1.0, 2.0, 1.0), 1.0);
        assert_eq!(best.adoption_probability(2.0, 2.0, 1.0), 0.0);
        let random = rule(UpdateRuleKind::BestRandom);
        assert_eq!(random.adoption_probability(2.0, 2.0, 1.0), 0.5);
        let better = rule(UpdateRuleKind::ImitateBetter);
        assert_eq!(better.adoption_probability(2.0, 1.0, 1.0), 0.0);
        assert_eq!(better.adoption_probability(1.0, 1.25, 1.0), 0.5);
        let imitate = rule(UpdateRuleKind::Imitate);
        assert_eq!(imitate.adoption_probability(1.0, 1.0, 1.0), 0.5);
        let proportional = rule(UpdateRuleKind::Proportional);
        assert_eq!(proportional.adoption_probability(1.0, 3.0, 1.0), 0.75);
    }

    #[test]
    fn test_error_clamps_both_sides() {
        let (best, _) = UpdateRule::new(UpdateRuleKind::Best, 1.0, 0.1);
        assert_eq!(best.adoption_probability(1.0, 5.0, 1.0), 0.9);
        assert_eq!(best.adoption_probability(5.0, 1.0, 1.0), 0.1);
    }

    #[test]
    fn test_vacancies() {
        let thermal = rule(UpdateRuleKind::Thermal);
        assert_eq!(thermal.adoption_probability(1.0, f64::NAN, 1.0), 0.0);
        assert_eq!(thermal.adoption_probability(f64::NAN, 1.0, 1.0), 1.0);
    }

    #[test]
    fn test_invalid_parameters_replaced() {
        let (rule, notes) = UpdateRule::new(UpdateRuleKind::Thermal, 0.0, 0.7);
        assert_eq!(rule.noise, DEFAULT_NOISE);
        assert_eq!(rule.error, 0.5);
        assert_eq!(notes.len(), 2);
        let (best, notes) = UpdateRule::new(UpdateRuleKind::Best, 0.0, 0.0);
        assert_eq!(best.noise, 0.0);
        assert!(notes.is_empty());
    }

    #[test]
    fn test_adopts_draws_only_when_uncertain() {
        let mut a = ChaCha8Rng::seed_from_u64(1);
        let mut b = ChaCha8Rng::seed_from_u64(1);
        assert!(UpdateRule::adopts(1.0, &mut a));
        assert!(!UpdateRule::adopts(0.0, &mut a));
        assert_eq!(a.gen::<u64>(), b.gen::<u64>());
    }

    #[test]
    fn test_best_response_against_defectors() {
        let game = MatrixGame::new(vec![vec![3.0, 0.0], vec![5.0, 1.0]]).unwrap();
        assert_eq!(best_response(&game, &[5, 5], 0).unwrap(), 1);
        assert_eq!(best_response(&game, &[5, 5], 1).unwrap(), 1);
        // coordination game: best reply follows the majority
        let coord = MatrixGame::new(vec![vec![2.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert_eq!(best_response(&coord, &[8, 2], 1).unwrap(), 0);
    }

    #[test]
    fn test_pick_weighted() {
        assert_eq!(pick_weighted(&[1.0, 0.0, 3.0], 0.1), 0);
        assert_eq!(pick_weighted(&[1.0, 0.0, 3.0], 0.5), 2);
        assert_eq!(pick_weighted(&[f64::NAN, 2.0], 0.0), 1);
        assert_eq!(pick_weighted(&[0.0, 0.0, 0.0, 0.0], 0.6), 2);
    }

    proptest! {
        #[test]
        fn test_fermi_strictly_increasing(
            a in -5.0f64..5.0,
            gap in 1e-3f64..5.0,
            noise in 0.5f64..5.0,
        ) {
            prop_assert!(fermi(a, noise) < fermi(a + gap, noise));
        }

        #[test]
        fn test_probabilities_in_unit_interval(
            focal in -10.0f64..10.0,
            reference in -10.0f64..10.0,
            error in 0.0f64..0.5,
        ) {
            for kind in [
                UpdateRuleKind::Best,
                UpdateRuleKind::BestRandom,
                UpdateRuleKind::Imitate,
                UpdateRuleKind::ImitateBetter,
                UpdateRuleKind::Thermal,
                UpdateRuleKind::Proportional,
            ] {
                let (rule, _) = UpdateRule::new(kind, 0.3, error);
                let p = rule.adoption_probability(focal, reference, 4.0);
                prop_assert!(p >= error && p <= 1.0 - error);
            }
        }
    }
}
