//! Game contract consumed by the payoff engine.
//!
//! A game describes what it can compute through a [`GameDescriptor`] of
//! orthogonal capability flags. The engine dispatches on those flags; a game
//! only implements the score functions its flags advertise and the defaults
//! report [`CoreError::Unsupported`] for the rest.
//!
//! ## Score conventions
//!
//! - `pair_scores(focal, neighbour_counts, trait_scores)` returns the focal's
//!   score summed over one encounter with every neighbour and writes into
//!   `trait_scores[t]` the payoff a `t` player collects from a single
//!   encounter with the focal.
//! - `group_scores(counts, trait_scores)` writes the payoff of a member of
//!   each trait in a group with the given composition.
//! - `mean_field_scores(densities, group_size, trait_scores)` writes the
//!   expected payoff per trait against a population with the given
//!   densities.
//!
//! Vacant traits score `NaN` and never enter fitness comparisons.

mod constant;
mod matrix;
mod public_goods;

pub use constant::ConstantSelection;
pub use matrix::MatrixGame;
pub use public_goods::{PayoffTerm, PublicGoods, Role};

use crate::error::{CoreError, Result};
use ludus_data::TraitIndex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of co-players a focal meets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interaction {
    Pairwise,
    /// Groups of `size` members, focal included.
    Group { size: usize },
}

/// Whether payoffs depend on the composition of the population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoffKind {
    /// Each trait has a fixed payoff.
    Static,
    /// Payoffs result from interactions.
    Computed,
}

/// Immutable per-run description of a game's capabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameDescriptor {
    pub name: String,
    pub trait_names: Vec<String>,
    pub interaction: Interaction,
    pub payoffs: PayoffKind,
    /// `mean_field_scores` is implemented.
    pub mean_field: bool,
    /// Trait marking empty sites.
    pub vacant: Option<TraitIndex>,
}

impl GameDescriptor {
    #[must_use]
    pub fn n_traits(&self) -> usize {
        self.trait_names.len()
    }

    /// Group size including the focal; 2 for pairwise games.
    #[must_use]
    pub fn group_size(&self) -> usize {
        match self.interaction {
            Interaction::Pairwise => 2,
            Interaction::Group { size } => size,
        }
    }

    #[must_use]
    pub fn is_pairwise(&self) -> bool {
        self.interaction == Interaction::Pairwise
    }

    #[must_use]
    pub fn is_active(&self, trait_index: TraitIndex) -> bool {
        trait_index < self.n_traits() && Some(trait_index) != self.vacant
    }

    /// All non-vacant traits in index order.
    #[must_use]
    pub fn active_traits(&self) -> Vec<TraitIndex> {
        (0..self.n_traits()).filter(|&t| self.is_active(t)).collect()
    }

    /// Rejects indices outside `0..n_traits`.
    pub fn check_trait(&self, trait_index: TraitIndex) -> Result<()> {
        if trait_index < self.n_traits() {
            Ok(())
        } else {
            Err(CoreError::UnknownTrait {
                trait_index,
                n_traits: self.n_traits(),
            })
        }
    }

    /// Rejects count or score slices whose length differs from `n_traits`.
    pub fn check_len(&self, what: &str, len: usize) -> Result<()> {
        if len == self.n_traits() {
            Ok(())
        } else {
            Err(CoreError::invariant(format!(
                "{what} has {len} entries, game '{}' declares {} traits",
                self.name,
                self.n_traits()
            )))
        }
    }
}

/// Score functions of a game. Implementations must be pure.
pub trait Game: Send + Sync + fmt::Debug {
    fn descriptor(&self) -> &GameDescriptor;

    fn pair_scores(
        &self,
        _focal: TraitIndex,
        _neighbour_counts: &[usize],
        _trait_scores: &mut [f64],
    ) -> Result<f64> {
        Err(CoreError::unsupported(format!(
            "game '{}' has no pairwise scores",
            self.descriptor().name
        )))
    }

    fn group_scores(&self, _counts: &[usize], _trait_scores: &mut [f64]) -> Result<()> {
        Err(CoreError::unsupported(format!(
            "game '{}' has no group scores",
            self.descriptor().name
        )))
    }

    fn mean_field_scores(
        &self,
        _densities: &[f64],
        _group_size: usize,
        _trait_scores: &mut [f64],
    ) -> Result<()> {
        Err(CoreError::unsupported(format!(
            "game '{}' has no mean-field scores",
            self.descriptor().name
        )))
    }

    /// Fixed payoff per trait for games with [`PayoffKind::Static`].
    fn static_scores(&self) -> Option<&[f64]> {
        None
    }

    /// Payoff of an agent in a population made only of `trait_index`.
    fn monomorphic_score(&self, trait_index: TraitIndex) -> f64;

    fn min_payoff(&self) -> f64;

    fn max_payoff(&self) -> f64;

    fn min_monomorphic_payoff(&self) -> f64 {
        self.descriptor()
            .active_traits()
            .into_iter()
            .map(|t| self.monomorphic_score(t))
            .fold(f64::INFINITY, f64::min)
    }

    fn max_monomorphic_payoff(&self) -> f64 {
        self.descriptor()
            .active_traits()
            .into_iter()
            .map(|t| self.monomorphic_score(t))
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Serializable choice of a reference game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum GameSpec {
    /// Pairwise game with `payoffs[i][j]` paid to `i` against `j`.
    Matrix { payoffs: Vec<Vec<f64>> },
    /// Fixed payoff per trait.
    Constant { payoffs: Vec<f64> },
    /// Linear public goods game with optional extra roles and terms.
    PublicGoods {
        roles: Vec<Role>,
        group_size: usize,
        multiplier: f64,
        cost: f64,
        #[serde(default)]
        loner_payoff: f64,
        #[serde(default)]
        terms: Vec<PayoffTerm>,
    },
}

impl Default for GameSpec {
    fn default() -> Self {
        Self::Matrix {
            payoffs: vec![vec![3.0, 0.0], vec![5.0, 1.0]],
        }
    }
}

impl GameSpec {
    /// Checks the game description without building it.
    pub fn validate(&self) -> Result<()> {
        self.build().map(|_| ())
    }

    /// Builds the boxed game.
    pub fn build(&self) -> Result<Box<dyn Game>> {
        Ok(match self {
            Self::Matrix { payoffs } => Box::new(MatrixGame::new(payoffs.clone())?),
            Self::Constant { payoffs } => Box::new(ConstantSelection::new(payoffs.clone())?),
            Self::PublicGoods {
                roles,
                group_size,
                multiplier,
                cost,
                loner_payoff,
                terms,
            } => Box::new(PublicGoods::new(
                roles.clone(),
                *group_size,
                *multiplier,
                *cost,
                *loner_payoff,
                terms.clone(),
            )?),
        })
    }

    /// Number of traits the built game declares.
    #[must_use]
    pub fn n_traits(&self) -> usize {
        match self {
            Self::Matrix { payoffs } => payoffs.len(),
            Self::Constant { payoffs } => payoffs.len(),
            Self::PublicGoods { roles, .. } => roles.len(),
        }
    }
}

/// Expected per-trait payoff in a group of `group_size` whose other members
/// are drawn independently from `densities`.
///
/// Enumerates every composition of the co-players and weights the group
/// scores by the multinomial probability, so it is exact for games whose
/// payoffs are non-linear in the group composition.
pub fn expected_group_scores(
    game: &dyn Game,
    densities: &[f64],
    group_size: usize,
    trait_scores: &mut [f64],
) -> Result<()> {
    let desc = game.descriptor();
    let n = desc.n_traits();
    desc.check_len("densities", densities.len())?;
    desc.check_len("trait scores", trait_scores.len())?;
    if group_size < 2 {
        return Err(CoreError::config(format!(
            "group size {group_size} leaves no co-players"
        )));
    }
    trait_scores.fill(0.0);
    let others = group_size - 1;
    let mut composition = vec![0usize; n];
    let mut group = vec![0usize; n];
    let mut scratch = vec![0.0; n];
    let mut result: Result<()> = Ok(());
    for_each_composition(&mut composition, 0, others, &mut |comp| {
        if result.is_err() {
            return;
        }
        let prob = multinomial_probability(comp, densities);
        if prob == 0.0 {
            return;
        }
        for focal in 0..n {
            if !desc.is_active(focal) {
                continue;
            }
            group.copy_from_slice(comp);
            group[focal] += 1;
            if let Err(e) = game.group_scores(&group, &mut scratch) {
                result = Err(e);
                return;
            }
            trait_scores[focal] += prob * scratch[focal];
        }
    });
    result?;
    if let Some(v) = desc.vacant {
        trait_scores[v] = f64::NAN;
    }
    Ok(())
}

/// Calls `visit` with every vector of `slots.len()` non-negative counts summing to `remaining`
/// (counting from `index` on).
pub(crate) fn for_each_composition<F: FnMut(&[usize])>(
    slots: &mut [usize],
    index: usize,
    remaining: usize,
    visit: &mut F,
) {
    if index + 1 == slots.len() {
        slots[index] = remaining;
        visit(slots);
        slots[index] = 0;
        return;
    }
    for k in 0..=remaining {
        slots[index] = k;
        for_each_composition(slots, index + 1, remaining - k, visit);
    }
    slots[index] = 0;
}

fn multinomial_probability(counts: &[usize], densities: &[f64]) -> f64 {
    let mut prob = 1.0;
    let mut total = 0usize;
    for (&k, &d) in counts.iter().zip(densities) {
        for i in 1..=k {
            total += 1;
            // builds total! / prod(k_i!) incrementally
            prob *= total as f64 / i as f64 * d;
        }
        if prob == 0.0 {
            return 0.0;
        }
    }
    prob
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compositions_cover_simplex() {
        let mut slots = vec![0; 3];
        let mut seen = Vec::new();
        for_each_composition(&mut slots, 0, 2, &mut |c| seen.push(c.to_vec()));
        assert_eq!(seen.len(), 6);
        assert!(seen.iter().all(|c| c.iter().sum::<usize>() == 2));
    }

    #[test]
    fn test_multinomial_probabilities_sum_to_one() {
        let densities = [0.2, 0.3, 0.5];
        let mut slots = vec![0; 3];
        let mut total = 0.0;
        for_each_composition(&mut slots, 0, 4, &mut |c| {
            total += multinomial_probability(c, &densities)
        });
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_default_spec_builds_prisoners_dilemma() {
        let game = GameSpec::default().build().unwrap();
        assert_eq!(game.descriptor().n_traits(), 2);
        assert!(game.descriptor().is_pairwise());
        assert_eq!(game.min_payoff(), 0.0);
        assert_eq!(game.max_payoff(), 5.0);
    }

    #[test]
    fn test_malformed_matrix_rejected() {
        let spec = GameSpec::Matrix {
            payoffs: vec![vec![1.0, 2.0], vec![3.0]],
        };
        assert!(spec.validate().is_err());
    }
}
