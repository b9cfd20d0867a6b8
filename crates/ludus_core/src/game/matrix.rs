use super::{Game, GameDescriptor, Interaction, PayoffKind};
use crate::error::{CoreError, Result};
use ludus_data::TraitIndex;

/// Symmetric pairwise game given by a square payoff matrix.
///
/// `payoffs[i][j]` is paid to a player of trait `i` meeting trait `j`.
#[derive(Debug, Clone)]
pub struct MatrixGame {
    descriptor: GameDescriptor,
    payoffs: Vec<Vec<f64>>,
    min: f64,
    max: f64,
}

impl MatrixGame {
    pub fn new(payoffs: Vec<Vec<f64>>) -> Result<Self> {
        let n = payoffs.len();
        if n < 2 {
            return Err(CoreError::config(format!(
                "payoff matrix needs at least 2 traits, got {n}"
            )));
        }
        if let Some(row) = payoffs.iter().position(|r| r.len() != n) {
            return Err(CoreError::config(format!(
                "payoff matrix row {row} has {} entries, expected {n}",
                payoffs[row].len()
            )));
        }
        if payoffs.iter().flatten().any(|x| !x.is_finite()) {
            return Err(CoreError::config("payoff matrix entries must be finite"));
        }
        let min = payoffs.iter().flatten().copied().fold(f64::INFINITY, f64::min);
        let max = payoffs
            .iter()
            .flatten()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        Ok(Self {
            descriptor: GameDescriptor {
                name: format!("matrix-{n}x{n}"),
                trait_names: (0..n).map(|t| format!("T{t}")).collect(),
                interaction: Interaction::Pairwise,
                payoffs: PayoffKind::Computed,
                mean_field: true,
                vacant: None,
            },
            payoffs,
            min,
            max,
        })
    }

    /// Payoff to `row` against `col`.
    #[must_use]
    pub fn payoff(&self, row: TraitIndex, col: TraitIndex) -> f64 {
        self.payoffs[row][col]
    }
}

impl Game for MatrixGame {
    fn descriptor(&self) -> &GameDescriptor {
        &self.descriptor
    }

    fn pair_scores(
        &self,
        focal: TraitIndex,
        neighbour_counts: &[usize],
        trait_scores: &mut [f64],
    ) -> Result<f64> {
        self.descriptor.check_trait(focal)?;
        self.descriptor
            .check_len("neighbour counts", neighbour_counts.len())?;
        self.descriptor.check_len("trait scores", trait_scores.len())?;
        let row = &self.payoffs[focal];
        let own: f64 = row
            .iter()
            .zip(neighbour_counts)
            .map(|(a, &k)| a * k as f64)
            .sum();
        for (t, score) in trait_scores.iter_mut().enumerate() {
            *score = self.payoffs[t][focal];
        }
        Ok(own)
    }

    fn mean_field_scores(
        &self,
        densities: &[f64],
        _group_size: usize,
        trait_scores: &mut [f64],
    ) -> Result<()> {
        self.descriptor.check_len("densities", densities.len())?;
        self.descriptor.check_len("trait scores", trait_scores.len())?;
        for (row, score) in self.payoffs.iter().zip(trait_scores.iter_mut()) {
            *score = row.iter().zip(densities).map(|(a, d)| a * d).sum();
        }
        Ok(())
    }

    fn monomorphic_score(&self, trait_index: TraitIndex) -> f64 {
        self.payoffs[trait_index][trait_index]
    }

    fn min_payoff(&self) -> f64 {
        self.min
    }

    fn max_payoff(&self) -> f64 {
        self.max
    }
}
