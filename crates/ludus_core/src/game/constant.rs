use super::{Game, GameDescriptor, Interaction, PayoffKind};
use crate::error::{CoreError, Result};
use ludus_data::TraitIndex;

/// Constant selection: every trait carries a fixed payoff.
///
/// The classic Moran fixation setting; the engine never tallies
/// interactions for it.
#[derive(Debug, Clone)]
pub struct ConstantSelection {
    descriptor: GameDescriptor,
    payoffs: Vec<f64>,
}

impl ConstantSelection {
    pub fn new(payoffs: Vec<f64>) -> Result<Self> {
        if payoffs.len() < 2 {
            return Err(CoreError::config("constant selection needs at least 2 traits"));
        }
        if payoffs.iter().any(|x| !x.is_finite()) {
            return Err(CoreError::config("constant payoffs must be finite"));
        }
        Ok(Self {
            descriptor: GameDescriptor {
                name: "constant".to_string(),
                trait_names: (0..payoffs.len()).map(|t| format!("T{t}")).collect(),
                interaction: Interaction::Pairwise,
                payoffs: PayoffKind::Static,
                mean_field: true,
                vacant: None,
            },
            payoffs,
        })
    }
}

impl Game for ConstantSelection {
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
        self.descriptor.check_len("trait scores", trait_scores.len())?;
        trait_scores.copy_from_slice(&self.payoffs);
        let encounters: usize = neighbour_counts.iter().sum();
        Ok(self.payoffs[focal] * encounters as f64)
    }

    fn mean_field_scores(
        &self,
        _densities: &[f64],
        _group_size: usize,
        trait_scores: &mut [f64],
    ) -> Result<()> {
        self.descriptor.check_len("trait scores", trait_scores.len())?;
        trait_scores.copy_from_slice(&self.payoffs);
        Ok(())
    }

    fn static_scores(&self) -> Option<&[f64]> {
        Some(&self.payoffs)
    }

    fn monomorphic_score(&self, trait_index: TraitIndex) -> f64 {
        self.payoffs[trait_index]
    }

    fn min_payoff(&self) -> f64 {
        self.payoffs.iter().copied().fold(f64::INFINITY, f64::min)
    }

    fn max_payoff(&self) -> f64 {
        self.payoffs.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}
