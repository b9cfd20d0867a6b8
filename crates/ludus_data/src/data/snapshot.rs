use serde::{Deserialize, Serialize};

use super::state::{ConvergenceState, TraitIndex};

/// Per-deme trait counts flattened row-major as `[deme][trait]`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DemeCounts {
    pub n_demes: usize,
    pub n_traits: usize,
    pub counts: Vec<usize>,
}

impl DemeCounts {
    #[must_use]
    pub fn get(&self, deme: usize, trait_index: TraitIndex) -> usize {
        self.counts[deme * self.n_traits + trait_index]
    }

    /// Counts of deme `deme` as a slice over traits.
    #[must_use]
    pub fn deme(&self, deme: usize) -> &[usize] {
        &self.counts[deme * self.n_traits..(deme + 1) * self.n_traits]
    }
}

/// Read-only copy of the engine state taken between commits.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PopulationSnapshot {
    /// Simulated time in generations.
    pub time: f64,
    pub events: u64,
    pub state: ConvergenceState,
    pub traits: Vec<TraitIndex>,
    /// Fitness per agent; `NaN` marks vacant sites.
    pub fitness: Vec<f64>,
    pub trait_counts: Vec<usize>,
    pub deme_counts: Option<DemeCounts>,
}

impl PopulationSnapshot {
    /// Fraction of sites holding each trait.
    #[must_use]
    pub fn frequencies(&self) -> Vec<f64> {
        let n = self.traits.len().max(1) as f64;
        self.trait_counts.iter().map(|&c| c as f64 / n).collect()
    }
}

/// Outcome of one independent run used by fixation statistics.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FixationRecord {
    pub run: usize,
    pub seed: u64,
    /// Trait that took over, `None` if the run was cut off or ended absorbed
    /// without a single trait.
    pub fixed_trait: Option<TraitIndex>,
    pub time: f64,
    pub events: u64,
}
