use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a discrete trait in `0..n_traits`.
pub type TraitIndex = usize;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(tag = "state", rename_all = "kebab-case")]
/// Outcome of a convergence inspection.
pub enum ConvergenceState {
    /// Productive events remain possible.
    #[default]
    Running,
    /// A single active trait occupies every non-vacant site.
    Monomorphic { trait_index: TraitIndex },
    /// Every deme is pure but the demes disagree; only mutation or
    /// migration can change the composition.
    HomogeneousDemes,
    /// Terminal: no productive event remains.
    Absorbed,
}

impl ConvergenceState {
    #[must_use]
    pub fn is_monomorphic(self) -> bool {
        matches!(self, Self::Monomorphic { .. })
    }
}

impl fmt::Display for ConvergenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Monomorphic { trait_index } => write!(f, "monomorphic({trait_index})"),
            Self::HomogeneousDemes => f.write_str("homogeneous-demes-heterogeneous-population"),
            Self::Absorbed => f.write_str("absorbed"),
        }
    }
}

/// One committed trait change.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraitFlip {
    /// Event counter at which the change was committed.
    pub event: u64,
    pub agent: usize,
    pub from: TraitIndex,
    pub to: TraitIndex,
}
