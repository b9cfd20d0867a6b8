//! # Ludus Data
//!
//! Plain data shared between the simulation engine and its consumers:
//! parameter vocabularies, convergence states, commit records and
//! read-only population snapshots. Nothing in this crate draws random
//! numbers or mutates engine state.

pub mod data;

pub use data::params::*;
pub use data::snapshot::{DemeCounts, FixationRecord, PopulationSnapshot};
pub use data::state::{ConvergenceState, TraitFlip, TraitIndex};
