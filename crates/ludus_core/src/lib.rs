//! # Ludus Core
//!
//! Individual-based simulation engine for evolutionary games.
//!
//! A population of agents carries discrete traits (strategies). Agents
//! interact according to a game on a topology, payoffs are mapped to
//! fitness, and traits spread through imitation or Moran-type reproduction
//! with optional mutation and migration between demes.
//!
//! ## Architecture
//!
//! - **Game contract**: games declare capabilities through a descriptor;
//!   payoff terms are data, not subclasses
//! - **Propose/commit overlay**: every event proposes changes and commits
//!   them at once, keeping trait and deme counts consistent
//! - **Exact payoffs**: scores are recomputed for changed neighbourhoods only
//! - **Deterministic simulation**: one seeded generator threaded through every
//!   draw; identical seeds give identical trajectories
//!
//! ## Example
//!
//! ```
//! use ludus_core::config::ModelConfig;
//! use ludus_core::model::{Model, RunControl};
//!
//! let mut config = ModelConfig::default();
//! config.run.max_events = 10_000;
//! config.sanitize();
//! let mut model = Model::from_config(&config).unwrap();
//! model.run(&RunControl::new()).unwrap();
//! let counts = model.species()[0].trait_counts();
//! assert_eq!(counts.iter().sum::<usize>(), 100);
//! ```

/// Model configuration, sanitising and fingerprints
pub mod config;
/// Continuous-trait populations
pub mod continuous;
/// Absorbing states and the rare-event clock
pub mod convergence;
/// Replicator derivatives for ODE solvers
pub mod dynamics;
/// Engine errors
pub mod error;
/// Payoff to fitness maps
pub mod fitness;
/// Game contract and reference games
pub mod game;
/// Initial trait configurations
pub mod init;
/// Run counters and structured logging
pub mod metrics;
/// Migration between demes
pub mod migration;
/// Multi-species models and run control
pub mod model;
/// Trait mutation kernels
pub mod mutation;
/// Declarative `key=value` options
pub mod options;
/// Cached per-agent payoffs
pub mod payoff;
/// Histograms and simplex phase mapping
pub mod phase;
/// Trait assignment with propose/commit
pub mod population;
/// Event loop of one population
pub mod simulation;
/// Fixation statistics over independent runs
pub mod statistics;
/// Interaction and reproduction graphs
pub mod topology;
/// Strategy revision rules
pub mod update;

pub use config::{ConfigWarning, ModelConfig, RunConfig, SpeciesConfig};
pub use error::{CoreError, Result};
pub use game::{Game, GameDescriptor, GameSpec};
pub use metrics::{init_logging, RunMetrics};
pub use model::{Model, RunControl, StopReason};
pub use simulation::{Simulation, SimulationParams};
pub use ludus_data::{ConvergenceState, PopulationSnapshot, TraitFlip, TraitIndex};
