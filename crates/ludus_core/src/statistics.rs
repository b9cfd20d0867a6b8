//! Fixation probabilities and absorption times over independent runs.
//!
//! Run `i` is seeded with `base_seed + i` and shares nothing with the other
//! runs, so with the `parallel` feature the runs execute on the rayon pool
//! and still give the same records as a sequential loop.

use crate::error::Result;
use crate::simulation::Simulation;
use ludus_data::{ConvergenceState, FixationRecord};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Fixation summary of one trait.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitFixation {
    pub count: usize,
    pub probability: f64,
    /// Mean time to fixation in generations, `None` if never fixed.
    pub mean_time: Option<f64>,
    pub time_variance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixationStats {
    pub runs: usize,
    pub traits: Vec<TraitFixation>,
    /// Runs cut off by the event limit or absorbed without a single trait.
    pub unresolved: usize,
    pub mean_absorption_time: Option<f64>,
}

/// Seed of run `run`.
#[must_use]
pub fn run_seed(base_seed: u64, run: usize) -> u64 {
    base_seed.wrapping_add(run as u64)
}

/// Executes one independent run.
///
/// `factory` builds a fresh simulation from the run's generator, so the
/// initial configuration is part of the run's draw sequence.
pub fn fixation_run<F>(
    factory: &F,
    run: usize,
    base_seed: u64,
    max_events: u64,
) -> Result<FixationRecord>
where
    F: Fn(&mut ChaCha8Rng) -> Result<Simulation>,
{
    let seed = run_seed(base_seed, run);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut sim = factory(&mut rng)?;
    let state = sim.run(max_events, &mut rng)?;
    let fixed_trait = match state {
        ConvergenceState::Monomorphic { trait_index } => Some(trait_index),
        _ => None,
    };
    Ok(FixationRecord {
        run,
        seed,
        fixed_trait,
        time: sim.time(),
        events: sim.events(),
    })
}

/// Executes `runs` independent runs, in parallel when available.
pub fn fixation_runs<F>(
    factory: F,
    runs: usize,
    base_seed: u64,
    max_events: u64,
) -> Result<Vec<FixationRecord>>
where
    F: Fn(&mut ChaCha8Rng) -> Result<Simulation> + Sync,
{
    tracing::info!(runs, base_seed, max_events, "Starting fixation runs");
    #[cfg(feature = "parallel")]
    let records = (0..runs)
        .into_par_iter()
        .map(|run| fixation_run(&factory, run, base_seed, max_events))
        .collect::<Result<Vec<_>>>();
    #[cfg(not(feature = "parallel"))]
    let records = (0..runs)
        .map(|run| fixation_run(&factory, run, base_seed, max_events))
        .collect::<Result<Vec<_>>>();
    records
}

/// Summarises run records for a game with `n_traits` traits.
#[must_use]
pub fn summarize(records: &[FixationRecord], n_traits: usize) -> FixationStats {
    let runs = records.len();
    let mut times: Vec<Vec<f64>> = vec![Vec::new(); n_traits];
    let mut unresolved = 0;
    for record in records {
        match record.fixed_trait {
            Some(t) if t < n_traits => times[t].push(record.time),
            _ => unresolved += 1,
        }
    }
    let traits = times
        .iter()
        .map(|samples| {
            let count = samples.len();
            let (mean_time, time_variance) = moments(samples).unzip();
            TraitFixation {
                count,
                probability: if runs == 0 { 0.0 } else { count as f64 / runs as f64 },
                mean_time,
                time_variance,
            }
        })
        .collect();
    let all: Vec<f64> = records.iter().map(|r| r.time).collect();
    FixationStats {
        runs,
        traits,
        unresolved,
        mean_absorption_time: moments(&all).map(|(mean, _)| mean),
    }
}

fn moments(samples: &[f64]) -> Option<(f64, f64)> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
    Some((mean, variance))
}

/// Fixation probability of a single neutral mutant, `1 / N`.
#[must_use]
pub fn neutral_fixation_probability(size: usize) -> f64 {
    1.0 / size as f64
}

/// Fixation probability of a single mutant with relative fitness `r` under
/// the Moran process, `(1 - 1/r) / (1 - 1/r^N)`.
#[must_use]
pub fn moran_fixation_probability(r: f64, size: usize) -> f64 {
    if (r - 1.0).abs() < 1e-12 {
        return neutral_fixation_probability(size);
    }
    (1.0 - 1.0 / r) / (1.0 - r.powi(-(size as i32)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{ConstantSelection, Game};
    use crate::init::initial_traits;
    use crate::simulation::SimulationParams;
    use crate::topology::{Structure, Topology};
    use crate::update::UpdateRule;
    use ludus_data::{InitKind, PopulationUpdate, UpdateRuleKind};

    fn neutral_factory(rng: &mut ChaCha8Rng) -> Result<Simulation> {
        let game: Box<dyn Game> = Box::new(ConstantSelection::new(vec![1.0, 1.0])?);
        let topology = Topology::WellMixed { size: 10 };
        let traits = initial_traits(
            &InitKind::Mutant { resident: 0, mutant: 1 },
            game.descriptor(),
            &topology,
            rng,
        )?;
        let params = SimulationParams {
            update: UpdateRule::new(UpdateRuleKind::Thermal, 1.0, 0.0).0,
            population_update: PopulationUpdate::MoranBirthDeath,
            ..SimulationParams::default()
        };
        let structure = Structure::new(topology, None);
        Simulation::new("neutral", game, structure, params, &traits, rng)
    }

    #[test]
    fn test_runs_are_reproducible() {
        let a = fixation_runs(neutral_factory, 16, 99, 100_000).unwrap();
        let b = fixation_runs(neutral_factory, 16, 99, 100_000).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().enumerate().all(|(i, r)| r.run == i && r.seed == 99 + i as u64));
    }

    #[test]
    fn test_neutral_fixation_near_one_over_n() {
        let records = fixation_runs(neutral_factory, 2000, 7, 1_000_000).unwrap();
        let stats = summarize(&records, 2);
        assert_eq!(stats.unresolved, 0);
        let p = stats.traits[1].probability;
        assert!((p - 0.1).abs() < 0.03, "fixation probability {p}");
        assert!((stats.traits[0].probability + p - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_moran_formula() {
        assert!((moran_fixation_probability(1.0, 10) - 0.1).abs() < 1e-12);
        assert!(moran_fixation_probability(2.0, 10) > 0.49);
    }

    #[test]
    fn test_summarize_empty() {
        let stats = summarize(&[], 2);
        assert_eq!(stats.runs, 0);
        assert!(stats.mean_absorption_time.is_none());
        assert_eq!(stats.traits[0].probability, 0.0);
    }
}
