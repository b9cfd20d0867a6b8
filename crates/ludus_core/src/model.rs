//! A model steps one or more species with a single generator.
//!
//! Species take turns, one [`Simulation::step`] each, so the draw sequence
//! of the whole model depends only on the seed. Species do not interact.

use crate::config::ModelConfig;
use crate::error::Result;
use crate::simulation::Simulation;
use ludus_data::PopulationSnapshot;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const PAUSE_POLL: Duration = Duration::from_millis(10);

/// Cooperative pause and cancel flags, checked between events only.
///
/// Clones share the flags, so a handle can be passed to another thread or a
/// signal handler while the model runs.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    paused: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl RunControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        tracing::info!("Pause requested");
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        tracing::info!("Cancel requested");
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every species reached a terminal convergence state.
    Finished,
    /// At least one species stopped at its event limit.
    EventLimit,
    Cancelled,
}

#[derive(Debug)]
pub struct Model {
    species: Vec<Simulation>,
    limits: Vec<u64>,
    rng: ChaCha8Rng,
    next: usize,
    steps: u64,
}

impl Model {
    /// Builds every species from an already sanitised configuration.
    /// Construction draws from the model generator in species order.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(config.run.seed);
        let mut species = Vec::with_capacity(config.species.len());
        let mut limits = Vec::with_capacity(config.species.len());
        for spec in &config.species {
            let mut sim = spec.build(&mut rng)?;
            sim.record_flips(config.run.record_flips);
            limits.push(config.run.event_limit(sim.population().size()));
            species.push(sim);
        }
        tracing::info!(
            species = species.len(),
            seed = config.run.seed,
            "Model initialized"
        );
        Ok(Self::with_species(species, limits, rng))
    }

    /// Assembles a model from prebuilt simulations.
    #[must_use]
    pub fn with_species(species: Vec<Simulation>, limits: Vec<u64>, rng: ChaCha8Rng) -> Self {
        Self {
            species,
            limits,
            rng,
            next: 0,
            steps: 0,
        }
    }

    #[must_use]
    pub fn species(&self) -> &[Simulation] {
        &self.species
    }

    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn is_active(&self, index: usize) -> bool {
        let sim = &self.species[index];
        !sim.is_finished() && sim.events() < self.limits.get(index).copied().unwrap_or(u64::MAX)
    }

    /// Steps the next active species. Returns `false` once none is left.
    pub fn step(&mut self) -> Result<bool> {
        let n = self.species.len();
        for offset in 0..n {
            let index = (self.next + offset) % n;
            if self.is_active(index) {
                self.species[index].step(&mut self.rng)?;
                self.next = (index + 1) % n;
                self.steps += 1;
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn run(&mut self, control: &RunControl) -> Result<StopReason> {
        self.run_observed(control, 0, |_| {})
    }

    /// Runs until every species stops, calling `observe` every `interval`
    /// model steps (never if zero) and once at the end.
    pub fn run_observed<F>(
        &mut self,
        control: &RunControl,
        interval: u64,
        mut observe: F,
    ) -> Result<StopReason>
    where
        F: FnMut(&Model),
    {
        loop {
            while control.is_paused() && !control.is_cancelled() {
                std::thread::sleep(PAUSE_POLL);
            }
            if control.is_cancelled() {
                observe(self);
                return Ok(StopReason::Cancelled);
            }
            if !self.step()? {
                break;
            }
            if interval > 0 && self.steps % interval == 0 {
                observe(self);
            }
        }
        observe(self);
        if self.species.iter().all(Simulation::is_finished) {
            Ok(StopReason::Finished)
        } else {
            Ok(StopReason::EventLimit)
        }
    }

    #[must_use]
    pub fn snapshots(&self) -> Vec<PopulationSnapshot> {
        self.species.iter().map(Simulation::snapshot).collect()
    }
}
