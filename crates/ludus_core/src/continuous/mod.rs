//! Continuous-trait populations.
//!
//! Agents carry real-valued trait vectors bounded component-wise. The
//! engine reuses the topology, fitness map, update rule probabilities and
//! continuous mutation kernels of the discrete engine. Only asynchronous
//! pairwise updates are supported.
//!
//! Draw order per event: focal agent, reference partner, adoption uniform
//! (only if `0 < p < 1`), mutation check (only if the rate is positive),
//! then one or more kernel samples per trait component.

mod snowdrift;

pub use snowdrift::ContinuousSnowdrift;

use crate::error::{CoreError, Result};
use crate::fitness::FitnessMap;
use crate::metrics::RunMetrics;
use crate::mutation::ContinuousMutation;
use crate::topology::Topology;
use crate::update::UpdateRule;
use ludus_data::Accounting;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pairwise game over real-valued traits.
pub trait ContinuousGame: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Component bounds `(min, max)`; the dimension is their number.
    fn bounds(&self) -> &[(f64, f64)];

    /// Payoff of `focal` in one encounter with `opponent`.
    fn payoff(&self, focal: &[f64], opponent: &[f64]) -> f64;

    fn min_payoff(&self) -> f64;

    fn max_payoff(&self) -> f64;

    fn dimension(&self) -> usize {
        self.bounds().len()
    }
}

/// Mean and variance of each trait component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitMoments {
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ContinuousParams {
    pub fitness: FitnessMap,
    pub update: UpdateRule,
    pub mutation: ContinuousMutation,
    pub accounting: Accounting,
}

#[derive(Debug)]
pub struct ContinuousSimulation {
    game: Box<dyn ContinuousGame>,
    topology: Topology,
    params: ContinuousParams,
    dimension: usize,
    /// `[agent][component]`, row-major.
    traits: Vec<f64>,
    /// Accumulated payoff per agent.
    scores: Vec<f64>,
    proposal: Vec<f64>,
    fitness_span: f64,
    metrics: RunMetrics,
}

impl ContinuousSimulation {
    /// Creates a population from row-major `traits` (`N x dimension`).
    pub fn new(
        game: Box<dyn ContinuousGame>,
        topology: Topology,
        params: ContinuousParams,
        traits: Vec<f64>,
    ) -> Result<Self> {
        let dimension = game.dimension();
        let size = topology.size();
        if dimension == 0 || traits.len() != size * dimension {
            return Err(CoreError::config(format!(
                "{} trait values for {size} agents of dimension {dimension}",
                traits.len()
            )));
        }
        let bounds = game.bounds();
        for (i, x) in traits.iter().enumerate() {
            let (lo, hi) = bounds[i % dimension];
            if !(lo..=hi).contains(x) {
                return Err(CoreError::config(format!(
                    "initial trait {x} of agent {} outside [{lo}, {hi}]",
                    i / dimension
                )));
            }
        }
        let scale = match params.accounting {
            Accounting::Averaged => 1.0,
            Accounting::Accumulated => {
                (0..size).map(|a| topology.degree(a)).max().unwrap_or(0) as f64
            }
        };
        let fitness_span = params.fitness.map(game.max_payoff() * scale)
            - params.fitness.map(game.min_payoff() * scale);
        let mut sim = Self {
            game,
            topology,
            params,
            dimension,
            traits,
            scores: vec![0.0; size],
            proposal: vec![0.0; dimension],
            fitness_span,
            metrics: RunMetrics::new(),
        };
        for agent in 0..size {
            sim.scores[agent] = sim.accumulate(agent);
        }
        Ok(sim)
    }

    /// Every agent at `value`.
    pub fn uniform_start(
        game: Box<dyn ContinuousGame>,
        topology: Topology,
        params: ContinuousParams,
        value: &[f64],
    ) -> Result<Self> {
        let size = topology.size();
        let traits = value.iter().copied().cycle().take(size * value.len()).collect();
        Self::new(game, topology, params, traits)
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.scores.len()
    }

    #[must_use]
    pub fn trait_of(&self, agent: usize) -> &[f64] {
        &self.traits[agent * self.dimension..(agent + 1) * self.dimension]
    }

    #[must_use]
    pub fn score_of(&self, agent: usize) -> f64 {
        match self.params.accounting {
            Accounting::Accumulated => self.scores[agent],
            Accounting::Averaged => {
                let k = self.topology.degree(agent);
                if k == 0 {
                    0.0
                } else {
                    self.scores[agent] / k as f64
                }
            }
        }
    }

    #[must_use]
    pub fn fitness_of(&self, agent: usize) -> f64 {
        self.params.fitness.map(self.score_of(agent))
    }

    #[must_use]
    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn time(&self) -> f64 {
        self.metrics.events as f64 / self.size() as f64
    }

    /// One asynchronous update.
    pub fn step<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        self.metrics.record_events(1, self.time());
        let focal = rng.gen_range(0..self.size());
        let mut proposal = std::mem::take(&mut self.proposal);
        proposal.copy_from_slice(self.trait_of(focal));
        if let Some(reference) = self.topology.random_neighbour(focal, rng) {
            let p = self.params.update.adoption_probability(
                self.fitness_of(focal),
                self.fitness_of(reference),
                self.fitness_span,
            );
            if UpdateRule::adopts(p, rng) {
                proposal.copy_from_slice(self.trait_of(reference));
            }
        }
        if self.params.mutation.occurs(rng) {
            self.params
                .mutation
                .mutate(&mut proposal, self.game.bounds(), rng);
            self.metrics.mutations += 1;
        }
        let changed = proposal.as_slice() != self.trait_of(focal);
        if changed {
            self.commit(focal, &proposal);
        }
        self.proposal = proposal;
        Ok(())
    }

    pub fn run<R: Rng>(&mut self, events: u64, rng: &mut R) -> Result<()> {
        for _ in 0..events {
            self.step(rng)?;
        }
        Ok(())
    }

    /// Installs `value` as the trait of `agent` and updates the scores of
    /// the agent and its neighbours.
    fn commit(&mut self, agent: usize, value: &[f64]) {
        let old: Vec<f64> = self.trait_of(agent).to_vec();
        let d = self.dimension;
        self.traits[agent * d..(agent + 1) * d].copy_from_slice(value);
        let neighbours: Vec<usize> = self.topology.neighbours(agent).collect();
        for j in neighbours {
            let xj = self.trait_of(j);
            let delta = self.game.payoff(xj, value) - self.game.payoff(xj, &old);
            self.scores[j] += delta;
        }
        self.scores[agent] = self.accumulate(agent);
        self.metrics.record_commit(1);
    }

    fn accumulate(&self, agent: usize) -> f64 {
        let x = self.trait_of(agent);
        self.topology
            .neighbours(agent)
            .map(|j| self.game.payoff(x, self.trait_of(j)))
            .sum()
    }

    #[must_use]
    pub fn moments(&self) -> TraitMoments {
        let n = self.size() as f64;
        let mut mean = vec![0.0; self.dimension];
        for agent in 0..self.size() {
            for (m, x) in mean.iter_mut().zip(self.trait_of(agent)) {
                *m += x / n;
            }
        }
        let mut variance = vec![0.0; self.dimension];
        for agent in 0..self.size() {
            for ((v, m), x) in variance.iter_mut().zip(&mean).zip(self.trait_of(agent)) {
                *v += (x - m) * (x - m) / n;
            }
        }
        TraitMoments { mean, variance }
    }

    /// Values of component `component` for every agent.
    #[must_use]
    pub fn component(&self, component: usize) -> Vec<f64> {
        self.traits
            .iter()
            .skip(component)
            .step_by(self.dimension)
            .copied()
            .collect()
    }

    #[must_use]
    pub fn game(&self) -> &dyn ContinuousGame {
        self.game.as_ref()
    }
}
