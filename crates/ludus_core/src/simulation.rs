//! Individual-based simulation of one population.
//!
//! # Draw order
//!
//! Every stochastic decision draws from the generator passed to
//! [`Simulation::step`], in this order:
//!
//! - **asynchronous update**: migration check (only if migration is active),
//!   then either the migration event or the focal agent, the reference
//!   partner, the adoption uniform (only if `0 < p < 1`), the mutation check
//!   (only if the mutation rate is positive) and the mutation kernel;
//! - **synchronous update**: the asynchronous sequence without migration for
//!   every agent in index order, against the frozen state;
//! - **Moran updates**: migration check, then `birth-death` draws one uniform
//!   for the parent and the offspring site, `death-birth` the dead site and
//!   one uniform for the parent, `imitate` the focal and one uniform for the
//!   model, each followed by the mutation check and kernel;
//! - **homogeneous demes**: the geometric waiting time, the migration versus
//!   mutation coin (only if both are possible), then the event itself;
//! - **sampled partners** (random partners, or group games whose
//!   neighbourhoods exceed one group): after every commit the rescored agents
//!   draw their partners, see [`crate::payoff`]. Construction and
//!   [`Simulation::reset`] draw them for every agent first.
//!
//! Identical seeds therefore give bit-identical trajectories.

use crate::convergence::ConvergenceMonitor;
use crate::error::{CoreError, Result};
use crate::fitness::FitnessMap;
use crate::game::Game;
use crate::metrics::RunMetrics;
use crate::migration::Migration;
use crate::mutation::Mutation;
use crate::payoff::PayoffEngine;
use crate::population::{Change, Population};
use crate::topology::{Structure, Topology};
use crate::update::{best_response, pick_weighted_by, UpdateRule};
use ludus_data::{
    Accounting, ConvergenceState, DemeCounts, Partners, PopulationSnapshot, PopulationUpdate,
    TraitFlip, TraitIndex, UpdateRuleKind,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Effective parameters of one population.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationParams {
    pub fitness: FitnessMap,
    pub update: UpdateRule,
    pub population_update: PopulationUpdate,
    pub mutation: Mutation,
    pub migration: Migration,
    pub accounting: Accounting,
    pub partners: Partners,
    /// Stop at the first monomorphic state.
    pub monostop: bool,
    /// Count updates that keep the current trait as commits.
    pub commit_noop: bool,
}

#[derive(Debug)]
pub struct Simulation {
    name: String,
    game: Box<dyn Game>,
    structure: Structure,
    population: Population,
    payoffs: PayoffEngine,
    params: SimulationParams,
    monitor: ConvergenceMonitor,
    active: Vec<TraitIndex>,
    fitness_span: f64,
    state: ConvergenceState,
    metrics: RunMetrics,
    flips: Option<Vec<TraitFlip>>,
    changes: Vec<Change>,
    weights: Vec<f64>,
    noop_agent: Option<usize>,
}

impl Simulation {
    /// Creates a simulation starting from `traits`. Only sampled partners
    /// draw from `rng`.
    pub fn new<R: Rng + ?Sized>(
        name: impl Into<String>,
        game: Box<dyn Game>,
        structure: Structure,
        params: SimulationParams,
        traits: &[TraitIndex],
        rng: &mut R,
    ) -> Result<Self> {
        let desc = game.descriptor().clone();
        if structure.reproduction().size() != structure.size() {
            return Err(CoreError::config(
                "interaction and reproduction topologies differ in size",
            ));
        }
        if params.update.kind == UpdateRuleKind::BestResponse
            && !desc.mean_field
            && !params.population_update.is_moran()
        {
            return Err(CoreError::unsupported(format!(
                "best-response needs a mean-field payoff, game '{}' has none",
                desc.name
            )));
        }
        if params.population_update == PopulationUpdate::Sync && params.migration.is_active() {
            return Err(CoreError::config(
                "migration requires asynchronous or Moran updates",
            ));
        }
        let mut population = Population::new(
            desc.n_traits(),
            structure.size(),
            desc.vacant,
            structure.demes(),
        )?;
        population.assign(traits)?;
        let payoffs = PayoffEngine::new(
            game.as_ref(),
            &structure.interaction,
            &population,
            params.accounting,
            params.partners,
            rng,
        )?;
        let monitor = ConvergenceMonitor::new(&params.mutation, &params.migration, params.monostop);
        let fitness_span = fitness_span(game.as_ref(), &payoffs, &structure.interaction, &params);
        let state = monitor.inspect(&population);
        tracing::debug!(
            game = %desc.name,
            agents = structure.size(),
            update = %params.update.kind,
            population_update = %params.population_update,
            state = %state,
            "Simulation created"
        );
        Ok(Self {
            name: name.into(),
            active: desc.active_traits(),
            game,
            structure,
            population,
            payoffs,
            params,
            monitor,
            fitness_span,
            state,
            metrics: RunMetrics::new(),
            flips: None,
            changes: Vec::new(),
            weights: Vec::new(),
            noop_agent: None,
        })
    }

    /// Starts over from `traits`, keeping game, topology and parameters.
    pub fn reset<R: Rng + ?Sized>(&mut self, traits: &[TraitIndex], rng: &mut R) -> Result<()> {
        self.population.assign(traits)?;
        self.payoffs.reset(
            self.game.as_ref(),
            &self.structure.interaction,
            &self.population,
            rng,
        )?;
        self.state = self.monitor.inspect(&self.population);
        self.metrics = RunMetrics::new();
        if let Some(flips) = self.flips.as_mut() {
            flips.clear();
        }
        Ok(())
    }

    /// Keeps a log of every committed trait change from now on.
    pub fn record_flips(&mut self, enabled: bool) {
        self.flips = enabled.then(Vec::new);
    }

    #[must_use]
    pub fn flips(&self) -> Option<&[TraitFlip]> {
        self.flips.as_deref()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn game(&self) -> &dyn Game {
        self.game.as_ref()
    }

    #[must_use]
    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    #[must_use]
    pub fn population(&self) -> &Population {
        &self.population
    }

    #[must_use]
    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    #[must_use]
    pub fn state(&self) -> ConvergenceState {
        self.state
    }

    #[must_use]
    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn events(&self) -> u64 {
        self.metrics.events
    }

    /// Simulated time in generations of `N` events.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.metrics.events as f64 / self.population.size() as f64
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.monitor.is_terminal(&self.state)
    }

    #[must_use]
    pub fn trait_of(&self, agent: usize) -> TraitIndex {
        self.population.trait_of(agent)
    }

    #[must_use]
    pub fn trait_counts(&self) -> &[usize] {
        self.population.trait_counts()
    }

    #[must_use]
    pub fn deme_counts(&self) -> Option<DemeCounts> {
        self.population.deme_counts()
    }

    /// Payoff of `agent`; `NaN` for vacant sites.
    #[must_use]
    pub fn score_of(&self, agent: usize) -> f64 {
        self.payoffs.score(&self.population, agent)
    }

    /// Fitness of `agent`; `NaN` for vacant sites.
    #[must_use]
    pub fn fitness_of(&self, agent: usize) -> f64 {
        self.params.fitness.map(self.score_of(agent))
    }

    /// Re-verifies the count invariants.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.population.check_invariants().is_ok()
    }

    #[must_use]
    pub fn snapshot(&self) -> PopulationSnapshot {
        PopulationSnapshot {
            time: self.time(),
            events: self.events(),
            state: self.state,
            traits: self.population.traits().to_vec(),
            fitness: (0..self.population.size())
                .map(|a| self.fitness_of(a))
                .collect(),
            trait_counts: self.population.trait_counts().to_vec(),
            deme_counts: self.population.deme_counts(),
        }
    }

    /// Advances by one event (one generation for synchronous updates) and
    /// returns the state after the commit. Terminal states are returned
    /// without drawing.
    pub fn step<R: Rng>(&mut self, rng: &mut R) -> Result<ConvergenceState> {
        if self.is_finished() {
            return Ok(self.state);
        }
        if self.state == ConvergenceState::HomogeneousDemes {
            return self.rare_event(rng);
        }
        match self.params.population_update {
            PopulationUpdate::Async => {
                self.metrics.record_events(1, self.time());
                if !self.try_migration(rng)? {
                    let focal = rng.gen_range(0..self.population.size());
                    self.propose_update(focal, rng)?;
                }
            }
            PopulationUpdate::Sync => {
                let n = self.population.size();
                self.metrics.record_events(n as u64, self.time());
                for focal in 0..n {
                    self.propose_update(focal, rng)?;
                }
            }
            PopulationUpdate::MoranBirthDeath
            | PopulationUpdate::MoranDeathBirth
            | PopulationUpdate::MoranImitate => {
                self.metrics.record_events(1, self.time());
                if !self.try_migration(rng)? {
                    self.propose_moran(rng)?;
                }
            }
        }
        self.finish_event(rng)
    }

    /// Steps until the run finishes or `max_events` elapse.
    pub fn run<R: Rng>(&mut self, max_events: u64, rng: &mut R) -> Result<ConvergenceState> {
        while !self.is_finished() && self.events() < max_events {
            self.step(rng)?;
        }
        Ok(self.state)
    }

    /// Draws the migration check and proposes a migration if it succeeds.
    fn try_migration<R: Rng>(&mut self, rng: &mut R) -> Result<bool> {
        if !self.params.migration.is_active() || rng.gen::<f64>() >= self.params.migration.rate {
            return Ok(false);
        }
        self.migrate(rng)?;
        Ok(true)
    }

    fn migrate<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        self.fill_weights();
        let weights = &self.weights;
        self.params
            .migration
            .propose(&mut self.population, |a| weights[a], rng)?;
        self.metrics.migrations += 1;
        Ok(())
    }

    /// Fitness of every agent into the scratch buffer.
    fn fill_weights(&mut self) {
        let mut weights = std::mem::take(&mut self.weights);
        weights.clear();
        weights.extend((0..self.population.size()).map(|a| self.fitness_of(a)));
        self.weights = weights;
    }

    /// Proposes the revised trait of `focal` against the current state.
    fn propose_update<R: Rng>(&mut self, focal: usize, rng: &mut R) -> Result<()> {
        let current = self.population.trait_of(focal);
        let mut next = current;
        if self.params.update.kind == UpdateRuleKind::BestResponse {
            if !self.population.is_vacant(focal) {
                let counts = self.environment_counts(focal);
                let best = best_response(self.game.as_ref(), &counts, current)?;
                if best != current {
                    let p = self.params.update.clamp_error(1.0);
                    if UpdateRule::adopts(p, rng) {
                        next = best;
                    }
                }
            }
        } else if let Some(reference) = self.structure.reproduction().random_neighbour(focal, rng) {
            let p = self.params.update.adoption_probability(
                self.fitness_of(focal),
                self.fitness_of(reference),
                self.fitness_span,
            );
            if UpdateRule::adopts(p, rng) {
                next = self.population.trait_of(reference);
            }
        }
        next = self.mutate(next, rng);
        self.offer(focal, current, next)
    }

    fn propose_moran<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        let n = self.population.size();
        let (site, model) = match self.params.population_update {
            PopulationUpdate::MoranBirthDeath => {
                self.fill_weights();
                let weights = &self.weights;
                let u = rng.gen::<f64>();
                let parent = pick_weighted_by(0..n, |a| weights[a], u)
                    .ok_or_else(|| CoreError::invariant("empty population"))?;
                match self.structure.reproduction().random_neighbour(parent, rng) {
                    Some(site) => (site, parent),
                    None => (parent, parent),
                }
            }
            PopulationUpdate::MoranDeathBirth => {
                let dead = rng.gen_range(0..n);
                let neighbours = self.structure.reproduction().neighbours(dead);
                let u = rng.gen::<f64>();
                let parent =
                    pick_weighted_by(neighbours, |a| self.fitness_of(a), u).unwrap_or(dead);
                (dead, parent)
            }
            _ => {
                let focal = rng.gen_range(0..n);
                let candidates =
                    std::iter::once(focal).chain(self.structure.reproduction().neighbours(focal));
                let u = rng.gen::<f64>();
                let model =
                    pick_weighted_by(candidates, |a| self.fitness_of(a), u).unwrap_or(focal);
                (focal, model)
            }
        };
        let current = self.population.trait_of(site);
        let next = self.mutate(self.population.trait_of(model), rng);
        self.offer(site, current, next)
    }

    /// Counts of the focal's interaction environment, focal included.
    fn environment_counts(&self, focal: usize) -> Vec<usize> {
        match &self.structure.interaction {
            Topology::WellMixed { .. } => self.population.trait_counts().to_vec(),
            Topology::Demes(layout) => self
                .population
                .deme_counts_of(layout.deme_of(focal))
                .to_vec(),
            Topology::Graph(graph) => {
                let mut counts = vec![0; self.population.n_traits()];
                counts[self.population.trait_of(focal)] += 1;
                for &j in graph.neighbours(focal) {
                    counts[self.population.trait_of(j)] += 1;
                }
                counts
            }
        }
    }

    /// Applies the mutation check and kernel. Vacant traits never mutate
    /// but still consume the check.
    fn mutate<R: Rng>(&mut self, proposal: TraitIndex, rng: &mut R) -> TraitIndex {
        if !self.params.mutation.occurs(rng) {
            return proposal;
        }
        if Some(proposal) == self.population.vacant() {
            return proposal;
        }
        self.metrics.mutations += 1;
        self.params.mutation.mutate(proposal, &self.active, rng)
    }

    fn offer(&mut self, agent: usize, current: TraitIndex, next: TraitIndex) -> Result<()> {
        if next != current {
            self.population.propose(agent, next)
        } else {
            if self.params.commit_noop {
                self.noop_agent = Some(agent);
            }
            Ok(())
        }
    }

    /// Skips the unproductive events of a homogeneous-demes state and
    /// executes the next migration or mutation.
    fn rare_event<R: Rng>(&mut self, rng: &mut R) -> Result<ConvergenceState> {
        let wait = self.monitor.rare_event_wait(rng);
        self.metrics.skipped_events += wait;
        self.metrics.record_events(wait + 1, self.time());
        if self.monitor.rare_event_is_migration(rng) {
            self.migrate(rng)?;
        } else {
            let agent = rng.gen_range(0..self.population.size());
            let current = self.population.trait_of(agent);
            let next = if Some(current) == self.population.vacant() {
                current
            } else {
                self.metrics.mutations += 1;
                self.params.mutation.mutate(current, &self.active, rng)
            };
            if next != current {
                self.population.propose(agent, next)?;
            }
        }
        tracing::debug!(
            skipped = wait,
            events = self.metrics.events,
            "Rare event after homogeneous demes"
        );
        self.finish_event(rng)
    }

    /// Commits pending proposals, refreshes payoffs and re-inspects.
    fn finish_event<R: Rng>(&mut self, rng: &mut R) -> Result<ConvergenceState> {
        self.changes.clear();
        self.population.commit(&mut self.changes)?;
        let noop = self.noop_agent.take();
        if !self.changes.is_empty() {
            self.payoffs.refresh(
                self.game.as_ref(),
                &self.structure.interaction,
                &self.population,
                &self.changes,
                rng,
            )?;
            self.metrics.record_commit(self.changes.len());
        } else if noop.is_some() {
            self.metrics.record_commit(0);
        }
        if let Some(flips) = self.flips.as_mut() {
            let event = self.metrics.events;
            flips.extend(self.changes.iter().map(|c| TraitFlip {
                event,
                agent: c.agent,
                from: c.from,
                to: c.to,
            }));
            if self.changes.is_empty() {
                if let Some(agent) = noop {
                    let t = self.population.trait_of(agent);
                    flips.push(TraitFlip {
                        event,
                        agent,
                        from: t,
                        to: t,
                    });
                }
            }
        }
        let state = self.monitor.inspect(&self.population);
        if state != self.state {
            tracing::info!(
                population = %self.name,
                from = %self.state,
                to = %state,
                events = self.metrics.events,
                "Convergence state changed"
            );
        }
        self.state = state;
        Ok(state)
    }
}

/// Range of attainable fitness used to scale the imitation rules.
fn fitness_span(
    game: &dyn Game,
    payoffs: &PayoffEngine,
    interaction: &Topology,
    params: &SimulationParams,
) -> f64 {
    let scale = payoffs.encounters(game, interaction);
    let map = &params.fitness;
    map.map(game.max_payoff() * scale) - map.map(game.min_payoff() * scale)
}
