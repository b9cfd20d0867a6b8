//! Payoff engine: turns the population state into per-agent scores.
//!
//! Scores are stored at the coarsest resolution the topology allows:
//! per trait for well-mixed populations, per deme and trait for demes, and
//! per agent for explicit graphs. After each commit only the scores that
//! can have changed are recomputed, always from scratch, so that equal
//! situations produce bit-identical scores.
//!
//! On graphs an agent meets either every neighbour or, with
//! [`Partners::Random`], one random neighbour per scoring. Group games play
//! the groups centred on the agent and on each neighbour while a whole
//! neighbourhood fits into one group; larger neighbourhoods, and random
//! partners, play one group of the agent and `group_size - 1` neighbours
//! sampled without replacement. Sampled partners are drawn whenever an
//! agent is rescored: for every agent in index order on reset, then for
//! each changed agent and its neighbours, in commit order, after every
//! commit.

use crate::error::{CoreError, Result};
use crate::game::{Game, PayoffKind};
use crate::population::{Change, Population};
use crate::topology::{Graph, Topology};
use ludus_data::{Accounting, Partners};
use rand::seq::index;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScoreMode {
    /// Fixed payoff per trait.
    Static,
    /// Per trait, focal excluded from its own environment.
    WellMixed,
    /// Per deme and trait.
    Demes,
    /// Per agent, one encounter with every neighbour.
    GraphPairwise,
    /// Per agent, one encounter with a random neighbour.
    GraphRandomPair,
    /// Per agent, groups centred on the agent and on each neighbour.
    GraphGroup,
    /// Per agent, one group with sampled neighbours.
    GraphSampledGroup,
}

#[derive(Debug, Clone)]
pub struct PayoffEngine {
    accounting: Accounting,
    mode: ScoreMode,
    scores: Vec<f64>,
    /// Cached group payoffs per centre, `[centre][trait]` (group mode only).
    group_payoffs: Vec<f64>,
    counts: Vec<usize>,
    densities: Vec<f64>,
    trait_scores: Vec<f64>,
    marks: Vec<bool>,
    dirty: Vec<usize>,
    affected: Vec<usize>,
}

impl PayoffEngine {
    /// Chooses the scoring path for `game` on `topology` and computes all scores.
    pub fn new<R: Rng + ?Sized>(
        game: &dyn Game,
        topology: &Topology,
        population: &Population,
        accounting: Accounting,
        partners: Partners,
        rng: &mut R,
    ) -> Result<Self> {
        let desc = game.descriptor();
        let mode = if desc.payoffs == PayoffKind::Static {
            if game.static_scores().is_none() {
                return Err(CoreError::unsupported(format!(
                    "game '{}' declares static payoffs but provides none",
                    desc.name
                )));
            }
            ScoreMode::Static
        } else {
            match topology {
                Topology::WellMixed { .. } | Topology::Demes(_) => {
                    if !desc.mean_field && !desc.is_pairwise() {
                        return Err(CoreError::unsupported(format!(
                            "group game '{}' needs mean-field scores on well-mixed populations",
                            desc.name
                        )));
                    }
                    if topology.is_well_mixed() {
                        ScoreMode::WellMixed
                    } else {
                        ScoreMode::Demes
                    }
                }
                Topology::Graph(graph) => match (desc.is_pairwise(), partners) {
                    (true, Partners::All) => ScoreMode::GraphPairwise,
                    (true, Partners::Random) => ScoreMode::GraphRandomPair,
                    (false, Partners::All) if max_degree(graph) < desc.group_size() => {
                        ScoreMode::GraphGroup
                    }
                    (false, _) => ScoreMode::GraphSampledGroup,
                },
            }
        };
        let n_traits = desc.n_traits();
        let size = population.size();
        let score_len = match mode {
            ScoreMode::Static | ScoreMode::WellMixed => n_traits,
            ScoreMode::Demes => topology.demes().map_or(0, |d| d.count) * n_traits,
            ScoreMode::GraphPairwise
            | ScoreMode::GraphRandomPair
            | ScoreMode::GraphGroup
            | ScoreMode::GraphSampledGroup => size,
        };
        let mut engine = Self {
            accounting,
            mode,
            scores: vec![0.0; score_len],
            group_payoffs: if mode == ScoreMode::GraphGroup {
                vec![0.0; size * n_traits]
            } else {
                Vec::new()
            },
            counts: vec![0; n_traits],
            densities: vec![0.0; n_traits],
            trait_scores: vec![0.0; n_traits],
            marks: vec![false; size],
            dirty: Vec::new(),
            affected: Vec::new(),
        };
        engine.reset(game, topology, population, rng)?;
        Ok(engine)
    }

    /// Recomputes every score from the current state.
    pub fn reset<R: Rng + ?Sized>(
        &mut self,
        game: &dyn Game,
        topology: &Topology,
        population: &Population,
        rng: &mut R,
    ) -> Result<()> {
        match (self.mode, topology) {
            (ScoreMode::Static, _) => {
                if let Some(fixed) = game.static_scores() {
                    self.scores.copy_from_slice(fixed);
                }
                Ok(())
            }
            (ScoreMode::WellMixed, _) => self.score_well_mixed(game, population),
            (ScoreMode::Demes, Topology::Demes(layout)) => {
                for deme in 0..layout.count {
                    self.score_deme(game, population, deme, layout.size)?;
                }
                Ok(())
            }
            (ScoreMode::GraphPairwise, Topology::Graph(graph)) => {
                for agent in 0..population.size() {
                    self.scores[agent] = self.pairwise_score(game, graph, population, agent)?;
                }
                Ok(())
            }
            (ScoreMode::GraphGroup, Topology::Graph(graph)) => {
                for centre in 0..population.size() {
                    self.group_at(game, graph, population, centre)?;
                }
                for agent in 0..population.size() {
                    self.scores[agent] = self.collect_group_score(graph, population, agent);
                }
                Ok(())
            }
            (ScoreMode::GraphRandomPair | ScoreMode::GraphSampledGroup, Topology::Graph(graph)) => {
                for agent in 0..population.size() {
                    self.scores[agent] = self.sampled_score(game, graph, population, agent, rng)?;
                }
                Ok(())
            }
            _ => Err(CoreError::invariant(
                "payoff engine used with a different topology than it was built for",
            )),
        }
    }

    /// Updates the scores affected by `changes`, which must already be
    /// committed to `population`.
    pub fn refresh<R: Rng + ?Sized>(
        &mut self,
        game: &dyn Game,
        topology: &Topology,
        population: &Population,
        changes: &[Change],
        rng: &mut R,
    ) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        match (self.mode, topology) {
            (ScoreMode::Static, _) => Ok(()),
            (ScoreMode::WellMixed, _) => self.score_well_mixed(game, population),
            (ScoreMode::Demes, Topology::Demes(layout)) => {
                self.dirty.clear();
                for change in changes {
                    let deme = layout.deme_of(change.agent);
                    if !self.dirty.contains(&deme) {
                        self.dirty.push(deme);
                    }
                }
                let dirty = std::mem::take(&mut self.dirty);
                for &deme in &dirty {
                    self.score_deme(game, population, deme, layout.size)?;
                }
                self.dirty = dirty;
                Ok(())
            }
            (ScoreMode::GraphPairwise, Topology::Graph(graph)) => {
                self.mark_neighbourhoods(graph, changes.iter().map(|c| c.agent));
                let affected = std::mem::take(&mut self.affected);
                for &agent in &affected {
                    self.scores[agent] = self.pairwise_score(game, graph, population, agent)?;
                }
                self.affected = affected;
                Ok(())
            }
            (ScoreMode::GraphGroup, Topology::Graph(graph)) => {
                // groups containing a changed agent
                self.mark_neighbourhoods(graph, changes.iter().map(|c| c.agent));
                let centres = std::mem::take(&mut self.affected);
                for &centre in &centres {
                    self.group_at(game, graph, population, centre)?;
                }
                // members of those groups
                self.mark_neighbourhoods(graph, centres.iter().copied());
                let members = std::mem::take(&mut self.affected);
                for &agent in &members {
                    self.scores[agent] = self.collect_group_score(graph, population, agent);
                }
                self.affected = members;
                Ok(())
            }
            (ScoreMode::GraphRandomPair | ScoreMode::GraphSampledGroup, Topology::Graph(graph)) => {
                self.mark_neighbourhoods(graph, changes.iter().map(|c| c.agent));
                let affected = std::mem::take(&mut self.affected);
                for &agent in &affected {
                    self.scores[agent] = self.sampled_score(game, graph, population, agent, rng)?;
                }
                self.affected = affected;
                Ok(())
            }
            _ => Err(CoreError::invariant(
                "payoff engine used with a different topology than it was built for",
            )),
        }
    }

    /// Score of `agent`; `NaN` for vacant sites.
    #[must_use]
    pub fn score(&self, population: &Population, agent: usize) -> f64 {
        let t = population.trait_of(agent);
        if Some(t) == population.vacant() {
            return f64::NAN;
        }
        match self.mode {
            ScoreMode::Static | ScoreMode::WellMixed => self.scores[t],
            ScoreMode::Demes => {
                let deme = population.demes().map_or(0, |d| d.deme_of(agent));
                self.scores[deme * population.n_traits() + t]
            }
            ScoreMode::GraphPairwise
            | ScoreMode::GraphRandomPair
            | ScoreMode::GraphGroup
            | ScoreMode::GraphSampledGroup => self.scores[agent],
        }
    }

    #[must_use]
    pub fn accounting(&self) -> Accounting {
        self.accounting
    }

    /// Largest number of single-encounter payoffs summed into one score.
    #[must_use]
    pub fn encounters(&self, game: &dyn Game, topology: &Topology) -> f64 {
        if self.accounting == Accounting::Averaged {
            return 1.0;
        }
        let pairwise = game.descriptor().is_pairwise();
        match (self.mode, topology) {
            (ScoreMode::WellMixed, Topology::WellMixed { size }) if pairwise => {
                size.saturating_sub(1) as f64
            }
            (ScoreMode::Demes, Topology::Demes(layout)) if pairwise => {
                layout.size.saturating_sub(1) as f64
            }
            (ScoreMode::GraphPairwise, Topology::Graph(graph)) => max_degree(graph) as f64,
            (ScoreMode::GraphGroup, Topology::Graph(graph)) => (max_degree(graph) + 1) as f64,
            _ => 1.0,
        }
    }

    /// Collects `seeds` and their neighbours into `self.affected`, without
    /// duplicates.
    fn mark_neighbourhoods<I: Iterator<Item = usize>>(&mut self, graph: &Graph, seeds: I) {
        self.affected.clear();
        for seed in seeds {
            for agent in std::iter::once(seed).chain(graph.neighbours(seed).iter().copied()) {
                if !self.marks[agent] {
                    self.marks[agent] = true;
                    self.affected.push(agent);
                }
            }
        }
        for &agent in &self.affected {
            self.marks[agent] = false;
        }
    }

    fn score_well_mixed(&mut self, game: &dyn Game, population: &Population) -> Result<()> {
        let n = population.n_traits();
        let counts = population.trait_counts().to_vec();
        let mut out = std::mem::take(&mut self.scores);
        let result = self.mixed_scores(game, &counts, population.size(), &mut out[..n]);
        self.scores = out;
        result
    }

    fn score_deme(
        &mut self,
        game: &dyn Game,
        population: &Population,
        deme: usize,
        deme_size: usize,
    ) -> Result<()> {
        let n = population.n_traits();
        let counts = population.deme_counts_of(deme).to_vec();
        let mut out = std::mem::take(&mut self.scores);
        let result = self.mixed_scores(
            game,
            &counts,
            deme_size,
            &mut out[deme * n..(deme + 1) * n],
        );
        self.scores = out;
        result
    }

    /// Per-trait scores in a well-mixed group of `members` with trait
    /// `counts`. Each focal's own trait is removed from its environment
    /// (`count[own] - 1` over `members - 1`). Absent and vacant traits get `NaN`.
    fn mixed_scores(
        &mut self,
        game: &dyn Game,
        counts: &[usize],
        members: usize,
        out: &mut [f64],
    ) -> Result<()> {
        let desc = game.descriptor();
        let others = members.saturating_sub(1);
        for t in 0..counts.len() {
            if counts[t] == 0 || !desc.is_active(t) {
                out[t] = f64::NAN;
                continue;
            }
            if others == 0 {
                out[t] = 0.0;
                continue;
            }
            if desc.mean_field {
                for (s, density) in self.densities.iter_mut().enumerate() {
                    let c = if s == t { counts[s] - 1 } else { counts[s] };
                    *density = c as f64 / others as f64;
                }
                game.mean_field_scores(&self.densities, desc.group_size(), &mut self.trait_scores)?;
                let average = self.trait_scores[t];
                out[t] = match (self.accounting, desc.is_pairwise()) {
                    (Accounting::Accumulated, true) => average * others as f64,
                    _ => average,
                };
            } else {
                self.counts.copy_from_slice(counts);
                self.counts[t] -= 1;
                let own = game.pair_scores(t, &self.counts, &mut self.trait_scores)?;
                out[t] = match self.accounting {
                    Accounting::Accumulated => own,
                    Accounting::Averaged => own / others as f64,
                };
            }
        }
        Ok(())
    }

    fn pairwise_score(
        &mut self,
        game: &dyn Game,
        graph: &Graph,
        population: &Population,
        agent: usize,
    ) -> Result<f64> {
        if population.is_vacant(agent) {
            return Ok(f64::NAN);
        }
        self.counts.fill(0);
        for &j in graph.neighbours(agent) {
            self.counts[population.trait_of(j)] += 1;
        }
        let own = game.pair_scores(
            population.trait_of(agent),
            &self.counts,
            &mut self.trait_scores,
        )?;
        Ok(match self.accounting {
            Accounting::Accumulated => own,
            Accounting::Averaged => {
                let vacant = population.vacant().map_or(0, |v| self.counts[v]);
                let partners = graph.degree(agent) - vacant;
                if partners == 0 {
                    0.0
                } else {
                    own / partners as f64
                }
            }
        })
    }

    fn group_at(
        &mut self,
        game: &dyn Game,
        graph: &Graph,
        population: &Population,
        centre: usize,
    ) -> Result<()> {
        let n = population.n_traits();
        self.counts.fill(0);
        self.counts[population.trait_of(centre)] += 1;
        for &j in graph.neighbours(centre) {
            self.counts[population.trait_of(j)] += 1;
        }
        game.group_scores(&self.counts, &mut self.group_payoffs[centre * n..(centre + 1) * n])
    }

    /// Score of `agent` against freshly drawn partners: one neighbour for
    /// pairwise games, `group_size - 1` neighbours for group games. Draws
    /// nothing when the whole neighbourhood is needed.
    fn sampled_score<R: Rng + ?Sized>(
        &mut self,
        game: &dyn Game,
        graph: &Graph,
        population: &Population,
        agent: usize,
        rng: &mut R,
    ) -> Result<f64> {
        if population.is_vacant(agent) {
            return Ok(f64::NAN);
        }
        let desc = game.descriptor();
        let neighbours = graph.neighbours(agent);
        let wanted = desc.group_size() - 1;
        let t = population.trait_of(agent);
        self.counts.fill(0);
        if neighbours.len() <= wanted {
            for &j in neighbours {
                self.counts[population.trait_of(j)] += 1;
            }
        } else if wanted == 1 {
            let j = neighbours[rng.gen_range(0..neighbours.len())];
            self.counts[population.trait_of(j)] += 1;
        } else {
            for i in index::sample(rng, neighbours.len(), wanted).iter() {
                self.counts[population.trait_of(neighbours[i])] += 1;
            }
        }
        if desc.is_pairwise() {
            let own = game.pair_scores(t, &self.counts, &mut self.trait_scores)?;
            let met: usize = self.counts.iter().sum();
            let partners = met - population.vacant().map_or(0, |v| self.counts[v]);
            return Ok(match (self.accounting, partners) {
                (_, 0) => 0.0,
                (Accounting::Accumulated, _) => own,
                (Accounting::Averaged, _) => own / partners as f64,
            });
        }
        self.counts[t] += 1;
        game.group_scores(&self.counts, &mut self.trait_scores)?;
        Ok(self.trait_scores[t])
    }

    fn collect_group_score(&self, graph: &Graph, population: &Population, agent: usize) -> f64 {
        if population.is_vacant(agent) {
            return f64::NAN;
        }
        let n = population.n_traits();
        let t = population.trait_of(agent);
        let total: f64 = std::iter::once(agent)
            .chain(graph.neighbours(agent).iter().copied())
            .map(|centre| self.group_payoffs[centre * n + t])
            .sum();
        match self.accounting {
            Accounting::Accumulated => total,
            Accounting::Averaged => total / (graph.degree(agent) + 1) as f64,
        }
    }
}

fn max_degree(graph: &Graph) -> usize {
    (0..graph.size()).map(|a| graph.degree(a)).max().unwrap_or(0)
}
