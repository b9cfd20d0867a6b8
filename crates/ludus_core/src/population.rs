//! Population state with a two-phase propose/commit overlay.
//!
//! Agents are slots `0..N`. Update, mutation and migration operators only
//! ever write to the `proposed` overlay; [`Population::commit`] applies all
//! pending proposals at once and updates the aggregate and per-deme counts in
//! lockstep. Readers only see `current`, so partially applied updates are
//! never observable.

use crate::error::{CoreError, Result};
use ludus_data::{DemeCounts, DemeLayout, TraitIndex};

/// One trait change applied by a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub agent: usize,
    pub from: TraitIndex,
    pub to: TraitIndex,
}

#[derive(Debug, Clone)]
pub struct Population {
    n_traits: usize,
    vacant: Option<TraitIndex>,
    current: Vec<TraitIndex>,
    proposed: Vec<TraitIndex>,
    is_pending: Vec<bool>,
    pending: Vec<usize>,
    trait_counts: Vec<usize>,
    demes: Option<DemeLayout>,
    /// `[deme][trait]`, row-major.
    deme_counts: Vec<usize>,
}

impl Population {
    /// Creates a population of `size` agents all holding trait 0.
    pub fn new(
        n_traits: usize,
        size: usize,
        vacant: Option<TraitIndex>,
        demes: Option<DemeLayout>,
    ) -> Result<Self> {
        if n_traits == 0 || size == 0 {
            return Err(CoreError::config("population needs traits and agents"));
        }
        if let Some(layout) = demes {
            if layout.population_size() != size {
                return Err(CoreError::config(format!(
                    "deme layout {layout} does not cover {size} agents"
                )));
            }
        }
        let mut population = Self {
            n_traits,
            vacant,
            current: vec![0; size],
            proposed: vec![0; size],
            is_pending: vec![false; size],
            pending: Vec::new(),
            trait_counts: vec![0; n_traits],
            demes,
            deme_counts: vec![0; demes.map_or(0, |d| d.count) * n_traits],
        };
        population.recount();
        Ok(population)
    }

    /// Replaces every trait and recomputes all counts from scratch.
    pub fn assign(&mut self, traits: &[TraitIndex]) -> Result<()> {
        if traits.len() != self.current.len() {
            return Err(CoreError::invariant(format!(
                "assigning {} traits to {} agents",
                traits.len(),
                self.current.len()
            )));
        }
        if let Some(&bad) = traits.iter().find(|&&t| t >= self.n_traits) {
            return Err(CoreError::UnknownTrait {
                trait_index: bad,
                n_traits: self.n_traits,
            });
        }
        self.discard();
        self.current.copy_from_slice(traits);
        self.proposed.copy_from_slice(traits);
        self.recount();
        self.check_invariants()
    }

    fn recount(&mut self) {
        self.trait_counts.fill(0);
        self.deme_counts.fill(0);
        for (agent, &t) in self.current.iter().enumerate() {
            self.trait_counts[t] += 1;
            if let Some(layout) = self.demes {
                self.deme_counts[layout.deme_of(agent) * self.n_traits + t] += 1;
            }
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.current.len()
    }

    #[must_use]
    pub fn n_traits(&self) -> usize {
        self.n_traits
    }

    #[must_use]
    pub fn vacant(&self) -> Option<TraitIndex> {
        self.vacant
    }

    #[must_use]
    pub fn demes(&self) -> Option<DemeLayout> {
        self.demes
    }

    #[must_use]
    pub fn trait_of(&self, agent: usize) -> TraitIndex {
        self.current[agent]
    }

    #[must_use]
    pub fn is_vacant(&self, agent: usize) -> bool {
        Some(self.current[agent]) == self.vacant
    }

    #[must_use]
    pub fn traits(&self) -> &[TraitIndex] {
        &self.current
    }

    #[must_use]
    pub fn trait_counts(&self) -> &[usize] {
        &self.trait_counts
    }

    #[must_use]
    pub fn count(&self, trait_index: TraitIndex) -> usize {
        self.trait_counts[trait_index]
    }

    /// Number of non-vacant agents.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.size() - self.vacant.map_or(0, |v| self.trait_counts[v])
    }

    /// Trait counts of deme `deme`.
    #[must_use]
    pub fn deme_counts_of(&self, deme: usize) -> &[usize] {
        &self.deme_counts[deme * self.n_traits..(deme + 1) * self.n_traits]
    }

    #[must_use]
    pub fn deme_counts(&self) -> Option<DemeCounts> {
        self.demes.map(|layout| DemeCounts {
            n_demes: layout.count,
            n_traits: self.n_traits,
            counts: self.deme_counts.clone(),
        })
    }

    /// The single active trait covering every non-vacant site, if any.
    #[must_use]
    pub fn monomorphic_trait(&self) -> Option<TraitIndex> {
        let active = self.active_count();
        if active == 0 {
            return None;
        }
        (0..self.n_traits)
            .find(|&t| Some(t) != self.vacant && self.trait_counts[t] == active)
    }

    /// Whether deme `deme` holds a single trait.
    #[must_use]
    pub fn deme_is_homogeneous(&self, deme: usize) -> bool {
        self.deme_counts_of(deme).iter().filter(|&&c| c > 0).count() <= 1
    }

    /// Queues `trait_index` for `agent`; a later proposal for the same agent
    /// replaces the earlier one.
    pub fn propose(&mut self, agent: usize, trait_index: TraitIndex) -> Result<()> {
        if trait_index >= self.n_traits {
            return Err(CoreError::UnknownTrait {
                trait_index,
                n_traits: self.n_traits,
            });
        }
        self.proposed[agent] = trait_index;
        if !self.is_pending[agent] {
            self.is_pending[agent] = true;
            self.pending.push(agent);
        }
        Ok(())
    }

    /// Trait `agent` will hold after the next commit.
    #[must_use]
    pub fn proposed_trait(&self, agent: usize) -> TraitIndex {
        self.proposed[agent]
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drops all pending proposals.
    pub fn discard(&mut self) {
        for &agent in &self.pending {
            self.proposed[agent] = self.current[agent];
            self.is_pending[agent] = false;
        }
        self.pending.clear();
    }

    /// Applies every pending proposal in proposal order and appends the
    /// effective changes to `changes`. Proposals that keep the current trait
    /// are dropped.
    pub fn commit(&mut self, changes: &mut Vec<Change>) -> Result<()> {
        for &agent in &self.pending {
            self.is_pending[agent] = false;
            let from = self.current[agent];
            let to = self.proposed[agent];
            if from == to {
                continue;
            }
            self.current[agent] = to;
            self.trait_counts[from] -= 1;
            self.trait_counts[to] += 1;
            if let Some(layout) = self.demes {
                let row = layout.deme_of(agent) * self.n_traits;
                self.deme_counts[row + from] -= 1;
                self.deme_counts[row + to] += 1;
            }
            changes.push(Change { agent, from, to });
        }
        self.pending.clear();
        self.check_invariants()
    }

    /// Verifies `sum(traitCount) == N` and, for demes, that deme counts add
    /// up to the aggregate counts trait by trait.
    pub fn check_invariants(&self) -> Result<()> {
        let total: usize = self.trait_counts.iter().sum();
        if total != self.size() {
            return Err(CoreError::invariant(format!(
                "trait counts sum to {total}, population has {} agents",
                self.size()
            )));
        }
        if let Some(layout) = self.demes {
            for t in 0..self.n_traits {
                let sum: usize = (0..layout.count)
                    .map(|d| self.deme_counts[d * self.n_traits + t])
                    .sum();
                if sum != self.trait_counts[t] {
                    return Err(CoreError::invariant(format!(
                        "deme counts of trait {t} sum to {sum}, aggregate is {}",
                        self.trait_counts[t]
                    )));
                }
            }
            for d in 0..layout.count {
                let size: usize = self.deme_counts_of(d).iter().sum();
                if size != layout.size {
                    return Err(CoreError::invariant(format!(
                        "deme {d} counts {size} agents, layout says {}",
                        layout.size
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demes() -> Population {
        let mut pop = Population::new(3, 6, None, Some(DemeLayout { count: 2, size: 3 })).unwrap();
        pop.assign(&[0, 0, 1, 2, 2, 2]).unwrap();
        pop
    }

    #[test]
    fn test_assign_recounts() {
        let pop = demes();
        assert_eq!(pop.trait_counts(), &[2, 1, 3]);
        assert_eq!(pop.deme_counts_of(0), &[2, 1, 0]);
        assert_eq!(pop.deme_counts_of(1), &[0, 0, 3]);
        assert!(!pop.deme_is_homogeneous(0));
        assert!(pop.deme_is_homogeneous(1));
    }

    #[test]
    fn test_proposals_invisible_until_commit() {
        let mut pop = demes();
        pop.propose(0, 2).unwrap();
        assert_eq!(pop.trait_of(0), 0);
        assert_eq!(pop.proposed_trait(0), 2);
        assert!(pop.has_pending());
        let mut changes = Vec::new();
        pop.commit(&mut changes).unwrap();
        assert_eq!(
            changes,
            vec![Change {
                agent: 0,
                from: 0,
                to: 2
            }]
        );
        assert_eq!(pop.trait_counts(), &[1, 1, 4]);
        assert_eq!(pop.deme_counts_of(0), &[1, 1, 1]);
        assert!(!pop.has_pending());
    }

    #[test]
    fn test_noop_proposal_not_reported() {
        let mut pop = demes();
        pop.propose(3, 2).unwrap();
        let mut changes = Vec::new();
        pop.commit(&mut changes).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_swap_preserves_aggregate() {
        let mut pop = demes();
        pop.propose(2, 2).unwrap();
        pop.propose(5, 1).unwrap();
        let mut changes = Vec::new();
        pop.commit(&mut changes).unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(pop.trait_counts(), &[2, 1, 3]);
        assert_eq!(pop.deme_counts_of(1), &[0, 1, 2]);
    }

    #[test]
    fn test_discard_restores_overlay() {
        let mut pop = demes();
        pop.propose(1, 1).unwrap();
        pop.discard();
        assert_eq!(pop.proposed_trait(1), 0);
        assert!(!pop.has_pending());
    }

    #[test]
    fn test_unknown_trait_rejected() {
        let mut pop = demes();
        assert!(matches!(
            pop.propose(0, 3),
            Err(CoreError::UnknownTrait { .. })
        ));
        assert!(pop.assign(&[0, 0, 0, 0, 0, 9]).is_err());
    }

    #[test]
    fn test_monomorphic_ignores_vacancies() {
        let mut pop = Population::new(3, 4, Some(2), None).unwrap();
        pop.assign(&[1, 2, 1, 2]).unwrap();
        assert_eq!(pop.active_count(), 2);
        assert_eq!(pop.monomorphic_trait(), Some(1));
        pop.assign(&[2, 2, 2, 2]).unwrap();
        assert_eq!(pop.monomorphic_trait(), None);
    }
}
