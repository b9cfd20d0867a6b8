//! Trait movement between demes.
//!
//! Migration only ever writes proposals; the caller commits them so that
//! deme counts move in lockstep with the aggregate counts.

use crate::error::{CoreError, Result};
use crate::population::Population;
use crate::update::pick_weighted_by;
use ludus_data::{DemeLayout, MigrationKind};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Migration {
    /// Probability that an event is a migration.
    pub rate: f64,
    pub kind: MigrationKind,
}

impl Migration {
    /// Creates a migration operator for `demes`. Migration without at least
    /// two demes is disabled with a note.
    #[must_use]
    pub fn new(rate: f64, kind: MigrationKind, demes: Option<DemeLayout>) -> (Self, Vec<String>) {
        let mut notes = Vec::new();
        if kind == MigrationKind::None {
            return (Self::default(), notes);
        }
        let rate = if (0.0..=1.0).contains(&rate) {
            rate
        } else {
            notes.push(format!("migration rate {rate} outside [0, 1], migration disabled"));
            0.0
        };
        match demes {
            Some(layout) if layout.count >= 2 => (Self { rate, kind }, notes),
            _ => {
                notes.push(format!(
                    "migration type {kind} needs at least two demes, migration disabled"
                ));
                (Self::default(), notes)
            }
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.kind != MigrationKind::None && self.rate > 0.0
    }

    /// Proposes one migration event.
    ///
    /// Draw order: `diffusion` draws the first agent then its partner;
    /// `birth-death` draws one uniform for the source then the destination;
    /// `death-birth` draws the destination, then either a uniform agent
    /// (fast path) or one uniform for the fitness-weighted source.
    pub fn propose<R, F>(&self, population: &mut Population, fitness: F, rng: &mut R) -> Result<()>
    where
        R: Rng,
        F: Fn(usize) -> f64,
    {
        let layout = population
            .demes()
            .ok_or_else(|| CoreError::invariant("migration in a population without demes"))?;
        let n = population.size();
        match self.kind {
            MigrationKind::None => Ok(()),
            MigrationKind::Diffusion => {
                let a = rng.gen_range(0..n);
                let b = outside_deme(layout, a, rng.gen_range(0..n - layout.size));
                let (ta, tb) = (population.trait_of(a), population.trait_of(b));
                population.propose(a, tb)?;
                population.propose(b, ta)
            }
            MigrationKind::BirthDeath => {
                let u = rng.gen::<f64>();
                let source = pick_weighted_by(0..n, &fitness, u)
                    .ok_or_else(|| CoreError::invariant("empty population"))?;
                let destination = rng.gen_range(0..n);
                population.propose(destination, population.trait_of(source))
            }
            MigrationKind::DeathBirth => {
                let destination = rng.gen_range(0..n);
                let deme = layout.deme_of(destination);
                let source = if population.deme_is_homogeneous(deme)
                    && rest_is_homogeneous(population, deme)
                {
                    outside_deme(layout, destination, rng.gen_range(0..n - layout.size))
                } else {
                    let members = layout.members(deme);
                    let u = rng.gen::<f64>();
                    pick_weighted_by((0..members.start).chain(members.end..n), &fitness, u)
                        .ok_or_else(|| CoreError::invariant("no agents outside deme"))?
                };
                population.propose(destination, population.trait_of(source))
            }
        }
    }
}

/// Maps `pick` in `0..N-size` onto the agents outside the deme of `agent`.
fn outside_deme(layout: DemeLayout, agent: usize, pick: usize) -> usize {
    let start = layout.deme_of(agent) * layout.size;
    if pick >= start {
        pick + layout.size
    } else {
        pick
    }
}

/// Whether all agents outside `deme` share one trait.
fn rest_is_homogeneous(population: &Population, deme: usize) -> bool {
    let own = population.deme_counts_of(deme);
    population
        .trait_counts()
        .iter()
        .zip(own)
        .filter(|&(&total, &inside)| total > inside)
        .count()
        <= 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::Change;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn population() -> Population {
        let layout = DemeLayout { count: 3, size: 4 };
        let mut pop = Population::new(3, 12, None, Some(layout)).unwrap();
        pop.assign(&[0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2]).unwrap();
        pop
    }

    #[test]
    fn test_requires_demes() {
        let (m, notes) = Migration::new(0.1, MigrationKind::Diffusion, None);
        assert!(!m.is_active());
        assert_eq!(notes.len(), 1);
        let layout = DemeLayout { count: 2, size: 3 };
        let (m, notes) = Migration::new(0.1, MigrationKind::Diffusion, Some(layout));
        assert!(m.is_active());
        assert!(notes.is_empty());
    }

    #[test]
    fn test_diffusion_swaps_across_demes() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut pop = population();
        let (m, _) = Migration::new(1.0, MigrationKind::Diffusion, pop.demes());
        for _ in 0..50 {
            m.propose(&mut pop, |_| 1.0, &mut rng).unwrap();
            let mut changes: Vec<Change> = Vec::new();
            pop.commit(&mut changes).unwrap();
            assert_eq!(pop.trait_counts(), &[4, 4, 4]);
            if changes.len() == 2 {
                assert_ne!(changes[0].agent / 4, changes[1].agent / 4);
            }
        }
    }

    #[test]
    fn test_birth_death_follows_fitness() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut pop = population();
        let (m, _) = Migration::new(1.0, MigrationKind::BirthDeath, pop.demes());
        // only trait 2 has fitness
        for _ in 0..300 {
            let traits = pop.traits().to_vec();
            m.propose(&mut pop, |a| if traits[a] == 2 { 1.0 } else { 0.0 }, &mut rng)
                .unwrap();
            pop.commit(&mut Vec::new()).unwrap();
        }
        assert_eq!(pop.count(2), 12);
    }

    #[test]
    fn test_death_birth_imports_from_other_demes() {
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let mut pop = population();
        let (m, _) = Migration::new(1.0, MigrationKind::DeathBirth, pop.demes());
        for _ in 0..30 {
            m.propose(&mut pop, |_| 1.0, &mut rng).unwrap();
            let mut changes = Vec::new();
            pop.commit(&mut changes).unwrap();
            for change in changes {
                assert_ne!(change.from, change.to);
            }
            pop.check_invariants().unwrap();
        }
    }

    #[test]
    fn test_outside_deme_mapping() {
        let layout = DemeLayout { count: 3, size: 4 };
        let picks: Vec<usize> = (0..8).map(|p| outside_deme(layout, 5, p)).collect();
        assert_eq!(picks, vec![0, 1, 2, 3, 8, 9, 10, 11]);
    }
}
