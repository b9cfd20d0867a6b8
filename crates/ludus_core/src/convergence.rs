//! Absorption, fixation and deme homogeneity detection.
//!
//! The monitor inspects the population after every commit. When all demes
//! are pure but differ from each other, the only productive events left are
//! migrations and mutations; the simulation then skips ahead by a geometric
//! waiting time (see [`ConvergenceMonitor::rare_event_wait`]).

use crate::migration::Migration;
use crate::mutation::Mutation;
use crate::population::Population;
use ludus_data::ConvergenceState;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceMonitor {
    /// Stop at the first monomorphic state even if mutations could escape it.
    pub monostop: bool,
    mutation_rate: f64,
    migration_rate: f64,
}

impl ConvergenceMonitor {
    #[must_use]
    pub fn new(mutation: &Mutation, migration: &Migration, monostop: bool) -> Self {
        Self {
            monostop,
            mutation_rate: if mutation.is_active() { mutation.rate } else { 0.0 },
            migration_rate: if migration.is_active() { migration.rate } else { 0.0 },
        }
    }

    /// Classifies the current state of `population`.
    #[must_use]
    pub fn inspect(&self, population: &Population) -> ConvergenceState {
        if population.active_count() == 0 {
            return ConvergenceState::Absorbed;
        }
        if let Some(trait_index) = population.monomorphic_trait() {
            return ConvergenceState::Monomorphic { trait_index };
        }
        if let Some(layout) = population.demes() {
            if (0..layout.count).all(|d| population.deme_is_homogeneous(d)) {
                return if self.mutation_rate > 0.0 || self.migration_rate > 0.0 {
                    ConvergenceState::HomogeneousDemes
                } else {
                    ConvergenceState::Absorbed
                };
            }
        }
        ConvergenceState::Running
    }

    /// Whether the run must stop in `state`.
    #[must_use]
    pub fn is_terminal(&self, state: &ConvergenceState) -> bool {
        match state {
            ConvergenceState::Absorbed => true,
            ConvergenceState::Monomorphic { .. } => self.monostop || self.mutation_rate <= 0.0,
            ConvergenceState::Running | ConvergenceState::HomogeneousDemes => false,
        }
    }

    /// Per-event probability of a migration or mutation.
    #[must_use]
    pub fn rare_event_rate(&self) -> f64 {
        self.migration_rate + (1.0 - self.migration_rate) * self.mutation_rate
    }

    /// Number of unproductive events before the next rare event, drawn from
    /// the geometric distribution with the combined rate. Draws one uniform.
    pub fn rare_event_wait<R: Rng>(&self, rng: &mut R) -> u64 {
        let q = self.rare_event_rate();
        let u = 1.0 - rng.gen::<f64>();
        if q >= 1.0 {
            return 0;
        }
        let k = (u.ln() / (1.0 - q).ln()).floor();
        if k.is_finite() && k > 0.0 {
            k as u64
        } else {
            0
        }
    }

    /// Whether the rare event is a migration. Draws one uniform only if both
    /// migration and mutation are possible.
    pub fn rare_event_is_migration<R: Rng>(&self, rng: &mut R) -> bool {
        match (self.migration_rate > 0.0, self.mutation_rate > 0.0) {
            (true, true) => rng.gen::<f64>() < self.migration_rate / self.rare_event_rate(),
            (migration, _) => migration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ludus_data::{DemeLayout, MigrationKind, MutationKernel};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn pure_demes() -> Population {
        let layout = DemeLayout { count: 4, size: 25 };
        let mut pop = Population::new(4, 100, None, Some(layout)).unwrap();
        let traits: Vec<usize> = (0..100).map(|i| i / 25).collect();
        pop.assign(&traits).unwrap();
        pop
    }

    #[test]
    fn test_pure_demes_absorbed_without_rare_events() {
        let monitor = ConvergenceMonitor::new(&Mutation::default(), &Migration::default(), false);
        let state = monitor.inspect(&pure_demes());
        assert_eq!(state, ConvergenceState::Absorbed);
        assert!(monitor.is_terminal(&state));
    }

    #[test]
    fn test_pure_demes_with_migration() {
        let pop = pure_demes();
        let (migration, _) = Migration::new(0.01, MigrationKind::Diffusion, pop.demes());
        let monitor = ConvergenceMonitor::new(&Mutation::default(), &migration, false);
        let state = monitor.inspect(&pop);
        assert_eq!(state, ConvergenceState::HomogeneousDemes);
        assert!(!monitor.is_terminal(&state));
    }

    #[test]
    fn test_monomorphic_terminal_unless_mutating() {
        let mut pop = Population::new(2, 10, None, None).unwrap();
        pop.assign(&[1; 10]).unwrap();
        let quiet = ConvergenceMonitor::new(&Mutation::default(), &Migration::default(), false);
        let state = quiet.inspect(&pop);
        assert_eq!(state, ConvergenceState::Monomorphic { trait_index: 1 });
        assert!(quiet.is_terminal(&state));

        let (mutation, _) = Mutation::new(0.01, MutationKernel::All, 1);
        let mutating = ConvergenceMonitor::new(&mutation, &Migration::default(), false);
        assert!(!mutating.is_terminal(&state));
        let stopping = ConvergenceMonitor::new(&mutation, &Migration::default(), true);
        assert!(stopping.is_terminal(&state));
    }

    #[test]
    fn test_all_vacant_is_absorbed() {
        let mut pop = Population::new(2, 3, Some(1), None).unwrap();
        pop.assign(&[1, 1, 1]).unwrap();
        let monitor = ConvergenceMonitor::new(&Mutation::default(), &Migration::default(), false);
        assert_eq!(monitor.inspect(&pop), ConvergenceState::Absorbed);
    }

    #[test]
    fn test_waiting_time_mean() {
        let pop = pure_demes();
        let (migration, _) = Migration::new(0.1, MigrationKind::Diffusion, pop.demes());
        let monitor = ConvergenceMonitor::new(&Mutation::default(), &migration, false);
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let runs = 20_000;
        let total: u64 = (0..runs).map(|_| monitor.rare_event_wait(&mut rng)).sum();
        // mean of failures before success is (1 - q) / q = 9
        let mean = total as f64 / runs as f64;
        assert!((mean - 9.0).abs() < 0.5, "mean wait {mean}");
    }
}
