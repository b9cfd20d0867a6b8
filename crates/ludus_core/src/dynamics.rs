//! Deterministic replicator dynamics from the same game contract.
//!
//! Solvers call [`replicator_derivatives`] with the current densities; the
//! integration scheme itself lives outside this crate.

use crate::error::{CoreError, Result};
use crate::fitness::FitnessMap;
use crate::game::Game;

/// Relative tolerance per active trait before densities are renormalised.
pub const DENSITY_TOLERANCE: f64 = 1e-7;

/// Writes `dx_i/dt = x_i (f_i - f_mean)` into `change` and the fitness of
/// every trait into `fitness`.
///
/// `state` holds densities over all traits. If they drift away from unit
/// sum by more than `DENSITY_TOLERANCE` times the number of active traits
/// they are renormalised in place. The rounding residual of the derivatives
/// is spread evenly over the active traits so that they sum to zero.
/// Vacant traits have `NaN` fitness and zero change.
pub fn replicator_derivatives(
    game: &dyn Game,
    map: &FitnessMap,
    _time: f64,
    state: &mut [f64],
    fitness: &mut [f64],
    change: &mut [f64],
) -> Result<()> {
    let desc = game.descriptor();
    desc.check_len("state", state.len())?;
    desc.check_len("fitness scratch", fitness.len())?;
    desc.check_len("change", change.len())?;
    let active = desc.active_traits();
    if active.is_empty() {
        return Err(CoreError::config(format!("game '{}' has no active traits", desc.name)));
    }
    if state.iter().any(|x| !x.is_finite() || *x < 0.0) {
        return Err(CoreError::invariant("densities must be finite and non-negative"));
    }

    let total: f64 = state.iter().sum();
    if total <= 0.0 {
        return Err(CoreError::invariant("densities sum to zero"));
    }
    if (total - 1.0).abs() > DENSITY_TOLERANCE * active.len() as f64 {
        tracing::debug!(total, "Renormalising densities");
        state.iter_mut().for_each(|x| *x /= total);
    }

    game.mean_field_scores(state, desc.group_size(), fitness)?;
    let mut mean = 0.0;
    for t in 0..fitness.len() {
        if desc.is_active(t) {
            fitness[t] = map.map(fitness[t]);
            mean += state[t] * fitness[t];
        } else {
            fitness[t] = f64::NAN;
        }
    }
    // with vacancies the active densities do not sum to one
    let active_mass: f64 = active.iter().map(|&t| state[t]).sum();
    if active_mass > 0.0 {
        mean /= active_mass;
    }

    change.fill(0.0);
    let mut residual = 0.0;
    for &t in &active {
        change[t] = state[t] * (fitness[t] - mean);
        residual += change[t];
    }
    let share = residual / active.len() as f64;
    for &t in &active {
        change[t] -= share;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::MatrixGame;

    fn dilemma() -> MatrixGame {
        MatrixGame::new(vec![vec![3.0, 0.0], vec![5.0, 1.0]]).unwrap()
    }

    #[test]
    fn test_defectors_grow() {
        let game = dilemma();
        let map = FitnessMap::default();
        let mut state = [0.5, 0.5];
        let mut fitness = [0.0; 2];
        let mut change = [0.0; 2];
        replicator_derivatives(&game, &map, 0.0, &mut state, &mut fitness, &mut change).unwrap();
        assert!(change[1] > 0.0);
        assert!((change[0] + change[1]).abs() < 1e-15);
        // f_C = 1 + 1.5, f_D = 1 + 3
        assert!((fitness[0] - 2.5).abs() < 1e-12);
        assert!((fitness[1] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_drifted_state_renormalised() {
        let game = dilemma();
        let mut state = [0.6, 0.6];
        let mut fitness = [0.0; 2];
        let mut change = [0.0; 2];
        let map = FitnessMap::default();
        replicator_derivatives(&game, &map, 0.0, &mut state, &mut fitness, &mut change).unwrap();
        assert!((state[0] - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_vertex_is_fixed_point() {
        let game = dilemma();
        let mut state = [0.0, 1.0];
        let mut fitness = [0.0; 2];
        let mut change = [0.0; 2];
        let map = FitnessMap::default();
        replicator_derivatives(&game, &map, 0.0, &mut state, &mut fitness, &mut change).unwrap();
        assert_eq!(change, [0.0, 0.0]);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let game = dilemma();
        let mut state = [1.0];
        let mut fitness = [0.0; 2];
        let mut change = [0.0; 2];
        assert!(replicator_derivatives(
            &game,
            &FitnessMap::default(),
            0.0,
            &mut state,
            &mut fitness,
            &mut change
        )
        .is_err());
    }
}
