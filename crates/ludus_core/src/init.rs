//! Initial trait configurations.

use crate::error::{CoreError, Result};
use crate::game::GameDescriptor;
use crate::topology::Topology;
use crate::update::pick_weighted;
use ludus_data::{InitKind, TraitIndex};
use rand::Rng;

/// Draws the initial trait of every agent.
///
/// `uniform` and `frequencies` draw one number per agent in index order,
/// `mutant` draws the mutant's position, the others draw nothing.
pub fn initial_traits<R: Rng>(
    init: &InitKind,
    descriptor: &GameDescriptor,
    topology: &Topology,
    rng: &mut R,
) -> Result<Vec<TraitIndex>> {
    let size = topology.size();
    let active = descriptor.active_traits();
    if active.is_empty() {
        return Err(CoreError::config(format!(
            "game '{}' has no active traits",
            descriptor.name
        )));
    }
    match init {
        InitKind::Uniform => Ok((0..size)
            .map(|_| active[rng.gen_range(0..active.len())])
            .collect()),
        InitKind::Frequencies(freqs) => {
            descriptor.check_len("initial frequencies", freqs.len())?;
            Ok((0..size)
                .map(|_| pick_weighted(freqs, rng.gen::<f64>()))
                .collect())
        }
        InitKind::Mono(t) => {
            descriptor.check_trait(*t)?;
            Ok(vec![*t; size])
        }
        InitKind::Mutant { resident, mutant } => {
            descriptor.check_trait(*resident)?;
            descriptor.check_trait(*mutant)?;
            let mut traits = vec![*resident; size];
            traits[rng.gen_range(0..size)] = *mutant;
            Ok(traits)
        }
        InitKind::Kaleidoscope => {
            let side = topology
                .graph()
                .and_then(|graph| graph.lattice_side())
                .ok_or_else(|| {
                    CoreError::unsupported("kaleidoscope start needs a lattice geometry")
                })?;
            if active.len() < 2 {
                return Err(CoreError::unsupported("kaleidoscope start needs two active traits"));
            }
            let mut traits = vec![active[0]; size];
            traits[(side / 2) * side + side / 2] = active[1];
            Ok(traits)
        }
    }
}
