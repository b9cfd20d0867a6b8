//! Core data structures for the Ludus simulation.

#[macro_use]
mod keyword;

pub mod params;
pub mod snapshot;
pub mod state;
