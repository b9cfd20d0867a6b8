//! # Ludus
//!
//! Headless front end for the ludus evolutionary game engine: loads a TOML
//! model configuration, applies `key=value` overrides, runs the model (or a
//! batch of independent fixation runs) and writes a JSON report.

pub mod app;
pub mod report;

pub use app::{App, Overrides};
pub use report::RunReport;
