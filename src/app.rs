//! Headless application: loads a configuration, runs it and builds a report.

use anyhow::{Context, Result};
use ludus_core::config::{ConfigWarning, ModelConfig};
use ludus_core::metrics::Stopwatch;
use ludus_core::model::{Model, RunControl, StopReason};
use ludus_core::options::apply_assignment;
use ludus_core::statistics::{fixation_runs, summarize};
use ludus_core::Simulation;
use std::path::Path;

use crate::report::{CountsSample, RunReport, SpeciesReport, StatisticsReport};

/// Command-line overrides applied on top of the configuration file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub assignments: Vec<String>,
    pub seed: Option<u64>,
    pub events: Option<u64>,
    pub statistics_runs: Option<usize>,
}

pub struct App {
    pub config: ModelConfig,
    pub warnings: Vec<ConfigWarning>,
    pub control: RunControl,
}

impl App {
    /// Loads `path` (or the defaults when it does not exist), applies the
    /// overrides, validates and sanitises.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                ModelConfig::from_toml(&content)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            Some(path) => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                ModelConfig::default()
            }
            None => ModelConfig::default(),
        };
        Self::from_config(&mut config, overrides)?;
        let warnings = config.sanitize();
        Ok(Self {
            config,
            warnings,
            control: RunControl::new(),
        })
    }

    fn from_config(config: &mut ModelConfig, overrides: &Overrides) -> Result<()> {
        for assignment in &overrides.assignments {
            apply_assignment(&mut config.species, assignment)
                .with_context(|| format!("Invalid option '{assignment}'"))?;
        }
        if let Some(seed) = overrides.seed {
            config.run.seed = seed;
        }
        if let Some(events) = overrides.events {
            config.run.max_events = events;
            config.run.generations = None;
        }
        if let Some(runs) = overrides.statistics_runs {
            config.run.statistics_runs = runs;
        }
        config.validate()
    }

    pub fn run(&mut self) -> Result<RunReport> {
        let stopwatch = Stopwatch::start();
        let mut report = RunReport::new(&self.config, self.warnings.clone());
        tracing::info!(
            id = %report.id,
            fingerprint = %report.fingerprint,
            "Starting run"
        );
        if self.config.run.statistics_runs > 0 {
            self.run_statistics(&mut report)?;
        } else {
            self.run_model(&mut report)?;
        }
        report.elapsed_ms = stopwatch.elapsed_ms();
        tracing::info!(
            stop = %report.stop_reason,
            elapsed_ms = report.elapsed_ms,
            "Run finished"
        );
        Ok(report)
    }

    fn run_model(&self, report: &mut RunReport) -> Result<()> {
        let mut model = Model::from_config(&self.config).context("Failed to build model")?;
        let mut samples: Vec<Vec<CountsSample>> = vec![Vec::new(); model.species().len()];
        let interval = self.config.run.snapshot_interval;
        let stop = model.run_observed(&self.control, interval, |model| {
            if interval == 0 {
                return;
            }
            for (sim, series) in model.species().iter().zip(samples.iter_mut()) {
                if series.last().map(|s| s.events) != Some(sim.events()) {
                    series.push(CountsSample::from(&sim.snapshot()));
                }
            }
        })?;
        report.stop_reason = describe(stop).to_string();
        report.species = model
            .species()
            .iter()
            .zip(samples)
            .map(|(sim, samples)| species_report(sim, samples))
            .collect();
        Ok(())
    }

    fn run_statistics(&self, report: &mut RunReport) -> Result<()> {
        let run = &self.config.run;
        for spec in &self.config.species {
            let n_traits = spec.game.n_traits();
            let limit = run.event_limit(spec.size);
            let records = fixation_runs(|rng| spec.build(rng), run.statistics_runs, run.seed, limit)
                .with_context(|| format!("Fixation runs of '{}' failed", spec.name))?;
            report.statistics.push(StatisticsReport {
                name: spec.name.clone(),
                stats: summarize(&records, n_traits),
            });
        }
        report.stop_reason = "statistics".to_string();
        Ok(())
    }
}

fn describe(stop: StopReason) -> &'static str {
    match stop {
        StopReason::Finished => "finished",
        StopReason::EventLimit => "event-limit",
        StopReason::Cancelled => "cancelled",
    }
}

fn species_report(sim: &Simulation, samples: Vec<CountsSample>) -> SpeciesReport {
    let desc = sim.game().descriptor();
    SpeciesReport {
        name: sim.name().to_string(),
        game: desc.name.clone(),
        trait_names: desc.trait_names.clone(),
        state: sim.state(),
        time: sim.time(),
        events: sim.events(),
        trait_counts: sim.trait_counts().to_vec(),
        metrics: sim.metrics().clone(),
        samples,
        flips: sim.flips().map(<[_]>::to_vec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_applied() {
        let overrides = Overrides {
            assignments: vec!["noise=0.25".to_string(), "geometry=moore".to_string()],
            seed: Some(9),
            events: Some(500),
            statistics_runs: None,
        };
        let app = App::load(None, &overrides).unwrap();
        assert_eq!(app.config.run.seed, 9);
        assert_eq!(app.config.species[0].noise, 0.25);
        assert!(app.warnings.is_empty());
    }

    #[test]
    fn test_unknown_option_rejected() {
        let overrides = Overrides {
            assignments: vec!["colour=blue".to_string()],
            ..Default::default()
        };
        assert!(App::load(None, &overrides).is_err());
    }

    #[test]
    fn test_single_run_report() {
        let overrides = Overrides {
            assignments: vec!["size=30".to_string()],
            events: Some(3_000),
            ..Default::default()
        };
        let mut app = App::load(None, &overrides).unwrap();
        app.config.run.snapshot_interval = 1_000;
        let report = app.run().unwrap();
        let species = &report.species[0];
        assert_eq!(species.trait_counts.iter().sum::<usize>(), 30);
        assert!(species.events <= 3_000);
        assert!(!species.samples.is_empty());
    }

    #[test]
    fn test_statistics_report() {
        let overrides = Overrides {
            assignments: vec!["size=10".to_string(), "init=mutant:0,1".to_string()],
            statistics_runs: Some(8),
            ..Default::default()
        };
        let mut app = App::load(None, &overrides).unwrap();
        let report = app.run().unwrap();
        assert_eq!(report.statistics[0].stats.runs, 8);
        assert!(report.species.is_empty());
    }
}
