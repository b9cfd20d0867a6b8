//! Declarative `key=value` option schema over [`SpeciesConfig`].
//!
//! Every option knows how to parse itself into a species and how to report
//! the effective value back. A value may carry one entry per species
//! separated by `;`; species beyond the last entry repeat it, so
//! `noise=0.1;0.5` sets `0.1` for the first species and `0.5` for all
//! others.

use crate::config::SpeciesConfig;
use crate::error::{CoreError, Result};
use std::str::FromStr;

type Apply = fn(&mut SpeciesConfig, &str) -> std::result::Result<(), String>;
type Report = fn(&SpeciesConfig) -> String;

pub struct OptionSpec {
    pub key: &'static str,
    pub default: &'static str,
    pub help: &'static str,
    pub apply: Apply,
    pub report: Report,
}

impl std::fmt::Debug for OptionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionSpec")
            .field("key", &self.key)
            .field("default", &self.default)
            .finish()
    }
}

fn number(value: &str) -> std::result::Result<f64, String> {
    let x: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if x.is_finite() {
        Ok(x)
    } else {
        Err(format!("'{value}' is not finite"))
    }
}

fn count(value: &str) -> std::result::Result<usize, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a non-negative integer"))
}

fn flag(value: &str) -> std::result::Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(format!("'{value}' is not a boolean")),
    }
}

fn keyword<T: FromStr<Err = String>>(value: &str) -> std::result::Result<T, String> {
    value.parse()
}

pub static OPTIONS: &[OptionSpec] = &[
    OptionSpec {
        key: "size",
        default: "100",
        help: "Number of agents (ignored when demes are set)",
        apply: |s, v| {
            s.size = count(v)?;
            Ok(())
        },
        report: |s| s.size.to_string(),
    },
    OptionSpec {
        key: "selection",
        default: "1",
        help: "Selection strength w of the fitness map",
        apply: |s, v| {
            s.selection = number(v)?;
            Ok(())
        },
        report: |s| s.selection.to_string(),
    },
    OptionSpec {
        key: "baseline",
        default: "1",
        help: "Baseline fitness b of the fitness map",
        apply: |s, v| {
            s.baseline = number(v)?;
            Ok(())
        },
        report: |s| s.baseline.to_string(),
    },
    OptionSpec {
        key: "fitnessmap",
        default: "static",
        help: "Payoff to fitness map: none, static, convex, exponential",
        apply: |s, v| {
            s.fitness_map = keyword(v)?;
            Ok(())
        },
        report: |s| s.fitness_map.to_string(),
    },
    OptionSpec {
        key: "update",
        default: "thermal",
        help: "Update rule: best, best-random, imitate, imitate-better, thermal, proportional, \
               best-response",
        apply: |s, v| {
            s.update = keyword(v)?;
            Ok(())
        },
        report: |s| s.update.to_string(),
    },
    OptionSpec {
        key: "noise",
        default: "1",
        help: "Noise of the imitation and thermal rules",
        apply: |s, v| {
            s.noise = number(v)?;
            Ok(())
        },
        report: |s| s.noise.to_string(),
    },
    OptionSpec {
        key: "error",
        default: "0",
        help: "Error rate, clamped to [0, 0.5]",
        apply: |s, v| {
            s.error = number(v)?;
            Ok(())
        },
        report: |s| s.error.to_string(),
    },
    OptionSpec {
        key: "popupdate",
        default: "async",
        help: "Population update: async, sync, moran-bd, moran-db, moran-imitate",
        apply: |s, v| {
            s.population_update = keyword(v)?;
            Ok(())
        },
        report: |s| s.population_update.to_string(),
    },
    OptionSpec {
        key: "mutation",
        default: "0",
        help: "Mutation probability per event",
        apply: |s, v| {
            s.mutation = number(v)?;
            Ok(())
        },
        report: |s| s.mutation.to_string(),
    },
    OptionSpec {
        key: "mutationkernel",
        default: "all",
        help: "Mutation kernel: all, other, range",
        apply: |s, v| {
            s.mutation_kernel = keyword(v)?;
            Ok(())
        },
        report: |s| s.mutation_kernel.to_string(),
    },
    OptionSpec {
        key: "mutationrange",
        default: "1",
        help: "Maximum trait distance of the range kernel",
        apply: |s, v| {
            s.mutation_range = count(v)?;
            Ok(())
        },
        report: |s| s.mutation_range.to_string(),
    },
    OptionSpec {
        key: "migration",
        default: "0",
        help: "Migration probability per event",
        apply: |s, v| {
            s.migration = number(v)?;
            Ok(())
        },
        report: |s| s.migration.to_string(),
    },
    OptionSpec {
        key: "migrationtype",
        default: "none",
        help: "Migration type: none, diffusion, birth-death, death-birth",
        apply: |s, v| {
            s.migration_type = keyword(v)?;
            Ok(())
        },
        report: |s| s.migration_type.to_string(),
    },
    OptionSpec {
        key: "demes",
        default: "none",
        help: "Hierarchical demes <count>x<size>, overrides geometry and size",
        apply: |s, v| {
            s.demes = match v.trim() {
                "" | "none" | "0" => None,
                layout => {
                    let layout: ludus_data::DemeLayout = layout.parse()?;
                    s.size = layout.population_size();
                    Some(layout)
                }
            };
            Ok(())
        },
        report: |s| s.demes.map_or_else(|| "none".to_string(), |d| d.to_string()),
    },
    OptionSpec {
        key: "geometry",
        default: "well-mixed",
        help: "Interaction graph, e.g. von-neumann, moore, hexagonal, random-regular:4",
        apply: |s, v| {
            s.geometry = keyword(v)?;
            Ok(())
        },
        report: |s| s.geometry.to_string(),
    },
    OptionSpec {
        key: "init",
        default: "uniform",
        help: "Initial configuration: uniform, frequencies:<f,..>, mono:<t>, mutant:<r>,<m>, \
               kaleidoscope",
        apply: |s, v| {
            s.init = keyword(v)?;
            Ok(())
        },
        report: |s| s.init.to_string(),
    },
    OptionSpec {
        key: "monostop",
        default: "false",
        help: "Stop at the first monomorphic state even with mutations",
        apply: |s, v| {
            s.monostop = flag(v)?;
            Ok(())
        },
        report: |s| s.monostop.to_string(),
    },
    OptionSpec {
        key: "accounting",
        default: "accumulated",
        help: "Payoff accounting: accumulated, averaged",
        apply: |s, v| {
            s.accounting = keyword(v)?;
            Ok(())
        },
        report: |s| s.accounting.to_string(),
    },
    OptionSpec {
        key: "partners",
        default: "all",
        help: "Partners on graphs: all neighbours, or one random neighbour or group",
        apply: |s, v| {
            s.partners = keyword(v)?;
            Ok(())
        },
        report: |s| s.partners.to_string(),
    },
    OptionSpec {
        key: "commitnoop",
        default: "false",
        help: "Count updates that keep the trait as commits",
        apply: |s, v| {
            s.commit_noop = flag(v)?;
            Ok(())
        },
        report: |s| s.commit_noop.to_string(),
    },
];

#[must_use]
pub fn lookup(key: &str) -> Option<&'static OptionSpec> {
    let key = key.trim();
    OPTIONS.iter().find(|o| o.key.eq_ignore_ascii_case(key))
}

/// Applies `value` for option `key` to every species.
pub fn apply_option(species: &mut [SpeciesConfig], key: &str, value: &str) -> Result<()> {
    let option = lookup(key).ok_or_else(|| CoreError::config(format!("unknown option '{key}'")))?;
    let values: Vec<&str> = value.split(';').map(str::trim).collect();
    let last = values.len() - 1;
    for (i, config) in species.iter_mut().enumerate() {
        let v = values[i.min(last)];
        (option.apply)(config, v).map_err(|msg| {
            CoreError::config(format!("option {} for species '{}': {msg}", option.key, config.name))
        })?;
    }
    Ok(())
}

/// Applies a `key=value` assignment.
pub fn apply_assignment(species: &mut [SpeciesConfig], assignment: &str) -> Result<()> {
    let (key, value) = assignment
        .split_once('=')
        .ok_or_else(|| CoreError::config(format!("option '{assignment}' must read key=value")))?;
    apply_option(species, key, value)
}

/// Effective value of every option, species separated by `;`.
#[must_use]
pub fn report(species: &[SpeciesConfig]) -> Vec<(&'static str, String)> {
    OPTIONS
        .iter()
        .map(|o| {
            let values: Vec<String> = species.iter().map(|s| (o.report)(s)).collect();
            (o.key, values.join(";"))
        })
        .collect()
}
