//! Configuration of a model run.
//!
//! A model consists of run-level settings and one or more species, each a
//! population with its own game, geometry and dynamics.
//!
//! ## Configuration hierarchy
//!
//! 1. Default values (hardcoded in `Default` impls)
//! 2. A TOML file (overrides defaults)
//! 3. `key=value` options from the option schema (override the file)
//!
//! ## Example
//!
//! ```toml
//! [run]
//! seed = 42
//! max_events = 1000000
//!
//! [[species]]
//! name = "pd"
//! size = 100
//! geometry = "von-neumann"
//! update = "thermal"
//! noise = 0.1
//!
//! [species.game]
//! kind = "matrix"
//! payoffs = [[3.0, 0.0], [5.0, 1.0]]
//! ```
//!
//! Structural problems (no species, empty runs) are rejected by
//! [`ModelConfig::validate`]. Parameter values that cannot be used are
//! replaced by [`ModelConfig::sanitize`], which logs and returns a warning
//! for every replacement.

use crate::error::Result;
use crate::fitness::FitnessMap;
use crate::game::GameSpec;
use crate::init::initial_traits;
use crate::migration::Migration;
use crate::mutation::Mutation;
use crate::simulation::{Simulation, SimulationParams};
use crate::topology::{build_graph, Structure, Topology};
use crate::update::UpdateRule;
use ludus_data::{
    Accounting, DemeLayout, FitnessMapKind, Geometry, InitKind, MigrationKind, MutationKernel,
    Partners, PopulationUpdate, UpdateRuleKind,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Run-level settings shared by all species.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub seed: u64,
    /// Event limit per species.
    pub max_events: u64,
    /// Limit in generations; overrides `max_events` when set.
    pub generations: Option<u64>,
    /// Independent runs for fixation statistics; 0 runs a single trajectory.
    pub statistics_runs: usize,
    /// Keep the log of committed trait flips.
    pub record_flips: bool,
    /// Events between snapshots in the run report; 0 disables snapshots.
    pub snapshot_interval: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            max_events: 1_000_000,
            generations: None,
            statistics_runs: 0,
            record_flips: false,
            snapshot_interval: 0,
        }
    }
}

/// One population.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SpeciesConfig {
    pub name: String,
    pub game: GameSpec,
    pub size: usize,
    pub geometry: Geometry,
    /// Separate reproduction graph; the interaction graph is used if unset.
    pub reproduction_geometry: Option<Geometry>,
    pub demes: Option<DemeLayout>,
    pub init: InitKind,
    pub fitness_map: FitnessMapKind,
    pub baseline: f64,
    pub selection: f64,
    pub update: UpdateRuleKind,
    pub noise: f64,
    pub error: f64,
    pub population_update: PopulationUpdate,
    pub mutation: f64,
    pub mutation_kernel: MutationKernel,
    pub mutation_range: usize,
    pub migration: f64,
    pub migration_type: MigrationKind,
    pub accounting: Accounting,
    /// Partners met on graph geometries.
    pub partners: Partners,
    pub monostop: bool,
    pub commit_noop: bool,
}

impl Default for SpeciesConfig {
    fn default() -> Self {
        Self {
            name: "species".to_string(),
            game: GameSpec::default(),
            size: 100,
            geometry: Geometry::WellMixed,
            reproduction_geometry: None,
            demes: None,
            init: InitKind::Uniform,
            fitness_map: FitnessMapKind::Static,
            baseline: 1.0,
            selection: 1.0,
            update: UpdateRuleKind::Thermal,
            noise: 1.0,
            error: 0.0,
            population_update: PopulationUpdate::Async,
            mutation: 0.0,
            mutation_kernel: MutationKernel::All,
            mutation_range: 1,
            migration: 0.0,
            migration_type: MigrationKind::None,
            accounting: Accounting::Accumulated,
            partners: Partners::All,
            monostop: false,
            commit_noop: false,
        }
    }
}

/// A configuration value that was replaced during sanitising.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConfigWarning {
    pub species: Option<String>,
    pub key: String,
    pub message: String,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.species {
            Some(species) => write!(f, "[{species}] {}: {}", self.key, self.message),
            None => write!(f, "{}: {}", self.key, self.message),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub run: RunConfig,
    pub species: Vec<SpeciesConfig>,
}

impl RunConfig {
    /// Event limit for a population of `size` agents.
    #[must_use]
    pub fn event_limit(&self, size: usize) -> u64 {
        match self.generations {
            Some(generations) => generations.saturating_mul(size as u64),
            None => self.max_events,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            species: vec![SpeciesConfig::default()],
        }
    }
}

impl ModelConfig {
    /// Rejects configurations that cannot describe a run at all.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.species.is_empty(), "At least one species is required");
        anyhow::ensure!(
            self.run.max_events > 0 && self.run.generations != Some(0),
            "Event limit must be positive"
        );
        for species in &self.species {
            anyhow::ensure!(
                species.size >= 2,
                "Species '{}' needs at least 2 agents",
                species.name
            );
            anyhow::ensure!(
                !species.name.trim().is_empty(),
                "Species names must not be empty"
            );
        }
        Ok(())
    }

    /// Parses and validates a TOML configuration.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str::<Self>(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Replaces unusable parameter values and reports each replacement.
    pub fn sanitize(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        for species in &mut self.species {
            species.sanitize(self.run.seed, &mut warnings);
        }
        for warning in &warnings {
            tracing::warn!(
                species = warning.species.as_deref().unwrap_or("-"),
                key = %warning.key,
                "{}",
                warning.message
            );
        }
        warnings
    }

    /// Identifies the configuration in reports.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.run).as_bytes());
        for species in &self.species {
            hasher.update(format!("{species:?}").as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

impl SpeciesConfig {
    fn warn(&self, warnings: &mut Vec<ConfigWarning>, key: &str, message: impl Into<String>) {
        warnings.push(ConfigWarning {
            species: Some(self.name.clone()),
            key: key.to_string(),
            message: message.into(),
        });
    }

    fn sanitize(&mut self, seed: u64, warnings: &mut Vec<ConfigWarning>) {
        let game = match self.game.build() {
            Ok(game) => game,
            Err(err) => {
                self.warn(warnings, "game", format!("{err}, using the default game"));
                self.game = GameSpec::default();
                match self.game.build() {
                    Ok(game) => game,
                    Err(_) => return,
                }
            }
        };
        let desc = game.descriptor().clone();

        if let Some(layout) = self.demes {
            if layout.population_size() != self.size {
                self.warn(
                    warnings,
                    "demes",
                    format!(
                        "{layout} demes hold {} agents, population size adjusted",
                        layout.population_size()
                    ),
                );
                self.size = layout.population_size();
            }
            if self.geometry != Geometry::WellMixed || self.reproduction_geometry.is_some() {
                self.warn(
                    warnings,
                    "geometry",
                    format!("geometry {} replaced by hierarchical demes", self.geometry),
                );
                self.geometry = Geometry::WellMixed;
                self.reproduction_geometry = None;
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for (key, geometry) in [
            ("geometry", Some(self.geometry)),
            ("reproduction-geometry", self.reproduction_geometry),
        ] {
            let Some(geometry) = geometry else { continue };
            if geometry == Geometry::WellMixed {
                continue;
            }
            if let Err(err) = build_graph(geometry, self.size, &mut rng) {
                self.warn(warnings, key, format!("{err}, using a well-mixed population"));
                if key == "geometry" {
                    self.geometry = Geometry::WellMixed;
                } else {
                    self.reproduction_geometry = None;
                }
            }
        }

        if self.partners == Partners::Random && self.geometry == Geometry::WellMixed {
            self.warn(
                warnings,
                "partners",
                "random partners need a graph geometry, meeting all",
            );
            self.partners = Partners::All;
        }

        let (map, notes) = FitnessMap::new(self.fitness_map, self.baseline, self.selection);
        self.baseline = map.baseline;
        self.selection = map.selection;
        for note in notes {
            self.warn(warnings, "fitnessmap", note);
        }

        if self.update == UpdateRuleKind::BestResponse
            && !desc.mean_field
            && !self.population_update.is_moran()
        {
            self.warn(
                warnings,
                "update",
                format!(
                    "best-response needs a mean-field payoff, game '{}' has none; using thermal",
                    desc.name
                ),
            );
            self.update = UpdateRuleKind::Thermal;
        }
        let (rule, notes) = UpdateRule::new(self.update, self.noise, self.error);
        self.noise = rule.noise;
        self.error = rule.error;
        for note in notes {
            self.warn(warnings, "update", note);
        }

        let (mutation, notes) =
            Mutation::new(self.mutation, self.mutation_kernel, self.mutation_range);
        self.mutation = mutation.rate;
        self.mutation_range = mutation.range;
        for note in notes {
            self.warn(warnings, "mutation", note);
        }

        let (migration, notes) = Migration::new(self.migration, self.migration_type, self.demes);
        if !notes.is_empty() {
            self.migration = migration.rate;
            self.migration_type = migration.kind;
            for note in notes {
                self.warn(warnings, "migration", note);
            }
        }
        if self.population_update == PopulationUpdate::Sync && migration.is_active() {
            self.warn(
                warnings,
                "popupdate",
                "migration requires asynchronous updates, using async",
            );
            self.population_update = PopulationUpdate::Async;
        }

        let init_problem = match &self.init {
            InitKind::Frequencies(freqs) if freqs.len() != desc.n_traits() => Some(format!(
                "{} frequencies for {} traits",
                freqs.len(),
                desc.n_traits()
            )),
            InitKind::Mono(t) if *t >= desc.n_traits() => Some(format!("unknown trait {t}")),
            InitKind::Mutant { resident, mutant }
                if *resident >= desc.n_traits() || *mutant >= desc.n_traits() =>
            {
                Some(format!("unknown trait in {}", self.init))
            }
            InitKind::Kaleidoscope if !self.geometry.is_lattice() || self.demes.is_some() => {
                Some("kaleidoscope start needs a lattice geometry".to_string())
            }
            _ => None,
        };
        if let Some(problem) = init_problem {
            self.warn(warnings, "init", format!("{problem}, using uniform"));
            self.init = InitKind::Uniform;
        }
    }

    /// Effective dynamics parameters.
    #[must_use]
    pub fn params(&self) -> SimulationParams {
        SimulationParams {
            fitness: FitnessMap::new(self.fitness_map, self.baseline, self.selection).0,
            update: UpdateRule::new(self.update, self.noise, self.error).0,
            population_update: self.population_update,
            mutation: Mutation::new(self.mutation, self.mutation_kernel, self.mutation_range).0,
            migration: Migration::new(self.migration, self.migration_type, self.demes).0,
            accounting: self.accounting,
            partners: self.partners,
            monostop: self.monostop,
            commit_noop: self.commit_noop,
        }
    }

    /// Builds the population. Random graphs, the initial configuration and
    /// sampled partners draw from `rng`, in that order.
    pub fn build<R: Rng>(&self, rng: &mut R) -> Result<Simulation> {
        let game = self.game.build()?;
        let interaction = Topology::build(self.geometry, self.size, self.demes, rng)?;
        let reproduction = match self.reproduction_geometry {
            Some(geometry) if self.demes.is_none() => {
                Some(Topology::build(geometry, self.size, None, rng)?)
            }
            _ => None,
        };
        let structure = Structure::new(interaction, reproduction);
        let traits = initial_traits(&self.init, game.descriptor(), &structure.interaction, rng)?;
        Simulation::new(self.name.clone(), game, structure, self.params(), &traits, rng)
    }
}
