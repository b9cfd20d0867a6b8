use ludus_core::config::SpeciesConfig;
use ludus_core::game::GameSpec;
use ludus_core::Simulation;
use ludus_data::{DemeLayout, Geometry, InitKind, MigrationKind, PopulationUpdate, UpdateRuleKind};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[allow(dead_code)]
pub const PRISONERS_DILEMMA: [[f64; 2]; 2] = [[3.0, 0.0], [5.0, 1.0]];

#[allow(dead_code)]
pub struct SimulationBuilder {
    config: SpeciesConfig,
    seed: u64,
}

#[allow(dead_code)]
impl SimulationBuilder {
    pub fn new() -> Self {
        Self {
            config: SpeciesConfig {
                name: "test".to_string(),
                ..Default::default()
            },
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_matrix(mut self, payoffs: &[[f64; 2]; 2]) -> Self {
        self.config.game = GameSpec::Matrix {
            payoffs: payoffs.iter().map(|row| row.to_vec()).collect(),
        };
        self
    }

    pub fn with_game(mut self, game: GameSpec) -> Self {
        self.config.game = game;
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.config.size = size;
        self
    }

    pub fn geometry(mut self, geometry: Geometry) -> Self {
        self.config.geometry = geometry;
        self
    }

    pub fn demes(mut self, count: usize, size: usize) -> Self {
        self.config.demes = Some(DemeLayout { count, size });
        self.config.size = count * size;
        self
    }

    pub fn init(mut self, init: InitKind) -> Self {
        self.config.init = init;
        self
    }

    pub fn update(mut self, update: UpdateRuleKind, noise: f64) -> Self {
        self.config.update = update;
        self.config.noise = noise;
        self
    }

    pub fn population_update(mut self, kind: PopulationUpdate) -> Self {
        self.config.population_update = kind;
        self
    }

    pub fn mutation(mut self, rate: f64) -> Self {
        self.config.mutation = rate;
        self
    }

    pub fn migration(mut self, rate: f64, kind: MigrationKind) -> Self {
        self.config.migration = rate;
        self.config.migration_type = kind;
        self
    }

    pub fn with_config<F>(mut self, modifier: F) -> Self
    where
        F: FnOnce(&mut SpeciesConfig),
    {
        modifier(&mut self.config);
        self
    }

    /// Builds the simulation and the generator that continues its draws.
    pub fn build(self) -> (Simulation, ChaCha8Rng) {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let sim = self
            .config
            .build(&mut rng)
            .expect("Failed to build simulation in test builder");
        (sim, rng)
    }
}
