use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ludus_core::config::SpeciesConfig;
use ludus_core::dynamics::replicator_derivatives;
use ludus_core::fitness::FitnessMap;
use ludus_core::game::{GameSpec, MatrixGame, PayoffTerm, Role};
use ludus_data::{Geometry, InitKind};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn species(geometry: Geometry, size: usize, game: GameSpec) -> SpeciesConfig {
    SpeciesConfig {
        name: "bench".to_string(),
        game,
        size,
        geometry,
        init: InitKind::Frequencies(vec![0.5, 0.5]),
        noise: 0.1,
        mutation: 0.001,
        ..Default::default()
    }
}

fn bench_lattice_events(c: &mut Criterion) {
    let config = species(Geometry::VonNeumann, 10_000, GameSpec::default());
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut sim = config.build(&mut rng).unwrap();

    c.bench_function("lattice_pd_1000_events", |b| {
        b.iter(|| {
            for _ in 0..1000 {
                sim.step(&mut rng).unwrap();
            }
            black_box(sim.trait_counts()[0])
        })
    });
}

fn bench_well_mixed_events(c: &mut Criterion) {
    let config = species(Geometry::WellMixed, 10_000, GameSpec::default());
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut sim = config.build(&mut rng).unwrap();

    c.bench_function("well_mixed_pd_1000_events", |b| {
        b.iter(|| {
            for _ in 0..1000 {
                sim.step(&mut rng).unwrap();
            }
            black_box(sim.trait_counts()[0])
        })
    });
}

fn bench_group_game_events(c: &mut Criterion) {
    let game = GameSpec::PublicGoods {
        roles: vec![Role::Defector, Role::Cooperator],
        group_size: 5,
        multiplier: 3.0,
        cost: 1.0,
        loner_payoff: 0.0,
        terms: Vec::<PayoffTerm>::new(),
    };
    let config = species(Geometry::VonNeumann, 2_500, game);
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut sim = config.build(&mut rng).unwrap();

    c.bench_function("lattice_public_goods_1000_events", |b| {
        b.iter(|| {
            for _ in 0..1000 {
                sim.step(&mut rng).unwrap();
            }
            black_box(sim.trait_counts()[0])
        })
    });
}

fn bench_replicator_derivatives(c: &mut Criterion) {
    let game = MatrixGame::new(vec![
        vec![0.0, -1.0, 1.0],
        vec![1.0, 0.0, -1.0],
        vec![-1.0, 1.0, 0.0],
    ])
    .unwrap();
    let map = FitnessMap::default();
    let mut state = [0.2, 0.3, 0.5];
    let mut fitness = [0.0; 3];
    let mut change = [0.0; 3];

    c.bench_function("replicator_derivatives_rps", |b| {
        b.iter(|| {
            replicator_derivatives(&game, &map, 0.0, &mut state, &mut fitness, &mut change)
                .unwrap();
            black_box(change[0])
        })
    });
}

criterion_group!(
    benches,
    bench_lattice_events,
    bench_well_mixed_events,
    bench_group_game_events,
    bench_replicator_derivatives
);
criterion_main!(benches);
