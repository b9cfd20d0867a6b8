mod common;

use common::{SimulationBuilder, PRISONERS_DILEMMA};
use ludus_core::game::{GameSpec, PayoffTerm, Role};
use ludus_core::ConvergenceState;
use ludus_core::game::Game;
use ludus_data::{
    Accounting, Geometry, InitKind, MigrationKind, Partners, PopulationUpdate, UpdateRuleKind,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[test]
fn test_monomorphic_start_reported_before_any_update() {
    let (mut sim, mut rng) = SimulationBuilder::new()
        .with_matrix(&PRISONERS_DILEMMA)
        .size(100)
        .init(InitKind::Mono(0))
        .update(UpdateRuleKind::Thermal, 0.1)
        .build();
    assert_eq!(sim.state(), ConvergenceState::Monomorphic { trait_index: 0 });
    assert_eq!(sim.events(), 0);

    let before = rng.clone();
    sim.step(&mut rng).unwrap();
    assert_eq!(rng, before, "a finished run must not draw");
    assert_eq!(sim.trait_counts(), &[100, 0]);
}

#[test]
fn test_homogeneous_demes_without_mutation_or_migration_are_absorbed() {
    let (mut sim, mut rng) = SimulationBuilder::new()
        .with_matrix(&PRISONERS_DILEMMA)
        .demes(4, 25)
        .init(InitKind::Mono(0))
        .build();
    let traits: Vec<usize> = (0..100).map(|agent| (agent / 25) % 2).collect();
    sim.reset(&traits, &mut rng).unwrap();
    assert_eq!(sim.state(), ConvergenceState::Absorbed);
    assert!(sim.is_finished());
    let demes = sim.deme_counts().unwrap();
    assert_eq!(demes.deme(0), &[25, 0]);
    assert_eq!(demes.deme(1), &[0, 25]);
}

#[test]
fn test_homogeneous_demes_with_migration_keep_running() {
    let (mut sim, mut rng) = SimulationBuilder::new()
        .with_matrix(&PRISONERS_DILEMMA)
        .demes(4, 25)
        .init(InitKind::Mono(0))
        .migration(0.001, MigrationKind::DeathBirth)
        .build();
    let traits: Vec<usize> = (0..100).map(|agent| (agent / 25) % 2).collect();
    sim.reset(&traits, &mut rng).unwrap();
    assert_eq!(sim.state(), ConvergenceState::HomogeneousDemes);

    let state = sim.run(100_000_000, &mut rng).unwrap();
    assert!(matches!(state, ConvergenceState::Monomorphic { .. }));
    assert!(sim.metrics().skipped_events > 0);
    assert!(sim.is_consistent());
}

#[test]
fn test_lattice_run_keeps_counts_consistent() {
    let (mut sim, mut rng) = SimulationBuilder::new()
        .with_seed(11)
        .with_matrix(&PRISONERS_DILEMMA)
        .size(400)
        .geometry(Geometry::VonNeumann)
        .init(InitKind::Frequencies(vec![0.5, 0.5]))
        .update(UpdateRuleKind::Thermal, 0.1)
        .mutation(0.001)
        .build();
    sim.run(50_000, &mut rng).unwrap();
    assert_eq!(sim.events(), 50_000);
    assert_eq!(sim.trait_counts().iter().sum::<usize>(), 400);
    assert!(sim.is_consistent());
}

#[test]
fn test_public_goods_with_loners_and_vacancy() {
    let game = GameSpec::PublicGoods {
        roles: vec![Role::Defector, Role::Cooperator, Role::Loner, Role::Vacant],
        group_size: 5,
        multiplier: 3.0,
        cost: 1.0,
        loner_payoff: 0.3,
        terms: vec![PayoffTerm::ParticipationCost { cost: 0.05 }],
    };
    let (mut sim, mut rng) = SimulationBuilder::new()
        .with_seed(5)
        .with_game(game)
        .size(100)
        .geometry(Geometry::VonNeumann)
        .init(InitKind::Frequencies(vec![0.3, 0.3, 0.3, 0.1]))
        .update(UpdateRuleKind::Imitate, 0.5)
        .mutation(0.001)
        .build();
    let vacant = sim.trait_counts()[3];
    sim.run(20_000, &mut rng).unwrap();
    // empty sites get colonised but agents never copy or mutate into them
    assert!(sim.trait_counts()[3] <= vacant);
    assert_eq!(sim.population().active_count(), 100 - sim.trait_counts()[3]);
    assert!(sim.is_consistent());
}

#[test]
fn test_moran_death_birth_on_cycle() {
    let (mut sim, _) = SimulationBuilder::new()
        .with_game(GameSpec::Constant {
            payoffs: vec![1.0, 2.0],
        })
        .size(20)
        .geometry(Geometry::Linear { k: 2 })
        .population_update(PopulationUpdate::MoranDeathBirth)
        .init(InitKind::Mutant {
            resident: 0,
            mutant: 1,
        })
        .build();
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let state = sim.run(10_000_000, &mut rng).unwrap();
    assert!(matches!(state, ConvergenceState::Monomorphic { .. }));
    assert_eq!(sim.trait_counts().iter().sum::<usize>(), 20);
}

#[test]
fn test_structured_group_scores_respect_declared_range() {
    for partners in [Partners::All, Partners::Random] {
        let (mut sim, mut rng) = SimulationBuilder::new()
            .with_seed(21)
            .with_game(GameSpec::PublicGoods {
                roles: vec![Role::Defector, Role::Punisher],
                group_size: 3,
                multiplier: 3.0,
                cost: 1.0,
                loner_payoff: 0.0,
                terms: vec![PayoffTerm::Punishment {
                    fine: 1.0,
                    cost: 0.1,
                }],
            })
            .size(25)
            .geometry(Geometry::Moore)
            .init(InitKind::Frequencies(vec![0.5, 0.5]))
            .with_config(|c| {
                c.accounting = Accounting::Averaged;
                c.partners = partners;
            })
            .mutation(0.01)
            .build();
        let (lo, hi) = (sim.game().min_payoff(), sim.game().max_payoff());
        for _ in 0..2_000 {
            sim.step(&mut rng).unwrap();
            for agent in 0..25 {
                let score = sim.score_of(agent);
                assert!(
                    score >= lo - 1e-9 && score <= hi + 1e-9,
                    "score {score} outside [{lo}, {hi}]"
                );
            }
        }
    }
}

#[test]
fn test_random_partners_replay_from_seed() {
    let run = |seed| {
        let (mut sim, mut rng) = SimulationBuilder::new()
            .with_seed(seed)
            .with_matrix(&PRISONERS_DILEMMA)
            .size(49)
            .geometry(Geometry::VonNeumann)
            .init(InitKind::Frequencies(vec![0.5, 0.5]))
            .with_config(|c| c.partners = Partners::Random)
            .build();
        sim.record_flips(true);
        sim.run(2_000, &mut rng).unwrap();
        assert!(sim.is_consistent());
        sim.flips().unwrap().to_vec()
    };
    assert_eq!(run(8), run(8));
}
