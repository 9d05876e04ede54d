//! SARSA driven through the training loop.

use snake_world_core::{
    agent::Agent,
    config::{SarsaConfig, WorldConfig},
    environment::{GridSimulation, Outcome},
    food::FoodSpawner,
    qtable::QTable,
    sarsa::{EpisodePhase, SarsaAgent},
    training::TrainingLoop,
};

fn world(seed: u64) -> GridSimulation {
    GridSimulation::new(&WorldConfig {
        seed: Some(seed),
        ..WorldConfig::default()
    })
}

fn trainer(seed: u64) -> SarsaAgent {
    SarsaAgent::new(SarsaConfig {
        seed: Some(seed),
        ..SarsaConfig::default()
    })
}

#[test]
fn test_training_fills_table_and_keeps_invariants() {
    let mut training = TrainingLoop::new(world(1), trainer(2));
    let mut crashes = 0;
    while training.stats().ticks < 20_000 {
        let report = training.tick();
        match report.outcome {
            Outcome::ReachedFood => {
                let simulation = training.simulation();
                assert!(FoodSpawner::is_valid_spot(simulation.snake(), simulation.food()));
            }
            outcome if outcome.is_crash() => {
                crashes += 1;
                assert!(report.episode_finished);
                assert_eq!(training.agent().phase(), EpisodePhase::EpisodeEnd);
                assert_eq!(training.simulation().snake().len(), 1);
            }
            _ => assert!(!report.episode_finished),
        }
    }

    let stats = training.stats();
    assert_eq!(stats.rounds, crashes);
    assert!(stats.rounds > 0);
    assert!(stats.foods > 0);
    assert!(stats.high_score >= 1);
    assert!(!training.agent().table().is_empty());
    // Egocentric keys: 3^3 obstacle codes x 2^4 food flags at most.
    assert!(training.agent().table().len() <= 27 * 16);
}

#[test]
fn test_learned_table_round_trips_through_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sarsa.json");

    let mut training = TrainingLoop::new(world(3), trainer(4).save_to(&path));
    training.run_until(|stats| stats.rounds >= 50 || stats.ticks >= 50_000);
    let learned = training.agent().table().clone();
    training.shutdown().unwrap();
    drop(training);

    let reloaded = QTable::load(&path).unwrap();
    assert_eq!(reloaded.len(), learned.len());
    for (key, row) in learned.iter() {
        let other = reloaded.row(key);
        for (a, b) in row.iter().zip(other.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}

#[test]
fn test_evaluation_mode_leaves_table_untouched() {
    let mut seeded = TrainingLoop::new(world(5), trainer(6));
    seeded.run_until(|stats| stats.rounds >= 30 || stats.ticks >= 50_000);
    let learned = seeded.agent().table().clone();
    assert!(!learned.is_empty());
    drop(seeded);

    let agent = SarsaAgent::with_table(
        SarsaConfig {
            seed: Some(7),
            ..SarsaConfig::evaluation()
        },
        learned.clone(),
    );
    assert_eq!(agent.epsilon(), 0.0);
    assert_eq!(agent.name(), "SARSA (evaluation)");

    let mut evaluation = TrainingLoop::new(world(8), agent);
    evaluation.run_until(|stats| stats.ticks >= 2_000);
    assert_eq!(evaluation.agent().table(), &learned);
}
