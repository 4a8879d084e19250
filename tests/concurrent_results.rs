//! Concurrency tests for match results arriving in parallel

mod fixtures;

use arena_standings::amqp::handlers::dispatch_message;
use arena_standings::types::MatchOutcome;
use futures::future::join_all;
use std::sync::Arc;

use fixtures::{
    create_engine_with_records, create_test_system, match_between, match_message,
    record_with_history,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_results_for_one_player_are_all_applied() {
    let players: Vec<_> = (0..20)
        .map(|i| record_with_history(&format!("opponent_{}", i), &[]))
        .chain(std::iter::once(record_with_history("hub", &[])))
        .collect();
    let engine = create_engine_with_records(players);

    let tasks = (0..20).map(|i| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let result = if i % 2 == 0 {
                match_between("hub", &format!("opponent_{}", i))
            } else {
                match_between(&format!("opponent_{}", i), "hub")
            };
            engine.record_match(&result).await
        })
    });

    for outcome in join_all(tasks).await {
        outcome.unwrap().unwrap();
    }

    let hub = engine.get_stats(&"hub".to_string()).await.unwrap();
    assert_eq!(hub.games_played, 20);
    assert_eq!(hub.games_won, 10);
    assert_eq!(hub.games_lost, 10);
    assert!(hub.is_consistent());

    let stats = engine.engine_stats().await.unwrap();
    assert_eq!(stats.matches_recorded, 20);
    assert_eq!(stats.tracked_players, 21);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_wins_accumulate_rank() {
    let engine = create_engine_with_records(vec![record_with_history("solo", &[])]);
    let player = "solo".to_string();

    let results = join_all(
        (0..10).map(|_| engine.apply_match_result(&player, MatchOutcome::Win)),
    )
    .await;
    assert!(results.iter().all(|result| result.is_ok()));

    // 30 + 35 + 40 + 45 + 50 * 6, whatever order the locks were taken in
    let solo = engine.get_stats(&player).await.unwrap();
    assert_eq!(solo.rank, 450);
    assert_eq!(solo.current_streak, 10);
    assert_eq!(solo.peak_rank, 450);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_deliveries_provision_each_player_once() {
    let system = create_test_system();

    let deliveries = (0..16).map(|i| {
        let handler = Arc::clone(&system.handler);
        tokio::spawn(async move {
            let message = match_message(&format!("newcomer_{}", i % 4), "gatekeeper");
            dispatch_message(handler.as_ref(), &message).await
        })
    });

    for outcome in join_all(deliveries).await {
        outcome.unwrap().unwrap();
    }

    let stats = system.engine.engine_stats().await.unwrap();
    assert_eq!(stats.tracked_players, 5);
    assert_eq!(stats.players_provisioned, 5);

    let gatekeeper = system
        .engine
        .get_stats(&"gatekeeper".to_string())
        .await
        .unwrap();
    assert_eq!(gatekeeper.games_lost, 16);
    assert_eq!(system.publisher.stats_updates().len(), 32);
}

#[test]
fn test_record_match_blocking_from_sync_context() {
    let engine = create_engine_with_records(vec![
        record_with_history("left", &[]),
        record_with_history("right", &[]),
    ]);

    let settlement =
        tokio_test::block_on(engine.record_match(&match_between("left", "right"))).unwrap();
    assert_eq!(settlement.winner.updated.rank, 30);
    assert_eq!(settlement.loser.updated.rank, 0);
}
