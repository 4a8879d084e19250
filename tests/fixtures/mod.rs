//! Test fixtures shared by the integration tests

#![allow(dead_code)]

use arena_standings::amqp::messages::MessageUtils;
use arena_standings::amqp::publisher::MockEventPublisher;
use arena_standings::metrics::MetricsCollector;
use arena_standings::service::StatsUpdateHandler;
use arena_standings::stats::{
    InMemoryStatsStorage, PlayerStatsRecord, RankingEngine, RankingRules, ScoreWeights,
};
use arena_standings::types::{AmqpMessage, MatchCompleted, MatchOutcome, OutcomeReported};
use arena_standings::utils::{current_timestamp, generate_game_id};
use std::sync::Arc;

/// Engine over empty in-memory storage with default rules
pub fn create_test_engine() -> Arc<RankingEngine> {
    create_engine_with_records(Vec::new())
}

/// Engine over in-memory storage preloaded with `records`
pub fn create_engine_with_records(records: Vec<PlayerStatsRecord>) -> Arc<RankingEngine> {
    Arc::new(RankingEngine::new(
        Arc::new(InMemoryStatsStorage::with_records(records)),
        RankingRules::default(),
        ScoreWeights::default(),
    ))
}

/// A complete consumer-side system: engine, handler and a capturing publisher
pub struct TestSystem {
    pub engine: Arc<RankingEngine>,
    pub handler: Arc<StatsUpdateHandler>,
    pub publisher: Arc<MockEventPublisher>,
}

pub fn create_test_system() -> TestSystem {
    let engine = create_test_engine();
    let publisher = Arc::new(MockEventPublisher::new());
    let metrics = Arc::new(MetricsCollector::default());
    let handler = Arc::new(StatsUpdateHandler::new(
        engine.clone(),
        publisher.clone(),
        metrics,
    ));

    TestSystem {
        engine,
        handler,
        publisher,
    }
}

/// Record for `player_id` after playing `history` in order from zero
pub fn record_with_history(player_id: &str, history: &[MatchOutcome]) -> PlayerStatsRecord {
    let rules = RankingRules::default();
    history
        .iter()
        .fold(PlayerStatsRecord::new(player_id), |record, outcome| {
            record.with_match_result(*outcome, &rules)
        })
}

pub fn match_between(winner: &str, loser: &str) -> MatchCompleted {
    MatchCompleted {
        game_id: generate_game_id(),
        game_type: "tic-tac-toe".to_string(),
        winner_id: winner.to_string(),
        loser_id: loser.to_string(),
        completed_at: current_timestamp(),
    }
}

pub fn outcome_for(player: &str, outcome: MatchOutcome) -> OutcomeReported {
    OutcomeReported {
        game_id: generate_game_id(),
        player_id: player.to_string(),
        outcome,
        reported_at: current_timestamp(),
    }
}

/// Wire bytes of a MatchCompleted message, as the match resolver sends them
pub fn match_message(winner: &str, loser: &str) -> Vec<u8> {
    MessageUtils::serialize_message(&AmqpMessage::MatchCompleted(match_between(winner, loser)))
        .expect("match message serializes")
}

/// Wire bytes of an OutcomeReported message with an arbitrary outcome string
pub fn raw_outcome_message(player: &str, outcome: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "type": "OutcomeReported",
        "game_id": generate_game_id(),
        "player_id": player,
        "outcome": outcome,
        "reported_at": current_timestamp(),
    }))
    .expect("outcome message serializes")
}
