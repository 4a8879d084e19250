//! Performance benchmarks for ranking updates and leaderboard reads

use arena_standings::leaderboard::Leaderboard;
use arena_standings::stats::{
    InMemoryStatsStorage, PlayerStatsRecord, RankingEngine, RankingRules, ScoreWeights,
};
use arena_standings::types::{MatchCompleted, MatchOutcome};
use arena_standings::utils::{current_timestamp, generate_game_id};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn seeded_records(count: usize) -> Vec<PlayerStatsRecord> {
    let rules = RankingRules::default();
    (0..count)
        .map(|i| {
            let mut record = PlayerStatsRecord::new(format!("player_{}", i));
            for game in 0..(i % 17) {
                let outcome = if (game + i) % 3 == 0 {
                    MatchOutcome::Loss
                } else {
                    MatchOutcome::Win
                };
                record.apply_match_result(outcome, &rules);
            }
            record
        })
        .collect()
}

fn create_bench_engine(players: usize) -> RankingEngine {
    let storage = Arc::new(InMemoryStatsStorage::with_records(seeded_records(players)));
    RankingEngine::new(storage, RankingRules::default(), ScoreWeights::default())
}

fn bench_record_transformation(c: &mut Criterion) {
    let rules = RankingRules::default();

    c.bench_function("record_apply_win_loss", |b| {
        b.iter(|| {
            let mut record = PlayerStatsRecord::new("bench_player");
            record.apply_match_result(black_box(MatchOutcome::Win), &rules);
            record.apply_match_result(black_box(MatchOutcome::Loss), &rules);
            black_box(record)
        })
    });
}

fn bench_apply_match_result(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let engine = create_bench_engine(1_000);
    let player_id = "player_42".to_string();

    c.bench_function("engine_apply_match_result", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(
                    engine
                        .apply_match_result(&player_id, MatchOutcome::Win)
                        .await,
                )
            })
        })
    });
}

fn bench_record_match(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let engine = create_bench_engine(1_000);

    c.bench_function("engine_record_match", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = MatchCompleted {
                    game_id: generate_game_id(),
                    game_type: "bench".to_string(),
                    winner_id: "player_7".to_string(),
                    loser_id: "player_8".to_string(),
                    completed_at: current_timestamp(),
                };
                black_box(engine.record_match(&result).await)
            })
        })
    });
}

fn bench_leaderboard_build(c: &mut Criterion) {
    let records = seeded_records(10_000);
    let weights = ScoreWeights::default();

    c.bench_function("leaderboard_build_10k_top_50", |b| {
        b.iter(|| black_box(Leaderboard::build(&records, 50, &weights)))
    });
}

fn bench_refresh_positions(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("refresh_positions_1k", |b| {
        b.iter(|| {
            rt.block_on(async {
                let engine = create_bench_engine(1_000);
                black_box(engine.refresh_positions().await)
            })
        })
    });
}

criterion_group!(
    benches,
    bench_record_transformation,
    bench_apply_match_result,
    bench_record_match,
    bench_leaderboard_build,
    bench_refresh_positions
);
criterion_main!(benches);
