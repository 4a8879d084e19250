//! Property tests for the stats record transformation and derived values

use arena_standings::stats::{
    composite_score, display_win_rate, level, PlayerStatsRecord, RankingRules, ScoreWeights,
};
use arena_standings::types::MatchOutcome;
use proptest::prelude::*;

fn outcome_strategy() -> impl Strategy<Value = MatchOutcome> {
    prop_oneof![Just(MatchOutcome::Win), Just(MatchOutcome::Loss)]
}

fn rules_strategy() -> impl Strategy<Value = RankingRules> {
    (1u64..100, 0u64..20, 0u64..60, 0u64..80).prop_map(
        |(win_base_points, streak_step_points, streak_bonus_cap, loss_penalty)| RankingRules {
            win_base_points,
            streak_step_points,
            streak_bonus_cap,
            loss_penalty,
        },
    )
}

proptest! {
    #[test]
    fn counters_stay_consistent(history in prop::collection::vec(outcome_strategy(), 0..200)) {
        let rules = RankingRules::default();
        let mut record = PlayerStatsRecord::new("prop_player");

        let mut previous_peak = record.peak_rank;

        for outcome in &history {
            record.apply_match_result(*outcome, &rules);
            prop_assert!(record.is_consistent());
            prop_assert!(record.peak_rank >= previous_peak);
            previous_peak = record.peak_rank;
            prop_assert_eq!(record.games_played, record.games_won + record.games_lost);
            prop_assert!(record.peak_rank >= record.rank);
        }

        prop_assert_eq!(record.games_played, history.len() as u64);
    }

    #[test]
    fn peak_rank_never_decreases(
        rules in rules_strategy(),
        history in prop::collection::vec(outcome_strategy(), 1..200),
    ) {
        let mut record = PlayerStatsRecord::new("prop_player");
        let mut highest_seen = 0;

        for outcome in history {
            let peak_before = record.peak_rank;
            record.apply_match_result(outcome, &rules);
            prop_assert!(record.peak_rank >= peak_before);

            highest_seen = highest_seen.max(record.rank);
            prop_assert_eq!(record.peak_rank, highest_seen);
        }
    }

    #[test]
    fn streak_counts_trailing_wins(history in prop::collection::vec(outcome_strategy(), 0..100)) {
        let rules = RankingRules::default();
        let mut record = PlayerStatsRecord::new("prop_player");
        for outcome in &history {
            record.apply_match_result(*outcome, &rules);
        }

        let trailing_wins = history
            .iter()
            .rev()
            .take_while(|outcome| **outcome == MatchOutcome::Win)
            .count() as u64;
        prop_assert_eq!(record.current_streak, trailing_wins);
    }

    #[test]
    fn rank_delta_is_bounded(
        rules in rules_strategy(),
        history in prop::collection::vec(outcome_strategy(), 1..100),
    ) {
        let mut record = PlayerStatsRecord::new("prop_player");

        for outcome in history {
            let rank_before = record.rank;
            let delta = record.apply_match_result(outcome, &rules);
            prop_assert_eq!(record.rank as i64 - rank_before as i64, delta);

            match outcome {
                MatchOutcome::Win => {
                    prop_assert!(delta >= rules.win_base_points as i64);
                    prop_assert!(delta <= rules.max_win_points() as i64);
                }
                MatchOutcome::Loss => {
                    prop_assert!(delta <= 0);
                    prop_assert!(-delta <= rules.loss_penalty as i64);
                    prop_assert_eq!(record.current_streak, 0);
                }
            }
        }
    }

    #[test]
    fn derived_values_depend_only_on_counters(
        games_won in 0u64..10_000,
        games_lost in 0u64..10_000,
        streak_seed in 0u64..10_000,
    ) {
        let weights = ScoreWeights::default();
        let games_played = games_won + games_lost;
        let current_streak = if games_won == 0 { 0 } else { streak_seed % (games_won + 1) };

        let first = composite_score(games_won, current_streak, games_played, &weights);
        let second = composite_score(games_won, current_streak, games_played, &weights);
        prop_assert_eq!(first, second);

        let win_rate = display_win_rate(games_won, games_played);
        prop_assert!((0.0..=100.0).contains(&win_rate));

        let more_wins = composite_score(games_won + 1, current_streak, games_played + 1, &weights);
        prop_assert!(more_wins > first);
    }

    #[test]
    fn level_grows_with_rank(rank in 0u64..1_000_000) {
        prop_assert!(level(rank) >= 1);
        prop_assert!(level(rank + 100) == level(rank) + 1);
    }
}
