//! Score-ordered leaderboard
//!
//! Candidates are picked by wins and streak, then ordered by the composite
//! score for display.

use crate::stats::record::PlayerStatsRecord;
use crate::stats::rules::ScoreWeights;
use crate::stats::score::{display_win_rate, ScoreBreakdown};
use crate::types::PlayerId;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Default number of players shown on the leaderboard
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 50;

/// One row of the leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based place on this leaderboard
    pub position: usize,
    pub player_id: PlayerId,
    pub level: u64,
    pub games_played: u64,
    pub wins: u64,
    /// Percentage, one decimal place
    pub win_rate: f64,
    pub score: u64,
    pub streak: u64,
    pub score_breakdown: ScoreBreakdown,
}

/// Description of the score weights, shown alongside the leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreInfo {
    pub win_points: u64,
    pub streak_points: u64,
    pub win_rate_bonus: String,
    pub experience_points: u64,
}

impl From<&ScoreWeights> for ScoreInfo {
    fn from(weights: &ScoreWeights) -> Self {
        Self {
            win_points: weights.win_points,
            streak_points: weights.streak_points,
            win_rate_bonus: format!("Up to {}", weights.win_rate_points),
            experience_points: weights.experience_points,
        }
    }
}

/// A built leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub players: Vec<LeaderboardEntry>,
    pub score_info: ScoreInfo,
}

impl Leaderboard {
    /// Build the leaderboard from a set of records
    ///
    /// The `limit` candidates with the most wins (then longest streak) are
    /// kept, then ordered by score. Ties keep the candidate order.
    pub fn build(
        records: &[PlayerStatsRecord],
        limit: usize,
        weights: &ScoreWeights,
    ) -> Leaderboard {
        let mut candidates: Vec<&PlayerStatsRecord> = records.iter().collect();
        candidates.sort_by_key(|record| {
            (
                Reverse(record.games_won),
                Reverse(record.current_streak),
                record.player_id.clone(),
            )
        });
        candidates.truncate(limit);

        let mut scored: Vec<(ScoreBreakdown, &PlayerStatsRecord)> = candidates
            .into_iter()
            .map(|record| (record.score_breakdown(weights), record))
            .collect();
        scored.sort_by_key(|(breakdown, _)| Reverse(breakdown.total));

        let players = scored
            .into_iter()
            .enumerate()
            .map(|(index, (breakdown, record))| LeaderboardEntry {
                position: index + 1,
                player_id: record.player_id.clone(),
                level: record.level(),
                games_played: record.games_played,
                wins: record.games_won,
                win_rate: display_win_rate(record.games_won, record.games_played),
                score: breakdown.total,
                streak: record.current_streak,
                score_breakdown: breakdown,
            })
            .collect();

        Leaderboard {
            players,
            score_info: ScoreInfo::from(weights),
        }
    }

    /// Find a player's entry, if they made the board
    pub fn entry(&self, player_id: &str) -> Option<&LeaderboardEntry> {
        self.players
            .iter()
            .find(|entry| entry.player_id == player_id)
    }
}
