//! Per-player statistics record and the match-result transformation

use crate::stats::rules::{RankingRules, ScoreWeights};
use crate::stats::score::{self, ScoreBreakdown};
use crate::types::{MatchOutcome, PlayerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics owned by one player
///
/// Counters only ever move through [`PlayerStatsRecord::apply_match_result`].
/// Derived values (`score`, `win_rate`, `level`) are methods, never fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatsRecord {
    pub player_id: PlayerId,
    pub games_played: u64,
    pub games_won: u64,
    pub games_lost: u64,
    pub current_streak: u64,
    pub rank: u64,
    pub peak_rank: u64,
    pub leaderboard_position: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlayerStatsRecord {
    /// Zero-valued record for a newly registered player
    pub fn new(player_id: impl Into<PlayerId>) -> Self {
        let now = Utc::now();
        Self {
            player_id: player_id.into(),
            games_played: 0,
            games_won: 0,
            games_lost: 0,
            current_streak: 0,
            rank: 0,
            peak_rank: 0,
            leaderboard_position: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply one completed match to this record and return the rank delta
    ///
    /// The streak is updated before the win bonus is computed, so the first
    /// win of a streak is worth `win_base_points + streak_step_points`.
    pub fn apply_match_result(&mut self, outcome: MatchOutcome, rules: &RankingRules) -> i64 {
        let rank_before = self.rank;

        self.games_played = self.games_played.saturating_add(1);

        match outcome {
            MatchOutcome::Win => {
                self.games_won = self.games_won.saturating_add(1);
                self.current_streak = self.current_streak.saturating_add(1);
                self.rank = self
                    .rank
                    .saturating_add(rules.win_points(self.current_streak));
            }
            MatchOutcome::Loss => {
                self.games_lost = self.games_lost.saturating_add(1);
                self.current_streak = 0;
                self.rank = self.rank.saturating_sub(rules.loss_penalty);
            }
        }

        if self.rank > self.peak_rank {
            self.peak_rank = self.rank;
        }

        self.updated_at = Utc::now();

        self.rank as i64 - rank_before as i64
    }

    /// Consuming form of [`apply_match_result`](Self::apply_match_result)
    pub fn with_match_result(mut self, outcome: MatchOutcome, rules: &RankingRules) -> Self {
        self.apply_match_result(outcome, rules);
        self
    }

    pub fn win_rate(&self) -> f64 {
        score::win_rate_percent(self.games_won, self.games_played)
    }

    pub fn score(&self, weights: &ScoreWeights) -> u64 {
        score::composite_score(
            self.games_won,
            self.current_streak,
            self.games_played,
            weights,
        )
    }

    pub fn score_breakdown(&self, weights: &ScoreWeights) -> ScoreBreakdown {
        score::score_breakdown(
            self.games_won,
            self.current_streak,
            self.games_played,
            weights,
        )
    }

    pub fn level(&self) -> u64 {
        score::level(self.rank)
    }

    /// Attach the derived score and win rate for serialization
    pub fn ranked(self, weights: &ScoreWeights) -> RankedStats {
        RankedStats {
            score: self.score(weights),
            win_rate: self.win_rate(),
            record: self,
        }
    }

    /// Check the counter invariants that must hold between any two updates
    pub fn is_consistent(&self) -> bool {
        self.games_played == self.games_won.saturating_add(self.games_lost)
            && self.peak_rank >= self.rank
            && self.current_streak <= self.games_won
    }
}

/// A record as served in listings and events: stored fields plus derived values
///
/// Built on demand from the record; the derived values are never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStats {
    #[serde(flatten)]
    pub record: PlayerStatsRecord,
    pub score: u64,
    pub win_rate: f64,
}
