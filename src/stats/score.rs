//! Derived values computed from a stats record on every read
//!
//! Nothing here is stored. Each function takes the base counters it depends
//! on, so a caller can never read a value that is stale relative to them.

use crate::stats::rules::ScoreWeights;
use serde::{Deserialize, Serialize};

/// Win rate as a percentage in `[0, 100]`, or 0 before the first game
pub fn win_rate_percent(games_won: u64, games_played: u64) -> f64 {
    if games_played == 0 {
        return 0.0;
    }
    (games_won as f64 / games_played as f64) * 100.0
}

/// Win rate rounded to one decimal place, for display
pub fn display_win_rate(games_won: u64, games_played: u64) -> f64 {
    (win_rate_percent(games_won, games_played) * 10.0).round() / 10.0
}

/// Per-component contributions to the composite score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub wins: u64,
    pub streak: u64,
    pub win_rate: u64,
    pub experience: u64,
    pub total: u64,
}

/// Split the composite score into its components
pub fn score_breakdown(
    games_won: u64,
    current_streak: u64,
    games_played: u64,
    weights: &ScoreWeights,
) -> ScoreBreakdown {
    let wins = games_won.saturating_mul(weights.win_points);
    let streak = current_streak.saturating_mul(weights.streak_points);
    let win_rate = if games_played == 0 {
        0
    } else {
        let ratio = games_won as f64 / games_played as f64;
        (ratio * weights.win_rate_points as f64).round() as u64
    };
    let experience = games_played.saturating_mul(weights.experience_points);

    ScoreBreakdown {
        wins,
        streak,
        win_rate,
        experience,
        total: wins
            .saturating_add(streak)
            .saturating_add(win_rate)
            .saturating_add(experience),
    }
}

/// Composite display score
pub fn composite_score(
    games_won: u64,
    current_streak: u64,
    games_played: u64,
    weights: &ScoreWeights,
) -> u64 {
    score_breakdown(games_won, current_streak, games_played, weights).total
}

/// Display level derived from rank points: one level per 100 points, from 1
pub fn level(rank: u64) -> u64 {
    rank / 100 + 1
}
