//! Point values for rank changes and the composite score

use crate::error::{Result, StandingsError};
use serde::{Deserialize, Serialize};

/// How many rank points a win earns and a loss costs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingRules {
    /// Flat points for any win
    pub win_base_points: u64,
    /// Extra points per game of the current streak (streak counted after the win)
    pub streak_step_points: u64,
    /// Upper bound on the streak extra
    pub streak_bonus_cap: u64,
    /// Points removed on a loss, floored at zero rank
    pub loss_penalty: u64,
}

impl Default for RankingRules {
    fn default() -> Self {
        Self {
            win_base_points: 25,
            streak_step_points: 5,
            streak_bonus_cap: 25,
            loss_penalty: 15,
        }
    }
}

impl RankingRules {
    /// Streak extra for a win that brought the streak to `current_streak`
    pub fn streak_bonus(&self, current_streak: u64) -> u64 {
        current_streak
            .saturating_mul(self.streak_step_points)
            .min(self.streak_bonus_cap)
    }

    /// Total rank points for a win that brought the streak to `current_streak`
    pub fn win_points(&self, current_streak: u64) -> u64 {
        self.win_base_points
            .saturating_add(self.streak_bonus(current_streak))
    }

    /// Largest rank gain a single win can produce
    pub fn max_win_points(&self) -> u64 {
        self.win_base_points.saturating_add(self.streak_bonus_cap)
    }

    pub fn validate(&self) -> Result<()> {
        if self.win_base_points == 0 {
            return Err(StandingsError::ConfigurationError {
                message: "Win base points must be greater than 0".to_string(),
            }
            .into());
        }
        if self.streak_step_points > 0 && self.streak_bonus_cap == 0 {
            return Err(StandingsError::ConfigurationError {
                message: "Streak bonus cap must be greater than 0 when streak points are awarded"
                    .to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Weights of the composite display score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Points per game won
    pub win_points: u64,
    /// Points per game of the current streak
    pub streak_points: u64,
    /// Points for a perfect win rate, scaled linearly
    pub win_rate_points: u64,
    /// Points per game played
    pub experience_points: u64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            win_points: 50,
            streak_points: 10,
            win_rate_points: 100,
            experience_points: 5,
        }
    }
}
