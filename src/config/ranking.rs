//! Ranking and leaderboard configuration

use crate::leaderboard::{DEFAULT_LEADERBOARD_LIMIT, DEFAULT_PAGE_SIZE, DEFAULT_TOP_PLAYERS};
use crate::stats::{RankingRules, ScoreWeights};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Ranking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingSettings {
    /// Rank points per win and loss
    pub rules: RankingRules,
    /// Composite score weights
    pub weights: ScoreWeights,
    /// Players shown on the leaderboard
    pub leaderboard_limit: usize,
    /// Default size of the top-players list
    pub top_players: usize,
    /// Default page size of the rank listing
    pub page_size: usize,
    /// How often leaderboard positions are recomputed
    pub position_refresh_interval_seconds: u64,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            rules: RankingRules::default(),
            weights: ScoreWeights::default(),
            leaderboard_limit: DEFAULT_LEADERBOARD_LIMIT,
            top_players: DEFAULT_TOP_PLAYERS,
            page_size: DEFAULT_PAGE_SIZE,
            position_refresh_interval_seconds: 60,
        }
    }
}

fn env_override<T: FromStr>(name: &str, target: &mut T) -> Result<()> {
    if let Ok(value) = env::var(name) {
        *target = value
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", name, value))?;
    }
    Ok(())
}

impl RankingSettings {
    /// Override settings from `RANKING_*` and related environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        env_override("RANKING_WIN_BASE_POINTS", &mut self.rules.win_base_points)?;
        env_override("RANKING_STREAK_STEP_POINTS", &mut self.rules.streak_step_points)?;
        env_override("RANKING_STREAK_BONUS_CAP", &mut self.rules.streak_bonus_cap)?;
        env_override("RANKING_LOSS_PENALTY", &mut self.rules.loss_penalty)?;

        env_override("SCORE_WIN_POINTS", &mut self.weights.win_points)?;
        env_override("SCORE_STREAK_POINTS", &mut self.weights.streak_points)?;
        env_override("SCORE_WIN_RATE_POINTS", &mut self.weights.win_rate_points)?;
        env_override("SCORE_EXPERIENCE_POINTS", &mut self.weights.experience_points)?;

        env_override("LEADERBOARD_LIMIT", &mut self.leaderboard_limit)?;
        env_override("TOP_PLAYERS_COUNT", &mut self.top_players)?;
        env_override("RANK_PAGE_SIZE", &mut self.page_size)?;
        env_override(
            "POSITION_REFRESH_INTERVAL_SECONDS",
            &mut self.position_refresh_interval_seconds,
        )?;

        Ok(())
    }

    /// Get position refresh interval as Duration
    pub fn position_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.position_refresh_interval_seconds)
    }

    pub fn validate(&self) -> Result<()> {
        self.rules.validate()?;

        if self.leaderboard_limit == 0 {
            return Err(anyhow!("Leaderboard limit must be greater than 0"));
        }
        if self.top_players == 0 {
            return Err(anyhow!("Top players count must be greater than 0"));
        }
        if self.page_size == 0 {
            return Err(anyhow!("Rank page size must be greater than 0"));
        }
        if self.position_refresh_interval_seconds == 0 {
            return Err(anyhow!("Position refresh interval must be greater than 0"));
        }

        Ok(())
    }
}
