//! Common types used throughout the standings service

use crate::error::StandingsError;
use crate::stats::record::RankedStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for players
pub type PlayerId = String;

/// Unique identifier for games
pub type GameId = Uuid;

/// One player's result in one completed match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MatchOutcome {
    Win,
    Loss,
}

impl MatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOutcome::Win => "win",
            MatchOutcome::Loss => "loss",
        }
    }
}

impl std::fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchOutcome {
    type Err = StandingsError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "win" => Ok(MatchOutcome::Win),
            "loss" => Ok(MatchOutcome::Loss),
            _ => Err(StandingsError::InvalidOutcome {
                value: value.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for MatchOutcome {
    type Error = StandingsError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MatchOutcome> for String {
    fn from(outcome: MatchOutcome) -> Self {
        outcome.as_str().to_string()
    }
}

// AMQP message types

/// A finished two-player match announced by the match resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCompleted {
    pub game_id: GameId,
    pub game_type: String,
    pub winner_id: PlayerId,
    pub loser_id: PlayerId,
    pub completed_at: DateTime<Utc>,
}

/// A single participant's outcome reported on its own
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeReported {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub outcome: MatchOutcome,
    pub reported_at: DateTime<Utc>,
}

/// Event emitted after a player's stats record has been updated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStatsUpdated {
    pub player_id: PlayerId,
    pub game_id: Option<GameId>,
    pub outcome: MatchOutcome,
    pub rank_delta: i64,
    /// Updated record with its score and win rate
    pub stats: RankedStats,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted after leaderboard positions were recomputed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardRefreshed {
    pub positions_updated: usize,
    pub total_players: usize,
    pub timestamp: DateTime<Utc>,
}

/// Union type for all AMQP messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AmqpMessage {
    MatchCompleted(MatchCompleted),
    OutcomeReported(OutcomeReported),
    PlayerStatsUpdated(PlayerStatsUpdated),
    LeaderboardRefreshed(LeaderboardRefreshed),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_parsing() {
        assert_eq!("win".parse::<MatchOutcome>().unwrap(), MatchOutcome::Win);
        assert_eq!("LOSS".parse::<MatchOutcome>().unwrap(), MatchOutcome::Loss);
        assert_eq!(" Win ".parse::<MatchOutcome>().unwrap(), MatchOutcome::Win);
    }

    #[test]
    fn test_outcome_rejects_anything_else() {
        for value in ["draw", "tie", "", "won", "lose"] {
            let err = value.parse::<MatchOutcome>().unwrap_err();
            assert_eq!(
                err,
                StandingsError::InvalidOutcome {
                    value: value.to_string()
                }
            );
        }
    }

    #[test]
    fn test_outcome_serde_is_lowercase_text() {
        let json = serde_json::to_string(&MatchOutcome::Loss).unwrap();
        assert_eq!(json, "\"loss\"");

        let parsed: MatchOutcome = serde_json::from_str("\"win\"").unwrap();
        assert_eq!(parsed, MatchOutcome::Win);

        let invalid = serde_json::from_str::<MatchOutcome>("\"draw\"");
        assert!(invalid.is_err());
        assert!(invalid
            .unwrap_err()
            .to_string()
            .contains("Invalid match outcome"));
    }
}
