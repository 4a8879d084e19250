//! AMQP message definitions and serialization

use crate::error::{Result, StandingsError};
use crate::types::*;
use serde_json;

/// Queue the match resolver publishes results to
pub const MATCH_RESULTS_QUEUE: &str = "arena.match_results";
/// Exchange for outbound stats events
pub const STATS_EVENTS_EXCHANGE: &str = "arena.stats_events";

/// Routing keys
pub const MATCH_COMPLETED_ROUTING_KEY: &str = "match.completed";
pub const OUTCOME_REPORTED_ROUTING_KEY: &str = "match.outcome";
pub const STATS_UPDATED_ROUTING_KEY: &str = "stats.updated";
pub const LEADERBOARD_REFRESHED_ROUTING_KEY: &str = "leaderboard.refreshed";

/// Message envelope with metadata
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Create a new message envelope
    pub fn new(payload: T, routing_key: impl Into<String>) -> Self {
        Self {
            payload,
            correlation_id: crate::utils::generate_correlation_id(),
            timestamp: crate::utils::current_timestamp(),
            routing_key: routing_key.into(),
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            StandingsError::InternalError {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Deserialize envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            StandingsError::InternalError {
                message: format!("Failed to deserialize message envelope: {}", e),
            }
            .into()
        })
    }
}

/// A message the service accepts on its input queue
#[derive(Debug, Clone)]
pub enum InboundMessage {
    MatchCompleted(MatchCompleted),
    OutcomeReported(OutcomeReported),
}

/// Message serialization and validation utilities
pub struct MessageUtils;

impl MessageUtils {
    /// Deserialize and validate a message from the input queue
    ///
    /// An `OutcomeReported` whose outcome is not "win" or "loss" fails with
    /// `InvalidOutcome`; other malformed input fails with `InvalidMatchResult`.
    pub fn deserialize_inbound(bytes: &[u8]) -> Result<InboundMessage> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| StandingsError::InvalidMatchResult {
                reason: format!("Message is not valid JSON: {}", e),
            })?;

        if value.get("type").and_then(|t| t.as_str()) == Some("OutcomeReported") {
            if let Some(outcome) = value.get("outcome").and_then(|o| o.as_str()) {
                outcome.parse::<MatchOutcome>()?;
            }
        }

        let message: AmqpMessage =
            serde_json::from_value(value).map_err(|e| StandingsError::InvalidMatchResult {
                reason: format!("Failed to deserialize match message: {}", e),
            })?;

        match message {
            AmqpMessage::MatchCompleted(result) => {
                Self::validate_match_completed(&result)?;
                Ok(InboundMessage::MatchCompleted(result))
            }
            AmqpMessage::OutcomeReported(report) => {
                Self::validate_outcome_reported(&report)?;
                Ok(InboundMessage::OutcomeReported(report))
            }
            other => Err(StandingsError::InvalidMatchResult {
                reason: format!(
                    "Unexpected message on input queue: {}",
                    Self::get_routing_key(&other)
                ),
            }
            .into()),
        }
    }

    /// Validate a completed match
    pub fn validate_match_completed(result: &MatchCompleted) -> Result<()> {
        if result.winner_id.is_empty() || result.loser_id.is_empty() {
            return Err(StandingsError::InvalidMatchResult {
                reason: "Winner and loser IDs cannot be empty".to_string(),
            }
            .into());
        }

        if result.winner_id == result.loser_id {
            return Err(StandingsError::InvalidMatchResult {
                reason: format!(
                    "Player '{}' cannot play against themselves",
                    result.winner_id
                ),
            }
            .into());
        }

        if result.game_type.is_empty() {
            return Err(StandingsError::InvalidMatchResult {
                reason: "Game type cannot be empty".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Validate a single reported outcome
    pub fn validate_outcome_reported(report: &OutcomeReported) -> Result<()> {
        if report.player_id.is_empty() {
            return Err(StandingsError::InvalidMatchResult {
                reason: "Player ID cannot be empty".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Serialize any AMQP message to bytes
    pub fn serialize_message(message: &AmqpMessage) -> Result<Vec<u8>> {
        serde_json::to_vec(message).map_err(|e| {
            StandingsError::InternalError {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Get routing key for a message type
    pub fn get_routing_key(message: &AmqpMessage) -> &'static str {
        match message {
            AmqpMessage::MatchCompleted(_) => MATCH_COMPLETED_ROUTING_KEY,
            AmqpMessage::OutcomeReported(_) => OUTCOME_REPORTED_ROUTING_KEY,
            AmqpMessage::PlayerStatsUpdated(_) => STATS_UPDATED_ROUTING_KEY,
            AmqpMessage::LeaderboardRefreshed(_) => LEADERBOARD_REFRESHED_ROUTING_KEY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{current_timestamp, generate_game_id};

    fn create_match_completed() -> MatchCompleted {
        MatchCompleted {
            game_id: generate_game_id(),
            game_type: "tic-tac-toe".to_string(),
            winner_id: "alice".to_string(),
            loser_id: "bob".to_string(),
            completed_at: current_timestamp(),
        }
    }

    fn error_kind(error: &anyhow::Error) -> &'static str {
        StandingsError::classify(error).map(|e| e.kind()).unwrap_or("other")
    }

    #[test]
    fn test_message_envelope_creation() {
        let envelope = MessageEnvelope::new(create_match_completed(), STATS_UPDATED_ROUTING_KEY);

        assert_eq!(envelope.routing_key, "stats.updated");
        assert!(!envelope.correlation_id.is_empty());
    }

    #[test]
    fn test_match_completed_validation() {
        assert!(MessageUtils::validate_match_completed(&create_match_completed()).is_ok());

        let mut self_match = create_match_completed();
        self_match.loser_id = "alice".to_string();
        assert!(MessageUtils::validate_match_completed(&self_match).is_err());

        let mut empty_winner = create_match_completed();
        empty_winner.winner_id = String::new();
        assert!(MessageUtils::validate_match_completed(&empty_winner).is_err());
    }

    #[test]
    fn test_deserialize_match_completed() {
        let bytes = MessageUtils::serialize_message(&AmqpMessage::MatchCompleted(
            create_match_completed(),
        ))
        .unwrap();

        match MessageUtils::deserialize_inbound(&bytes).unwrap() {
            InboundMessage::MatchCompleted(result) => {
                assert_eq!(result.winner_id, "alice");
                assert_eq!(result.loser_id, "bob");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_reported_draw_is_invalid_outcome() {
        let bytes = serde_json::to_vec(&serde_json::json!({
            "type": "OutcomeReported",
            "game_id": generate_game_id(),
            "player_id": "alice",
            "outcome": "draw",
            "reported_at": current_timestamp(),
        }))
        .unwrap();

        let err = MessageUtils::deserialize_inbound(&bytes).unwrap_err();
        assert_eq!(error_kind(&err), "invalid_outcome");
    }

    #[test]
    fn test_reported_outcome_is_case_insensitive() {
        let bytes = serde_json::to_vec(&serde_json::json!({
            "type": "OutcomeReported",
            "game_id": generate_game_id(),
            "player_id": "alice",
            "outcome": "Loss",
            "reported_at": current_timestamp(),
        }))
        .unwrap();

        match MessageUtils::deserialize_inbound(&bytes).unwrap() {
            InboundMessage::OutcomeReported(report) => {
                assert_eq!(report.outcome, MatchOutcome::Loss)
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_garbage_and_outbound_events() {
        let err = MessageUtils::deserialize_inbound(b"not json").unwrap_err();
        assert_eq!(error_kind(&err), "invalid_match");

        let event = AmqpMessage::LeaderboardRefreshed(LeaderboardRefreshed {
            positions_updated: 1,
            total_players: 2,
            timestamp: current_timestamp(),
        });
        let bytes = MessageUtils::serialize_message(&event).unwrap();
        let err = MessageUtils::deserialize_inbound(&bytes).unwrap_err();
        assert_eq!(error_kind(&err), "invalid_match");
    }

    #[test]
    fn test_routing_keys() {
        let completed = AmqpMessage::MatchCompleted(create_match_completed());
        assert_eq!(
            MessageUtils::get_routing_key(&completed),
            MATCH_COMPLETED_ROUTING_KEY
        );
    }
}
