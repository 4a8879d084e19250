//! AMQP message handlers for processing match results
//!
//! The consumer decodes each delivery, hands it to a `MessageHandler`, and
//! acks it once handling finished. Failed deliveries are rejected without
//! requeue so a poisoned message cannot be applied twice.

use crate::amqp::messages::{InboundMessage, MessageUtils};
use crate::error::{Result, StandingsError};
use crate::types::{MatchCompleted, OutcomeReported};
use amqprs::{
    channel::{
        BasicAckArguments, BasicCancelArguments, BasicConsumeArguments, BasicNackArguments,
        Channel,
    },
    consumer::AsyncConsumer,
    BasicProperties, Deliver,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Trait defining the interface for handling AMQP messages
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle a completed two-player match
    async fn handle_match_completed(&self, result: MatchCompleted) -> Result<()>;

    /// Handle a single reported outcome
    async fn handle_outcome_reported(&self, report: OutcomeReported) -> Result<()>;

    /// Handle processing errors
    async fn handle_error(&self, error: StandingsError, message_data: &[u8]);
}

/// Decode one delivery and route it to the handler
pub async fn dispatch_message(handler: &dyn MessageHandler, content: &[u8]) -> Result<()> {
    match MessageUtils::deserialize_inbound(content)? {
        InboundMessage::MatchCompleted(result) => {
            debug!(
                "Match result parsed - game: {}, winner: '{}', loser: '{}'",
                result.game_id, result.winner_id, result.loser_id
            );
            handler.handle_match_completed(result).await
        }
        InboundMessage::OutcomeReported(report) => {
            debug!(
                "Outcome report parsed - game: {}, player: '{}', outcome: {}",
                report.game_id, report.player_id, report.outcome
            );
            handler.handle_outcome_reported(report).await
        }
    }
}

/// Turn any processing failure into the domain error handed to `handle_error`
fn into_standings_error(error: anyhow::Error) -> StandingsError {
    match StandingsError::classify(&error) {
        Some(classified) => classified.clone(),
        None => StandingsError::InternalError {
            message: error.to_string(),
        },
    }
}

/// Consumer for match result messages
pub struct MatchResultConsumer {
    handler: Arc<dyn MessageHandler>,
    channel: Channel,
    consumer_tag: String,
}

impl MatchResultConsumer {
    /// Create a new match result consumer
    pub fn new(handler: Arc<dyn MessageHandler>, channel: Channel) -> Self {
        let consumer_tag = format!("standings-consumer-{}", uuid::Uuid::new_v4());

        Self {
            handler,
            channel,
            consumer_tag,
        }
    }

    /// Start consuming messages from the queue
    pub async fn start_consuming(&self, queue_name: &str) -> Result<()> {
        let args = BasicConsumeArguments::new(queue_name, &self.consumer_tag);

        self.channel
            .basic_consume(ResultConsumer::new(self.handler.clone()), args)
            .await
            .map_err(|e| StandingsError::AmqpConnectionFailed {
                message: format!("Failed to start consuming: {}", e),
            })?;

        info!("Started consuming messages from queue: {}", queue_name);
        Ok(())
    }

    /// Stop consuming messages
    pub async fn stop_consuming(&self) -> Result<()> {
        let args = BasicCancelArguments::new(&self.consumer_tag);

        self.channel.basic_cancel(args).await.map_err(|e| {
            StandingsError::AmqpConnectionFailed {
                message: format!("Failed to stop consuming: {}", e),
            }
        })?;

        info!("Stopped consuming messages");
        Ok(())
    }
}

/// Internal consumer implementation
struct ResultConsumer {
    handler: Arc<dyn MessageHandler>,
}

impl ResultConsumer {
    fn new(handler: Arc<dyn MessageHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl AsyncConsumer for ResultConsumer {
    async fn consume(
        &mut self,
        channel: &Channel,
        deliver: Deliver,
        _basic_properties: BasicProperties,
        content: Vec<u8>,
    ) {
        let delivery_tag = deliver.delivery_tag();

        debug!(
            "AMQP message received - delivery_tag: {}, routing_key: '{}', size: {} bytes",
            delivery_tag,
            deliver.routing_key(),
            content.len()
        );

        let start_time = std::time::Instant::now();

        match dispatch_message(self.handler.as_ref(), &content).await {
            Ok(()) => {
                debug!(
                    "Message processed - delivery_tag: {}, processing_time: {:.2}ms",
                    delivery_tag,
                    start_time.elapsed().as_secs_f64() * 1000.0
                );
                if let Err(e) = channel
                    .basic_ack(BasicAckArguments::new(delivery_tag, false))
                    .await
                {
                    warn!("Failed to ack delivery {}: {}", delivery_tag, e);
                }
            }
            Err(e) => {
                error!(
                    "Message processing failed - delivery_tag: {}, processing_time: {:.2}ms, error: {}",
                    delivery_tag,
                    start_time.elapsed().as_secs_f64() * 1000.0,
                    e
                );
                self.handler
                    .handle_error(into_standings_error(e), &content)
                    .await;
                if let Err(e) = channel
                    .basic_nack(BasicNackArguments::new(delivery_tag, false, false))
                    .await
                {
                    warn!("Failed to reject delivery {}: {}", delivery_tag, e);
                }
            }
        }
    }
}

/// Mock message handler for testing
pub struct MockMessageHandler {
    pub received_matches: Arc<tokio::sync::Mutex<Vec<MatchCompleted>>>,
    pub received_outcomes: Arc<tokio::sync::Mutex<Vec<OutcomeReported>>>,
    pub errors: Arc<tokio::sync::Mutex<Vec<StandingsError>>>,
}

impl Default for MockMessageHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMessageHandler {
    pub fn new() -> Self {
        Self {
            received_matches: Arc::new(tokio::sync::Mutex::new(Vec::new())),
            received_outcomes: Arc::new(tokio::sync::Mutex::new(Vec::new())),
            errors: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        }
    }

    /// Dispatch a raw message the way the consumer does, reporting failures
    pub async fn deliver(&self, content: &[u8]) -> bool {
        match dispatch_message(self, content).await {
            Ok(()) => true,
            Err(e) => {
                self.handle_error(into_standings_error(e), content).await;
                false
            }
        }
    }
}

#[async_trait]
impl MessageHandler for MockMessageHandler {
    async fn handle_match_completed(&self, result: MatchCompleted) -> Result<()> {
        self.received_matches.lock().await.push(result);
        Ok(())
    }

    async fn handle_outcome_reported(&self, report: OutcomeReported) -> Result<()> {
        self.received_outcomes.lock().await.push(report);
        Ok(())
    }

    async fn handle_error(&self, error: StandingsError, _message_data: &[u8]) {
        self.errors.lock().await.push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AmqpMessage, MatchOutcome};
    use crate::utils::{current_timestamp, generate_game_id};

    fn match_completed_bytes(winner: &str, loser: &str) -> Vec<u8> {
        MessageUtils::serialize_message(&AmqpMessage::MatchCompleted(MatchCompleted {
            game_id: generate_game_id(),
            game_type: "connect-four".to_string(),
            winner_id: winner.to_string(),
            loser_id: loser.to_string(),
            completed_at: current_timestamp(),
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_routes_match_completed() {
        let handler = MockMessageHandler::new();

        assert!(handler.deliver(&match_completed_bytes("alice", "bob")).await);

        let received = handler.received_matches.lock().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].winner_id, "alice");
        assert!(handler.errors.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_routes_outcome_reported() {
        let handler = MockMessageHandler::new();
        let bytes = MessageUtils::serialize_message(&AmqpMessage::OutcomeReported(
            OutcomeReported {
                game_id: generate_game_id(),
                player_id: "carol".to_string(),
                outcome: MatchOutcome::Win,
                reported_at: current_timestamp(),
            },
        ))
        .unwrap();

        assert!(handler.deliver(&bytes).await);
        assert_eq!(handler.received_outcomes.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_message_reaches_error_path() {
        let handler = MockMessageHandler::new();

        assert!(!handler.deliver(&match_completed_bytes("alice", "alice")).await);
        assert!(!handler.deliver(b"{\"type\":\"Nonsense\"}").await);

        let errors = handler.errors.lock().await;
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, StandingsError::InvalidMatchResult { .. })));
        assert!(handler.received_matches.lock().await.is_empty());
    }

    #[test]
    fn test_foreign_errors_become_internal() {
        let error = into_standings_error(anyhow::anyhow!("boom"));
        assert_eq!(error.kind(), "internal");
    }
}
