//! AMQP event publisher for outbound stats events

use crate::amqp::messages::{
    MessageEnvelope, LEADERBOARD_REFRESHED_ROUTING_KEY, STATS_EVENTS_EXCHANGE,
    STATS_UPDATED_ROUTING_KEY,
};
use crate::error::{Result, StandingsError};
use crate::types::*;
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Trait for publishing stats events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a PlayerStatsUpdated event
    async fn publish_stats_updated(&self, event: PlayerStatsUpdated) -> Result<()>;

    /// Publish a LeaderboardRefreshed event
    async fn publish_leaderboard_refreshed(&self, event: LeaderboardRefreshed) -> Result<()>;
}

/// Configuration for event publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub exchange_name: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub enable_deduplication: bool,
    /// Published (player, game) keys remembered for deduplication
    pub deduplication_capacity: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            exchange_name: STATS_EVENTS_EXCHANGE.to_string(),
            max_retries: 3,
            retry_delay_ms: 500,
            enable_deduplication: true,
            deduplication_capacity: 10_000,
        }
    }
}

/// Stable identity of a stats update: one per player per game
///
/// Updates without a game id have no identity and are never deduplicated.
fn stats_update_key(event: &PlayerStatsUpdated) -> Option<String> {
    event
        .game_id
        .map(|game_id| format!("{}:{}", event.player_id, game_id))
}

/// Bounded set of recently published event keys
#[derive(Debug, Default)]
struct PublishedIds {
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl PublishedIds {
    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn insert(&mut self, id: String, capacity: usize) {
        if !self.ids.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn clear(&mut self) {
        self.ids.clear();
        self.order.clear();
    }
}

/// AMQP-based event publisher implementation
pub struct AmqpEventPublisher {
    channel: Channel,
    config: PublisherConfig,
    published_messages: Mutex<PublishedIds>,
}

impl AmqpEventPublisher {
    /// Create a new event publisher and declare its exchange
    pub async fn new(channel: Channel, config: PublisherConfig) -> Result<Self> {
        let publisher = Self {
            channel,
            config,
            published_messages: Mutex::new(PublishedIds::default()),
        };

        publisher.setup_exchange().await?;

        Ok(publisher)
    }

    /// Declare the stats events topic exchange
    async fn setup_exchange(&self) -> Result<()> {
        let args = ExchangeDeclareArguments::new(&self.config.exchange_name, "topic")
            .durable(true)
            .finish();
        self.channel.exchange_declare(args).await.map_err(|e| {
            StandingsError::AmqpConnectionFailed {
                message: format!(
                    "Failed to declare exchange {}: {}",
                    self.config.exchange_name, e
                ),
            }
        })?;

        info!(
            "Declared stats events exchange '{}'",
            self.config.exchange_name
        );
        Ok(())
    }

    /// Publish an envelope to the configured exchange with retry logic
    ///
    /// An envelope whose `dedup_key` was already published is skipped.
    async fn publish_envelope<T>(
        &self,
        envelope: &MessageEnvelope<T>,
        dedup_key: Option<String>,
    ) -> Result<()>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        let dedup_key = dedup_key.filter(|_| self.config.enable_deduplication);
        if let Some(key) = &dedup_key {
            if self.already_published(key)? {
                debug!("Event {} already published, skipping", key);
                return Ok(());
            }
        }

        let mut retry_count = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            match self.try_publish(envelope).await {
                Ok(()) => {
                    if let Some(key) = dedup_key {
                        self.published_messages
                            .lock()
                            .map_err(|_| StandingsError::InternalError {
                                message: "Failed to acquire published messages lock".to_string(),
                            })?
                            .insert(key, self.config.deduplication_capacity);
                    }

                    debug!(
                        "Published message {} to exchange {} with key {}",
                        envelope.correlation_id, self.config.exchange_name, envelope.routing_key
                    );
                    return Ok(());
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "Failed to publish message {} after {} retries: {}",
                            envelope.correlation_id, self.config.max_retries, e
                        );
                        return Err(e);
                    }

                    warn!(
                        "Publish attempt {} failed for message {}: {}. Retrying in {:?}",
                        retry_count, envelope.correlation_id, e, delay
                    );

                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(5000));
                }
            }
        }
    }

    fn already_published(&self, key: &str) -> Result<bool> {
        let published = self
            .published_messages
            .lock()
            .map_err(|_| StandingsError::InternalError {
                message: "Failed to acquire published messages lock".to_string(),
            })?;
        Ok(published.contains(key))
    }

    /// Single publish attempt
    async fn try_publish<T>(&self, envelope: &MessageEnvelope<T>) -> Result<()>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        let payload = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(&self.config.exchange_name, &envelope.routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json")
            .with_persistence(true);

        self.channel
            .basic_publish(properties, payload, args)
            .await
            .map_err(|e| StandingsError::AmqpConnectionFailed {
                message: format!("Failed to publish message: {}", e),
            })?;

        Ok(())
    }

    /// Clear deduplication cache
    pub fn clear_deduplication_cache(&self) {
        if let Ok(mut published_messages) = self.published_messages.lock() {
            published_messages.clear();
        }
    }

    /// Get number of cached event keys (for monitoring)
    pub fn cached_message_count(&self) -> usize {
        self.published_messages
            .lock()
            .map(|cache| cache.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventPublisher for AmqpEventPublisher {
    async fn publish_stats_updated(&self, event: PlayerStatsUpdated) -> Result<()> {
        let dedup_key = stats_update_key(&event);
        let envelope = MessageEnvelope::new(event, STATS_UPDATED_ROUTING_KEY);
        self.publish_envelope(&envelope, dedup_key).await
    }

    async fn publish_leaderboard_refreshed(&self, event: LeaderboardRefreshed) -> Result<()> {
        let envelope = MessageEnvelope::new(event, LEADERBOARD_REFRESHED_ROUTING_KEY);
        self.publish_envelope(&envelope, None).await
    }
}

/// Mock event publisher for testing
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published_events: Mutex<Vec<String>>,
    stats_updates: Mutex<Vec<PlayerStatsUpdated>>,
    refreshes: Mutex<Vec<LeaderboardRefreshed>>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all published event types
    pub fn get_published_events(&self) -> Vec<String> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Get the published PlayerStatsUpdated events
    pub fn stats_updates(&self) -> Vec<PlayerStatsUpdated> {
        self.stats_updates
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Get the published LeaderboardRefreshed events
    pub fn leaderboard_refreshes(&self) -> Vec<LeaderboardRefreshed> {
        self.refreshes
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Clear published events
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
        if let Ok(mut events) = self.stats_updates.lock() {
            events.clear();
        }
        if let Ok(mut events) = self.refreshes.lock() {
            events.clear();
        }
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish_stats_updated(&self, event: PlayerStatsUpdated) -> Result<()> {
        if let Ok(mut events) = self.published_events.lock() {
            events.push("PlayerStatsUpdated".to_string());
        }
        if let Ok(mut events) = self.stats_updates.lock() {
            events.push(event);
        }
        Ok(())
    }

    async fn publish_leaderboard_refreshed(&self, event: LeaderboardRefreshed) -> Result<()> {
        if let Ok(mut events) = self.published_events.lock() {
            events.push("LeaderboardRefreshed".to_string());
        }
        if let Ok(mut events) = self.refreshes.lock() {
            events.push(event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{PlayerStatsRecord, RankingRules, ScoreWeights};
    use crate::utils::{current_timestamp, generate_game_id};

    #[test]
    fn test_publisher_config_default() {
        let config = PublisherConfig::default();
        assert_eq!(config.exchange_name, "arena.stats_events");
        assert_eq!(config.max_retries, 3);
        assert!(config.enable_deduplication);
    }

    #[test]
    fn test_published_ids_are_bounded() {
        let mut ids = PublishedIds::default();
        for i in 0..5 {
            ids.insert(format!("id-{}", i), 3);
        }
        ids.insert("id-4".to_string(), 3);

        assert_eq!(ids.len(), 3);
        assert!(!ids.contains("id-0"));
        assert!(!ids.contains("id-1"));
        assert!(ids.contains("id-4"));
    }

    fn stats_update(player_id: &str, game_id: Option<GameId>) -> PlayerStatsUpdated {
        let record = PlayerStatsRecord::new(player_id)
            .with_match_result(MatchOutcome::Win, &RankingRules::default());
        PlayerStatsUpdated {
            player_id: player_id.to_string(),
            game_id,
            outcome: MatchOutcome::Win,
            rank_delta: 30,
            stats: record.ranked(&ScoreWeights::default()),
            timestamp: current_timestamp(),
        }
    }

    #[test]
    fn test_stats_update_key_is_stable_per_player_and_game() {
        let game_id = generate_game_id();

        let first = stats_update_key(&stats_update("alice", Some(game_id)));
        let repeat = stats_update_key(&stats_update("alice", Some(game_id)));
        let opponent = stats_update_key(&stats_update("bob", Some(game_id)));
        let next_game = stats_update_key(&stats_update("alice", Some(generate_game_id())));

        assert!(first.is_some());
        assert_eq!(first, repeat);
        assert_ne!(first, opponent);
        assert_ne!(first, next_game);
        assert_eq!(stats_update_key(&stats_update("alice", None)), None);
    }

    #[test]
    fn test_repeated_update_is_recognised() {
        let game_id = generate_game_id();
        let mut published = PublishedIds::default();
        let key = stats_update_key(&stats_update("alice", Some(game_id))).unwrap();
        published.insert(key, 10);

        let redelivered = stats_update_key(&stats_update("alice", Some(game_id))).unwrap();
        assert!(published.contains(&redelivered));
    }

    #[tokio::test]
    async fn test_mock_publisher_records_events() {
        let publisher = MockEventPublisher::new();
        publisher
            .publish_leaderboard_refreshed(LeaderboardRefreshed {
                positions_updated: 3,
                total_players: 10,
                timestamp: current_timestamp(),
            })
            .await
            .unwrap();

        assert_eq!(
            publisher.get_published_events(),
            vec!["LeaderboardRefreshed".to_string()]
        );
        assert_eq!(publisher.leaderboard_refreshes()[0].positions_updated, 3);

        publisher.clear_events();
        assert!(publisher.get_published_events().is_empty());
    }
}
