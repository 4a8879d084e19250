//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the ranking
//! engine to AMQP, the HTTP server and the background tasks.

use crate::amqp::connection::{AmqpConfig, AmqpConnection};
use crate::amqp::handlers::{MatchResultConsumer, MessageHandler};
use crate::amqp::publisher::{AmqpEventPublisher, EventPublisher, PublisherConfig};
use crate::config::AppConfig;
use crate::error::{Result as StandingsResult, StandingsError};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector, MetricsService};
use crate::service::health::{HealthCheck, ServiceHandle};
use crate::stats::engine::{OutcomeApplied, RankingEngine};
use crate::stats::storage::InMemoryStatsStorage;
use crate::types::{
    GameId, LeaderboardRefreshed, MatchCompleted, OutcomeReported, PlayerStatsUpdated,
};
use crate::utils::{current_timestamp, redact_url};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("AMQP connection error: {message}")]
    AmqpConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Message handler that applies match results and announces the new stats
///
/// Players without a record get one before their first result is applied.
pub struct StatsUpdateHandler {
    engine: Arc<RankingEngine>,
    publisher: Arc<dyn EventPublisher>,
    metrics_collector: Arc<MetricsCollector>,
}

impl StatsUpdateHandler {
    pub fn new(
        engine: Arc<RankingEngine>,
        publisher: Arc<dyn EventPublisher>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            engine,
            publisher,
            metrics_collector,
        }
    }

    /// Announce one applied outcome; a publish failure is logged, not returned
    async fn announce(&self, game_id: Option<GameId>, applied: OutcomeApplied) {
        let weights = self.engine.weights();
        let event = PlayerStatsUpdated {
            player_id: applied.player_id.clone(),
            game_id,
            outcome: applied.outcome,
            rank_delta: applied.rank_delta,
            stats: applied.updated.ranked(weights),
            timestamp: current_timestamp(),
        };

        let start = Instant::now();
        let result = self.publisher.publish_stats_updated(event).await;
        self.metrics_collector
            .record_amqp_operation("publish_stats_updated", result.is_ok(), start.elapsed());

        if let Err(e) = result {
            warn!(
                "Stats for player '{}' saved but update event not published: {}",
                applied.player_id, e
            );
        }
    }
}

#[async_trait]
impl MessageHandler for StatsUpdateHandler {
    async fn handle_match_completed(&self, result: MatchCompleted) -> StandingsResult<()> {
        let start_time = Instant::now();

        if result.winner_id != result.loser_id {
            self.engine.get_or_provision(&result.winner_id).await?;
            self.engine.get_or_provision(&result.loser_id).await?;
        }

        let settlement = self.engine.record_match(&result).await?;

        info!(
            "Match {} settled - winner: '{}' ({:+}), loser: '{}' ({:+}), time: {:.2}ms",
            settlement.game_id,
            settlement.winner.player_id,
            settlement.winner.rank_delta,
            settlement.loser.player_id,
            settlement.loser.rank_delta,
            start_time.elapsed().as_secs_f64() * 1000.0
        );

        self.announce(Some(settlement.game_id), settlement.winner).await;
        self.announce(Some(settlement.game_id), settlement.loser).await;
        Ok(())
    }

    async fn handle_outcome_reported(&self, report: OutcomeReported) -> StandingsResult<()> {
        self.engine.get_or_provision(&report.player_id).await?;
        let applied = self
            .engine
            .apply_match_result(&report.player_id, report.outcome)
            .await?;

        self.announce(Some(report.game_id), applied).await;
        Ok(())
    }

    async fn handle_error(&self, error: StandingsError, message_data: &[u8]) {
        error!(
            "Match result dropped - kind: '{}', error: '{}', message_size: {} bytes",
            error.kind(),
            error,
            message_data.len()
        );

        if !message_data.is_empty() {
            let preview_len = std::cmp::min(100, message_data.len());
            let preview = String::from_utf8_lossy(&message_data[..preview_len]);
            debug!("Message preview: {:?}", preview);
        }

        self.metrics_collector
            .record_amqp_operation("consume", false, Duration::ZERO);
    }
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Ranking engine over the stats storage
    engine: Arc<RankingEngine>,

    /// AMQP connection for message handling
    amqp_connection: Arc<AmqpConnection>,

    /// Publisher for stats events
    publisher: Arc<dyn EventPublisher>,

    /// Metrics collection and the HTTP server
    metrics_service: Arc<MetricsService>,

    /// Shared view used by health checks and HTTP handlers
    handle: ServiceHandle,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// AMQP consumer for match results
    result_consumer: Option<MatchResultConsumer>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing arena-standings service");
        info!(
            "Configuration: service={}, amqp_url={}",
            config.service.name,
            redact_url(&config.amqp.url)
        );

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let amqp_connection = Self::initialize_amqp(&config).await?;

        let engine = Arc::new(RankingEngine::with_metrics(
            Arc::new(InMemoryStatsStorage::new()),
            config.ranking.rules.clone(),
            config.ranking.weights.clone(),
            metrics_collector.clone(),
        ));

        let publisher = Self::initialize_publisher(&config, &amqp_connection).await?;

        let handle = ServiceHandle::new(config.service.name.clone(), engine.clone())
            .with_amqp_connection(amqp_connection.clone());

        let health_server = Arc::new(HealthServer::new(
            HealthServerConfig {
                port: config.service.http_port,
                host: "0.0.0.0".to_string(),
            },
            metrics_collector.clone(),
            handle.clone(),
            config.ranking.clone(),
        ));
        let metrics_service = Arc::new(MetricsService::new(metrics_collector, health_server));

        Ok(Self {
            config,
            engine,
            amqp_connection,
            publisher,
            metrics_service,
            handle,
            background_tasks: Vec::new(),
            result_consumer: None,
        })
    }

    /// Start all background services and message consumption
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting arena-standings service");

        self.handle.set_running(true).await;

        self.start_http_server().await?;
        self.start_amqp_consumption().await?;
        self.start_background_tasks();

        info!("✅ Arena-standings service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of arena-standings service");

        self.handle.set_running(false).await;

        if let Some(consumer) = self.result_consumer.take() {
            if let Err(e) = consumer.stop_consuming().await {
                warn!("Failed to stop AMQP consumer: {}", e);
            } else {
                info!("✅ AMQP message consumption stopped");
            }
        }

        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop HTTP server: {}", e);
        }

        self.stop_background_tasks().await;

        let final_stats =
            self.engine
                .engine_stats()
                .await
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final stats: {}", e),
                })?;

        info!("Final service statistics: {:?}", final_stats);
        info!("✅ Arena-standings service shutdown completed");

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        self.handle.is_running().await
    }

    pub fn engine(&self) -> Arc<RankingEngine> {
        self.engine.clone()
    }

    pub fn handle(&self) -> ServiceHandle {
        self.handle.clone()
    }

    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    /// Get AMQP connection for health checks
    pub fn amqp_connection(&self) -> Arc<AmqpConnection> {
        self.amqp_connection.clone()
    }

    /// Initialize AMQP connection with retry logic
    async fn initialize_amqp(config: &AppConfig) -> Result<Arc<AmqpConnection>, ServiceError> {
        info!("Connecting to AMQP broker: {}", redact_url(&config.amqp.url));

        let amqp_config =
            AmqpConfig::from_settings(&config.amqp).map_err(|e| ServiceError::Configuration {
                message: format!("Failed to parse AMQP URL: {}", e),
            })?;

        let connection =
            AmqpConnection::new(amqp_config)
                .await
                .map_err(|e| ServiceError::AmqpConnection {
                    message: format!("Failed to connect to AMQP: {}", e),
                })?;

        Ok(Arc::new(connection))
    }

    async fn initialize_publisher(
        config: &AppConfig,
        connection: &AmqpConnection,
    ) -> Result<Arc<dyn EventPublisher>, ServiceError> {
        let channel = connection
            .open_channel()
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to open publisher channel: {}", e),
            })?;

        let publisher_config = PublisherConfig {
            exchange_name: config.amqp.exchange_name.clone(),
            max_retries: config.amqp.max_retry_attempts,
            retry_delay_ms: config.amqp.retry_delay_ms,
            ..PublisherConfig::default()
        };

        let publisher = AmqpEventPublisher::new(channel, publisher_config)
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to initialize event publisher: {}", e),
            })?;

        Ok(Arc::new(publisher))
    }

    /// Run the HTTP server as a background task
    async fn start_http_server(&mut self) -> Result<(), ServiceError> {
        let metrics_service = self.metrics_service.clone();
        let port = self.config.service.http_port;

        let server_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("HTTP server failed: {}", e);
            } else {
                info!("HTTP server task completed");
            }
        });
        self.background_tasks.push(server_handle);

        // Give the server a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("✅ HTTP server started on port {}", port);
        Ok(())
    }

    /// Declare the input queue and start consuming match results
    async fn start_amqp_consumption(&mut self) -> Result<(), ServiceError> {
        let queue_name = self.config.amqp.queue_name.clone();

        let channel =
            self.amqp_connection
                .open_channel()
                .await
                .map_err(|e| ServiceError::AmqpConnection {
                    message: format!("Failed to open consumer channel: {}", e),
                })?;

        let queue_declare_args = amqprs::channel::QueueDeclareArguments::new(&queue_name)
            .durable(true)
            .auto_delete(false)
            .finish();

        channel
            .queue_declare(queue_declare_args)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to declare queue {}: {}", queue_name, e),
            })?;

        info!("Queue '{}' declared", queue_name);

        let message_handler = Arc::new(StatsUpdateHandler::new(
            self.engine.clone(),
            self.publisher.clone(),
            self.metrics_service.collector(),
        ));

        let consumer = MatchResultConsumer::new(message_handler, channel);
        consumer
            .start_consuming(&queue_name)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to start consuming messages: {}", e),
            })?;

        self.result_consumer = Some(consumer);

        info!(
            "AMQP message consumption started on queue '{}'",
            queue_name
        );
        Ok(())
    }

    /// Start background maintenance tasks
    fn start_background_tasks(&mut self) {
        let metrics_task = {
            let engine = self.engine.clone();
            let metrics_collector = self.metrics_service.collector();
            let is_running = self.handle.running_flag();
            let mut ticks = IntervalStream::new(tokio::time::interval(
                self.config.metrics_update_interval(),
            ));

            tokio::spawn(async move {
                info!("Metrics update task started");

                while ticks.next().await.is_some() {
                    if !*is_running.read().await {
                        break;
                    }

                    match engine.engine_stats().await {
                        Ok(stats) => {
                            debug!(
                                "Updating metrics - players: {}, matches: {}",
                                stats.tracked_players, stats.matches_recorded
                            );
                            metrics_collector.update_from_engine_stats(&stats);
                        }
                        Err(e) => warn!("Failed to get engine stats for metrics update: {}", e),
                    }
                }

                info!("Metrics update task stopped");
            })
        };

        let position_task = {
            let engine = self.engine.clone();
            let publisher = self.publisher.clone();
            let is_running = self.handle.running_flag();
            let mut ticks = IntervalStream::new(tokio::time::interval(
                self.config.ranking.position_refresh_interval(),
            ));

            tokio::spawn(async move {
                info!("Leaderboard position refresh task started");

                while ticks.next().await.is_some() {
                    if !*is_running.read().await {
                        break;
                    }
                    refresh_and_announce(&engine, publisher.as_ref()).await;
                }

                info!("Leaderboard position refresh task stopped");
            })
        };

        let health_task = {
            let handle = self.handle.clone();
            let metrics_collector = self.metrics_service.collector();
            let mut ticks = IntervalStream::new(tokio::time::interval(Duration::from_secs(60)));

            tokio::spawn(async move {
                info!("Health metrics task started");

                while ticks.next().await.is_some() {
                    if !handle.is_running().await {
                        break;
                    }

                    metrics_collector
                        .service()
                        .uptime_seconds
                        .set(handle.uptime_seconds() as i64);

                    match HealthCheck::check(&handle).await {
                        Ok(health) => {
                            metrics_collector.update_health_status(health.status.as_gauge());
                            for check in &health.checks {
                                metrics_collector.update_component_health(
                                    &check.name,
                                    check.status.as_gauge() > 0,
                                );
                            }
                        }
                        Err(e) => warn!("Health check failed: {}", e),
                    }
                }

                info!("Health metrics task stopped");
            })
        };

        self.background_tasks.push(metrics_task);
        self.background_tasks.push(position_task);
        self.background_tasks.push(health_task);

        info!("Background maintenance tasks started");
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for task in self.background_tasks.drain(..) {
            task.abort();
        }

        tokio::time::sleep(Duration::from_millis(500)).await;

        info!("✅ All {} background tasks stopped", task_count);
    }
}

/// Recompute leaderboard positions and announce the refresh if any moved
pub async fn refresh_and_announce(engine: &RankingEngine, publisher: &dyn EventPublisher) {
    let updated = match engine.refresh_positions().await {
        Ok(updated) => updated,
        Err(e) => {
            warn!("Leaderboard position refresh failed: {}", e);
            return;
        }
    };

    if updated == 0 {
        debug!("Position refresh completed - no positions changed");
        return;
    }

    let total_players = match engine.engine_stats().await {
        Ok(stats) => stats.tracked_players,
        Err(e) => {
            warn!("Failed to count players after position refresh: {}", e);
            return;
        }
    };

    let event = LeaderboardRefreshed {
        positions_updated: updated,
        total_players,
        timestamp: current_timestamp(),
    };
    if let Err(e) = publisher.publish_leaderboard_refreshed(event).await {
        warn!("Failed to publish leaderboard refresh: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amqp::publisher::MockEventPublisher;
    use crate::stats::{RankingRules, ScoreWeights};
    use crate::types::MatchOutcome;
    use crate::utils::generate_game_id;

    fn create_handler() -> (StatsUpdateHandler, Arc<RankingEngine>, Arc<MockEventPublisher>) {
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let engine = Arc::new(RankingEngine::with_metrics(
            Arc::new(InMemoryStatsStorage::new()),
            RankingRules::default(),
            ScoreWeights::default(),
            metrics.clone(),
        ));
        let publisher = Arc::new(MockEventPublisher::new());
        let handler = StatsUpdateHandler::new(engine.clone(), publisher.clone(), metrics);
        (handler, engine, publisher)
    }

    #[tokio::test]
    async fn test_match_completed_updates_and_announces_both_players() {
        let (handler, engine, publisher) = create_handler();
        let game_id = generate_game_id();

        handler
            .handle_match_completed(MatchCompleted {
                game_id,
                game_type: "checkers".to_string(),
                winner_id: "alice".to_string(),
                loser_id: "bob".to_string(),
                completed_at: current_timestamp(),
            })
            .await
            .unwrap();

        let updates = publisher.stats_updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].player_id, "alice");
        assert_eq!(updates[0].rank_delta, 30);
        assert_eq!(updates[0].stats.score, 165);
        assert_eq!(updates[1].player_id, "bob");
        assert_eq!(updates[1].outcome, MatchOutcome::Loss);
        assert_eq!(updates[1].game_id, Some(game_id));

        assert_eq!(
            engine.get_stats(&"bob".to_string()).await.unwrap().games_lost,
            1
        );
    }

    #[tokio::test]
    async fn test_self_match_is_rejected_without_records() {
        let (handler, engine, publisher) = create_handler();

        let result = handler
            .handle_match_completed(MatchCompleted {
                game_id: generate_game_id(),
                game_type: "checkers".to_string(),
                winner_id: "alice".to_string(),
                loser_id: "alice".to_string(),
                completed_at: current_timestamp(),
            })
            .await;

        assert!(result.is_err());
        assert!(publisher.stats_updates().is_empty());
        assert_eq!(engine.engine_stats().await.unwrap().tracked_players, 0);
    }

    #[tokio::test]
    async fn test_outcome_reported() {
        let (handler, engine, publisher) = create_handler();

        handler
            .handle_outcome_reported(OutcomeReported {
                game_id: generate_game_id(),
                player_id: "carol".to_string(),
                outcome: MatchOutcome::Loss,
                reported_at: current_timestamp(),
            })
            .await
            .unwrap();

        let stats = engine.get_stats(&"carol".to_string()).await.unwrap();
        assert_eq!(stats.games_played, 1);
        assert_eq!(stats.rank, 0);
        assert_eq!(publisher.stats_updates()[0].rank_delta, 0);
    }

    #[tokio::test]
    async fn test_refresh_and_announce() {
        let (handler, engine, publisher) = create_handler();
        handler
            .handle_match_completed(MatchCompleted {
                game_id: generate_game_id(),
                game_type: "checkers".to_string(),
                winner_id: "alice".to_string(),
                loser_id: "bob".to_string(),
                completed_at: current_timestamp(),
            })
            .await
            .unwrap();

        refresh_and_announce(&engine, publisher.as_ref()).await;
        refresh_and_announce(&engine, publisher.as_ref()).await;

        let refreshes = publisher.leaderboard_refreshes();
        assert_eq!(refreshes.len(), 1);
        assert_eq!(refreshes[0].positions_updated, 2);
        assert_eq!(refreshes[0].total_players, 2);
    }
}
