//! Health check aggregation
//!
//! This module provides health check functionality for the arena-standings
//! service, including readiness and liveness probes.

use crate::amqp::connection::AmqpConnection;
use crate::stats::engine::RankingEngine;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Numeric form used by the health status gauge
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Unhealthy => 0,
            HealthStatus::Degraded => 1,
            HealthStatus::Healthy => 2,
        }
    }

    /// Combine with a component status; the worse one wins
    fn worst(self, other: HealthStatus) -> HealthStatus {
        if other.as_gauge() < self.as_gauge() {
            other
        } else {
            self
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Cloneable view of the running service used by health checks and HTTP handlers
#[derive(Clone)]
pub struct ServiceHandle {
    service_name: String,
    engine: Arc<RankingEngine>,
    amqp_connection: Option<Arc<AmqpConnection>>,
    is_running: Arc<RwLock<bool>>,
    started_at: Instant,
}

impl ServiceHandle {
    pub fn new(service_name: impl Into<String>, engine: Arc<RankingEngine>) -> Self {
        Self {
            service_name: service_name.into(),
            engine,
            amqp_connection: None,
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        }
    }

    /// Attach the broker connection whose state is reported by health checks
    pub fn with_amqp_connection(mut self, connection: Arc<AmqpConnection>) -> Self {
        self.amqp_connection = Some(connection);
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn engine(&self) -> Arc<RankingEngine> {
        self.engine.clone()
    }

    pub fn amqp_connection(&self) -> Option<Arc<AmqpConnection>> {
        self.amqp_connection.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub async fn set_running(&self, running: bool) {
        *self.is_running.write().await = running;
    }

    /// Shared running flag, polled by background tasks
    pub fn running_flag(&self) -> Arc<RwLock<bool>> {
        self.is_running.clone()
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Players with a stats record
    pub tracked_players: usize,
    /// Two-player matches settled since start
    pub matches_recorded: u64,
    pub wins_applied: u64,
    pub losses_applied: u64,
    /// Results refused as invalid
    pub results_rejected: u64,
    pub storage_failures: u64,
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(handle: &ServiceHandle) -> Result<Self> {
        let mut checks = Vec::new();

        let service_check = Self::check_service_running(handle).await;
        let mut overall_status = service_check.status;
        checks.push(service_check);

        let engine_check = Self::check_ranking_engine(handle).await;
        overall_status = overall_status.worst(engine_check.status);
        checks.push(engine_check);

        let amqp_check = Self::check_amqp_health(handle);
        overall_status = overall_status.worst(amqp_check.status);
        checks.push(amqp_check);

        let stats = Self::gather_service_stats(handle).await;

        Ok(HealthCheck {
            status: overall_status,
            service: handle.service_name().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(handle: &ServiceHandle) -> Result<HealthStatus> {
        if handle.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can handle requests
    pub async fn readiness_check(handle: &ServiceHandle) -> Result<HealthStatus> {
        if !handle.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_ranking_engine(handle).await.status)
    }

    async fn check_service_running(handle: &ServiceHandle) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = if handle.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// The engine is usable if its storage answers
    async fn check_ranking_engine(handle: &ServiceHandle) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = match handle.engine().engine_stats().await {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Ranking engine stats check failed: {}", e);
                (
                    HealthStatus::Degraded,
                    Some(format!("Stats check failed: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "ranking_engine".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_amqp_health(handle: &ServiceHandle) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = match handle.amqp_connection() {
            Some(connection) if connection.is_alive() => (HealthStatus::Healthy, None),
            Some(_) => (
                HealthStatus::Unhealthy,
                Some("AMQP connection is closed".to_string()),
            ),
            None => (
                HealthStatus::Degraded,
                Some("No AMQP connection attached".to_string()),
            ),
        };

        ComponentCheck {
            name: "amqp_connection".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn gather_service_stats(handle: &ServiceHandle) -> ServiceStats {
        match handle.engine().engine_stats().await {
            Ok(stats) => ServiceStats {
                tracked_players: stats.tracked_players,
                matches_recorded: stats.matches_recorded,
                wins_applied: stats.wins_applied,
                losses_applied: stats.losses_applied,
                results_rejected: stats.results_rejected,
                storage_failures: stats.storage_failures,
                uptime_seconds: handle.uptime_seconds(),
            },
            Err(e) => {
                debug!("Failed to get engine stats for health check: {}", e);
                ServiceStats {
                    uptime_seconds: handle.uptime_seconds(),
                    ..ServiceStats::default()
                }
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{InMemoryStatsStorage, RankingRules, ScoreWeights};

    fn handle() -> ServiceHandle {
        let engine = Arc::new(RankingEngine::new(
            Arc::new(InMemoryStatsStorage::new()),
            RankingRules::default(),
            ScoreWeights::default(),
        ));
        ServiceHandle::new("arena-standings", engine)
    }

    #[tokio::test]
    async fn test_stopped_service_is_unhealthy() {
        let handle = handle();

        assert_eq!(
            HealthCheck::liveness_check(&handle).await.unwrap(),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            HealthCheck::readiness_check(&handle).await.unwrap(),
            HealthStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_running_service_without_broker_is_degraded() {
        let handle = handle();
        handle.set_running(true).await;

        assert_eq!(
            HealthCheck::readiness_check(&handle).await.unwrap(),
            HealthStatus::Healthy
        );

        let health = HealthCheck::check(&handle).await.unwrap();
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.checks.len(), 3);
        assert_eq!(health.service, "arena-standings");
        assert!(health.to_json().unwrap().contains("ranking_engine"));
    }

    #[test]
    fn test_worst_status_wins() {
        assert_eq!(
            HealthStatus::Healthy.worst(HealthStatus::Degraded),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::Unhealthy.worst(HealthStatus::Degraded),
            HealthStatus::Unhealthy
        );
    }
}
