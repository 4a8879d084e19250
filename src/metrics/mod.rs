//! Metrics and monitoring for the arena-standings service
//!
//! Prometheus collection plus the HTTP server that exposes it alongside the
//! health probes and stats reads.

pub mod collector;
pub mod health;

pub use collector::{
    MetricsCollector, MetricsTimer, PerformanceMetrics, RankingMetrics, ServiceMetrics,
};
pub use health::{HealthServer, HealthServerConfig, PlayerStatsView};

use std::sync::Arc;

/// Unified metrics service that combines all monitoring capabilities
#[derive(Clone)]
pub struct MetricsService {
    collector: Arc<MetricsCollector>,
    health_server: Arc<HealthServer>,
}

impl MetricsService {
    /// Create a new metrics service
    pub fn new(collector: Arc<MetricsCollector>, health_server: Arc<HealthServer>) -> Self {
        Self {
            collector,
            health_server,
        }
    }

    /// Get the metrics collector
    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Get the HTTP server
    pub fn health_server(&self) -> Arc<HealthServer> {
        self.health_server.clone()
    }

    /// Start the HTTP server
    pub async fn start(&self) -> anyhow::Result<()> {
        self.health_server.start().await
    }

    /// Stop the HTTP server
    pub async fn stop(&self) -> anyhow::Result<()> {
        self.health_server.stop().await
    }
}
