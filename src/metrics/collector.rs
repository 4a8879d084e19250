//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the arena-standings
//! service using Prometheus metrics.

use crate::error::StandingsError;
use crate::stats::engine::EngineStats;
use crate::types::MatchOutcome;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the standings service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Ranking-related metrics
    ranking_metrics: RankingMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Total AMQP messages processed
    pub amqp_messages_total: IntCounterVec,

    /// AMQP message processing errors
    pub amqp_errors_total: IntCounterVec,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Ranking-related metrics
#[derive(Clone)]
pub struct RankingMetrics {
    /// Outcomes applied to stats records, by outcome
    pub outcomes_applied_total: IntCounterVec,

    /// Two-player matches settled
    pub matches_recorded_total: IntCounter,

    /// Match results rejected before touching any record, by reason
    pub results_rejected_total: IntCounterVec,

    /// Failed storage reads or writes
    pub storage_errors_total: IntCounter,

    /// Stats records provisioned for new players
    pub players_provisioned_total: IntCounter,

    /// Number of players with a stats record
    pub tracked_players: IntGauge,

    /// Absolute rank change per applied outcome
    pub rank_delta: HistogramVec,

    /// Leaderboard position refreshes that changed at least one record
    pub position_updates_total: IntCounter,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Load, apply and save of one outcome
    pub outcome_apply_duration: Histogram,

    /// Settlement of a full two-player match
    pub match_settlement_duration: Histogram,

    /// Leaderboard construction
    pub leaderboard_build_duration: Histogram,

    /// Leaderboard position refresh
    pub position_refresh_duration: Histogram,

    /// AMQP operation durations
    pub amqp_operation_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let ranking_metrics = RankingMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            ranking_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get ranking metrics
    pub fn ranking(&self) -> &RankingMetrics {
        &self.ranking_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Refresh gauges from the engine's counters
    pub fn update_from_engine_stats(&self, stats: &EngineStats) {
        self.ranking_metrics
            .tracked_players
            .set(stats.tracked_players as i64);
    }

    /// Record one outcome applied to a stats record
    pub fn record_outcome_applied(&self, outcome: MatchOutcome, rank_delta: i64, duration: Duration) {
        self.ranking_metrics
            .outcomes_applied_total
            .with_label_values(&[outcome.as_str()])
            .inc();

        self.ranking_metrics
            .rank_delta
            .with_label_values(&[outcome.as_str()])
            .observe(rank_delta.unsigned_abs() as f64);

        self.performance_metrics
            .outcome_apply_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a settled two-player match
    pub fn record_match_recorded(&self, duration: Duration) {
        self.ranking_metrics.matches_recorded_total.inc();
        self.performance_metrics
            .match_settlement_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a match result that was refused before any update
    pub fn record_result_rejected(&self, error: &StandingsError) {
        self.ranking_metrics
            .results_rejected_total
            .with_label_values(&[error.kind()])
            .inc();
    }

    /// Record a storage failure
    pub fn record_storage_error(&self) {
        self.ranking_metrics.storage_errors_total.inc();
    }

    /// Record a newly provisioned stats record
    pub fn record_player_provisioned(&self) {
        self.ranking_metrics.players_provisioned_total.inc();
        self.ranking_metrics.tracked_players.inc();
    }

    /// Record a removed stats record
    pub fn record_player_removed(&self) {
        self.ranking_metrics.tracked_players.dec();
    }

    /// Record a leaderboard build
    pub fn record_leaderboard_build(&self, duration: Duration) {
        self.performance_metrics
            .leaderboard_build_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a position refresh
    pub fn record_position_refresh(&self, updated: usize, duration: Duration) {
        if updated > 0 {
            self.ranking_metrics.position_updates_total.inc();
        }
        self.performance_metrics
            .position_refresh_duration
            .observe(duration.as_secs_f64());
    }

    /// Record AMQP operation
    pub fn record_amqp_operation(&self, operation: &str, success: bool, duration: Duration) {
        let status = if success { "success" } else { "error" };

        self.service_metrics
            .amqp_messages_total
            .with_label_values(&[operation, status])
            .inc();

        if !success {
            self.service_metrics
                .amqp_errors_total
                .with_label_values(&[operation])
                .inc();
        }

        self.performance_metrics
            .amqp_operation_duration
            .with_label_values(&[operation, status])
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("arena_standings_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let amqp_messages_total = IntCounterVec::new(
            Opts::new(
                "arena_standings_amqp_messages_total",
                "Total AMQP messages processed",
            ),
            &["operation", "status"],
        )?;
        registry.register(Box::new(amqp_messages_total.clone()))?;

        let amqp_errors_total = IntCounterVec::new(
            Opts::new("arena_standings_amqp_errors_total", "Total AMQP errors"),
            &["operation"],
        )?;
        registry.register(Box::new(amqp_errors_total.clone()))?;

        let health_status = IntGauge::new(
            "arena_standings_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new(
                "arena_standings_component_health",
                "Component health status",
            ),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            amqp_messages_total,
            amqp_errors_total,
            health_status,
            component_health,
        })
    }
}

impl RankingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let outcomes_applied_total = IntCounterVec::new(
            Opts::new(
                "arena_standings_outcomes_applied_total",
                "Match outcomes applied to stats records",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(outcomes_applied_total.clone()))?;

        let matches_recorded_total = IntCounter::new(
            "arena_standings_matches_recorded_total",
            "Two-player matches settled",
        )?;
        registry.register(Box::new(matches_recorded_total.clone()))?;

        let results_rejected_total = IntCounterVec::new(
            Opts::new(
                "arena_standings_results_rejected_total",
                "Match results rejected before any update",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(results_rejected_total.clone()))?;

        let storage_errors_total = IntCounter::new(
            "arena_standings_storage_errors_total",
            "Stats storage failures",
        )?;
        registry.register(Box::new(storage_errors_total.clone()))?;

        let players_provisioned_total = IntCounter::new(
            "arena_standings_players_provisioned_total",
            "Stats records provisioned",
        )?;
        registry.register(Box::new(players_provisioned_total.clone()))?;

        let tracked_players = IntGauge::new(
            "arena_standings_tracked_players",
            "Players with a stats record",
        )?;
        registry.register(Box::new(tracked_players.clone()))?;

        let rank_delta = HistogramVec::new(
            HistogramOpts::new(
                "arena_standings_rank_delta",
                "Absolute rank change per applied outcome",
            )
            .buckets(vec![0.0, 5.0, 15.0, 30.0, 35.0, 40.0, 45.0, 50.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(rank_delta.clone()))?;

        let position_updates_total = IntCounter::new(
            "arena_standings_position_updates_total",
            "Position refreshes that changed at least one record",
        )?;
        registry.register(Box::new(position_updates_total.clone()))?;

        Ok(Self {
            outcomes_applied_total,
            matches_recorded_total,
            results_rejected_total,
            storage_errors_total,
            players_provisioned_total,
            tracked_players,
            rank_delta,
            position_updates_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let outcome_apply_duration = Histogram::with_opts(
            HistogramOpts::new(
                "arena_standings_outcome_apply_duration_seconds",
                "Outcome load/apply/save time",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1]),
        )?;
        registry.register(Box::new(outcome_apply_duration.clone()))?;

        let match_settlement_duration = Histogram::with_opts(
            HistogramOpts::new(
                "arena_standings_match_settlement_duration_seconds",
                "Two-player match settlement time",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        )?;
        registry.register(Box::new(match_settlement_duration.clone()))?;

        let leaderboard_build_duration = Histogram::with_opts(
            HistogramOpts::new(
                "arena_standings_leaderboard_build_duration_seconds",
                "Leaderboard build time",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(leaderboard_build_duration.clone()))?;

        let position_refresh_duration = Histogram::with_opts(
            HistogramOpts::new(
                "arena_standings_position_refresh_duration_seconds",
                "Leaderboard position refresh time",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(position_refresh_duration.clone()))?;

        let amqp_operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "arena_standings_amqp_operation_duration_seconds",
                "AMQP operation duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation", "status"],
        )?;
        registry.register(Box::new(amqp_operation_duration.clone()))?;

        Ok(Self {
            outcome_apply_duration,
            match_settlement_duration,
            leaderboard_build_duration,
            position_refresh_duration,
            amqp_operation_duration,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    fn render(collector: &MetricsCollector) -> String {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&collector.registry().gather(), &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        let _service = collector.service();
        let _ranking = collector.ranking();
        let _performance = collector.performance();
    }

    #[test]
    fn test_outcome_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_outcome_applied(MatchOutcome::Win, 30, Duration::from_micros(40));
        collector.record_outcome_applied(MatchOutcome::Loss, -15, Duration::from_micros(40));
        collector.record_outcome_applied(MatchOutcome::Loss, 0, Duration::from_micros(40));

        let ranking = collector.ranking();
        assert_eq!(
            ranking
                .outcomes_applied_total
                .with_label_values(&["win"])
                .get(),
            1
        );
        assert_eq!(
            ranking
                .outcomes_applied_total
                .with_label_values(&["loss"])
                .get(),
            2
        );
        assert_eq!(
            ranking.rank_delta.with_label_values(&["loss"]).get_sample_count(),
            2
        );
    }

    #[test]
    fn test_rejections_are_labelled_by_kind() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_result_rejected(&StandingsError::InvalidOutcome {
            value: "draw".to_string(),
        });

        assert_eq!(
            collector
                .ranking()
                .results_rejected_total
                .with_label_values(&["invalid_outcome"])
                .get(),
            1
        );
    }

    #[test]
    fn test_provisioning_tracks_players() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_player_provisioned();
        collector.record_player_provisioned();
        collector.record_player_removed();

        assert_eq!(collector.ranking().tracked_players.get(), 1);
        assert_eq!(collector.ranking().players_provisioned_total.get(), 2);
    }

    #[test]
    fn test_health_status_updates() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.update_health_status(2);
        collector.update_component_health("ranking_engine", true);
        collector.update_component_health("amqp", false);

        assert_eq!(collector.service().health_status.get(), 2);
        let text = render(&collector);
        assert!(text.contains("arena_standings_component_health"));
    }

    #[test]
    fn test_metrics_timer() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let timer = collector.start_timer();

        std::thread::sleep(Duration::from_millis(10));
        let duration = timer.elapsed();

        assert!(duration >= Duration::from_millis(10));

        let final_duration = timer.stop();
        assert!(final_duration >= Duration::from_millis(10));
    }
}
