//! HTTP server for health checks, Prometheus metrics and stats reads
//!
//! This module provides the axum router of the arena-standings service:
//! operational endpoints plus the leaderboard and player stats reads.

use crate::config::RankingSettings;
use crate::error::StandingsError;
use crate::metrics::collector::MetricsCollector;
use crate::service::health::{HealthCheck, HealthStatus, ServiceHandle};
use crate::stats::record::{PlayerStatsRecord, RankedStats};
use crate::stats::score::ScoreBreakdown;
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Upper bound on any list size requested through a query parameter
pub const MAX_LIST_SIZE: usize = 500;

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct HealthServerState {
    pub metrics_collector: Arc<MetricsCollector>,
    pub service: ServiceHandle,
    pub ranking: RankingSettings,
}

/// HTTP server providing monitoring and stats endpoints
pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    /// Create a new health server
    pub fn new(
        config: HealthServerConfig,
        metrics_collector: Arc<MetricsCollector>,
        service: ServiceHandle,
        ranking: RankingSettings,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: HealthServerState {
                metrics_collector,
                service,
                ranking,
            },
            shutdown_tx,
        }
    }

    /// Start the server; returns once a stop signal was received
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid health server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;

        info!("HTTP server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("HTTP server shutdown signal received");
            })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    /// Create the Axum router with all endpoints
    pub fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/alive", get(alive_handler))
            .route("/metrics", get(metrics_handler))
            .route("/stats", get(stats_handler))
            .route("/leaderboard", get(leaderboard_handler))
            .route("/player-stats", get(rank_listing_handler))
            .route("/player-stats/top", get(top_players_handler))
            .route("/player-stats/{player_id}", get(player_stats_handler))
            .with_state(self.state.clone())
    }

    /// Stop the server
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping HTTP server...");

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to HTTP server: {}", e);
        }

        Ok(())
    }
}

/// Map a failed engine call to an HTTP error response
fn error_response(error: anyhow::Error) -> Response {
    let status = match StandingsError::classify(&error) {
        Some(StandingsError::PlayerNotFound { .. }) => StatusCode::NOT_FOUND,
        Some(StandingsError::InvalidOutcome { .. })
        | Some(StandingsError::InvalidMatchResult { .. }) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {}", error);
    }

    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

/// Requested list size, falling back to the default and capped
fn list_size(requested: Option<usize>, default: usize) -> usize {
    requested
        .filter(|size| *size > 0)
        .unwrap_or(default)
        .min(MAX_LIST_SIZE)
}

/// Root endpoint handler - shows service information
async fn root_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    Json(json!({
        "service": state.service.service_name(),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/health",
            "/ready",
            "/alive",
            "/metrics",
            "/stats",
            "/leaderboard",
            "/player-stats",
            "/player-stats/top",
            "/player-stats/{player_id}"
        ]
    }))
}

async fn health_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Health check requested");

    let status = HealthCheck::liveness_check(&state.service)
        .await
        .unwrap_or(HealthStatus::Unhealthy);
    let code = match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (
        code,
        Json(json!({
            "status": status,
            "service": state.service.service_name(),
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

async fn ready_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Readiness check requested");

    match HealthCheck::readiness_check(&state.service).await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "Ready"),
        Ok(HealthStatus::Degraded) => (StatusCode::OK, "Degraded but ready"),
        Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
        Err(e) => {
            error!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
        }
    }
}

async fn alive_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Liveness check requested");

    match HealthCheck::liveness_check(&state.service).await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "Alive"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "Not alive"),
    }
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<HealthServerState>) -> Response {
    let metric_families = state.metrics_collector.registry().gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_output) => {
            debug!("Serving {} metric families", metric_families.len());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, encoder.format_type().to_string())],
                metrics_output,
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

/// Detailed service statistics endpoint handler
async fn stats_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    match HealthCheck::check(&state.service).await {
        Ok(health) => {
            let code = match health.status {
                HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::OK,
            };
            let stats = json!({
                "service": {
                    "name": health.service,
                    "version": health.version,
                    "status": health.status,
                    "uptime_seconds": health.stats.uptime_seconds
                },
                "players": {
                    "tracked": health.stats.tracked_players
                },
                "results": {
                    "matches_recorded": health.stats.matches_recorded,
                    "wins_applied": health.stats.wins_applied,
                    "losses_applied": health.stats.losses_applied,
                    "rejected": health.stats.results_rejected,
                    "storage_failures": health.stats.storage_failures
                },
                "components": health.checks,
                "timestamp": chrono::Utc::now()
            });

            (code, Json(stats))
        }
        Err(e) => {
            error!("Failed to get stats: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "service": {
                        "name": state.service.service_name(),
                        "version": env!("CARGO_PKG_VERSION"),
                        "status": "error"
                    },
                    "error": "Failed to get service stats",
                    "timestamp": chrono::Utc::now()
                })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    limit: Option<usize>,
}

async fn leaderboard_handler(
    State(state): State<HealthServerState>,
    Query(query): Query<LeaderboardQuery>,
) -> Response {
    let limit = list_size(query.limit, state.ranking.leaderboard_limit);
    match state.service.engine().leaderboard(limit).await {
        Ok(board) => Json(board).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct RankListingQuery {
    page: Option<usize>,
    per_page: Option<usize>,
}

async fn rank_listing_handler(
    State(state): State<HealthServerState>,
    Query(query): Query<RankListingQuery>,
) -> Response {
    let per_page = list_size(query.per_page, state.ranking.page_size);
    let page = query.page.unwrap_or(1);
    let engine = state.service.engine();
    match engine.rank_page(page, per_page).await {
        Ok(page) => Json(page.map(|record| record.ranked(engine.weights()))).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct TopPlayersQuery {
    count: Option<usize>,
}

async fn top_players_handler(
    State(state): State<HealthServerState>,
    Query(query): Query<TopPlayersQuery>,
) -> Response {
    let count = list_size(query.count, state.ranking.top_players);
    let engine = state.service.engine();
    match engine.top_players(count).await {
        Ok(players) => {
            let ranked: Vec<RankedStats> = players
                .into_iter()
                .map(|record| record.ranked(engine.weights()))
                .collect();
            Json(ranked).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// One player's record with the values derived from it
#[derive(Debug, Serialize, Deserialize)]
pub struct PlayerStatsView {
    pub stats: PlayerStatsRecord,
    pub win_rate: f64,
    pub score: u64,
    pub level: u64,
    pub score_breakdown: ScoreBreakdown,
}

async fn player_stats_handler(
    State(state): State<HealthServerState>,
    Path(player_id): Path<String>,
) -> Response {
    let engine = state.service.engine();
    match engine.get_stats(&player_id).await {
        Ok(stats) => {
            let breakdown = stats.score_breakdown(engine.weights());
            Json(PlayerStatsView {
                win_rate: stats.win_rate(),
                score: breakdown.total,
                level: stats.level(),
                score_breakdown: breakdown,
                stats,
            })
            .into_response()
        }
        Err(e) => error_response(e),
    }
}
