//! Arena Standings - player statistics and ranking microservice
//!
//! This crate applies completed match results to per-player stats records,
//! derives ranks, scores and leaderboards from them, and exposes the results
//! over AMQP events and HTTP.

pub mod amqp;
pub mod config;
pub mod error;
pub mod leaderboard;
pub mod metrics;
pub mod service;
pub mod stats;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{Result, StandingsError};
pub use types::*;

// Re-export key components
pub use amqp::publisher::EventPublisher;
pub use leaderboard::{Leaderboard, LeaderboardEntry, Page};
pub use stats::{
    EngineStats, InMemoryStatsStorage, MatchSettlement, OutcomeApplied, PlayerStatsRecord,
    RankedStats, RankingEngine, RankingRules, ScoreWeights, StatsStorage,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
