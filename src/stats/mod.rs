//! Player stats: records, ranking rules, scoring and the ranking engine

pub mod engine;
pub mod record;
pub mod rules;
pub mod score;
pub mod storage;

pub use engine::{EngineStats, MatchSettlement, OutcomeApplied, RankingEngine};
pub use record::{PlayerStatsRecord, RankedStats};
pub use rules::{RankingRules, ScoreWeights};
pub use score::{composite_score, display_win_rate, level, win_rate_percent, ScoreBreakdown};
pub use storage::{InMemoryStatsStorage, StatsStorage};
