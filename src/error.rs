//! Error types for the standings service
//!
//! Fallible operations return `anyhow::Result`, with the domain failures
//! below carried inside so callers can classify them by downcasting.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Domain errors for stats, ranking and their transports
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StandingsError {
    #[error("Invalid match outcome: {value:?} (expected \"win\" or \"loss\")")]
    InvalidOutcome { value: String },

    #[error("Player stats not found: {player_id}")]
    PlayerNotFound { player_id: String },

    #[error("Stats storage error: {message}")]
    StorageError { message: String },

    #[error("Invalid match result: {reason}")]
    InvalidMatchResult { reason: String },

    #[error("AMQP connection failed: {message}")]
    AmqpConnectionFailed { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl StandingsError {
    /// Classify an `anyhow::Error` as one of ours, if it is one
    pub fn classify(error: &anyhow::Error) -> Option<&StandingsError> {
        error.downcast_ref::<StandingsError>()
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            StandingsError::InvalidOutcome { .. } => "invalid_outcome",
            StandingsError::PlayerNotFound { .. } => "not_found",
            StandingsError::StorageError { .. } => "storage",
            StandingsError::InvalidMatchResult { .. } => "invalid_match",
            StandingsError::AmqpConnectionFailed { .. } => "amqp",
            StandingsError::ConfigurationError { .. } => "configuration",
            StandingsError::InternalError { .. } => "internal",
        }
    }
}
