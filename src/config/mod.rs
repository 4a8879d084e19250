//! Configuration management for the arena-standings service
//!
//! Configuration is loaded from environment variables or a TOML file,
//! validated, and falls back to defaults for anything unset.

pub mod app;
pub mod ranking;

// Re-export commonly used types
pub use app::{validate_config, AmqpSettings, AppConfig, ServiceSettings};
pub use ranking::RankingSettings;
