//! Service layer for the arena-standings service
//!
//! This module contains the main application state, service coordination,
//! and background task management for the production service.

pub mod app;
pub mod health;

pub use app::{refresh_and_announce, AppState, ServiceError, StatsUpdateHandler};
pub use health::{HealthCheck, HealthStatus, ServiceHandle};
