//! AMQP integration for the standings service
//!
//! This module handles the broker connection, consumption of match results,
//! and publishing of stats events.

pub mod connection;
pub mod handlers;
pub mod messages;
pub mod publisher;

// Re-export commonly used types
pub use connection::{AmqpConfig, AmqpConnection};
pub use handlers::{dispatch_message, MatchResultConsumer, MessageHandler, MockMessageHandler};
pub use messages::*;
pub use publisher::{AmqpEventPublisher, EventPublisher, MockEventPublisher, PublisherConfig};
