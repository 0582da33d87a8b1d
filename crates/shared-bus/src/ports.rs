//! # Message Bus Port
//!
//! The narrow contract this service needs from an external pub/sub system.

use async_trait::async_trait;
use shared_types::EngagementError;
use std::collections::HashMap;
use thiserror::Error;

/// Attributes attached to a published message.
pub type Attributes = HashMap<String, String>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// Publishing to a topic that was never ensured.
    #[error("topic not found: {0}")]
    TopicNotFound(String),

    /// The bus could not be reached.
    #[error("message bus unavailable: {0}")]
    Unavailable(String),
}

impl From<BusError> for EngagementError {
    fn from(err: BusError) -> Self {
        EngagementError::upstream(err.to_string())
    }
}

/// Driven port over the message bus.
///
/// `ensure_*` calls are create-if-absent and safe to run from every replica
/// on every start.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn ensure_topic(&self, topic: &str) -> Result<(), BusError>;

    async fn ensure_subscription(
        &self,
        topic: &str,
        subscription: &str,
        push_endpoint: &str,
    ) -> Result<(), BusError>;

    /// Publishes one message and returns the bus-assigned message ID.
    async fn publish(
        &self,
        topic: &str,
        data: Vec<u8>,
        attributes: Attributes,
    ) -> Result<String, BusError>;
}
