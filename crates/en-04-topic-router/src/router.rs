//! # Topic Router
//!
//! ```text
//! POST body ──► verify bearer ──► parse push envelope ──► resolve topicID
//!                                                              │
//!                 ack (2xx) ◄── handler (bounded) ◄── seen? ◄──┘
//! ```
//!
//! Any error makes the webhook answer non-2xx so the bus redelivers. A
//! message ID is only remembered after its handler succeeded.

use crate::handlers::Delivery;
use crate::registry::HandlerRegistry;
use crate::verifier::PushVerifier;
use parking_lot::Mutex;
use shared_bus::{DeliveryCache, PushEnvelope, TopicNamespace};
use shared_types::{EngagementError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Upper bound on a single handler invocation.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// How a delivery was acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// The handler ran and succeeded.
    Processed,
    /// The message ID was already handled by this process.
    Duplicate,
}

pub struct TopicRouter {
    namespace: TopicNamespace,
    verifier: Arc<dyn PushVerifier>,
    registry: HandlerRegistry,
    deliveries: Mutex<DeliveryCache>,
    delivery_timeout: Duration,
}

impl TopicRouter {
    pub fn new(
        namespace: TopicNamespace,
        verifier: Arc<dyn PushVerifier>,
        registry: HandlerRegistry,
    ) -> Self {
        Self {
            namespace,
            verifier,
            registry,
            deliveries: Mutex::new(DeliveryCache::new()),
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_delivery_timeout(mut self, delivery_timeout: Duration) -> Self {
        self.delivery_timeout = delivery_timeout;
        self
    }

    pub fn namespace(&self) -> &TopicNamespace {
        &self.namespace
    }

    /// Webhook entry point: authenticates, then dispatches.
    pub async fn handle(&self, authorization: Option<&str>, body: &[u8]) -> Result<Ack> {
        let claims = self.verifier.verify(authorization).map_err(|e| {
            warn!(error = %e, "Push delivery rejected");
            e
        })?;
        debug!(issuer = %claims.iss, email = %claims.email, "Push delivery authenticated");
        let push = PushEnvelope::from_slice(body)?;
        self.dispatch(push).await
    }

    /// Dispatches an already authenticated delivery.
    pub async fn dispatch(&self, push: PushEnvelope) -> Result<Ack> {
        let topic_id = push
            .topic_id()
            .ok_or_else(|| EngagementError::validation("delivery carries no topicID attribute"))?;
        let topic = self.namespace.resolve(topic_id).ok_or_else(|| {
            EngagementError::validation(format!("unknown topic {topic_id:?}"))
        })?;
        let handler = self.registry.get(topic).ok_or_else(|| {
            EngagementError::validation(format!("no handler registered for {topic}"))
        })?;

        let message_id = push.message_id().to_string();
        if !message_id.is_empty() {
            let seen = self.deliveries.lock().is_acknowledged(&message_id);
            if seen {
                debug!(%topic, message_id = %message_id, "Duplicate delivery acknowledged");
                return Ok(Ack::Duplicate);
            }
        }

        let delivery = Delivery {
            topic,
            message_id,
            data: push.message.data,
            attributes: push.message.attributes,
        };
        match timeout(self.delivery_timeout, handler.handle(&delivery)).await {
            Ok(Ok(())) => {
                if !delivery.message_id.is_empty() {
                    self.deliveries.lock().acknowledge(&delivery.message_id);
                }
                info!(%topic, message_id = %delivery.message_id, "Delivery processed");
                Ok(Ack::Processed)
            }
            Ok(Err(e)) => {
                warn!(%topic, message_id = %delivery.message_id, error = %e, "Delivery failed");
                Err(e)
            }
            Err(_) => {
                warn!(%topic, message_id = %delivery.message_id, "Delivery timed out");
                Err(EngagementError::timed_out(format!("{topic} handler")))
            }
        }
    }
}
