//! # Local Delivery
//!
//! With the in-memory bus nothing calls the webhook, so this task plays the
//! part of the push subscriptions: every published message is wrapped in the
//! push body its subscription would POST and handed to the topic router.
//!
//! Upstream failures are retried a bounded number of times, like a push
//! subscription redelivering. Other failures are logged and dropped.

use en_04_topic_router::{Ack, TopicRouter};
use shared_bus::{InMemoryMessageBus, PublishedMessage};
use shared_types::{ErrorKind, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Deliveries attempted per message.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Delay before the first redelivery; doubled on each attempt.
pub const REDELIVERY_BACKOFF: Duration = Duration::from_millis(100);

pub struct LocalDelivery {
    receiver: broadcast::Receiver<PublishedMessage>,
    router: Arc<TopicRouter>,
}

impl LocalDelivery {
    /// Subscribes to `bus`. Only messages published after this call are seen.
    pub fn new(bus: &InMemoryMessageBus, router: Arc<TopicRouter>) -> Self {
        Self {
            receiver: bus.subscribe(),
            router,
        }
    }

    /// Runs until the bus is dropped.
    pub async fn run(mut self) {
        loop {
            match self.receiver.recv().await {
                Ok(message) => {
                    if let Err(e) = self.deliver(&message).await {
                        warn!(
                            topic = %message.topic,
                            message_id = %message.message_id,
                            error = %e,
                            "Local delivery dropped"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Local delivery lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Message bus closed, local delivery stopping");
                    break;
                }
            }
        }
    }

    /// Delivers one message, redelivering on upstream failures.
    pub async fn deliver(&self, message: &PublishedMessage) -> Result<Ack> {
        let namespace = self.router.namespace();
        let subscription = namespace
            .resolve(&message.topic)
            .map(|topic| namespace.subscription_name(topic))
            .unwrap_or_default();

        let mut backoff = REDELIVERY_BACKOFF;
        let mut attempt = 1;
        loop {
            let push = message.to_push_envelope(subscription.clone());
            match self.router.dispatch(push).await {
                Ok(ack) => {
                    debug!(topic = %message.topic, message_id = %message.message_id, ?ack, "Delivered locally");
                    return Ok(ack);
                }
                Err(e) if e.kind == ErrorKind::Upstream && attempt < MAX_DELIVERY_ATTEMPTS => {
                    debug!(attempt, error = %e, "Redelivering after upstream failure");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Spawns [`run`](Self::run), stopping early when `shutdown` flips.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::select! {
                _ = self.run() => {}
                _ = shutdown.changed() => {
                    info!("Local delivery shutdown signal received");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngagementConfig;
    use crate::context::AppContext;
    use chrono::{Duration as ChronoDuration, Utc};
    use en_01_lifecycle::LifecycleApi;
    use shared_types::{Flavour, Item, Link, LinkType};

    fn item(id: &str) -> Item {
        Item {
            id: id.into(),
            persistent: true,
            label: "BILLING".into(),
            tagline: "Invoice".into(),
            summary: "Invoice 42 is ready".into(),
            expiry: Utc::now() + ChronoDuration::days(7),
            icon: Link {
                id: "i".into(),
                url: "https://assets.example.com/i.png".into(),
                link_type: LinkType::PngImage,
                ..Default::default()
            },
            users: vec!["u1".into()],
            ..Default::default()
        }
    }

    async fn eventually<F>(mut check: F)
    where
        F: FnMut() -> bool,
    {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_published_item_is_routed_back() {
        let ctx = AppContext::build(EngagementConfig::default()).await.unwrap();
        ctx.device_tokens.register("u1", "token-1");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = LocalDelivery::new(&ctx.bus, ctx.topic_router.clone()).spawn(shutdown_rx);

        ctx.lifecycle
            .publish_item("u1", Flavour::Consumer, item("x"))
            .await
            .unwrap();

        let push = ctx.push.clone();
        eventually(|| push.sent().len() == 1).await;
        let mut labelled = false;
        for _ in 0..100 {
            let labels = ctx.feeds.labels("u1", Flavour::Consumer).await.unwrap();
            if labels.iter().any(|l| l == "BILLING") {
                labelled = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(labelled);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_redelivery_of_same_message_is_duplicate() {
        let ctx = AppContext::build(EngagementConfig::default()).await.unwrap();
        let delivery = LocalDelivery::new(&ctx.bus, ctx.topic_router.clone());
        ctx.lifecycle
            .publish_item("u1", Flavour::Consumer, item("x"))
            .await
            .unwrap();
        let message = ctx.bus.published().pop().unwrap();

        assert_eq!(delivery.deliver(&message).await.unwrap(), Ack::Processed);
        assert_eq!(delivery.deliver(&message).await.unwrap(), Ack::Duplicate);
    }

    #[tokio::test]
    async fn test_unknown_topic_is_not_retried() {
        let ctx = AppContext::build(EngagementConfig::default()).await.unwrap();
        let delivery = LocalDelivery::new(&ctx.bus, ctx.topic_router.clone());
        let message = PublishedMessage {
            message_id: "m".into(),
            topic: "engagement-unknown-staging-v1".into(),
            data: b"{}".to_vec(),
            attributes: Default::default(),
        };
        let err = delivery.deliver(&message).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
