//! # Notification Dispatcher
//!
//! Publish side of the event flow. After every successful mutation the
//! lifecycle engine hands the element here; it is wrapped in a
//! `NotificationEnvelope` and published to the namespaced topic.
//!
//! Publish failures are returned to the caller. The mutation they describe
//! is already persisted, so callers decide whether to surface or log them.

use crate::ports::{Attributes, MessageBus};
use crate::push::{FLAVOUR_ATTRIBUTE, TOPIC_ID_ATTRIBUTE, UID_ATTRIBUTE};
use crate::topics::{Topic, TopicNamespace};
use async_trait::async_trait;
use shared_types::{Element, EngagementError, Flavour, Metadata, NotificationEnvelope, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info};
use url::Url;

/// Default bound on a single publish call.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Publishes element changes to topics.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Validates the element, wraps it and publishes to `topic`.
    ///
    /// Returns the bus message ID.
    async fn notify(
        &self,
        topic: Topic,
        uid: &str,
        flavour: Flavour,
        element: &dyn Element,
        metadata: Metadata,
    ) -> Result<String>;
}

pub struct NotificationDispatcher {
    bus: Arc<dyn MessageBus>,
    namespace: TopicNamespace,
    callback_url: String,
    publish_timeout: Duration,
    published: AtomicU64,
}

impl NotificationDispatcher {
    /// Fails with a validation error on a blank environment or a callback
    /// URL that is not absolute http(s).
    pub fn new(
        bus: Arc<dyn MessageBus>,
        namespace: TopicNamespace,
        callback_url: impl Into<String>,
        publish_timeout: Duration,
    ) -> Result<Self> {
        let callback_url = callback_url.into();
        if namespace.environment().trim().is_empty() {
            return Err(EngagementError::validation("environment must not be blank"));
        }
        let parsed = Url::parse(&callback_url).map_err(|e| {
            EngagementError::validation(format!("invalid callback url {callback_url:?}: {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(EngagementError::validation(format!(
                "callback url {callback_url:?} must be http or https"
            )));
        }
        Ok(Self {
            bus,
            namespace,
            callback_url,
            publish_timeout,
            published: AtomicU64::new(0),
        })
    }

    pub fn namespace(&self) -> &TopicNamespace {
        &self.namespace
    }

    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    /// Number of messages published through this dispatcher.
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Ensures every catalogue topic exists with a push subscription to the
    /// callback URL. Idempotent; run on every start.
    pub async fn ensure_catalogue(&self) -> Result<()> {
        for topic in Topic::ALL {
            let name = self.namespace.topic_name(topic);
            let subscription = self.namespace.subscription_name(topic);
            self.bounded("ensure topic", self.bus.ensure_topic(&name))
                .await?;
            self.bounded(
                "ensure subscription",
                self.bus
                    .ensure_subscription(&name, &subscription, &self.callback_url),
            )
            .await?;
        }
        info!(
            topics = Topic::ALL.len(),
            environment = self.namespace.environment(),
            callback_url = %self.callback_url,
            "Topic catalogue ensured"
        );
        Ok(())
    }

    /// Publishes a payload that is not a `NotificationEnvelope`, such as an
    /// FCM request or an e-mail message.
    pub async fn publish_raw(
        &self,
        topic: Topic,
        data: Vec<u8>,
        mut attributes: Attributes,
    ) -> Result<String> {
        let name = self.namespace.topic_name(topic);
        attributes.insert(TOPIC_ID_ATTRIBUTE.to_string(), name.clone());

        let message_id = self
            .bounded("publish", self.bus.publish(&name, data, attributes))
            .await
            .map_err(|e| {
                error!(topic = %name, error = %e, "Publish failed");
                e
            })?;

        self.published.fetch_add(1, Ordering::Relaxed);
        debug!(topic = %name, message_id = %message_id, "Published");
        Ok(message_id)
    }

    async fn bounded<T, E>(
        &self,
        operation: &str,
        fut: impl std::future::Future<Output = std::result::Result<T, E>>,
    ) -> Result<T>
    where
        E: Into<EngagementError>,
    {
        match timeout(self.publish_timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(EngagementError::timed_out(operation)),
        }
    }
}

#[async_trait]
impl Notifier for NotificationDispatcher {
    async fn notify(
        &self,
        topic: Topic,
        uid: &str,
        flavour: Flavour,
        element: &dyn Element,
        metadata: Metadata,
    ) -> Result<String> {
        if !topic.carries_envelope() {
            return Err(EngagementError::validation(format!(
                "{topic} carries raw payloads, not element notifications"
            )));
        }
        let envelope = NotificationEnvelope::wrap(uid, flavour, element, metadata)?;

        let mut attributes = Attributes::new();
        attributes.insert(UID_ATTRIBUTE.to_string(), uid.to_string());
        attributes.insert(FLAVOUR_ATTRIBUTE.to_string(), flavour.to_string());

        self.publish_raw(topic, envelope.to_bytes()?, attributes)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryMessageBus;
    use shared_types::{metadata, Action, ErrorKind};

    fn action() -> Action {
        Action {
            id: "a1".into(),
            sequence_number: 1,
            name: "GET_TEST".into(),
            ..Default::default()
        }
    }

    fn dispatcher(bus: Arc<InMemoryMessageBus>) -> NotificationDispatcher {
        NotificationDispatcher::new(
            bus,
            TopicNamespace::new("test"),
            "http://localhost:8080/pubsub",
            DEFAULT_PUBLISH_TIMEOUT,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_blank_environment_and_relative_callback() {
        let bus = Arc::new(InMemoryMessageBus::new());
        assert!(NotificationDispatcher::new(
            bus.clone(),
            TopicNamespace::new(" "),
            "http://localhost/pubsub",
            DEFAULT_PUBLISH_TIMEOUT
        )
        .is_err());
        assert!(NotificationDispatcher::new(
            bus,
            TopicNamespace::new("test"),
            "/pubsub",
            DEFAULT_PUBLISH_TIMEOUT
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_ensure_catalogue_creates_every_topic_with_push_endpoint() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let d = dispatcher(bus.clone());
        d.ensure_catalogue().await.unwrap();
        d.ensure_catalogue().await.unwrap();

        assert_eq!(bus.topics().len(), Topic::ALL.len());
        assert_eq!(bus.subscription_count(), Topic::ALL.len());
        let sub = bus
            .subscription("engagement-items.pin-test-v1-subscription")
            .unwrap();
        assert_eq!(sub.push_endpoint, "http://localhost:8080/pubsub");
    }

    #[tokio::test]
    async fn test_notify_publishes_envelope_with_topic_attribute() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let d = dispatcher(bus.clone());
        d.ensure_catalogue().await.unwrap();

        d.notify(
            Topic::ActionPublish,
            "u1",
            Flavour::Consumer,
            &action(),
            metadata([("actionID", "a1")]),
        )
        .await
        .unwrap();

        let sent = bus.published_on("engagement-actions.publish-test-v1");
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].attributes.get(TOPIC_ID_ATTRIBUTE).map(String::as_str),
            Some("engagement-actions.publish-test-v1")
        );
        let envelope = NotificationEnvelope::from_bytes(&sent[0].data).unwrap();
        assert_eq!(envelope.uid, "u1");
        assert_eq!(envelope.decode_payload::<Action>().unwrap(), action());
        assert_eq!(d.published_count(), 1);
    }

    #[tokio::test]
    async fn test_notify_surfaces_bus_failure() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let d = dispatcher(bus.clone());
        d.ensure_catalogue().await.unwrap();
        bus.set_unavailable(true);

        let err = d
            .notify(
                Topic::ActionDelete,
                "u1",
                Flavour::Pro,
                &action(),
                Metadata::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Upstream);
        assert_eq!(d.published_count(), 0);
    }

    #[tokio::test]
    async fn test_notify_refuses_raw_payload_topics() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let d = dispatcher(bus.clone());
        d.ensure_catalogue().await.unwrap();
        for topic in [Topic::FcmSendNotification, Topic::MailsInbox] {
            let err = d
                .notify(topic, "u1", Flavour::Consumer, &action(), Metadata::new())
                .await
                .unwrap_err();
            assert_eq!(err.kind, ErrorKind::Validation);
        }
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn test_notify_rejects_invalid_element_before_publishing() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let d = dispatcher(bus.clone());
        d.ensure_catalogue().await.unwrap();
        let mut bad = action();
        bad.id.clear();

        let err = d
            .notify(Topic::ActionPublish, "u1", Flavour::Pro, &bad, Metadata::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(bus.published().is_empty());
    }
}
