//! # In-Memory Message Bus
//!
//! Single-process implementation of [`MessageBus`].
//!
//! Uses `tokio::sync::broadcast` to hand published messages to observers, for
//! example the runtime's loopback delivery task. A hosted pub/sub system would
//! replace it in a distributed deployment.

use crate::ports::{Attributes, BusError, MessageBus};
use crate::push::{PushEnvelope, PushMessage};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

/// Default number of messages buffered per observer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// A message accepted by the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub message_id: String,
    pub topic: String,
    pub data: Vec<u8>,
    pub attributes: Attributes,
}

impl PublishedMessage {
    /// The body a push subscription would POST for this message.
    pub fn to_push_envelope(&self, subscription: impl Into<String>) -> PushEnvelope {
        PushEnvelope {
            subscription: subscription.into(),
            message: PushMessage {
                message_id: self.message_id.clone(),
                data: self.data.clone(),
                attributes: self.attributes.clone(),
                publish_time: None,
            },
        }
    }
}

/// A push subscription registered on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSubscription {
    pub name: String,
    pub topic: String,
    pub push_endpoint: String,
}

#[derive(Default)]
struct BusState {
    topics: HashSet<String>,
    subscriptions: HashMap<String, PushSubscription>,
    log: Vec<PublishedMessage>,
}

pub struct InMemoryMessageBus {
    state: RwLock<BusState>,
    sender: broadcast::Sender<PublishedMessage>,
    next_id: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryMessageBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            state: RwLock::new(BusState::default()),
            sender,
            next_id: AtomicU64::new(1),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Receives every message published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedMessage> {
        self.sender.subscribe()
    }

    /// Simulates an outage: every call fails with `BusError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<_> = self.state.read().topics.iter().cloned().collect();
        topics.sort();
        topics
    }

    pub fn subscription(&self, name: &str) -> Option<PushSubscription> {
        self.state.read().subscriptions.get(name).cloned()
    }

    /// Subscriptions attached to a topic.
    pub fn subscriptions_for(&self, topic: &str) -> Vec<PushSubscription> {
        self.state
            .read()
            .subscriptions
            .values()
            .filter(|s| s.topic == topic)
            .cloned()
            .collect()
    }

    pub fn subscription_count(&self) -> usize {
        self.state.read().subscriptions.len()
    }

    /// Every message published so far, oldest first.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state.read().log.clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<PublishedMessage> {
        self.state
            .read()
            .log
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    fn check_available(&self) -> Result<(), BusError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BusError::Unavailable("in-memory bus marked unavailable".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn ensure_topic(&self, topic: &str) -> Result<(), BusError> {
        self.check_available()?;
        if self.state.write().topics.insert(topic.to_string()) {
            debug!(topic, "Topic created");
        }
        Ok(())
    }

    async fn ensure_subscription(
        &self,
        topic: &str,
        subscription: &str,
        push_endpoint: &str,
    ) -> Result<(), BusError> {
        self.check_available()?;
        let mut state = self.state.write();
        if !state.topics.contains(topic) {
            return Err(BusError::TopicNotFound(topic.to_string()));
        }
        let entry = PushSubscription {
            name: subscription.to_string(),
            topic: topic.to_string(),
            push_endpoint: push_endpoint.to_string(),
        };
        if state.subscriptions.get(subscription) != Some(&entry) {
            debug!(subscription, push_endpoint, "Push subscription configured");
            state.subscriptions.insert(subscription.to_string(), entry);
        }
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        data: Vec<u8>,
        attributes: Attributes,
    ) -> Result<String, BusError> {
        self.check_available()?;
        let message = {
            let mut state = self.state.write();
            if !state.topics.contains(topic) {
                return Err(BusError::TopicNotFound(topic.to_string()));
            }
            let message = PublishedMessage {
                message_id: self.next_id.fetch_add(1, Ordering::Relaxed).to_string(),
                topic: topic.to_string(),
                data,
                attributes,
            };
            state.log.push(message.clone());
            message
        };

        let receivers = self.sender.send(message.clone()).unwrap_or(0);
        debug!(
            topic,
            message_id = %message.message_id,
            receivers,
            "Message published"
        );
        Ok(message.message_id)
    }
}
