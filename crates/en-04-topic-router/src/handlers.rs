//! # Topic Handlers
//!
//! One handler per topic, each solely responsible for that topic's side
//! effect. External effects are guarded by an applied-effect marker so an
//! at-least-once redelivery does not repeat them.
//!
//! Element markers are keyed by the envelope's notification id, so a later
//! publish that reuses an ID and sequence number still notifies. Raw payload
//! markers are keyed by message id and expire after
//! [`PAYLOAD_EFFECT_RETENTION_HOURS`].

use crate::notifications::{
    EmailMessage, FcmNotifier, SendNotificationPayload, SimpleNotification, ITEM_DELETE_SENDER,
    ITEM_HIDE_SENDER, ITEM_PIN_SENDER, ITEM_PUBLISH_SENDER, ITEM_RESOLVE_SENDER, ITEM_SHOW_SENDER,
    ITEM_UNPIN_SENDER, ITEM_UNRESOLVE_SENDER, NUDGE_DELETE_SENDER, NUDGE_HIDE_SENDER,
    NUDGE_PUBLISH_SENDER, NUDGE_RESOLVE_SENDER, NUDGE_SHOW_SENDER, NUDGE_UNRESOLVE_SENDER,
    SEND_NOTIFICATION_SENDER,
};
use crate::ports::MailService;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use en_01_lifecycle::{EffectMarker, FeedRepository, FeedScope};
use en_03_feed_aggregator::FeedAggregator;
use serde::de::DeserializeOwned;
use shared_bus::{Attributes, Topic};
use shared_types::{
    Action, Element, EngagementError, Event, Flavour, Item, Message, NotificationEnvelope, Nudge,
    Result, DEFAULT_ICON_PATH,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Feed owning the effect markers of raw payloads that name no user.
pub const SYSTEM_UID: &str = "_engagement";

/// Age after which a raw payload marker is pruned.
pub const PAYLOAD_EFFECT_RETENTION_HOURS: i64 = 24;

/// A push delivery whose topic has been resolved.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub topic: Topic,
    pub message_id: String,
    pub data: Vec<u8>,
    pub attributes: Attributes,
}

impl Delivery {
    pub fn envelope(&self) -> Result<NotificationEnvelope> {
        NotificationEnvelope::from_bytes(&self.data)
    }

    /// Decodes `data` as a raw JSON payload.
    pub fn raw<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.data).map_err(|e| {
            EngagementError::validation(format!("malformed {} payload: {e}", self.topic))
        })
    }

    /// Feed named by the `uid`/`flavour` attributes, or the system feed.
    pub fn scope(&self) -> FeedScope {
        let uid = self
            .attributes
            .get(shared_bus::UID_ATTRIBUTE)
            .filter(|u| !u.is_empty())
            .cloned();
        let flavour = self
            .attributes
            .get(shared_bus::FLAVOUR_ATTRIBUTE)
            .and_then(|f| f.parse::<Flavour>().ok());
        match (uid, flavour) {
            (Some(uid), Some(flavour)) => FeedScope::new(uid, flavour),
            _ => FeedScope::new(SYSTEM_UID, Flavour::Consumer),
        }
    }
}

#[async_trait]
pub trait TopicHandler: Send + Sync {
    async fn handle(&self, delivery: &Delivery) -> Result<()>;
}

/// Collaborators shared by the standard handlers.
#[derive(Clone)]
pub struct HandlerDeps {
    pub repo: FeedRepository,
    pub feeds: Arc<FeedAggregator>,
    pub fcm: FcmNotifier,
    pub mail: Arc<dyn MailService>,
}

fn element_effect_key(
    topic: Topic,
    element: &dyn Element,
    envelope: &NotificationEnvelope,
) -> String {
    let key = format!(
        "{}:{}:{}",
        topic.id(),
        element.element_id(),
        element.sequence_number()
    );
    if envelope.notification_id.is_empty() {
        key
    } else {
        format!("{key}:{}", envelope.notification_id)
    }
}

fn message_effect_key(topic: Topic, message_id: &str) -> String {
    format!("{}:{message_id}", topic.id())
}

/// Records a raw payload effect and prunes the scope's expired ones.
async fn record_payload_effect(repo: &FeedRepository, scope: &FeedScope, key: &str) -> Result<()> {
    let now = Utc::now();
    repo.record_effect(scope, &EffectMarker::for_payload(key, now))
        .await?;
    let cutoff = now - Duration::hours(PAYLOAD_EFFECT_RETENTION_HOURS);
    let pruned = repo.prune_payload_effects(scope, cutoff).await?;
    if pruned > 0 {
        debug!(%scope, pruned, "Expired payload effect markers pruned");
    }
    Ok(())
}

fn decode_element<T>(envelope: &NotificationEnvelope) -> Result<T>
where
    T: DeserializeOwned + Element,
{
    let element: T = envelope.decode_payload()?;
    element.validate()?;
    Ok(element)
}

// =============================================================================
// Items
// =============================================================================

pub fn item_sender(topic: Topic) -> Option<&'static str> {
    Some(match topic {
        Topic::ItemPublish => ITEM_PUBLISH_SENDER,
        Topic::ItemDelete => ITEM_DELETE_SENDER,
        Topic::ItemResolve => ITEM_RESOLVE_SENDER,
        Topic::ItemUnresolve => ITEM_UNRESOLVE_SENDER,
        Topic::ItemHide => ITEM_HIDE_SENDER,
        Topic::ItemShow => ITEM_SHOW_SENDER,
        Topic::ItemPin => ITEM_PIN_SENDER,
        Topic::ItemUnpin => ITEM_UNPIN_SENDER,
        _ => return None,
    })
}

/// Tray notification for persistent item publishes; label bookkeeping and
/// the unread count for every item event.
pub struct ItemHandler {
    topic: Topic,
    sender: &'static str,
    deps: HandlerDeps,
}

impl ItemHandler {
    pub fn new(topic: Topic, deps: HandlerDeps) -> Option<Self> {
        item_sender(topic).map(|sender| Self {
            topic,
            sender,
            deps,
        })
    }
}

#[async_trait]
impl TopicHandler for ItemHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<()> {
        let envelope = delivery.envelope()?;
        let item: Item = decode_element(&envelope)?;
        let scope = FeedScope::new(envelope.uid.clone(), envelope.flavour);
        let publishing = self.topic == Topic::ItemPublish;

        if publishing && item.persistent {
            let key = element_effect_key(self.topic, &item, &envelope);
            if self.deps.repo.has_effect(&scope, &key).await? {
                debug!(%scope, key = %key, "Item notification already sent");
            } else {
                let notification = SimpleNotification {
                    title: item.tagline.clone(),
                    body: item.summary.clone(),
                    image_url: Some(DEFAULT_ICON_PATH.to_string()),
                    ..Default::default()
                };
                self.deps
                    .fcm
                    .send(&item.users, self.sender, &envelope, notification)
                    .await?;
                self.deps
                    .repo
                    .record_effect(&scope, &EffectMarker::for_element(key, &item, Utc::now()))
                    .await?;
            }
        }

        if publishing && !item.label.is_empty() {
            self.deps
                .feeds
                .save_label(&envelope.uid, envelope.flavour, &item.label)
                .await?;
        }
        let unread = self
            .deps
            .feeds
            .update_unread_persistent_items_count(&envelope.uid, envelope.flavour)
            .await?;
        info!(%scope, topic = %self.topic, item_id = %item.id, unread, "Item delivery handled");
        Ok(())
    }
}

// =============================================================================
// Nudges
// =============================================================================

pub fn nudge_sender(topic: Topic) -> Option<&'static str> {
    Some(match topic {
        Topic::NudgePublish => NUDGE_PUBLISH_SENDER,
        Topic::NudgeDelete => NUDGE_DELETE_SENDER,
        Topic::NudgeResolve => NUDGE_RESOLVE_SENDER,
        Topic::NudgeUnresolve => NUDGE_UNRESOLVE_SENDER,
        Topic::NudgeShow => NUDGE_SHOW_SENDER,
        Topic::NudgeHide => NUDGE_HIDE_SENDER,
        _ => return None,
    })
}

/// Publish and resolve notify the nudge's users; other events are
/// acknowledged without effect.
pub struct NudgeHandler {
    topic: Topic,
    sender: &'static str,
    deps: HandlerDeps,
}

impl NudgeHandler {
    pub fn new(topic: Topic, deps: HandlerDeps) -> Option<Self> {
        nudge_sender(topic).map(|sender| Self {
            topic,
            sender,
            deps,
        })
    }
}

#[async_trait]
impl TopicHandler for NudgeHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<()> {
        let envelope = delivery.envelope()?;
        let nudge: Nudge = decode_element(&envelope)?;
        let body = match self.topic {
            Topic::NudgePublish => nudge.notification_body.publish_message.clone(),
            Topic::NudgeResolve => nudge.notification_body.resolve_message.clone(),
            _ => {
                debug!(topic = %self.topic, nudge_id = %nudge.id, "Nudge delivery acknowledged");
                return Ok(());
            }
        };

        let scope = FeedScope::new(envelope.uid.clone(), envelope.flavour);
        let key = element_effect_key(self.topic, &nudge, &envelope);
        if self.deps.repo.has_effect(&scope, &key).await? {
            debug!(%scope, key = %key, "Nudge notification already sent");
            return Ok(());
        }
        let notification = SimpleNotification {
            title: nudge.title.clone(),
            body,
            image_url: nudge.image_url().map(str::to_string),
            ..Default::default()
        };
        self.deps
            .fcm
            .send(&nudge.users, self.sender, &envelope, notification)
            .await?;
        self.deps
            .repo
            .record_effect(&scope, &EffectMarker::for_element(key, &nudge, Utc::now()))
            .await?;
        info!(%scope, topic = %self.topic, nudge_id = %nudge.id, "Nudge delivery handled");
        Ok(())
    }
}

// =============================================================================
// Observational sinks
// =============================================================================

/// Decodes, validates and logs deliveries that have no side effect here.
pub struct PassiveHandler {
    topic: Topic,
}

impl PassiveHandler {
    pub fn new(topic: Topic) -> Self {
        Self { topic }
    }
}

#[async_trait]
impl TopicHandler for PassiveHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<()> {
        let envelope = delivery.envelope()?;
        let id = match self.topic {
            Topic::ActionPublish | Topic::ActionDelete => {
                decode_element::<Action>(&envelope)?.id
            }
            Topic::MessagePost | Topic::MessageDelete => {
                decode_element::<Message>(&envelope)?.id
            }
            Topic::IncomingEvent => decode_element::<Event>(&envelope)?.id,
            _ => {
                envelope.decode_payload::<serde_json::Value>()?;
                delivery.message_id.clone()
            }
        };
        info!(
            uid = %envelope.uid,
            flavour = %envelope.flavour,
            topic = %self.topic,
            id = %id,
            "Delivery observed"
        );
        Ok(())
    }
}

// =============================================================================
// Raw payloads
// =============================================================================

/// Forwards `fcm.send_notification` requests to the push service.
pub struct SendNotificationHandler {
    deps: HandlerDeps,
}

impl SendNotificationHandler {
    pub fn new(deps: HandlerDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl TopicHandler for SendNotificationHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<()> {
        let payload: SendNotificationPayload = delivery.raw()?;
        payload.validate()?;
        let scope = delivery.scope();
        let key = message_effect_key(delivery.topic, &delivery.message_id);
        let guarded = !delivery.message_id.is_empty();
        if guarded && self.deps.repo.has_effect(&scope, &key).await? {
            debug!(key = %key, "Notification already sent");
            return Ok(());
        }
        let sender = delivery
            .attributes
            .get("sender")
            .map(String::as_str)
            .unwrap_or(SEND_NOTIFICATION_SENDER);
        self.deps.fcm.push_service().push(sender, payload).await?;
        if guarded {
            record_payload_effect(&self.deps.repo, &scope, &key).await?;
        }
        info!(sender, message_id = %delivery.message_id, "Notification sent");
        Ok(())
    }
}

/// Sends `mails.inbox` messages through the mail service.
pub struct MailHandler {
    deps: HandlerDeps,
}

impl MailHandler {
    pub fn new(deps: HandlerDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl TopicHandler for MailHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<()> {
        let message: EmailMessage = delivery.raw()?;
        message.validate()?;
        let scope = delivery.scope();
        let key = message_effect_key(delivery.topic, &delivery.message_id);
        let guarded = !delivery.message_id.is_empty();
        if guarded && self.deps.repo.has_effect(&scope, &key).await? {
            debug!(key = %key, "Email already sent");
            return Ok(());
        }
        self.deps
            .mail
            .send_email(&message.subject, &message.text, &message.to)
            .await?;
        if guarded {
            record_payload_effect(&self.deps.repo, &scope, &key).await?;
        }
        info!(recipients = message.to.len(), subject = %message.subject, "Email sent");
        Ok(())
    }
}
