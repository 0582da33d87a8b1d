//! # Lifecycle Service
//!
//! Implements [`LifecycleApi`] over the feed repository and a notifier.
//!
//! Every read-modify-write is an optimistic conditional update keyed on the
//! previously stored sequence number. A lost race is retried from a fresh
//! read, at most [`MAX_WRITE_ATTEMPTS`] times, before surfacing `Upstream`.
//!
//! Nudge titles are claimed in the store before the nudge is written. A claim
//! is only taken over once its holder is gone, resolved or retitled, and every
//! takeover is conditional on the claim's sequence number.

use crate::domain::{
    apply_to_item, apply_to_nudge, tombstone_action, tombstone_item, tombstone_nudge, Outcome,
    Transition,
};
use crate::ports::inbound::LifecycleApi;
use crate::ports::outbound::{FeedScope, TimeSource, WriteCondition};
use crate::repository::{FeedRepository, TitleClaim};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use shared_bus::{Notifier, Topic};
use shared_types::{
    metadata, new_id, Action, Element, ElementKind, EngagementError, Event, Flavour, Item,
    Message, Metadata, Nudge, Result, Status,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Attempts per conditional write before giving up.
pub const MAX_WRITE_ATTEMPTS: usize = 3;

/// How long a title claim whose nudge is not stored yet stays binding.
pub const TITLE_CLAIM_GRACE_SECS: i64 = 30;

pub struct LifecycleService {
    repo: FeedRepository,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn TimeSource>,
}

fn contention(kind: ElementKind, id: &str) -> EngagementError {
    EngagementError::upstream(format!(
        "{kind} {id} was modified concurrently {MAX_WRITE_ATTEMPTS} times"
    ))
}

fn not_found(kind: ElementKind, id: &str) -> EngagementError {
    EngagementError::not_found(format!("{kind} {id} not found"))
}

fn is_unset(ts: &DateTime<Utc>) -> bool {
    *ts == DateTime::<Utc>::default()
}

impl LifecycleService {
    pub fn new(
        repo: FeedRepository,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            repo,
            notifier,
            clock,
        }
    }

    pub fn repository(&self) -> &FeedRepository {
        &self.repo
    }

    async fn notify(
        &self,
        topic: Topic,
        scope: &FeedScope,
        element: &dyn Element,
        metadata: Metadata,
    ) -> Result<()> {
        match self
            .notifier
            .notify(topic, &scope.uid, scope.flavour, element, metadata)
            .await
        {
            Ok(message_id) => {
                debug!(%topic, %scope, message_id = %message_id, "Notified");
                Ok(())
            }
            Err(e) => {
                error!(
                    %topic,
                    %scope,
                    id = element.element_id(),
                    error = %e,
                    "Notify failed after the mutation was persisted"
                );
                Err(e)
            }
        }
    }

    /// Claims `nudge.title` for `nudge.id`.
    ///
    /// # Errors
    /// - `Conflict`: a PENDING nudge with another ID holds the title
    async fn claim_title(&self, scope: &FeedScope, nudge: &Nudge) -> Result<()> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let now = self.clock.now();
            let (condition, sequence_number) =
                match self.repo.title_claim(scope, &nudge.title).await? {
                    None => (WriteCondition::Absent, 1),
                    Some(claim) if claim.nudge_id == nudge.id => return Ok(()),
                    Some(claim) => {
                        if self.claim_is_live(scope, &claim, now).await? {
                            return Err(EngagementError::conflict(format!(
                                "a pending nudge titled {:?} already exists ({})",
                                nudge.title, claim.nudge_id
                            )));
                        }
                        (
                            WriteCondition::SequenceIs(claim.sequence_number),
                            claim.sequence_number + 1,
                        )
                    }
                };
            let claim = TitleClaim {
                title: nudge.title.clone(),
                nudge_id: nudge.id.clone(),
                sequence_number,
                claimed_at: now,
            };
            if self.repo.save_title_claim(scope, &claim, condition).await? {
                debug!(%scope, nudge_id = %nudge.id, title = %nudge.title, "Title claimed");
                return Ok(());
            }
            warn!(%scope, title = %nudge.title, "Concurrent title claim, retrying");
        }
        Err(contention(ElementKind::Nudge, &nudge.id))
    }

    async fn claim_is_live(
        &self,
        scope: &FeedScope,
        claim: &TitleClaim,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if claim.nudge_id.is_empty() {
            return Ok(false);
        }
        Ok(match self.repo.get_nudge(scope, &claim.nudge_id).await? {
            Some(holder) => holder.status == Status::Pending && holder.title == claim.title,
            // The holder may still be between its claim and its write.
            None => now - claim.claimed_at < Duration::seconds(TITLE_CLAIM_GRACE_SECS),
        })
    }

    /// Frees `title` if `nudge_id` holds it. Failures only delay reuse of the
    /// title, so they are logged rather than returned.
    async fn release_title(&self, scope: &FeedScope, nudge_id: &str, title: &str) {
        let claim = match self.repo.title_claim(scope, title).await {
            Ok(Some(claim)) if claim.nudge_id == nudge_id => claim,
            Ok(_) => return,
            Err(e) => {
                warn!(%scope, nudge_id, title, error = %e, "Title claim lookup failed");
                return;
            }
        };
        let released = TitleClaim {
            nudge_id: String::new(),
            sequence_number: claim.sequence_number + 1,
            ..claim.clone()
        };
        let condition = WriteCondition::SequenceIs(claim.sequence_number);
        match self.repo.save_title_claim(scope, &released, condition).await {
            Ok(true) => debug!(%scope, nudge_id, title, "Title released"),
            Ok(false) => debug!(%scope, nudge_id, title, "Title claim already moved on"),
            Err(e) => warn!(%scope, nudge_id, title, error = %e, "Title release failed"),
        }
    }

    async fn forget_effects(&self, scope: &FeedScope, kind: ElementKind, id: &str) -> Result<()> {
        let forgotten = self.repo.forget_effects(scope, kind, id).await?;
        if forgotten > 0 {
            debug!(%scope, %kind, id, forgotten, "Applied-effect markers dropped");
        }
        Ok(())
    }
}

#[async_trait]
impl LifecycleApi for LifecycleService {
    async fn publish_item(&self, uid: &str, flavour: Flavour, mut item: Item) -> Result<Item> {
        let scope = FeedScope::new(uid, flavour);
        if item.id.trim().is_empty() {
            item.id = new_id();
        }
        if item.sequence_number == 0 {
            item.sequence_number = 1;
        }
        if is_unset(&item.timestamp) {
            item.timestamp = self.clock.now();
        }
        item.validate()?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let condition = match self.repo.get_item(&scope, &item.id).await? {
                Some(stored) if stored.sequence_number >= item.sequence_number => {
                    debug!(%scope, item_id = %item.id, "Item publish replayed");
                    return Ok(stored);
                }
                Some(stored) => WriteCondition::SequenceIs(stored.sequence_number),
                None => WriteCondition::Absent,
            };
            if !self.repo.save_item(&scope, &item, condition).await? {
                warn!(%scope, item_id = %item.id, "Concurrent item write, retrying");
                continue;
            }
            self.repo
                .replace_thread(&scope, &item.id, &item.conversations)
                .await?;
            info!(%scope, item_id = %item.id, seq = item.sequence_number, "Item published");
            self.notify(
                Topic::ItemPublish,
                &scope,
                &item,
                metadata([("itemID", item.id.as_str())]),
            )
            .await?;
            return Ok(item);
        }
        Err(contention(ElementKind::Item, &item.id))
    }

    async fn publish_nudge(&self, uid: &str, flavour: Flavour, mut nudge: Nudge) -> Result<Nudge> {
        let scope = FeedScope::new(uid, flavour);
        if nudge.id.trim().is_empty() {
            nudge.id = new_id();
        }
        if nudge.sequence_number == 0 {
            nudge.sequence_number = 1;
        }
        nudge.validate()?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let stored = self.repo.get_nudge(&scope, &nudge.id).await?;
            let condition = match &stored {
                Some(stored) if stored.sequence_number >= nudge.sequence_number => {
                    debug!(%scope, nudge_id = %nudge.id, "Nudge publish replayed");
                    return Ok(stored.clone());
                }
                Some(stored) => WriteCondition::SequenceIs(stored.sequence_number),
                None => WriteCondition::Absent,
            };
            self.claim_title(&scope, &nudge).await?;
            if !self.repo.save_nudge(&scope, &nudge, condition).await? {
                warn!(%scope, nudge_id = %nudge.id, "Concurrent nudge write, retrying");
                continue;
            }
            if let Some(previous) = stored.filter(|p| p.title != nudge.title) {
                self.release_title(&scope, &nudge.id, &previous.title).await;
            }
            info!(%scope, nudge_id = %nudge.id, title = %nudge.title, "Nudge published");
            self.notify(
                Topic::NudgePublish,
                &scope,
                &nudge,
                metadata([("nudgeID", nudge.id.as_str())]),
            )
            .await?;
            return Ok(nudge);
        }
        Err(contention(ElementKind::Nudge, &nudge.id))
    }

    async fn publish_action(
        &self,
        uid: &str,
        flavour: Flavour,
        mut action: Action,
    ) -> Result<Action> {
        let scope = FeedScope::new(uid, flavour);
        if action.id.trim().is_empty() {
            action.id = new_id();
        }
        if action.sequence_number == 0 {
            action.sequence_number = 1;
        }
        action.validate()?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let condition = match self.repo.get_action(&scope, &action.id).await? {
                Some(stored) if stored.sequence_number >= action.sequence_number => {
                    debug!(%scope, action_id = %action.id, "Action publish replayed");
                    return Ok(stored);
                }
                Some(stored) => WriteCondition::SequenceIs(stored.sequence_number),
                None => WriteCondition::Absent,
            };
            if !self.repo.save_action(&scope, &action, condition).await? {
                warn!(%scope, action_id = %action.id, "Concurrent action write, retrying");
                continue;
            }
            info!(%scope, action_id = %action.id, name = %action.name, "Action published");
            self.notify(
                Topic::ActionPublish,
                &scope,
                &action,
                metadata([("actionID", action.id.as_str())]),
            )
            .await?;
            return Ok(action);
        }
        Err(contention(ElementKind::Action, &action.id))
    }

    async fn transition_item(
        &self,
        uid: &str,
        flavour: Flavour,
        item_id: &str,
        transition: Transition,
    ) -> Result<Item> {
        let scope = FeedScope::new(uid, flavour);
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let stored = self
                .repo
                .get_item(&scope, item_id)
                .await?
                .ok_or_else(|| not_found(ElementKind::Item, item_id))?;
            let next = match apply_to_item(&stored, transition)? {
                Outcome::Unchanged(item) => {
                    debug!(%scope, item_id, %transition, "Item already in target state");
                    return Ok(item);
                }
                Outcome::Applied(next) => next,
            };
            next.validate()?;
            let condition = WriteCondition::SequenceIs(stored.sequence_number);
            if !self.repo.save_item(&scope, &next, condition).await? {
                warn!(%scope, item_id, %transition, "Concurrent item write, retrying");
                continue;
            }
            info!(%scope, item_id, %transition, seq = next.sequence_number, "Item transitioned");
            self.notify(
                transition.item_topic(),
                &scope,
                &next,
                metadata([("itemID", item_id)]),
            )
            .await?;
            return Ok(next);
        }
        Err(contention(ElementKind::Item, item_id))
    }

    async fn transition_nudge(
        &self,
        uid: &str,
        flavour: Flavour,
        nudge_id: &str,
        transition: Transition,
    ) -> Result<Nudge> {
        let scope = FeedScope::new(uid, flavour);
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let stored = self
                .repo
                .get_nudge(&scope, nudge_id)
                .await?
                .ok_or_else(|| not_found(ElementKind::Nudge, nudge_id))?;
            let next = match apply_to_nudge(&stored, transition)? {
                Outcome::Unchanged(nudge) => {
                    debug!(%scope, nudge_id, %transition, "Nudge already in target state");
                    return Ok(nudge);
                }
                Outcome::Applied(next) => next,
            };
            let topic = transition.nudge_topic().ok_or_else(|| {
                EngagementError::invalid_operation(format!("nudges cannot {transition}"))
            })?;
            next.validate()?;
            let condition = WriteCondition::SequenceIs(stored.sequence_number);
            if !self.repo.save_nudge(&scope, &next, condition).await? {
                warn!(%scope, nudge_id, %transition, "Concurrent nudge write, retrying");
                continue;
            }
            info!(%scope, nudge_id, %transition, seq = next.sequence_number, "Nudge transitioned");
            match transition {
                Transition::Resolve => self.release_title(&scope, nudge_id, &next.title).await,
                Transition::Unresolve => {
                    if let Err(e) = self.claim_title(&scope, &next).await {
                        warn!(%scope, nudge_id, title = %next.title, error = %e, "Unresolved nudge could not reclaim its title");
                    }
                }
                _ => {}
            }
            self.notify(topic, &scope, &next, metadata([("nudgeID", nudge_id)]))
                .await?;
            return Ok(next);
        }
        Err(contention(ElementKind::Nudge, nudge_id))
    }

    async fn delete_item(&self, uid: &str, flavour: Flavour, item_id: &str) -> Result<()> {
        let scope = FeedScope::new(uid, flavour);
        let stored = self.repo.get_item(&scope, item_id).await?;
        let existed = self.repo.delete_item(&scope, item_id).await?;
        self.forget_effects(&scope, ElementKind::Item, item_id).await?;
        info!(%scope, item_id, existed, "Item deleted");
        let element = stored.unwrap_or_else(|| tombstone_item(item_id));
        self.notify(
            Topic::ItemDelete,
            &scope,
            &element,
            metadata([("itemID", item_id)]),
        )
        .await
    }

    async fn delete_nudge(&self, uid: &str, flavour: Flavour, nudge_id: &str) -> Result<()> {
        let scope = FeedScope::new(uid, flavour);
        let stored = self.repo.get_nudge(&scope, nudge_id).await?;
        let existed = self.repo.delete_nudge(&scope, nudge_id).await?;
        self.forget_effects(&scope, ElementKind::Nudge, nudge_id).await?;
        if let Some(stored) = &stored {
            self.release_title(&scope, nudge_id, &stored.title).await;
        }
        info!(%scope, nudge_id, existed, "Nudge deleted");
        let element = stored.unwrap_or_else(|| tombstone_nudge(nudge_id));
        self.notify(
            Topic::NudgeDelete,
            &scope,
            &element,
            metadata([("nudgeID", nudge_id)]),
        )
        .await
    }

    async fn delete_action(&self, uid: &str, flavour: Flavour, action_id: &str) -> Result<()> {
        let scope = FeedScope::new(uid, flavour);
        let stored = self.repo.get_action(&scope, action_id).await?;
        let existed = self.repo.delete_action(&scope, action_id).await?;
        self.forget_effects(&scope, ElementKind::Action, action_id).await?;
        info!(%scope, action_id, existed, "Action deleted");
        let element = stored.unwrap_or_else(|| tombstone_action(action_id));
        self.notify(
            Topic::ActionDelete,
            &scope,
            &element,
            metadata([("actionID", action_id)]),
        )
        .await
    }

    async fn post_message(
        &self,
        uid: &str,
        flavour: Flavour,
        item_id: &str,
        mut message: Message,
    ) -> Result<Message> {
        let scope = FeedScope::new(uid, flavour);
        let item = self
            .repo
            .get_item(&scope, item_id)
            .await?
            .ok_or_else(|| not_found(ElementKind::Item, item_id))?;

        if message.id.trim().is_empty() {
            message.id = new_id();
        }
        if message.sequence_number == 0 {
            let last = item
                .conversations
                .iter()
                .map(|m| m.sequence_number)
                .max()
                .unwrap_or(0);
            message.sequence_number = last + 1;
        }
        if is_unset(&message.timestamp) {
            message.timestamp = self.clock.now();
        }
        message.validate()?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let condition = match self.repo.get_message(&scope, item_id, &message.id).await? {
                Some(stored) if stored.sequence_number >= message.sequence_number => {
                    debug!(%scope, item_id, message_id = %message.id, "Message post replayed");
                    return Ok(stored);
                }
                Some(stored) => WriteCondition::SequenceIs(stored.sequence_number),
                None => WriteCondition::Absent,
            };
            if !self
                .repo
                .save_message(&scope, item_id, &message, condition)
                .await?
            {
                warn!(%scope, item_id, message_id = %message.id, "Concurrent message write, retrying");
                continue;
            }
            info!(%scope, item_id, message_id = %message.id, "Message posted");
            self.notify(
                Topic::MessagePost,
                &scope,
                &message,
                metadata([("itemID", item_id), ("messageID", message.id.as_str())]),
            )
            .await?;
            return Ok(message);
        }
        Err(contention(ElementKind::Message, &message.id))
    }

    async fn delete_message(
        &self,
        uid: &str,
        flavour: Flavour,
        item_id: &str,
        message_id: &str,
    ) -> Result<()> {
        let scope = FeedScope::new(uid, flavour);
        let Some(stored) = self.repo.get_message(&scope, item_id, message_id).await? else {
            debug!(%scope, item_id, message_id, "Message already absent");
            return Ok(());
        };
        self.repo.delete_message(&scope, item_id, message_id).await?;
        info!(%scope, item_id, message_id, "Message deleted");
        self.notify(
            Topic::MessageDelete,
            &scope,
            &stored,
            metadata([("itemID", item_id), ("messageID", message_id)]),
        )
        .await
    }

    async fn process_event(&self, uid: &str, flavour: Flavour, mut event: Event) -> Result<Event> {
        let scope = FeedScope::new(uid, flavour);
        if event.id.trim().is_empty() {
            event.id = new_id();
        }
        if event.context.user_id.trim().is_empty() {
            event.context.user_id = uid.to_string();
        }
        match event.context.flavour {
            None => event.context.flavour = Some(flavour),
            Some(declared) if declared != flavour => {
                return Err(EngagementError::validation(format!(
                    "event flavour {declared} does not match feed flavour {flavour}"
                )));
            }
            Some(_) => {}
        }
        if is_unset(&event.context.timestamp) {
            event.context.timestamp = self.clock.now();
        }
        event.validate()?;

        self.repo.save_event(&scope, &event).await?;
        info!(%scope, event_id = %event.id, name = %event.name, "Event processed");
        self.notify(
            Topic::IncomingEvent,
            &scope,
            &event,
            metadata([("eventID", event.id.as_str())]),
        )
        .await?;
        Ok(event)
    }
}
