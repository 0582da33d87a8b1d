//! # Inbound Port - LifecycleApi
//!
//! Primary driving port for every element mutation.
//!
//! | Operation | Topic notified | Errors |
//! |-----------|----------------|--------|
//! | `publish_item` / `publish_nudge` / `publish_action` | `*.publish` | Validation, Conflict (nudge title) |
//! | `transition_item` | `items.{resolve,unresolve,pin,unpin,hide,show}` | NotFound, InvalidOperation |
//! | `transition_nudge` | `nudges.{resolve,unresolve,hide,show}` | NotFound, InvalidOperation |
//! | `delete_*` | `*.delete` | never NotFound |
//! | `post_message` / `delete_message` | `message.{post,delete}` | NotFound (item), Validation |
//! | `process_event` | `incoming.event` | Validation |
//!
//! Every operation may also fail with `Upstream` when the store or bus does.

use crate::domain::Transition;
use async_trait::async_trait;
use shared_types::{Action, Event, Flavour, Item, Message, Nudge, Result};

#[async_trait]
pub trait LifecycleApi: Send + Sync {
    /// Creates or replaces an item.
    ///
    /// A missing ID is generated and a zero sequence number becomes 1. If an
    /// element with this ID is stored at an equal or higher sequence number
    /// the call is an idempotent replay and returns the stored item.
    /// Otherwise the item's `conversations` become its whole thread, so
    /// messages absent from the new version are removed.
    async fn publish_item(&self, uid: &str, flavour: Flavour, item: Item) -> Result<Item>;

    /// Creates or replaces a nudge.
    ///
    /// # Errors
    /// - `Conflict`: another PENDING nudge of this user has the same title
    async fn publish_nudge(&self, uid: &str, flavour: Flavour, nudge: Nudge) -> Result<Nudge>;

    async fn publish_action(&self, uid: &str, flavour: Flavour, action: Action) -> Result<Action>;

    /// Applies a single-bit transition. A transition whose target state
    /// already holds returns the stored item without notifying.
    async fn transition_item(
        &self,
        uid: &str,
        flavour: Flavour,
        item_id: &str,
        transition: Transition,
    ) -> Result<Item>;

    async fn transition_nudge(
        &self,
        uid: &str,
        flavour: Flavour,
        nudge_id: &str,
        transition: Transition,
    ) -> Result<Nudge>;

    /// Idempotent: succeeds whether or not the item exists.
    async fn delete_item(&self, uid: &str, flavour: Flavour, item_id: &str) -> Result<()>;

    async fn delete_nudge(&self, uid: &str, flavour: Flavour, nudge_id: &str) -> Result<()>;

    async fn delete_action(&self, uid: &str, flavour: Flavour, action_id: &str) -> Result<()>;

    /// Appends a message to an item's conversation.
    async fn post_message(
        &self,
        uid: &str,
        flavour: Flavour,
        item_id: &str,
        message: Message,
    ) -> Result<Message>;

    async fn delete_message(
        &self,
        uid: &str,
        flavour: Flavour,
        item_id: &str,
        message_id: &str,
    ) -> Result<()>;

    /// Stores an observational event. Mutates no element.
    async fn process_event(&self, uid: &str, flavour: Flavour, event: Event) -> Result<Event>;

    async fn resolve_item(&self, uid: &str, flavour: Flavour, item_id: &str) -> Result<Item> {
        self.transition_item(uid, flavour, item_id, Transition::Resolve)
            .await
    }

    async fn unresolve_item(&self, uid: &str, flavour: Flavour, item_id: &str) -> Result<Item> {
        self.transition_item(uid, flavour, item_id, Transition::Unresolve)
            .await
    }

    async fn pin_item(&self, uid: &str, flavour: Flavour, item_id: &str) -> Result<Item> {
        self.transition_item(uid, flavour, item_id, Transition::Pin)
            .await
    }

    async fn unpin_item(&self, uid: &str, flavour: Flavour, item_id: &str) -> Result<Item> {
        self.transition_item(uid, flavour, item_id, Transition::Unpin)
            .await
    }

    async fn hide_item(&self, uid: &str, flavour: Flavour, item_id: &str) -> Result<Item> {
        self.transition_item(uid, flavour, item_id, Transition::Hide)
            .await
    }

    async fn show_item(&self, uid: &str, flavour: Flavour, item_id: &str) -> Result<Item> {
        self.transition_item(uid, flavour, item_id, Transition::Show)
            .await
    }

    async fn resolve_nudge(&self, uid: &str, flavour: Flavour, nudge_id: &str) -> Result<Nudge> {
        self.transition_nudge(uid, flavour, nudge_id, Transition::Resolve)
            .await
    }

    async fn unresolve_nudge(&self, uid: &str, flavour: Flavour, nudge_id: &str) -> Result<Nudge> {
        self.transition_nudge(uid, flavour, nudge_id, Transition::Unresolve)
            .await
    }

    async fn hide_nudge(&self, uid: &str, flavour: Flavour, nudge_id: &str) -> Result<Nudge> {
        self.transition_nudge(uid, flavour, nudge_id, Transition::Hide)
            .await
    }

    async fn show_nudge(&self, uid: &str, flavour: Flavour, nudge_id: &str) -> Result<Nudge> {
        self.transition_nudge(uid, flavour, nudge_id, Transition::Show)
            .await
    }
}
