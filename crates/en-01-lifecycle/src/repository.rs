//! # Feed Repository
//!
//! Typed access to the `ElementStore`. Items are stored without their
//! conversation; messages live in a per-item sub-collection and are joined
//! back in on read.

use crate::ports::outbound::{
    Collection, ElementStore, FeedScope, QueryFilter, StoreError, WriteCondition,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{Action, Element, ElementKind, Event, Item, Message, Nudge, Result};
use std::collections::HashSet;
use std::sync::Arc;

const LABELS_DOC: &str = "labels";
const UNREAD_DOC: &str = "persistent";

#[derive(Debug, Serialize, Deserialize)]
struct LabelsDoc {
    labels: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UnreadDoc {
    count: i64,
}

/// A side effect a topic handler has performed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectMarker {
    pub key: String,
    /// `{kind}/{id}` of the element the effect was for. Empty for raw
    /// payload effects.
    #[serde(default)]
    pub element: String,
    pub recorded_at: DateTime<Utc>,
}

impl EffectMarker {
    pub fn for_element(key: impl Into<String>, element: &dyn Element, at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            element: element_ref(element.kind(), element.element_id()),
            recorded_at: at,
        }
    }

    pub fn for_payload(key: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            element: String::new(),
            recorded_at: at,
        }
    }
}

fn element_ref(kind: ElementKind, id: &str) -> String {
    format!("{kind}/{id}")
}

/// Holder of a nudge title. A released claim has an empty `nudge_id`.
///
/// Takeovers and releases are conditional on `sequence_number`, so two
/// publishers can never both hold the same title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleClaim {
    pub title: String,
    pub nudge_id: String,
    pub sequence_number: i64,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct FeedRepository {
    store: Arc<dyn ElementStore>,
}

fn decode<T: DeserializeOwned>(collection: &Collection, doc: Value) -> Result<T, StoreError> {
    let id = doc
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    serde_json::from_value(doc).map_err(|e| StoreError::Corrupt {
        collection: collection.path(),
        id,
        reason: e.to_string(),
    })
}

fn encode<T: Serialize>(collection: &Collection, id: &str, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Corrupt {
        collection: collection.path(),
        id: id.to_string(),
        reason: e.to_string(),
    })
}

fn messages_of(item_id: &str) -> Collection {
    Collection::Messages {
        item_id: item_id.to_string(),
    }
}

impl FeedRepository {
    pub fn new(store: Arc<dyn ElementStore>) -> Self {
        Self { store }
    }

    async fn load<T: DeserializeOwned>(
        &self,
        scope: &FeedScope,
        collection: &Collection,
        id: &str,
    ) -> Result<Option<T>> {
        match self.store.get(scope, collection, id).await? {
            Some(doc) => Ok(Some(decode(collection, doc)?)),
            None => Ok(None),
        }
    }

    async fn load_all<T: DeserializeOwned>(
        &self,
        scope: &FeedScope,
        collection: &Collection,
        filters: &[QueryFilter],
    ) -> Result<Vec<T>> {
        self.store
            .query(scope, collection, filters)
            .await?
            .into_iter()
            .map(|doc| decode(collection, doc).map_err(Into::into))
            .collect()
    }

    /// Writes a document. `Ok(false)` means the condition did not hold.
    async fn write<T: Serialize>(
        &self,
        scope: &FeedScope,
        collection: &Collection,
        id: &str,
        value: &T,
        condition: WriteCondition,
    ) -> Result<bool> {
        let doc = encode(collection, id, value)?;
        match self.store.save(scope, collection, id, doc, condition).await {
            Ok(()) => Ok(true),
            Err(StoreError::PreconditionFailed { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Items
    // =========================================================================

    pub async fn get_item(&self, scope: &FeedScope, id: &str) -> Result<Option<Item>> {
        match self.load::<Item>(scope, &Collection::Items, id).await? {
            Some(mut item) => {
                item.conversations = self.messages(scope, id).await?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    pub async fn items(&self, scope: &FeedScope, filters: &[QueryFilter]) -> Result<Vec<Item>> {
        let mut items: Vec<Item> = self.load_all(scope, &Collection::Items, filters).await?;
        for item in &mut items {
            item.conversations = self.messages(scope, &item.id).await?;
        }
        Ok(items)
    }

    /// Persists the item document. Its conversation is not written here.
    pub async fn save_item(
        &self,
        scope: &FeedScope,
        item: &Item,
        condition: WriteCondition,
    ) -> Result<bool> {
        let mut doc = item.clone();
        doc.conversations.clear();
        self.write(scope, &Collection::Items, &item.id, &doc, condition)
            .await
    }

    /// Makes `thread` the item's whole conversation: stored messages missing
    /// from it are removed and the rest are overwritten.
    pub async fn replace_thread(
        &self,
        scope: &FeedScope,
        item_id: &str,
        thread: &[Message],
    ) -> Result<()> {
        let keep: HashSet<&str> = thread.iter().map(|m| m.id.as_str()).collect();
        let collection = messages_of(item_id);
        for stale in self.messages(scope, item_id).await? {
            if !keep.contains(stale.id.as_str()) {
                self.store.delete(scope, &collection, &stale.id).await?;
            }
        }
        for message in thread {
            self.write(scope, &collection, &message.id, message, WriteCondition::Always)
                .await?;
        }
        Ok(())
    }

    /// Deletes the item and its conversation. Returns whether it existed.
    pub async fn delete_item(&self, scope: &FeedScope, id: &str) -> Result<bool> {
        let thread = messages_of(id);
        for message in self.messages(scope, id).await? {
            self.store.delete(scope, &thread, &message.id).await?;
        }
        Ok(self.store.delete(scope, &Collection::Items, id).await?)
    }

    // =========================================================================
    // Nudges
    // =========================================================================

    pub async fn get_nudge(&self, scope: &FeedScope, id: &str) -> Result<Option<Nudge>> {
        self.load(scope, &Collection::Nudges, id).await
    }

    pub async fn nudges(&self, scope: &FeedScope, filters: &[QueryFilter]) -> Result<Vec<Nudge>> {
        self.load_all(scope, &Collection::Nudges, filters).await
    }

    /// Nudges with the given title, in any status.
    pub async fn nudges_titled(&self, scope: &FeedScope, title: &str) -> Result<Vec<Nudge>> {
        self.nudges(scope, &[QueryFilter::eq("title", title)]).await
    }

    pub async fn save_nudge(
        &self,
        scope: &FeedScope,
        nudge: &Nudge,
        condition: WriteCondition,
    ) -> Result<bool> {
        self.write(scope, &Collection::Nudges, &nudge.id, nudge, condition)
            .await
    }

    pub async fn delete_nudge(&self, scope: &FeedScope, id: &str) -> Result<bool> {
        Ok(self.store.delete(scope, &Collection::Nudges, id).await?)
    }

    pub async fn title_claim(&self, scope: &FeedScope, title: &str) -> Result<Option<TitleClaim>> {
        self.load(scope, &Collection::NudgeTitles, title).await
    }

    pub async fn save_title_claim(
        &self,
        scope: &FeedScope,
        claim: &TitleClaim,
        condition: WriteCondition,
    ) -> Result<bool> {
        self.write(scope, &Collection::NudgeTitles, &claim.title, claim, condition)
            .await
    }

    // =========================================================================
    // Actions
    // =========================================================================

    pub async fn get_action(&self, scope: &FeedScope, id: &str) -> Result<Option<Action>> {
        self.load(scope, &Collection::Actions, id).await
    }

    pub async fn actions(&self, scope: &FeedScope, filters: &[QueryFilter]) -> Result<Vec<Action>> {
        self.load_all(scope, &Collection::Actions, filters).await
    }

    pub async fn save_action(
        &self,
        scope: &FeedScope,
        action: &Action,
        condition: WriteCondition,
    ) -> Result<bool> {
        self.write(scope, &Collection::Actions, &action.id, action, condition)
            .await
    }

    pub async fn delete_action(&self, scope: &FeedScope, id: &str) -> Result<bool> {
        Ok(self.store.delete(scope, &Collection::Actions, id).await?)
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// An item's conversation, ordered by sequence number.
    pub async fn messages(&self, scope: &FeedScope, item_id: &str) -> Result<Vec<Message>> {
        let mut messages: Vec<Message> = self.load_all(scope, &messages_of(item_id), &[]).await?;
        messages.sort_by(|a, b| {
            a.sequence_number
                .cmp(&b.sequence_number)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(messages)
    }

    pub async fn get_message(
        &self,
        scope: &FeedScope,
        item_id: &str,
        id: &str,
    ) -> Result<Option<Message>> {
        self.load(scope, &messages_of(item_id), id).await
    }

    pub async fn save_message(
        &self,
        scope: &FeedScope,
        item_id: &str,
        message: &Message,
        condition: WriteCondition,
    ) -> Result<bool> {
        self.write(scope, &messages_of(item_id), &message.id, message, condition)
            .await
    }

    pub async fn delete_message(&self, scope: &FeedScope, item_id: &str, id: &str) -> Result<bool> {
        Ok(self.store.delete(scope, &messages_of(item_id), id).await?)
    }

    // =========================================================================
    // Events, labels, counters and the applied-effect ledger
    // =========================================================================

    pub async fn save_event(&self, scope: &FeedScope, event: &Event) -> Result<()> {
        self.write(
            scope,
            &Collection::IncomingEvents,
            &event.id,
            event,
            WriteCondition::Always,
        )
        .await
        .map(|_| ())
    }

    pub async fn labels(&self, scope: &FeedScope) -> Result<Option<Vec<String>>> {
        Ok(self
            .load::<LabelsDoc>(scope, &Collection::Labels, LABELS_DOC)
            .await?
            .map(|doc| doc.labels))
    }

    pub async fn save_labels(
        &self,
        scope: &FeedScope,
        labels: &[String],
        condition: WriteCondition,
    ) -> Result<bool> {
        let doc = LabelsDoc {
            labels: labels.to_vec(),
        };
        self.write(scope, &Collection::Labels, LABELS_DOC, &doc, condition)
            .await
    }

    pub async fn unread_count(&self, scope: &FeedScope) -> Result<Option<i64>> {
        Ok(self
            .load::<UnreadDoc>(scope, &Collection::UnreadCounts, UNREAD_DOC)
            .await?
            .map(|doc| doc.count))
    }

    pub async fn save_unread_count(
        &self,
        scope: &FeedScope,
        count: i64,
        condition: WriteCondition,
    ) -> Result<bool> {
        self.write(
            scope,
            &Collection::UnreadCounts,
            UNREAD_DOC,
            &UnreadDoc { count },
            condition,
        )
        .await
    }

    /// Records that the side effect `marker.key` was performed.
    ///
    /// Returns `false` when it was already recorded.
    pub async fn record_effect(&self, scope: &FeedScope, marker: &EffectMarker) -> Result<bool> {
        self.write(
            scope,
            &Collection::AppliedEffects,
            &marker.key,
            marker,
            WriteCondition::Absent,
        )
        .await
    }

    pub async fn has_effect(&self, scope: &FeedScope, key: &str) -> Result<bool> {
        Ok(self
            .store
            .get(scope, &Collection::AppliedEffects, key)
            .await?
            .is_some())
    }

    /// Drops every marker recorded for one element. Returns how many.
    pub async fn forget_effects(
        &self,
        scope: &FeedScope,
        kind: ElementKind,
        id: &str,
    ) -> Result<usize> {
        let filters = [QueryFilter::eq("element", element_ref(kind, id))];
        self.delete_effects(scope, &filters).await
    }

    /// Drops raw payload markers recorded at or before `cutoff`.
    pub async fn prune_payload_effects(
        &self,
        scope: &FeedScope,
        cutoff: DateTime<Utc>,
    ) -> Result<usize> {
        let filters = [
            QueryFilter::eq("element", ""),
            QueryFilter::lte("recordedAt", cutoff.to_rfc3339()),
        ];
        self.delete_effects(scope, &filters).await
    }

    async fn delete_effects(&self, scope: &FeedScope, filters: &[QueryFilter]) -> Result<usize> {
        let markers: Vec<EffectMarker> = self
            .load_all(scope, &Collection::AppliedEffects, filters)
            .await?;
        for marker in &markers {
            self.store
                .delete(scope, &Collection::AppliedEffects, &marker.key)
                .await?;
        }
        Ok(markers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryElementStore;
    use shared_types::Flavour;

    fn repo() -> FeedRepository {
        FeedRepository::new(Arc::new(InMemoryElementStore::new()))
    }

    fn scope() -> FeedScope {
        FeedScope::new("u1", Flavour::Consumer)
    }

    fn message(id: &str, seq: i64) -> Message {
        Message {
            id: id.into(),
            sequence_number: seq,
            text: "hi".into(),
            posted_by_uid: "u".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_item_conversation_is_joined_on_read() {
        let repo = repo();
        let mut item = Item {
            id: "i1".into(),
            sequence_number: 1,
            ..Default::default()
        };
        item.conversations.push(message("ignored", 1));
        assert!(repo
            .save_item(&scope(), &item, WriteCondition::Absent)
            .await
            .unwrap());
        for (id, seq) in [("m2", 2), ("m1", 1)] {
            repo.save_message(&scope(), "i1", &message(id, seq), WriteCondition::Absent)
                .await
                .unwrap();
        }

        let loaded = repo.get_item(&scope(), "i1").await.unwrap().unwrap();
        let ids: Vec<_> = loaded.conversations.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_delete_item_removes_thread() {
        let repo = repo();
        let item = Item {
            id: "i1".into(),
            sequence_number: 1,
            ..Default::default()
        };
        repo.save_item(&scope(), &item, WriteCondition::Always)
            .await
            .unwrap();
        repo.save_message(&scope(), "i1", &message("m1", 1), WriteCondition::Always)
            .await
            .unwrap();

        assert!(repo.delete_item(&scope(), "i1").await.unwrap());
        assert!(repo.messages(&scope(), "i1").await.unwrap().is_empty());
        assert!(!repo.delete_item(&scope(), "i1").await.unwrap());
    }

    #[tokio::test]
    async fn test_conditional_write_reports_precondition() {
        let repo = repo();
        let nudge = Nudge {
            id: "n".into(),
            sequence_number: 1,
            ..Default::default()
        };
        assert!(repo
            .save_nudge(&scope(), &nudge, WriteCondition::Absent)
            .await
            .unwrap());
        assert!(!repo
            .save_nudge(&scope(), &nudge, WriteCondition::Absent)
            .await
            .unwrap());
        assert!(!repo
            .save_nudge(&scope(), &nudge, WriteCondition::SequenceIs(9))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_effect_ledger_records_once() {
        let repo = repo();
        let marker = EffectMarker::for_payload("k", Utc::now());
        assert!(!repo.has_effect(&scope(), "k").await.unwrap());
        assert!(repo.record_effect(&scope(), &marker).await.unwrap());
        assert!(!repo.record_effect(&scope(), &marker).await.unwrap());
        assert!(repo.has_effect(&scope(), "k").await.unwrap());
    }

    #[tokio::test]
    async fn test_forget_effects_only_drops_that_element() {
        let repo = repo();
        let now = Utc::now();
        let item = Item {
            id: "x".into(),
            sequence_number: 1,
            ..Default::default()
        };
        let nudge = Nudge {
            id: "x".into(),
            sequence_number: 1,
            ..Default::default()
        };
        for marker in [
            EffectMarker::for_element("items.publish:x:1:a", &item, now),
            EffectMarker::for_element("items.publish:x:1:b", &item, now),
            EffectMarker::for_element("nudges.publish:x:1:c", &nudge, now),
            EffectMarker::for_payload("mails.inbox:m-1", now),
        ] {
            repo.record_effect(&scope(), &marker).await.unwrap();
        }

        let forgotten = repo
            .forget_effects(&scope(), ElementKind::Item, "x")
            .await
            .unwrap();
        assert_eq!(forgotten, 2);
        assert!(!repo.has_effect(&scope(), "items.publish:x:1:a").await.unwrap());
        assert!(repo.has_effect(&scope(), "nudges.publish:x:1:c").await.unwrap());
        assert!(repo.has_effect(&scope(), "mails.inbox:m-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_payload_effects_expire_after_cutoff() {
        let repo = repo();
        let now = Utc::now();
        let old = EffectMarker::for_payload("old", now - chrono::Duration::hours(48));
        let fresh = EffectMarker::for_payload("fresh", now);
        let item = Item {
            id: "i".into(),
            sequence_number: 1,
            ..Default::default()
        };
        let element = EffectMarker::for_element("el", &item, now - chrono::Duration::hours(48));
        for marker in [&old, &fresh, &element] {
            repo.record_effect(&scope(), marker).await.unwrap();
        }

        let pruned = repo
            .prune_payload_effects(&scope(), now - chrono::Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(pruned, 1);
        assert!(!repo.has_effect(&scope(), "old").await.unwrap());
        assert!(repo.has_effect(&scope(), "fresh").await.unwrap());
        assert!(repo.has_effect(&scope(), "el").await.unwrap());
    }

    #[tokio::test]
    async fn test_replace_thread_drops_messages_not_in_new_version() {
        let repo = repo();
        for id in ["m1", "m2"] {
            repo.save_message(&scope(), "i1", &message(id, 1), WriteCondition::Absent)
                .await
                .unwrap();
        }
        let mut edited = message("m2", 2);
        edited.text = "edited".into();
        repo.replace_thread(&scope(), "i1", &[edited, message("m3", 3)])
            .await
            .unwrap();

        let thread = repo.messages(&scope(), "i1").await.unwrap();
        let ids: Vec<_> = thread.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3"]);
        assert_eq!(thread[0].text, "edited");
    }

    #[tokio::test]
    async fn test_title_claim_is_create_if_absent() {
        let repo = repo();
        let claim = TitleClaim {
            title: "Verify".into(),
            nudge_id: "a".into(),
            sequence_number: 1,
            claimed_at: Utc::now(),
        };
        assert!(repo
            .save_title_claim(&scope(), &claim, WriteCondition::Absent)
            .await
            .unwrap());
        let rival = TitleClaim {
            nudge_id: "b".into(),
            ..claim.clone()
        };
        assert!(!repo
            .save_title_claim(&scope(), &rival, WriteCondition::Absent)
            .await
            .unwrap());
        let stored = repo.title_claim(&scope(), "Verify").await.unwrap().unwrap();
        assert_eq!(stored, claim);
    }

    #[tokio::test]
    async fn test_labels_and_unread_documents() {
        let repo = repo();
        assert_eq!(repo.labels(&scope()).await.unwrap(), None);
        repo.save_labels(&scope(), &["WELCOME".into()], WriteCondition::Absent)
            .await
            .unwrap();
        assert_eq!(
            repo.labels(&scope()).await.unwrap(),
            Some(vec!["WELCOME".to_string()])
        );

        assert_eq!(repo.unread_count(&scope()).await.unwrap(), None);
        repo.save_unread_count(&scope(), 3, WriteCondition::Always)
            .await
            .unwrap();
        assert_eq!(repo.unread_count(&scope()).await.unwrap(), Some(3));
    }
}
