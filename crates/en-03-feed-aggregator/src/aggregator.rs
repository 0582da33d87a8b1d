//! # Feed Aggregator
//!
//! Assembles filtered feed views from the element store.
//!
//! A plain read (persistent=BOTH, nothing else set) of a feed with no
//! elements at all seeds the default feed and re-reads exactly once.

use crate::defaults::{global_actions, welcome_item};
use crate::query::FeedQuery;
use en_01_lifecycle::{
    FeedRepository, FeedScope, LifecycleApi, TimeSource, WriteCondition,
};
use en_02_default_nudges::DefaultNudgeManager;
use shared_types::{
    Action, BooleanFilter, EngagementError, Feed, Flavour, Item, Nudge, Result, DEFAULT_LABEL,
};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct FeedAggregator {
    repo: FeedRepository,
    lifecycle: Arc<dyn LifecycleApi>,
    default_nudges: Arc<DefaultNudgeManager>,
    clock: Arc<dyn TimeSource>,
}

fn dedup_by_id<T>(elements: Vec<T>, id: impl Fn(&T) -> &str) -> Vec<T> {
    let mut seen = HashSet::new();
    elements
        .into_iter()
        .filter(|e| seen.insert(id(e).to_string()))
        .collect()
}

fn order_items(items: &mut [Item]) {
    items.sort_by(|a, b| {
        b.expiry
            .cmp(&a.expiry)
            .then_with(|| b.id.cmp(&a.id))
            .then_with(|| b.sequence_number.cmp(&a.sequence_number))
    });
}

fn order_nudges(nudges: &mut [Nudge]) {
    nudges.sort_by(|a, b| {
        b.expiry
            .cmp(&a.expiry)
            .then_with(|| b.id.cmp(&a.id))
            .then_with(|| b.sequence_number.cmp(&a.sequence_number))
    });
}

fn order_actions(actions: &mut [Action]) {
    actions.sort_by_key(|a| (Reverse(a.id.clone()), Reverse(a.sequence_number)));
}

impl FeedAggregator {
    pub fn new(
        repo: FeedRepository,
        lifecycle: Arc<dyn LifecycleApi>,
        default_nudges: Arc<DefaultNudgeManager>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            repo,
            lifecycle,
            default_nudges,
            clock,
        }
    }

    async fn read_feed(
        &self,
        uid: &str,
        is_anonymous: bool,
        flavour: Flavour,
        query: &FeedQuery,
    ) -> Result<Feed> {
        let scope = FeedScope::new(uid, flavour);
        let now = self.clock.now();

        let mut items = dedup_by_id(
            self.repo.items(&scope, &query.item_filters(now)).await?,
            |i| i.id.as_str(),
        );
        let mut nudges = dedup_by_id(
            self.repo.nudges(&scope, &query.nudge_filters(now)).await?,
            |n| n.id.as_str(),
        );
        let mut actions = dedup_by_id(self.repo.actions(&scope, &[]).await?, |a| a.id.as_str());
        order_items(&mut items);
        order_nudges(&mut nudges);
        order_actions(&mut actions);

        let mut feed = Feed::empty(uid, flavour, is_anonymous, now.timestamp());
        feed.items = items;
        feed.nudges = nudges;
        feed.actions = actions;
        Ok(feed)
    }

    /// True when the feed holds no element in any state.
    async fn is_fresh(&self, scope: &FeedScope) -> Result<bool> {
        Ok(self.repo.actions(scope, &[]).await?.is_empty()
            && self.repo.nudges(scope, &[]).await?.is_empty()
            && self.repo.items(scope, &[]).await?.is_empty())
    }

    async fn seed_default_feed(&self, uid: &str, flavour: Flavour) -> Result<()> {
        for action in global_actions(flavour) {
            self.lifecycle.publish_action(uid, flavour, action).await?;
        }
        self.default_nudges
            .ensure_default_nudges(uid, flavour)
            .await?;
        let item = welcome_item(uid, flavour, self.clock.now());
        self.lifecycle.publish_item(uid, flavour, item).await?;
        Ok(())
    }

    /// Returns the feed filtered by `query`.
    ///
    /// List results are empty rather than an error when nothing matches.
    pub async fn get_feed(
        &self,
        uid: &str,
        is_anonymous: bool,
        flavour: Flavour,
        query: &FeedQuery,
    ) -> Result<Feed> {
        let feed = self.read_feed(uid, is_anonymous, flavour, query).await?;
        let scope = FeedScope::new(uid, flavour);
        if !query.is_unfiltered() || !self.is_fresh(&scope).await? {
            return Ok(feed);
        }

        info!(%scope, "Seeding default feed");
        self.seed_default_feed(uid, flavour).await?;
        let seeded = self.read_feed(uid, is_anonymous, flavour, query).await?;
        if seeded.is_empty() {
            warn!(%scope, "Default feed still empty after seeding");
        }
        Ok(seeded)
    }

    /// Every element of the feed regardless of state, for ID lookups.
    pub async fn get_thin_feed(
        &self,
        uid: &str,
        is_anonymous: bool,
        flavour: Flavour,
    ) -> Result<Feed> {
        let scope = FeedScope::new(uid, flavour);
        let mut feed = Feed::empty(uid, flavour, is_anonymous, self.clock.now().timestamp());
        feed.items = self.repo.items(&scope, &[]).await?;
        feed.nudges = self.repo.nudges(&scope, &[]).await?;
        feed.actions = self.repo.actions(&scope, &[]).await?;
        Ok(feed)
    }

    /// Returns the item with its conversation thread.
    pub async fn get_feed_item(&self, uid: &str, flavour: Flavour, item_id: &str) -> Result<Item> {
        let scope = FeedScope::new(uid, flavour);
        self.repo
            .get_item(&scope, item_id)
            .await?
            .ok_or_else(|| EngagementError::not_found(format!("item {item_id} not found")))
    }

    pub async fn get_nudge(&self, uid: &str, flavour: Flavour, nudge_id: &str) -> Result<Nudge> {
        let scope = FeedScope::new(uid, flavour);
        self.repo
            .get_nudge(&scope, nudge_id)
            .await?
            .ok_or_else(|| EngagementError::not_found(format!("nudge {nudge_id} not found")))
    }

    pub async fn get_action(&self, uid: &str, flavour: Flavour, action_id: &str) -> Result<Action> {
        let scope = FeedScope::new(uid, flavour);
        self.repo
            .get_action(&scope, action_id)
            .await?
            .ok_or_else(|| EngagementError::not_found(format!("action {action_id} not found")))
    }

    pub async fn get_default_nudge_by_title(
        &self,
        uid: &str,
        flavour: Flavour,
        title: &str,
    ) -> Result<Nudge> {
        self.default_nudges
            .get_default_nudge_by_title(uid, flavour, title)
            .await
    }

    // =========================================================================
    // Labels
    // =========================================================================

    /// The feed's label set, initialised to `["WELCOME"]` on first read.
    pub async fn labels(&self, uid: &str, flavour: Flavour) -> Result<Vec<String>> {
        let scope = FeedScope::new(uid, flavour);
        if let Some(labels) = self.repo.labels(&scope).await? {
            return Ok(labels);
        }
        let defaults = vec![DEFAULT_LABEL.to_string()];
        if self
            .repo
            .save_labels(&scope, &defaults, WriteCondition::Absent)
            .await?
        {
            debug!(%scope, "Initialised label set");
            return Ok(defaults);
        }
        Ok(self.repo.labels(&scope).await?.unwrap_or(defaults))
    }

    /// Adds `label` to the feed's label set if it is not there yet.
    pub async fn save_label(&self, uid: &str, flavour: Flavour, label: &str) -> Result<()> {
        let label = label.trim();
        if label.is_empty() {
            return Err(EngagementError::validation("label must not be blank"));
        }
        let scope = FeedScope::new(uid, flavour);
        let mut labels = self.labels(uid, flavour).await?;
        if labels.iter().any(|l| l == label) {
            return Ok(());
        }
        labels.push(label.to_string());
        self.repo
            .save_labels(&scope, &labels, WriteCondition::Always)
            .await?;
        info!(%scope, label, "Label saved");
        Ok(())
    }

    // =========================================================================
    // Unread inbox count
    // =========================================================================

    pub async fn unread_persistent_items(&self, uid: &str, flavour: Flavour) -> Result<i64> {
        let scope = FeedScope::new(uid, flavour);
        if let Some(count) = self.repo.unread_count(&scope).await? {
            return Ok(count);
        }
        self.repo
            .save_unread_count(&scope, 0, WriteCondition::Absent)
            .await?;
        Ok(self.repo.unread_count(&scope).await?.unwrap_or(0))
    }

    /// Recounts persistent items that pass the default predicates.
    pub async fn update_unread_persistent_items_count(
        &self,
        uid: &str,
        flavour: Flavour,
    ) -> Result<i64> {
        let scope = FeedScope::new(uid, flavour);
        let query = FeedQuery::new(BooleanFilter::True);
        let filters = query.item_filters(self.clock.now());
        let count = dedup_by_id(self.repo.items(&scope, &filters).await?, |i| i.id.as_str()).len()
            as i64;
        self.repo
            .save_unread_count(&scope, count, WriteCondition::Always)
            .await?;
        debug!(%scope, count, "Unread persistent count updated");
        Ok(count)
    }
}
