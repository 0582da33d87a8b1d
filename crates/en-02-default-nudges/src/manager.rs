//! # Default Nudge Manager
//!
//! Seeds the flavour's default nudges and resolves them by title.
//!
//! A title present in any status counts as seeded, so a nudge the user
//! already resolved is never re-created.

use crate::definitions::definitions_for;
use en_01_lifecycle::{FeedRepository, FeedScope, LifecycleApi, TimeSource};
use shared_types::{EngagementError, Flavour, Nudge, Result, Status};
use std::sync::Arc;
use tracing::{debug, info};

pub struct DefaultNudgeManager {
    lifecycle: Arc<dyn LifecycleApi>,
    repo: FeedRepository,
    clock: Arc<dyn TimeSource>,
}

impl DefaultNudgeManager {
    pub fn new(
        lifecycle: Arc<dyn LifecycleApi>,
        repo: FeedRepository,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            lifecycle,
            repo,
            clock,
        }
    }

    /// Returns the stored nudge for `title`, preferring a PENDING one.
    async fn find_titled(&self, scope: &FeedScope, title: &str) -> Result<Option<Nudge>> {
        let mut titled = self.repo.nudges_titled(scope, title).await?;
        let pending = titled.iter().position(|n| n.status == Status::Pending);
        Ok(match pending {
            Some(index) => Some(titled.swap_remove(index)),
            None => titled.into_iter().next(),
        })
    }

    /// Publishes every default nudge of the flavour that is not yet stored.
    ///
    /// Returns one nudge per definition, stored or newly published.
    pub async fn ensure_default_nudges(&self, uid: &str, flavour: Flavour) -> Result<Vec<Nudge>> {
        let scope = FeedScope::new(uid, flavour);
        let mut ensured = Vec::new();
        for definition in definitions_for(flavour) {
            if let Some(existing) = self.find_titled(&scope, definition.title).await? {
                debug!(%scope, title = definition.title, "Default nudge already present");
                ensured.push(existing);
                continue;
            }
            let nudge = definition.build(uid, self.clock.now());
            match self.lifecycle.publish_nudge(uid, flavour, nudge).await {
                Ok(published) => {
                    info!(%scope, title = definition.title, "Default nudge seeded");
                    ensured.push(published);
                }
                // Another publisher stored a pending nudge with this title first.
                Err(e) if e.is_conflict() => {
                    debug!(%scope, title = definition.title, "Default nudge seeded concurrently");
                    if let Some(existing) = self.find_titled(&scope, definition.title).await? {
                        ensured.push(existing);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(ensured)
    }

    /// # Errors
    /// - `NotFound`: no nudge with this title exists for the user
    pub async fn get_default_nudge_by_title(
        &self,
        uid: &str,
        flavour: Flavour,
        title: &str,
    ) -> Result<Nudge> {
        let scope = FeedScope::new(uid, flavour);
        self.find_titled(&scope, title).await?.ok_or_else(|| {
            EngagementError::not_found(format!("no nudge titled {title:?} for {scope}"))
        })
    }

    /// Resolves the nudge titled `title`. Already resolved is a success.
    pub async fn resolve_default_nudge_by_title(
        &self,
        uid: &str,
        flavour: Flavour,
        title: &str,
    ) -> Result<Nudge> {
        let nudge = self.get_default_nudge_by_title(uid, flavour, title).await?;
        if nudge.status == Status::Done {
            debug!(uid, %flavour, title, "Default nudge already resolved");
            return Ok(nudge);
        }
        self.lifecycle.resolve_nudge(uid, flavour, &nudge.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{
        default_nudge_id, ADD_INSURANCE_TITLE, ADD_PRIMARY_EMAIL_TITLE,
        PARTNER_ACCOUNT_SETUP_TITLE,
    };
    use en_01_lifecycle::{InMemoryElementStore, LifecycleService, SystemTimeSource};
    use shared_bus::{
        InMemoryMessageBus, NotificationDispatcher, TopicNamespace, DEFAULT_PUBLISH_TIMEOUT,
    };
    use shared_types::ErrorKind;

    struct Harness {
        manager: Arc<DefaultNudgeManager>,
        lifecycle: Arc<LifecycleService>,
        bus: Arc<InMemoryMessageBus>,
    }

    async fn harness() -> Harness {
        let store = Arc::new(InMemoryElementStore::new());
        let bus = Arc::new(InMemoryMessageBus::new());
        let dispatcher = NotificationDispatcher::new(
            bus.clone(),
            TopicNamespace::new("test"),
            "http://localhost:8080/pubsub",
            DEFAULT_PUBLISH_TIMEOUT,
        )
        .unwrap();
        dispatcher.ensure_catalogue().await.unwrap();
        let repo = FeedRepository::new(store);
        let clock = Arc::new(SystemTimeSource);
        let lifecycle = Arc::new(LifecycleService::new(
            repo.clone(),
            Arc::new(dispatcher),
            clock.clone(),
        ));
        let manager = Arc::new(DefaultNudgeManager::new(lifecycle.clone(), repo, clock));
        Harness {
            manager,
            lifecycle,
            bus,
        }
    }

    async fn stored_nudges(h: &Harness, uid: &str, flavour: Flavour) -> Vec<Nudge> {
        h.lifecycle
            .repository()
            .nudges(&FeedScope::new(uid, flavour), &[])
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let h = harness().await;
        for _ in 0..3 {
            let ensured = h
                .manager
                .ensure_default_nudges("u1", Flavour::Pro)
                .await
                .unwrap();
            assert_eq!(ensured.len(), 2);
        }
        let nudges = stored_nudges(&h, "u1", Flavour::Pro).await;
        assert_eq!(nudges.len(), 2);
        assert_eq!(h.bus.published().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_creates_one_nudge_per_definition() {
        let h = harness().await;
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = h.manager.clone();
                tokio::spawn(async move {
                    manager.ensure_default_nudges("u1", Flavour::Consumer).await
                })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            let ensured = result.unwrap().unwrap();
            assert_eq!(ensured.len(), 1);
            assert_eq!(ensured[0].id, default_nudge_id(ADD_PRIMARY_EMAIL_TITLE));
        }
        assert_eq!(stored_nudges(&h, "u1", Flavour::Consumer).await.len(), 1);
    }

    #[tokio::test]
    async fn test_resolved_default_is_not_reseeded() {
        let h = harness().await;
        h.manager
            .ensure_default_nudges("u1", Flavour::Consumer)
            .await
            .unwrap();
        let resolved = h
            .manager
            .resolve_default_nudge_by_title("u1", Flavour::Consumer, ADD_PRIMARY_EMAIL_TITLE)
            .await
            .unwrap();
        assert_eq!(resolved.status, Status::Done);
        assert_eq!(resolved.sequence_number, 2);

        let ensured = h
            .manager
            .ensure_default_nudges("u1", Flavour::Consumer)
            .await
            .unwrap();
        assert_eq!(ensured[0].status, Status::Done);
        assert_eq!(stored_nudges(&h, "u1", Flavour::Consumer).await.len(), 1);
    }

    #[tokio::test]
    async fn test_deleted_default_is_seeded_again() {
        let h = harness().await;
        let id = default_nudge_id(ADD_PRIMARY_EMAIL_TITLE);
        h.manager
            .ensure_default_nudges("u1", Flavour::Consumer)
            .await
            .unwrap();
        h.lifecycle
            .delete_nudge("u1", Flavour::Consumer, &id)
            .await
            .unwrap();
        assert!(stored_nudges(&h, "u1", Flavour::Consumer).await.is_empty());

        let ensured = h
            .manager
            .ensure_default_nudges("u1", Flavour::Consumer)
            .await
            .unwrap();
        assert_eq!(ensured[0].id, id);
        assert_eq!(ensured[0].status, Status::Pending);
        assert_eq!(ensured[0].sequence_number, 1);

        let published = h.bus.published();
        assert_eq!(published.len(), 3);
        let envelopes: Vec<_> = published
            .iter()
            .map(|m| shared_types::NotificationEnvelope::from_bytes(&m.data).unwrap())
            .collect();
        assert_ne!(envelopes[0].notification_id, envelopes[2].notification_id);
    }

    #[tokio::test]
    async fn test_resolve_by_title_twice_is_noop() {
        let h = harness().await;
        h.manager
            .ensure_default_nudges("u1", Flavour::Pro)
            .await
            .unwrap();
        for _ in 0..2 {
            let nudge = h
                .manager
                .resolve_default_nudge_by_title("u1", Flavour::Pro, PARTNER_ACCOUNT_SETUP_TITLE)
                .await
                .unwrap();
            assert_eq!(nudge.sequence_number, 2);
        }
    }

    #[tokio::test]
    async fn test_unknown_title_is_not_found() {
        let h = harness().await;
        h.manager
            .ensure_default_nudges("u1", Flavour::Consumer)
            .await
            .unwrap();
        let err = h
            .manager
            .resolve_default_nudge_by_title("u1", Flavour::Consumer, ADD_INSURANCE_TITLE)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_existing_pending_title_with_other_id_is_kept() {
        let h = harness().await;
        let custom = Nudge {
            id: "custom".into(),
            title: ADD_PRIMARY_EMAIL_TITLE.into(),
            text: "custom copy".into(),
            ..Default::default()
        };
        h.lifecycle
            .publish_nudge("u1", Flavour::Consumer, custom)
            .await
            .unwrap();
        let ensured = h
            .manager
            .ensure_default_nudges("u1", Flavour::Consumer)
            .await
            .unwrap();
        assert_eq!(ensured[0].id, "custom");
        assert_eq!(stored_nudges(&h, "u1", Flavour::Consumer).await.len(), 1);
    }
}
