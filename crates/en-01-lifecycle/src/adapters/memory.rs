//! In-memory `ElementStore`.
//!
//! Conditions are evaluated under the same write lock as the write itself,
//! so conditional updates are atomic. The lock is never held across an
//! await point.

use crate::ports::outbound::{
    Collection, ElementStore, FeedScope, FilterOp, QueryFilter, StoreError, WriteCondition,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use parking_lot::RwLock;
use serde_json::Value;
use shared_types::Flavour;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

type CollectionKey = (String, Flavour, String);

#[derive(Default)]
pub struct InMemoryElementStore {
    collections: RwLock<HashMap<CollectionKey, BTreeMap<String, Value>>>,
    unavailable: AtomicBool,
}

impl InMemoryElementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: every call fails with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of documents in a collection.
    pub fn count(&self, scope: &FeedScope, collection: &Collection) -> usize {
        self.collections
            .read()
            .get(&key(scope, collection))
            .map_or(0, BTreeMap::len)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store marked unavailable".into()));
        }
        Ok(())
    }
}

fn key(scope: &FeedScope, collection: &Collection) -> CollectionKey {
    (scope.uid.clone(), scope.flavour, collection.path())
}

fn stored_sequence(doc: &Value) -> Option<i64> {
    doc.get("sequenceNumber").and_then(Value::as_i64)
}

fn as_datetime(value: &Value) -> Option<DateTime<FixedOffset>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

/// Orders numbers numerically, RFC 3339 timestamps chronologically and
/// other strings lexicographically.
fn compare(left: &Value, right: &Value) -> Option<CmpOrdering> {
    if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
        return l.partial_cmp(&r);
    }
    if let (Some(l), Some(r)) = (as_datetime(left), as_datetime(right)) {
        return Some(l.cmp(&r));
    }
    match (left.as_str(), right.as_str()) {
        (Some(l), Some(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

fn matches(doc: &Value, filter: &QueryFilter) -> bool {
    let Some(field) = doc.get(&filter.field) else {
        return false;
    };
    match filter.op {
        FilterOp::Eq => field == &filter.value,
        FilterOp::In => filter
            .value
            .as_array()
            .is_some_and(|values| values.contains(field)),
        FilterOp::Gte => matches!(
            compare(field, &filter.value),
            Some(CmpOrdering::Greater | CmpOrdering::Equal)
        ),
        FilterOp::Lte => matches!(
            compare(field, &filter.value),
            Some(CmpOrdering::Less | CmpOrdering::Equal)
        ),
    }
}

#[async_trait]
impl ElementStore for InMemoryElementStore {
    async fn get(
        &self,
        scope: &FeedScope,
        collection: &Collection,
        id: &str,
    ) -> Result<Option<Value>, StoreError> {
        self.check_available()?;
        Ok(self
            .collections
            .read()
            .get(&key(scope, collection))
            .and_then(|docs| docs.get(id).cloned()))
    }

    async fn save(
        &self,
        scope: &FeedScope,
        collection: &Collection,
        id: &str,
        doc: Value,
        condition: WriteCondition,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let mut collections = self.collections.write();
        let docs = collections.entry(key(scope, collection)).or_default();
        let holds = match condition {
            WriteCondition::Always => true,
            WriteCondition::Absent => !docs.contains_key(id),
            WriteCondition::SequenceIs(expected) => {
                docs.get(id).and_then(stored_sequence) == Some(expected)
            }
        };
        if !holds {
            return Err(StoreError::PreconditionFailed {
                collection: collection.path(),
                id: id.to_string(),
            });
        }
        docs.insert(id.to_string(), doc);
        Ok(())
    }

    async fn query(
        &self,
        scope: &FeedScope,
        collection: &Collection,
        filters: &[QueryFilter],
    ) -> Result<Vec<Value>, StoreError> {
        self.check_available()?;
        Ok(self
            .collections
            .read()
            .get(&key(scope, collection))
            .map(|docs| {
                docs.values()
                    .filter(|doc| filters.iter().all(|f| matches(doc, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(
        &self,
        scope: &FeedScope,
        collection: &Collection,
        id: &str,
    ) -> Result<bool, StoreError> {
        self.check_available()?;
        Ok(self
            .collections
            .write()
            .get_mut(&key(scope, collection))
            .is_some_and(|docs| docs.remove(id).is_some()))
    }
}
