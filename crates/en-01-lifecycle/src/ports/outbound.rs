//! Outbound (Driven) ports for the Lifecycle Engine.
//!
//! These traits define dependencies on external systems: the document store
//! holding feed elements and the clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use shared_types::{EngagementError, Flavour};
use std::fmt;
use thiserror::Error;

/// The partition every document lives in: one user's feed for one flavour.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedScope {
    pub uid: String,
    pub flavour: Flavour,
}

impl FeedScope {
    pub fn new(uid: impl Into<String>, flavour: Flavour) -> Self {
        Self {
            uid: uid.into(),
            flavour,
        }
    }
}

impl fmt::Display for FeedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.uid, self.flavour)
    }
}

/// Document collections within a feed scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Collection {
    Items,
    Nudges,
    Actions,
    /// Conversation thread of one item.
    Messages { item_id: String },
    IncomingEvents,
    Labels,
    UnreadCounts,
    /// Ledger of side effects already performed by topic handlers.
    AppliedEffects,
    /// One claim per nudge title, keyed by the title.
    NudgeTitles,
}

impl Collection {
    /// Storage path of the collection relative to its scope.
    pub fn path(&self) -> String {
        match self {
            Collection::Items => "items".to_string(),
            Collection::Nudges => "nudges".to_string(),
            Collection::Actions => "actions".to_string(),
            Collection::Messages { item_id } => format!("items/{item_id}/messages"),
            Collection::IncomingEvents => "incoming_events".to_string(),
            Collection::Labels => "labels".to_string(),
            Collection::UnreadCounts => "unread_persistent_items".to_string(),
            Collection::AppliedEffects => "applied_effects".to_string(),
            Collection::NudgeTitles => "nudge_titles".to_string(),
        }
    }
}

/// Precondition evaluated atomically with a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCondition {
    /// Unconditional upsert.
    Always,
    /// Create only; fails if the document exists.
    Absent,
    /// Update only if the stored `sequenceNumber` equals the given value.
    SequenceIs(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    /// The field equals any element of an array value.
    In,
    Gte,
    Lte,
}

/// A single predicate on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl QueryFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn one_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::In,
            value: Value::Array(values),
        }
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Gte,
            value: value.into(),
        }
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Lte,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The write condition did not hold.
    #[error("precondition failed for {collection}/{id}")]
    PreconditionFailed { collection: String, id: String },

    /// A stored document could not be decoded.
    #[error("corrupt document {collection}/{id}: {reason}")]
    Corrupt {
        collection: String,
        id: String,
        reason: String,
    },

    #[error("element store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for EngagementError {
    fn from(err: StoreError) -> Self {
        EngagementError::upstream(err.to_string())
    }
}

/// Keyed document store addressed by (scope, collection, id).
#[async_trait]
pub trait ElementStore: Send + Sync {
    async fn get(
        &self,
        scope: &FeedScope,
        collection: &Collection,
        id: &str,
    ) -> Result<Option<Value>, StoreError>;

    /// Writes `doc` if `condition` holds, else `StoreError::PreconditionFailed`.
    async fn save(
        &self,
        scope: &FeedScope,
        collection: &Collection,
        id: &str,
        doc: Value,
        condition: WriteCondition,
    ) -> Result<(), StoreError>;

    /// Documents matching every filter, in key order.
    async fn query(
        &self,
        scope: &FeedScope,
        collection: &Collection,
        filters: &[QueryFilter],
    ) -> Result<Vec<Value>, StoreError>;

    /// Removes a document. Returns whether it existed.
    async fn delete(
        &self,
        scope: &FeedScope,
        collection: &Collection,
        id: &str,
    ) -> Result<bool, StoreError>;
}

/// Time source for consistent timestamp handling.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant, for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource(pub DateTime<Utc>);

impl TimeSource for FixedTimeSource {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
