//! # Lifecycle Engine (en-01)
//!
//! Owns every element mutation: publish, the resolve/pin/hide toggles,
//! delete, conversation messages and incoming events.
//!
//! ## Write Protocol
//!
//! ```text
//! load stored ──→ replay? (stored.seq >= incoming.seq) ──yes──→ return stored
//!      │                        │ no
//!      │                        ↓
//!      │            conditional save (Absent | SequenceIs(stored.seq))
//!      │                        │
//!      └──── precondition failed (retry, max 3) ←──┤
//!                               ↓ ok
//!                      notify → NotificationDispatcher
//! ```
//!
//! ## Domain Invariants
//!
//! | Invariant | Description |
//! |-----------|-------------|
//! | Monotonic sequence | Each applied mutation increments the sequence number by one |
//! | Idempotent replay | A publish at or below the stored sequence is a no-op |
//! | Idempotent delete | Deleting an absent element succeeds and still notifies |
//! | Pin scope | Only persistent items can be pinned |
//! | Unique pending title | At most one PENDING nudge per title per feed |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Pure transition state machine
//! - `ports/` - `LifecycleApi` (inbound), `ElementStore` and `TimeSource` (outbound)
//! - `repository.rs` - Typed access to the element store
//! - `service.rs` - `LifecycleService` implementing the API
//! - `adapters/` - In-memory store

#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod repository;
pub mod service;

pub use adapters::InMemoryElementStore;
pub use domain::{apply_to_item, apply_to_nudge, Outcome, Transition};
pub use ports::inbound::LifecycleApi;
pub use ports::outbound::{
    Collection, ElementStore, FeedScope, FilterOp, FixedTimeSource, QueryFilter, StoreError,
    SystemTimeSource, TimeSource, WriteCondition,
};
pub use repository::{EffectMarker, FeedRepository, TitleClaim};
pub use service::{LifecycleService, MAX_WRITE_ATTEMPTS};
