//! # Shared Bus - Topics, Dispatch and Push Delivery
//!
//! Everything between a persisted mutation and the handler that reacts to it.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐  notify()   ┌──────────────┐  publish()  ┌──────────────┐
//! │  Lifecycle   │ ──────────→ │ Notification │ ──────────→ │ Message Bus  │
//! │   Engine     │             │  Dispatcher  │             │  (port)      │
//! └──────────────┘             └──────────────┘             └──────┬───────┘
//!                                                                  │ push
//!                                                                  ↓
//!                                                          ┌──────────────┐
//!                                                          │ Topic Router │
//!                                                          │  (webhook)   │
//!                                                          └──────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Topic names are namespaced per environment (`TopicNamespace`).
//! - The catalogue is ensured idempotently at startup.
//! - Publish failures are returned, never swallowed.
//! - Redeliveries are detected by `DeliveryCache` on the consume side.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod delivery_cache;
pub mod dispatcher;
pub mod memory;
pub mod ports;
pub mod push;
pub mod topics;

pub use delivery_cache::DeliveryCache;
pub use dispatcher::{NotificationDispatcher, Notifier, DEFAULT_PUBLISH_TIMEOUT};
pub use memory::{InMemoryMessageBus, PublishedMessage, PushSubscription};
pub use ports::{Attributes, BusError, MessageBus};
pub use push::{
    PushEnvelope, PushMessage, FLAVOUR_ATTRIBUTE, TOPIC_ID_ATTRIBUTE, UID_ATTRIBUTE,
};
pub use topics::{Topic, TopicNamespace};
