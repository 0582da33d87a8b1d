//! # Feed Aggregator (en-03)
//!
//! Read side of a user's feed.
//!
//! | Operation | Notes |
//! |-----------|-------|
//! | `get_feed` | Filtered view; seeds the default feed once for a fresh user |
//! | `get_thin_feed` | All elements in any state, for ID lookups |
//! | `get_feed_item` / `get_nudge` / `get_action` | `NotFound` when absent |
//! | `labels` / `save_label` | Label set, initialised to `WELCOME` |
//! | `unread_persistent_items` / `update_unread_persistent_items_count` | Inbox badge |

#![warn(clippy::all)]

pub mod aggregator;
pub mod defaults;
pub mod query;

pub use aggregator::FeedAggregator;
pub use defaults::{global_actions, welcome_item, WELCOME_ITEM_ID};
pub use query::FeedQuery;
