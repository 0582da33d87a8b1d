//! REST and webhook handlers.

pub mod elements;
pub mod feed;
pub mod messages;
pub mod webhook;

use en_01_lifecycle::LifecycleApi;
use en_02_default_nudges::DefaultNudgeManager;
use en_03_feed_aggregator::FeedAggregator;
use en_04_topic_router::TopicRouter;
use serde_json::{json, Value};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<dyn LifecycleApi>,
    pub feeds: Arc<FeedAggregator>,
    pub default_nudges: Arc<DefaultNudgeManager>,
    pub topic_router: Arc<TopicRouter>,
}

/// Body of a successful delete or webhook acknowledgement.
pub(crate) fn success() -> Value {
    json!({ "status": "success" })
}
