//! # Handler Registry
//!
//! Table-driven topic dispatch. Every catalogue topic maps to exactly one
//! handler; the router never branches on topic names itself.
//!
//! ```rust,ignore
//! let registry = HandlerRegistry::standard(deps);
//! let handler = registry.get(Topic::ItemPublish).ok_or(...)?;
//! handler.handle(&delivery).await?;
//! ```

use crate::handlers::{
    HandlerDeps, ItemHandler, MailHandler, NudgeHandler, PassiveHandler, SendNotificationHandler,
    TopicHandler,
};
use shared_bus::Topic;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Topic, Arc<dyn TopicHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry covering the full topic catalogue.
    pub fn standard(deps: HandlerDeps) -> Self {
        let mut registry = Self::new();
        for topic in Topic::ALL {
            let handler: Arc<dyn TopicHandler> = match topic {
                Topic::FcmSendNotification => Arc::new(SendNotificationHandler::new(deps.clone())),
                Topic::MailsInbox => Arc::new(MailHandler::new(deps.clone())),
                _ => {
                    if let Some(h) = ItemHandler::new(topic, deps.clone()) {
                        Arc::new(h)
                    } else if let Some(h) = NudgeHandler::new(topic, deps.clone()) {
                        Arc::new(h)
                    } else {
                        Arc::new(PassiveHandler::new(topic))
                    }
                }
            };
            registry.register(topic, handler);
        }
        registry
    }

    /// Installs `handler` for `topic`, replacing any previous one.
    pub fn register(&mut self, topic: Topic, handler: Arc<dyn TopicHandler>) {
        if self.handlers.insert(topic, handler).is_some() {
            warn!(%topic, "Replacing topic handler");
        }
    }

    pub fn get(&self, topic: Topic) -> Option<&Arc<dyn TopicHandler>> {
        self.handlers.get(&topic)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
