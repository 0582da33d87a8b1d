//! # Topic Catalogue
//!
//! The fixed set of engagement topics and their namespaced names.
//!
//! Names follow `{service}-{topic}-{environment}-{version}`, so staging and
//! production can share one bus project without colliding.

use std::fmt;

/// Every topic the engagement service publishes to or consumes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    ItemPublish,
    ItemDelete,
    ItemResolve,
    ItemUnresolve,
    ItemHide,
    ItemShow,
    ItemPin,
    ItemUnpin,
    NudgePublish,
    NudgeDelete,
    NudgeResolve,
    NudgeUnresolve,
    NudgeHide,
    NudgeShow,
    ActionPublish,
    ActionDelete,
    MessagePost,
    MessageDelete,
    IncomingEvent,
    FcmSendNotification,
    MailsInbox,
    EngagementCreate,
}

impl Topic {
    /// The full catalogue, provisioned at startup.
    pub const ALL: [Topic; 22] = [
        Topic::ItemPublish,
        Topic::ItemDelete,
        Topic::ItemResolve,
        Topic::ItemUnresolve,
        Topic::ItemHide,
        Topic::ItemShow,
        Topic::ItemPin,
        Topic::ItemUnpin,
        Topic::NudgePublish,
        Topic::NudgeDelete,
        Topic::NudgeResolve,
        Topic::NudgeUnresolve,
        Topic::NudgeHide,
        Topic::NudgeShow,
        Topic::ActionPublish,
        Topic::ActionDelete,
        Topic::MessagePost,
        Topic::MessageDelete,
        Topic::IncomingEvent,
        Topic::FcmSendNotification,
        Topic::MailsInbox,
        Topic::EngagementCreate,
    ];

    /// The un-namespaced topic identifier.
    pub fn id(&self) -> &'static str {
        match self {
            Topic::ItemPublish => "items.publish",
            Topic::ItemDelete => "items.delete",
            Topic::ItemResolve => "items.resolve",
            Topic::ItemUnresolve => "items.unresolve",
            Topic::ItemHide => "items.hide",
            Topic::ItemShow => "items.show",
            Topic::ItemPin => "items.pin",
            Topic::ItemUnpin => "items.unpin",
            Topic::NudgePublish => "nudges.publish",
            Topic::NudgeDelete => "nudges.delete",
            Topic::NudgeResolve => "nudges.resolve",
            Topic::NudgeUnresolve => "nudges.unresolve",
            Topic::NudgeHide => "nudges.hide",
            Topic::NudgeShow => "nudges.show",
            Topic::ActionPublish => "actions.publish",
            Topic::ActionDelete => "actions.delete",
            Topic::MessagePost => "message.post",
            Topic::MessageDelete => "message.delete",
            Topic::IncomingEvent => "incoming.event",
            Topic::FcmSendNotification => "fcm.send_notification",
            Topic::MailsInbox => "mails.inbox",
            Topic::EngagementCreate => "engagement.create",
        }
    }

    pub fn from_id(id: &str) -> Option<Topic> {
        Topic::ALL.iter().copied().find(|t| t.id() == id)
    }

    /// Whether the payload on this topic is a `NotificationEnvelope`.
    ///
    /// FCM and mail topics carry their own request bodies instead.
    pub fn carries_envelope(&self) -> bool {
        !matches!(self, Topic::FcmSendNotification | Topic::MailsInbox)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Namespacing rule for topic and subscription names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicNamespace {
    service: String,
    environment: String,
    version: String,
}

impl TopicNamespace {
    pub const SERVICE: &'static str = "engagement";
    pub const VERSION: &'static str = "v1";

    /// Namespace for the engagement service in an environment.
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            service: Self::SERVICE.to_string(),
            environment: environment.into(),
            version: Self::VERSION.to_string(),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// `{service}-{topic}-{environment}-{version}`
    pub fn topic_name(&self, topic: Topic) -> String {
        format!(
            "{}-{}-{}-{}",
            self.service,
            topic.id(),
            self.environment,
            self.version
        )
    }

    pub fn subscription_name(&self, topic: Topic) -> String {
        format!("{}-subscription", self.topic_name(topic))
    }

    /// Resolves a namespaced topic name. Names from other namespaces and
    /// unknown topics resolve to `None`.
    pub fn resolve(&self, name: &str) -> Option<Topic> {
        let prefix = format!("{}-", self.service);
        let suffix = format!("-{}-{}", self.environment, self.version);
        let id = name.strip_prefix(&prefix)?.strip_suffix(&suffix)?;
        Topic::from_id(id)
    }
}
