//! # Push Delivery Envelope
//!
//! The body a push subscription POSTs to the webhook:
//! `{subscription, message: {messageId, data, attributes, publishTime}}`.

use crate::ports::Attributes;
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use shared_types::{EngagementError, NotificationEnvelope, Result};

/// Attribute naming the namespaced topic a message was published to.
pub const TOPIC_ID_ATTRIBUTE: &str = "topicID";

/// Attribute carrying the target user, when known.
pub const UID_ATTRIBUTE: &str = "uid";

/// Attribute carrying the flavour, when known.
pub const FLAVOUR_ATTRIBUTE: &str = "flavour";

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    #[serde(rename = "messageId", alias = "messageID", alias = "message_id", default)]
    pub message_id: String,
    #[serde_as(as = "Base64")]
    #[serde(default)]
    pub data: Vec<u8>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(
        rename = "publishTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub publish_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEnvelope {
    #[serde(default)]
    pub subscription: String,
    pub message: PushMessage,
}

impl PushEnvelope {
    /// Parses a raw webhook body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| EngagementError::validation(format!("malformed push envelope: {e}")))
    }

    /// The declared namespaced topic, if any.
    pub fn topic_id(&self) -> Option<&str> {
        self.message
            .attributes
            .get(TOPIC_ID_ATTRIBUTE)
            .map(String::as_str)
            .filter(|t| !t.is_empty())
    }

    pub fn message_id(&self) -> &str {
        &self.message.message_id
    }

    /// Decodes `data` as a `NotificationEnvelope`.
    pub fn decode_envelope(&self) -> Result<NotificationEnvelope> {
        NotificationEnvelope::from_bytes(&self.message.data)
    }
}
