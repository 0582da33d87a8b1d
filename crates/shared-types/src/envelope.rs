//! # `NotificationEnvelope`
//!
//! The wire unit published to every element topic.
//!
//! The payload is the validated, marshalled element. Subscribers decode it
//! into the element type implied by the topic, so the bus itself never needs
//! to know element schemas.

use crate::entities::{new_id, Flavour};
use crate::errors::Result;
use crate::validation::Element;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use std::collections::HashMap;

/// Metadata map carried beside the payload, e.g. `{"itemID": "..."}`.
pub type Metadata = HashMap<String, serde_json::Value>;

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    pub uid: String,
    pub flavour: Flavour,
    /// Marshalled element JSON, base64 on the wire.
    #[serde_as(as = "Base64")]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub metadata: Metadata,
    /// Unique per notify call and unchanged across redeliveries. Two
    /// publishes of the same element version carry different ids.
    #[serde(
        default,
        rename = "notificationId",
        skip_serializing_if = "String::is_empty"
    )]
    pub notification_id: String,
}

impl NotificationEnvelope {
    /// Wraps an element after validating it.
    pub fn wrap(
        uid: impl Into<String>,
        flavour: Flavour,
        element: &dyn Element,
        metadata: Metadata,
    ) -> Result<Self> {
        Ok(Self {
            uid: uid.into(),
            flavour,
            payload: element.validate_and_marshal()?,
            metadata,
            notification_id: new_id(),
        })
    }

    /// Decodes the payload into a concrete element type.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// A string metadata value, if present.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Builds a metadata map from string pairs.
pub fn metadata<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Metadata {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect()
}
