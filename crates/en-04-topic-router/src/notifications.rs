//! Push and mail payloads, and the FCM fan-out helper.

use crate::ports::{DeviceTokenSource, PushService};
use serde::{Deserialize, Serialize};
use shared_types::{EngagementError, NotificationEnvelope, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub const ITEM_PUBLISH_SENDER: &str = "ITEM_PUBLISHED";
pub const ITEM_DELETE_SENDER: &str = "ITEM_DELETED";
pub const ITEM_RESOLVE_SENDER: &str = "ITEM_RESOLVED";
pub const ITEM_UNRESOLVE_SENDER: &str = "ITEM_UNRESOLVED";
pub const ITEM_HIDE_SENDER: &str = "ITEM_HIDE";
pub const ITEM_SHOW_SENDER: &str = "ITEM_SHOW";
pub const ITEM_PIN_SENDER: &str = "ITEM_PIN";
pub const ITEM_UNPIN_SENDER: &str = "ITEM_UNPIN";

pub const NUDGE_PUBLISH_SENDER: &str = "NUDGE_PUBLISHED";
pub const NUDGE_DELETE_SENDER: &str = "NUDGE_DELETED";
pub const NUDGE_RESOLVE_SENDER: &str = "NUDGE_RESOLVED";
pub const NUDGE_UNRESOLVE_SENDER: &str = "NUDGE_UNRESOLVED";
pub const NUDGE_SHOW_SENDER: &str = "NUDGE_SHOW";
pub const NUDGE_HIDE_SENDER: &str = "NUDGE_HIDE";

/// Sender used for raw `fcm.send_notification` requests.
pub const SEND_NOTIFICATION_SENDER: &str = "SEND_NOTIFICATION";

/// The tray notification shown by the device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimpleNotification {
    pub title: String,
    pub body: String,
    #[serde(rename = "imageURL", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SendNotificationPayload {
    pub registration_tokens: Vec<String>,
    pub data: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<SimpleNotification>,
}

impl SendNotificationPayload {
    pub fn validate(&self) -> Result<()> {
        if self.registration_tokens.iter().all(|t| t.trim().is_empty()) {
            return Err(EngagementError::validation(
                "notification needs at least one registration token",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailMessage {
    pub subject: String,
    pub text: String,
    pub to: Vec<String>,
}

impl EmailMessage {
    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() {
            return Err(EngagementError::validation("email subject is required"));
        }
        if self.to.iter().all(|r| r.trim().is_empty()) {
            return Err(EngagementError::validation("email needs at least one recipient"));
        }
        Ok(())
    }
}

/// Sends element notifications to the devices of a set of users.
#[derive(Clone)]
pub struct FcmNotifier {
    push: Arc<dyn PushService>,
    tokens: Arc<dyn DeviceTokenSource>,
}

impl FcmNotifier {
    pub fn new(push: Arc<dyn PushService>, tokens: Arc<dyn DeviceTokenSource>) -> Self {
        Self { push, tokens }
    }

    pub fn push_service(&self) -> &Arc<dyn PushService> {
        &self.push
    }

    /// Pushes `notification` with the envelope under `data[sender]`.
    ///
    /// Returns `false` when none of the users has a registered device.
    pub async fn send(
        &self,
        uids: &[String],
        sender: &str,
        envelope: &NotificationEnvelope,
        notification: SimpleNotification,
    ) -> Result<bool> {
        let registration_tokens = self.tokens.device_tokens(uids).await?;
        if registration_tokens.is_empty() {
            debug!(sender, users = uids.len(), "No device tokens, skipping push");
            return Ok(false);
        }
        let mut data = HashMap::new();
        data.insert(
            sender.to_string(),
            serde_json::to_string(envelope).map_err(EngagementError::from)?,
        );
        let payload = SendNotificationPayload {
            registration_tokens,
            data,
            notification: Some(notification),
        };
        self.push.push(sender, payload).await?;
        Ok(true)
    }
}
