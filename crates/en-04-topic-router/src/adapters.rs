//! In-process delivery channels.
//!
//! They log and record what would have been sent, so a single-process
//! deployment and the tests can observe every side effect.

use crate::notifications::{EmailMessage, SendNotificationPayload};
use crate::ports::{DeviceTokenSource, MailService, PushService};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::Result;
use std::collections::HashMap;
use tracing::info;

/// A push request accepted by [`LoggingPushService`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentPush {
    pub sender: String,
    pub payload: SendNotificationPayload,
}

#[derive(Default)]
pub struct LoggingPushService {
    sent: RwLock<Vec<SentPush>>,
}

impl LoggingPushService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentPush> {
        self.sent.read().clone()
    }

    pub fn sent_by(&self, sender: &str) -> Vec<SentPush> {
        self.sent
            .read()
            .iter()
            .filter(|p| p.sender == sender)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PushService for LoggingPushService {
    async fn push(&self, sender: &str, payload: SendNotificationPayload) -> Result<()> {
        payload.validate()?;
        info!(
            sender,
            devices = payload.registration_tokens.len(),
            title = payload.notification.as_ref().map(|n| n.title.as_str()).unwrap_or(""),
            "Push notification sent"
        );
        self.sent.write().push(SentPush {
            sender: sender.to_string(),
            payload,
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct LoggingMailService {
    sent: RwLock<Vec<EmailMessage>>,
}

impl LoggingMailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.read().clone()
    }
}

#[async_trait]
impl MailService for LoggingMailService {
    async fn send_email(&self, subject: &str, text: &str, to: &[String]) -> Result<()> {
        let message = EmailMessage {
            subject: subject.to_string(),
            text: text.to_string(),
            to: to.to_vec(),
        };
        message.validate()?;
        info!(subject, recipients = to.len(), "Email sent");
        self.sent.write().push(message);
        Ok(())
    }
}

/// Device registrations keyed by user.
#[derive(Default)]
pub struct StaticDeviceTokens {
    tokens: RwLock<HashMap<String, Vec<String>>>,
}

impl StaticDeviceTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device token for `uid`. Repeated registrations are ignored.
    pub fn register(&self, uid: impl Into<String>, token: impl Into<String>) {
        let token = token.into();
        let mut tokens = self.tokens.write();
        let entry = tokens.entry(uid.into()).or_default();
        if !entry.contains(&token) {
            entry.push(token);
        }
    }
}

#[async_trait]
impl DeviceTokenSource for StaticDeviceTokens {
    async fn device_tokens(&self, uids: &[String]) -> Result<Vec<String>> {
        let tokens = self.tokens.read();
        Ok(uids
            .iter()
            .filter_map(|uid| tokens.get(uid))
            .flatten()
            .cloned()
            .collect())
    }
}
