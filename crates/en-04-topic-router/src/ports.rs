//! # Outbound Ports
//!
//! Delivery channels the router hands side effects to. Real FCM and mail
//! providers live outside this service.

use crate::notifications::SendNotificationPayload;
use async_trait::async_trait;
use shared_types::Result;

#[async_trait]
pub trait PushService: Send + Sync {
    /// Sends a push notification. `sender` names the originating event.
    async fn push(&self, sender: &str, payload: SendNotificationPayload) -> Result<()>;
}

#[async_trait]
pub trait DeviceTokenSource: Send + Sync {
    /// Registered device tokens of `uids`. Users without devices add none.
    async fn device_tokens(&self, uids: &[String]) -> Result<Vec<String>>;
}

#[async_trait]
pub trait MailService: Send + Sync {
    async fn send_email(&self, subject: &str, text: &str, to: &[String]) -> Result<()>;
}
