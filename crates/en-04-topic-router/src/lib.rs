//! # Topic Router (en-04)
//!
//! Consume side of the bus. The push subscription of every catalogue topic
//! POSTs to one webhook; the router authenticates the delivery, resolves
//! its namespaced `topicID` and hands it to that topic's handler.
//!
//! | Topic group | Handler | Side effect |
//! |-------------|---------|-------------|
//! | `items.*` | `ItemHandler` | FCM for persistent publishes, label, unread count |
//! | `nudges.*` | `NudgeHandler` | FCM on publish and resolve |
//! | `actions.*`, `message.*`, `incoming.event`, `engagement.create` | `PassiveHandler` | none |
//! | `fcm.send_notification` | `SendNotificationHandler` | forwards a raw FCM request |
//! | `mails.inbox` | `MailHandler` | sends an e-mail |
//!
//! Deliveries are at least once. Handlers record an applied-effect marker
//! per element version or message ID, and the router remembers recently
//! acknowledged message IDs.

#![warn(clippy::all)]

pub mod adapters;
pub mod handlers;
pub mod notifications;
pub mod ports;
pub mod registry;
pub mod router;
pub mod verifier;

pub use adapters::{LoggingMailService, LoggingPushService, SentPush, StaticDeviceTokens};
pub use handlers::{Delivery, HandlerDeps, TopicHandler};
pub use notifications::{EmailMessage, FcmNotifier, SendNotificationPayload, SimpleNotification};
pub use ports::{DeviceTokenSource, MailService, PushService};
pub use registry::HandlerRegistry;
pub use router::{Ack, TopicRouter, DEFAULT_DELIVERY_TIMEOUT};
pub use verifier::{InsecurePushVerifier, JwtPushVerifier, PushClaims, PushVerifier};
