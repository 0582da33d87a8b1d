//! # Delivery Flows
//!
//! Messages published by the lifecycle engine travel back into the topic
//! router, either as webhook POSTs or through local delivery, and fan out to
//! FCM, mail and the feed's derived state.

use super::harness::{item_json, TestService, CONSUMER, UID};
use axum::http::StatusCode;
use engagement_runtime::{EngagementConfig, LocalDelivery, PushAuthConfig};
use en_04_topic_router::notifications::ITEM_PUBLISH_SENDER;
use en_04_topic_router::{EmailMessage, SendNotificationPayload, SimpleNotification};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use shared_bus::{Attributes, Topic, UID_ATTRIBUTE};
use shared_types::Flavour;
use std::time::Duration;

const PUSH_SECRET: &str = "push-secret";
const PUSH_AUDIENCE: &str = "https://engagement.example.com/pubsub";

async fn publish_item(svc: &TestService, persistent: bool) {
    let (status, _) = svc
        .request(
            "POST",
            &format!("{CONSUMER}/items/"),
            Some(item_json("x", persistent)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

// =============================================================================
// WEBHOOK DELIVERY
// =============================================================================

#[tokio::test]
async fn test_redelivered_publish_pushes_once() {
    let svc = TestService::start().await;
    svc.ctx.device_tokens.register(UID, "token-1");
    publish_item(&svc, true).await;
    let message = svc.published_on(Topic::ItemPublish).pop().unwrap();

    for _ in 0..2 {
        let (status, body) = svc.deliver(&message).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success"}));
    }
    // A new message ID for the same element version is still one push.
    let mut copy = message.clone();
    copy.message_id = format!("{}-copy", message.message_id);
    let (status, _) = svc.deliver(&copy).await;
    assert_eq!(status, StatusCode::OK);

    let pushes = svc.ctx.push.sent_by(ITEM_PUBLISH_SENDER);
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].payload.registration_tokens, vec!["token-1"]);
    let tray = pushes[0].payload.notification.clone().unwrap();
    assert_eq!(tray.title, "Your invoice");
}

#[tokio::test]
async fn test_item_published_again_after_delete_pushes_again() {
    let svc = TestService::start().await;
    svc.ctx.device_tokens.register(UID, "token-1");
    publish_item(&svc, true).await;
    let first = svc.published_on(Topic::ItemPublish).pop().unwrap();
    assert_eq!(svc.deliver(&first).await.0, StatusCode::OK);

    let (status, _) = svc
        .request("DELETE", &format!("{CONSUMER}/items/x/"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    publish_item(&svc, true).await;
    let second = svc.published_on(Topic::ItemPublish).pop().unwrap();
    assert_ne!(second.message_id, first.message_id);
    for _ in 0..2 {
        assert_eq!(svc.deliver(&second).await.0, StatusCode::OK);
    }

    assert_eq!(svc.ctx.push.sent_by(ITEM_PUBLISH_SENDER).len(), 2);
}

#[tokio::test]
async fn test_item_delivery_updates_labels_and_unread_count() {
    let svc = TestService::start().await;
    publish_item(&svc, true).await;
    let message = svc.published_on(Topic::ItemPublish).pop().unwrap();
    assert_eq!(svc.deliver(&message).await.0, StatusCode::OK);

    let labels = svc.ctx.feeds.labels(UID, Flavour::Consumer).await.unwrap();
    assert_eq!(labels.iter().filter(|l| *l == "BILLING").count(), 1);
    let unread = svc
        .ctx
        .feeds
        .unread_persistent_items(UID, Flavour::Consumer)
        .await
        .unwrap();
    assert_eq!(unread, 1);

    svc.request("PATCH", &format!("{CONSUMER}/items/x/resolve/"), None, None)
        .await;
    let resolved = svc.published_on(Topic::ItemResolve).pop().unwrap();
    assert_eq!(svc.deliver(&resolved).await.0, StatusCode::OK);
    let unread = svc
        .ctx
        .feeds
        .unread_persistent_items(UID, Flavour::Consumer)
        .await
        .unwrap();
    assert_eq!(unread, 0);
}

#[tokio::test]
async fn test_non_persistent_publish_sends_no_push() {
    let svc = TestService::start().await;
    svc.ctx.device_tokens.register(UID, "token-1");
    publish_item(&svc, false).await;
    let message = svc.published_on(Topic::ItemPublish).pop().unwrap();
    assert_eq!(svc.deliver(&message).await.0, StatusCode::OK);
    assert!(svc.ctx.push.sent().is_empty());
}

#[tokio::test]
async fn test_raw_notification_and_mail_topics() {
    let svc = TestService::start().await;
    let payload = SendNotificationPayload {
        registration_tokens: vec!["token-9".into()],
        notification: Some(SimpleNotification {
            title: "Hello".into(),
            body: "World".into(),
            ..Default::default()
        }),
        ..Default::default()
    };
    let mut attributes = Attributes::new();
    attributes.insert("sender".into(), "CAMPAIGN".into());
    attributes.insert(UID_ATTRIBUTE.into(), UID.into());
    svc.ctx
        .dispatcher
        .publish_raw(
            Topic::FcmSendNotification,
            serde_json::to_vec(&payload).unwrap(),
            attributes,
        )
        .await
        .unwrap();

    let mail = EmailMessage {
        subject: "Welcome".into(),
        text: "Hi there".into(),
        to: vec!["user@example.com".into()],
    };
    svc.ctx
        .dispatcher
        .publish_raw(
            Topic::MailsInbox,
            serde_json::to_vec(&mail).unwrap(),
            Attributes::new(),
        )
        .await
        .unwrap();

    for topic in [Topic::FcmSendNotification, Topic::MailsInbox] {
        let message = svc.published_on(topic).pop().unwrap();
        for _ in 0..2 {
            assert_eq!(svc.deliver(&message).await.0, StatusCode::OK);
        }
    }
    assert_eq!(svc.ctx.push.sent_by("CAMPAIGN").len(), 1);
    assert_eq!(svc.ctx.mail.sent(), vec![mail]);
}

#[tokio::test]
async fn test_failed_delivery_is_not_acknowledged() {
    let svc = TestService::start().await;
    let invalid = EmailMessage {
        subject: "No recipients".into(),
        ..Default::default()
    };
    svc.ctx
        .dispatcher
        .publish_raw(
            Topic::MailsInbox,
            serde_json::to_vec(&invalid).unwrap(),
            Attributes::new(),
        )
        .await
        .unwrap();
    let message = svc.published_on(Topic::MailsInbox).pop().unwrap();

    for _ in 0..2 {
        let (status, body) = svc.deliver(&message).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "Validation");
    }
    assert!(svc.ctx.mail.sent().is_empty());
}

#[tokio::test]
async fn test_webhook_verifies_push_tokens() {
    let config = EngagementConfig {
        push_auth: Some(PushAuthConfig {
            secret: PUSH_SECRET.into(),
            audience: PUSH_AUDIENCE.into(),
            issuers: vec![],
            allowed_emails: vec!["pusher@example.com".into()],
        }),
        ..Default::default()
    };
    let svc = TestService::with_config(config).await;
    publish_item(&svc, false).await;
    let message = svc.published_on(Topic::ItemPublish).pop().unwrap();
    let body = svc.push_body(&message);

    let token = |email: &str| {
        let claims = json!({
            "sub": "pusher",
            "aud": PUSH_AUDIENCE,
            "email": email,
            "exp": chrono::Utc::now().timestamp() + 600,
        });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(PUSH_SECRET.as_bytes()),
        )
        .unwrap()
    };

    let (status, err) = svc.request("POST", "/pubsub", Some(body.clone()), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["kind"], "Auth");

    let stranger = token("stranger@example.com");
    let (status, _) = svc
        .request("POST", "/pubsub", Some(body.clone()), Some(&stranger))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let pusher = token("pusher@example.com");
    let (status, _) = svc
        .request("POST", "/pubsub", Some(body), Some(&pusher))
        .await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// LOCAL DELIVERY
// =============================================================================

#[tokio::test]
async fn test_local_delivery_closes_the_loop() {
    let svc = TestService::start().await;
    svc.ctx.device_tokens.register(UID, "token-1");
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle =
        LocalDelivery::new(&svc.ctx.bus, svc.ctx.topic_router.clone()).spawn(shutdown_rx);

    publish_item(&svc, true).await;

    let mut pushed = false;
    for _ in 0..100 {
        if svc.ctx.push.sent_by(ITEM_PUBLISH_SENDER).len() == 1 {
            pushed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(pushed);

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}
