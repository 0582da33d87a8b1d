//! A fully wired service driven through its HTTP router.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use engagement_runtime::{AppContext, EngagementConfig};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use shared_bus::{PublishedMessage, Topic};
use tower::ServiceExt;

pub const UID: &str = "u1";
pub const CONSUMER: &str = "/feed/u1/CONSUMER/false";
pub const PRO: &str = "/feed/u1/PRO/false";

pub struct TestService {
    pub ctx: AppContext,
    pub app: Router,
}

impl TestService {
    pub async fn start() -> Self {
        Self::with_config(EngagementConfig::default()).await
    }

    pub async fn with_config(config: EngagementConfig) -> Self {
        let ctx = AppContext::build(config).await.unwrap();
        let app = ctx.gateway().unwrap().router();
        Self { ctx, app }
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        bearer: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(v) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };
        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    pub fn published_on(&self, topic: Topic) -> Vec<PublishedMessage> {
        let namespace = self.ctx.topic_router.namespace();
        self.ctx.bus.published_on(&namespace.topic_name(topic))
    }

    /// Topic IDs of everything published so far, in order.
    pub fn published_topics(&self) -> Vec<&'static str> {
        let namespace = self.ctx.topic_router.namespace();
        self.ctx
            .bus
            .published()
            .iter()
            .filter_map(|m| namespace.resolve(&m.topic))
            .map(|t| t.id())
            .collect()
    }

    /// The body the push subscription of `message`'s topic would POST.
    pub fn push_body(&self, message: &PublishedMessage) -> Value {
        let namespace = self.ctx.topic_router.namespace();
        let topic = namespace.resolve(&message.topic).unwrap();
        serde_json::to_value(message.to_push_envelope(namespace.subscription_name(topic))).unwrap()
    }

    pub async fn deliver(&self, message: &PublishedMessage) -> (StatusCode, Value) {
        let body = self.push_body(message);
        self.request("POST", "/pubsub", Some(body), None).await
    }
}

pub fn item_json(id: &str, persistent: bool) -> Value {
    json!({
        "id": id,
        "persistent": persistent,
        "tagline": "Your invoice",
        "summary": "Invoice 42 is ready",
        "label": "BILLING",
        "expiry": (Utc::now() + Duration::days(7)).to_rfc3339(),
        "icon": {"id": "i", "url": "https://assets.example.com/i.png", "linkType": "PNG_IMAGE"},
        "users": [UID]
    })
}

pub fn nudge_json(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "text": "Please add it",
        "expiry": (Utc::now() + Duration::days(7)).to_rfc3339(),
    })
}
