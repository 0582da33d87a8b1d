//! Route table.
//!
//! Every REST route lives under `/feed/:uid/:flavour/:is_anonymous/`. The
//! push webhook is mounted at the configured pubsub path.

use crate::domain::config::GatewayConfig;
use crate::middleware::{create_cors_layer, AuthLayer, TimeoutLayer, TracingLayer};
use crate::rest::{elements, feed, messages, webhook, AppState};
use axum::{
    routing::{get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

const FEED: &str = "/feed/:uid/:flavour/:is_anonymous";

fn feed_route(suffix: &str) -> String {
    format!("{FEED}{suffix}")
}

/// Builds the gateway router with its full middleware stack.
pub fn build_router(state: AppState, config: &GatewayConfig) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(create_cors_layer(&config.cors))
        .layer(TracingLayer::new())
        .layer(TimeoutLayer::new(
            config.timeouts.clone(),
            &config.auth.pubsub_path,
        ))
        .layer(AuthLayer::new(config.auth.jwt_secret.as_deref()));

    Router::new()
        .route("/health", get(feed::health))
        .route(&config.auth.pubsub_path, post(webhook::receive_push))
        .route(&feed_route("/"), get(feed::get_feed))
        .route(&feed_route("/thin/"), get(feed::get_thin_feed))
        .route(&feed_route("/items/"), post(elements::publish_item))
        .route(
            &feed_route("/items/:id/"),
            get(feed::get_item).delete(elements::delete_item),
        )
        .route(
            &feed_route("/items/:id/:transition/"),
            patch(elements::transition_item),
        )
        .route(&feed_route("/nudges/"), post(elements::publish_nudge))
        .route(
            &feed_route("/nudges/:id/"),
            get(feed::get_nudge).delete(elements::delete_nudge),
        )
        .route(
            &feed_route("/nudges/:id/:transition/"),
            patch(elements::transition_nudge),
        )
        .route(&feed_route("/actions/"), post(elements::publish_action))
        .route(
            &feed_route("/actions/:id/"),
            get(feed::get_action).delete(elements::delete_action),
        )
        .route(
            &feed_route("/defaultnudges/:title/resolve/"),
            patch(elements::resolve_default_nudge),
        )
        .route(&feed_route("/events/"), post(elements::process_event))
        .route(
            &feed_route("/:item_id/messages/"),
            post(messages::post_message),
        )
        .route(
            &feed_route("/:item_id/messages/:message_id/"),
            axum::routing::delete(messages::delete_message),
        )
        // Applied per route, so the layers above still see axum's body type.
        .layer(RequestBodyLimitLayer::new(config.limits.max_request_size))
        .layer(middleware)
        .with_state(state)
}
