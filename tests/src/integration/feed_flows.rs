//! # Feed Flows
//!
//! REST scenarios across the gateway, lifecycle engine, feed aggregator and
//! default nudge manager, observed through responses and the bus log.

use super::harness::{item_json, nudge_json, TestService, CONSUMER, PRO, UID};
use axum::http::StatusCode;
use en_01_lifecycle::LifecycleApi;
use en_02_default_nudges::default_nudge_id;
use en_02_default_nudges::definitions::PARTNER_ACCOUNT_SETUP_TITLE;
use en_03_feed_aggregator::{FeedQuery, WELCOME_ITEM_ID};
use futures::future::join_all;
use serde_json::json;
use shared_bus::Topic;
use shared_types::{BooleanFilter, Flavour, Item, Status};
use std::sync::Arc;

// =============================================================================
// LIFECYCLE SCENARIOS
// =============================================================================

#[tokio::test]
async fn test_item_scenario_publishes_every_change() {
    let svc = TestService::start().await;
    let items = format!("{CONSUMER}/items/");

    let (status, _) = svc.request("POST", &items, Some(item_json("x", true)), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, pinned) = svc.request("PATCH", &format!("{items}x/pin/"), None, None).await;
    assert_eq!(pinned["sequenceNumber"], 2);
    let (_, resolved) = svc.request("PATCH", &format!("{items}x/resolve/"), None, None).await;
    assert_eq!(resolved["sequenceNumber"], 3);
    assert_eq!(resolved["status"], "DONE");

    // Repeating a transition whose target already holds changes nothing.
    let (_, again) = svc.request("PATCH", &format!("{items}x/resolve/"), None, None).await;
    assert_eq!(again["sequenceNumber"], 3);

    for _ in 0..2 {
        let (status, _) = svc.request("DELETE", &format!("{items}x/"), None, None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = svc.request("GET", &format!("{items}x/"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(
        svc.published_topics(),
        vec![
            "items.publish",
            "items.pin",
            "items.resolve",
            "items.delete",
            "items.delete"
        ]
    );
}

#[tokio::test]
async fn test_nudge_title_scenario() {
    let svc = TestService::start().await;
    let nudges = format!("{CONSUMER}/nudges/");

    let (status, _) = svc
        .request("POST", &nudges, Some(nudge_json("n1", "add-email")), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, err) = svc
        .request("POST", &nudges, Some(nudge_json("n2", "add-email")), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["kind"], "Conflict");

    // The same title under the other flavour is a different feed.
    let (status, _) = svc
        .request("POST", &format!("{PRO}/nudges/"), Some(nudge_json("n2", "add-email")), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);

    svc.request("PATCH", &format!("{nudges}n1/resolve/"), None, None)
        .await;
    let (status, _) = svc
        .request("POST", &nudges, Some(nudge_json("n2", "add-email")), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_replayed_publish_is_not_renotified() {
    let svc = TestService::start().await;
    let items = format!("{CONSUMER}/items/");
    let mut body = item_json("x", false);
    body["sequenceNumber"] = json!(4);

    for _ in 0..3 {
        let (status, stored) = svc.request("POST", &items, Some(body.clone()), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(stored["sequenceNumber"], 4);
    }
    body["sequenceNumber"] = json!(2);
    let (_, stored) = svc.request("POST", &items, Some(body), None).await;
    assert_eq!(stored["sequenceNumber"], 4);

    assert_eq!(svc.published_on(Topic::ItemPublish).len(), 1);
}

#[tokio::test]
async fn test_concurrent_publishes_notify_once() {
    let svc = TestService::start().await;
    let lifecycle = Arc::clone(&svc.ctx.lifecycle);
    let item: Item = serde_json::from_value(item_json("x", true)).unwrap();

    let results = join_all((0..8).map(|_| {
        let lifecycle = Arc::clone(&lifecycle);
        let item = item.clone();
        tokio::spawn(async move { lifecycle.publish_item(UID, Flavour::Consumer, item).await })
    }))
    .await;

    for result in results {
        assert_eq!(result.unwrap().unwrap().sequence_number, 1);
    }
    assert_eq!(svc.published_on(Topic::ItemPublish).len(), 1);
}

#[tokio::test]
async fn test_conversation_round_trip() {
    let svc = TestService::start().await;
    svc.request("POST", &format!("{CONSUMER}/items/"), Some(item_json("x", true)), None)
        .await;

    for (id, expected) in [("m1", 1), ("m2", 2)] {
        let (status, message) = svc
            .request(
                "POST",
                &format!("{CONSUMER}/x/messages/"),
                Some(json!({"id": id, "text": "hi", "postedByUID": UID})),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(message["sequenceNumber"], expected);
    }
    let (_, item) = svc
        .request("GET", &format!("{CONSUMER}/items/x/"), None, None)
        .await;
    assert_eq!(item["conversations"].as_array().unwrap().len(), 2);

    svc.request("DELETE", &format!("{CONSUMER}/x/messages/m1/"), None, None)
        .await;
    let (_, item) = svc
        .request("GET", &format!("{CONSUMER}/items/x/"), None, None)
        .await;
    assert_eq!(item["conversations"][0]["id"], "m2");

    let (status, _) = svc
        .request(
            "POST",
            &format!("{CONSUMER}/missing/messages/"),
            Some(json!({"text": "hi", "postedByUID": UID})),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// FEED SEEDING AND QUERIES
// =============================================================================

#[tokio::test]
async fn test_fresh_feed_is_seeded_once_per_flavour() {
    let svc = TestService::start().await;
    let (status, feed) = svc
        .request("GET", &format!("{PRO}/?persistent=BOTH"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed["flavour"], "PRO");
    assert!(feed["items"]
        .as_array()
        .unwrap()
        .iter()
        .any(|i| i["id"] == WELCOME_ITEM_ID));
    let partner_id = default_nudge_id(PARTNER_ACCOUNT_SETUP_TITLE);
    assert!(feed["nudges"]
        .as_array()
        .unwrap()
        .iter()
        .any(|n| n["id"] == partner_id.as_str()));

    let seeded = svc.ctx.bus.published().len();
    assert!(seeded > 0);
    svc.request("GET", &format!("{PRO}/?persistent=BOTH"), None, None)
        .await;
    assert_eq!(svc.ctx.bus.published().len(), seeded);

    // The consumer feed of the same user is seeded separately.
    svc.request("GET", &format!("{CONSUMER}/?persistent=BOTH"), None, None)
        .await;
    assert!(svc.ctx.bus.published().len() > seeded);
}

#[tokio::test]
async fn test_filtered_read_does_not_seed() {
    let svc = TestService::start().await;
    let (status, feed) = svc
        .request(
            "GET",
            &format!("{CONSUMER}/?persistent=BOTH&status=DONE"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(feed["items"].as_array().unwrap().is_empty());
    assert!(svc.ctx.bus.published().is_empty());
}

#[tokio::test]
async fn test_feed_filters_by_status_and_persistence() {
    let svc = TestService::start().await;
    let items = format!("{CONSUMER}/items/");
    svc.request("POST", &items, Some(item_json("p", true)), None).await;
    svc.request("POST", &items, Some(item_json("t", false)), None).await;
    svc.request("PATCH", &format!("{items}t/resolve/"), None, None)
        .await;

    let query = FeedQuery::new(BooleanFilter::True);
    let feed = svc
        .ctx
        .feeds
        .get_feed(UID, false, Flavour::Consumer, &query.with_status(Status::Pending))
        .await
        .unwrap();
    let ids: Vec<&str> = feed.items.iter().map(|i| i.id.as_str()).collect();
    assert!(ids.contains(&"p"));
    assert!(!ids.contains(&"t"));

    let (_, done) = svc
        .request(
            "GET",
            &format!("{CONSUMER}/?persistent=FALSE&status=DONE"),
            None,
            None,
        )
        .await;
    let ids: Vec<&str> = done["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|i| i["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["t"]);
}
