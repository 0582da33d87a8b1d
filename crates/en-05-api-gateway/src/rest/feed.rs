//! Read routes: the feed and single elements.

use super::AppState;
use crate::domain::{parse_feed_query, ApiError, FeedPath};
use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::{json, Value};
use shared_types::{Action, Feed, Item, Nudge};
use std::collections::HashMap;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn get_feed(
    State(state): State<AppState>,
    path: FeedPath,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Feed>, ApiError> {
    let query = parse_feed_query(&params)?;
    let feed = state
        .feeds
        .get_feed(&path.uid, path.is_anonymous, path.flavour, &query)
        .await?;
    Ok(Json(feed))
}

/// Every stored element regardless of state, without seeding.
pub async fn get_thin_feed(
    State(state): State<AppState>,
    path: FeedPath,
) -> Result<Json<Feed>, ApiError> {
    let feed = state
        .feeds
        .get_thin_feed(&path.uid, path.is_anonymous, path.flavour)
        .await?;
    Ok(Json(feed))
}

pub async fn get_item(
    State(state): State<AppState>,
    path: FeedPath,
) -> Result<Json<Item>, ApiError> {
    let item = state
        .feeds
        .get_feed_item(&path.uid, path.flavour, path.param("id")?)
        .await?;
    Ok(Json(item))
}

pub async fn get_nudge(
    State(state): State<AppState>,
    path: FeedPath,
) -> Result<Json<Nudge>, ApiError> {
    let nudge = state
        .feeds
        .get_nudge(&path.uid, path.flavour, path.param("id")?)
        .await?;
    Ok(Json(nudge))
}

pub async fn get_action(
    State(state): State<AppState>,
    path: FeedPath,
) -> Result<Json<Action>, ApiError> {
    let action = state
        .feeds
        .get_action(&path.uid, path.flavour, path.param("id")?)
        .await?;
    Ok(Json(action))
}
