//! Mutation routes for items, nudges, actions and events.

use super::{success, AppState};
use crate::domain::{parse_body, ApiError, FeedPath};
use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use en_01_lifecycle::Transition;
use serde_json::Value;
use shared_types::{Action, Event, Item, Nudge};

type Created<T> = (StatusCode, Json<T>);

fn transition(path: &FeedPath) -> Result<Transition, ApiError> {
    let segment = path.param("transition")?;
    Transition::from_segment(segment)
        .ok_or_else(|| ApiError::bad_request(format!("unknown transition {segment:?}")))
}

pub async fn publish_item(
    State(state): State<AppState>,
    path: FeedPath,
    body: Bytes,
) -> Result<Created<Item>, ApiError> {
    let item: Item = parse_body(&body)?;
    let item = state
        .lifecycle
        .publish_item(&path.uid, path.flavour, item)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn publish_nudge(
    State(state): State<AppState>,
    path: FeedPath,
    body: Bytes,
) -> Result<Created<Nudge>, ApiError> {
    let nudge: Nudge = parse_body(&body)?;
    let nudge = state
        .lifecycle
        .publish_nudge(&path.uid, path.flavour, nudge)
        .await?;
    Ok((StatusCode::CREATED, Json(nudge)))
}

pub async fn publish_action(
    State(state): State<AppState>,
    path: FeedPath,
    body: Bytes,
) -> Result<Created<Action>, ApiError> {
    let action: Action = parse_body(&body)?;
    let action = state
        .lifecycle
        .publish_action(&path.uid, path.flavour, action)
        .await?;
    Ok((StatusCode::CREATED, Json(action)))
}

pub async fn delete_item(
    State(state): State<AppState>,
    path: FeedPath,
) -> Result<Json<Value>, ApiError> {
    state
        .lifecycle
        .delete_item(&path.uid, path.flavour, path.param("id")?)
        .await?;
    Ok(Json(success()))
}

pub async fn delete_nudge(
    State(state): State<AppState>,
    path: FeedPath,
) -> Result<Json<Value>, ApiError> {
    state
        .lifecycle
        .delete_nudge(&path.uid, path.flavour, path.param("id")?)
        .await?;
    Ok(Json(success()))
}

pub async fn delete_action(
    State(state): State<AppState>,
    path: FeedPath,
) -> Result<Json<Value>, ApiError> {
    state
        .lifecycle
        .delete_action(&path.uid, path.flavour, path.param("id")?)
        .await?;
    Ok(Json(success()))
}

pub async fn transition_item(
    State(state): State<AppState>,
    path: FeedPath,
) -> Result<Json<Item>, ApiError> {
    let transition = transition(&path)?;
    let item = state
        .lifecycle
        .transition_item(&path.uid, path.flavour, path.param("id")?, transition)
        .await?;
    Ok(Json(item))
}

pub async fn transition_nudge(
    State(state): State<AppState>,
    path: FeedPath,
) -> Result<Json<Nudge>, ApiError> {
    let transition = transition(&path)?;
    if transition.nudge_topic().is_none() {
        return Err(ApiError::bad_request(format!(
            "nudges do not support {transition}"
        )));
    }
    let nudge = state
        .lifecycle
        .transition_nudge(&path.uid, path.flavour, path.param("id")?, transition)
        .await?;
    Ok(Json(nudge))
}

pub async fn resolve_default_nudge(
    State(state): State<AppState>,
    path: FeedPath,
) -> Result<Json<Nudge>, ApiError> {
    let nudge = state
        .default_nudges
        .resolve_default_nudge_by_title(&path.uid, path.flavour, path.param("title")?)
        .await?;
    Ok(Json(nudge))
}

pub async fn process_event(
    State(state): State<AppState>,
    path: FeedPath,
    body: Bytes,
) -> Result<Json<Event>, ApiError> {
    let event: Event = parse_body(&body)?;
    let event = state
        .lifecycle
        .process_event(&path.uid, path.flavour, event)
        .await?;
    Ok(Json(event))
}
