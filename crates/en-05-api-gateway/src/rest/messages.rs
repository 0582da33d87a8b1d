//! Conversation routes under `/{itemID}/messages/`.

use super::{success, AppState};
use crate::domain::{parse_body, ApiError, FeedPath};
use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde_json::Value;
use shared_types::Message;

pub async fn post_message(
    State(state): State<AppState>,
    path: FeedPath,
    body: Bytes,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let message: Message = parse_body(&body)?;
    let message = state
        .lifecycle
        .post_message(&path.uid, path.flavour, path.param("item_id")?, message)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn delete_message(
    State(state): State<AppState>,
    path: FeedPath,
) -> Result<Json<Value>, ApiError> {
    state
        .lifecycle
        .delete_message(
            &path.uid,
            path.flavour,
            path.param("item_id")?,
            path.param("message_id")?,
        )
        .await?;
    Ok(Json(success()))
}
