//! The push-delivery webhook.

use super::{success, AppState};
use crate::domain::ApiError;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use serde_json::Value;
use tracing::debug;

pub async fn receive_push(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let ack = state
        .topic_router
        .handle(authorization, &body)
        .await
        .map_err(ApiError::webhook)?;
    debug!(?ack, "Push delivery acknowledged");
    Ok(Json(success()))
}
