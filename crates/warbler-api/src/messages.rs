use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use warbler_types::api::{LikeResponse, NewMessageRequest};

use crate::auth::{AppState, with_db};
use crate::error::ApiError;
use crate::policy::Identity;
use crate::{graph, posts};

/// GET /: the caller's home timeline.
pub async fn timeline(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = with_db(&state, move |db| posts::timeline(db, identity)).await?;
    Ok(Json(messages))
}

/// POST /messages. The body is only read once the caller is known.
pub async fn create_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<NewMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    identity.require()?;
    let Json(req) = payload?;

    let message = with_db(&state, move |db| posts::create_message(db, identity, &req.text)).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /messages/{message_id}
pub async fn show_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = with_db(&state, move |db| posts::show_message(db, message_id)).await?;
    Ok(Json(detail))
}

/// DELETE /messages/{message_id}
pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    with_db(&state, move |db| posts::delete_message(db, identity, message_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /messages/{message_id}/like
pub async fn toggle_like(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let liked = with_db(&state, move |db| graph::toggle_like(db, identity, message_id)).await?;
    Ok(Json(LikeResponse { liked }))
}
