use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;

use warbler_types::api::{UpdateProfileRequest, UserSearchQuery};

use crate::auth::{AppState, clear_session_cookie, with_db};
use crate::error::ApiError;
use crate::policy::Identity;
use crate::{accounts, graph};

/// GET /users?q=
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserSearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let users = with_db(&state, move |db| accounts::list_users(db, query.q.as_deref())).await?;
    Ok(Json(users))
}

/// GET /users/{user_id}
pub async fn show_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = with_db(&state, move |db| accounts::show_profile(db, identity, user_id)).await?;
    Ok(Json(profile))
}

/// PATCH /users/{user_id}. Ownership is checked before the body is read.
pub async fn update_profile(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    identity.require_owner(user_id)?;
    let Json(req) = payload?;

    let user = with_db(&state, move |db| {
        accounts::update_profile(db, identity, user_id, &req)
    })
    .await?;
    Ok(Json(user))
}

/// DELETE /users/{user_id}: also ends every session of the account.
pub async fn delete_account(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(identity): Extension<Identity>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    with_db(&state, move |db| accounts::delete_account(db, identity, user_id)).await?;
    Ok((StatusCode::NO_CONTENT, clear_session_cookie(jar)))
}

/// GET /users/{user_id}/followers
pub async fn followers(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let users = with_db(&state, move |db| graph::followers(db, identity, user_id)).await?;
    Ok(Json(users))
}

/// GET /users/{user_id}/following
pub async fn following(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let users = with_db(&state, move |db| graph::following(db, identity, user_id)).await?;
    Ok(Json(users))
}

/// GET /users/{user_id}/likes
pub async fn likes(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = with_db(&state, move |db| graph::liked_messages(db, identity, user_id)).await?;
    Ok(Json(messages))
}

/// POST /users/{user_id}/follow
pub async fn follow(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    with_db(&state, move |db| graph::follow(db, identity, user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /users/{user_id}/follow
pub async fn unfollow(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    with_db(&state, move |db| graph::unfollow(db, identity, user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
