//! Follows and likes between users and messages.

use tracing::info;

use warbler_db::{FollowsRepo, LikesRepo, MessageRepo, UserRepo};
use warbler_types::api::MessageResponse;
use warbler_types::models::User;

use crate::error::ApiError;
use crate::policy::Identity;
use crate::posts::message_response;

/// True iff `follower` follows `followed`.
pub fn is_following<R: FollowsRepo>(repo: &R, follower: i64, followed: i64) -> Result<bool, ApiError> {
    Ok(repo.follow_exists(follower, followed)?)
}

/// True iff `other` follows `user`. The exact inverse of [`is_following`].
pub fn is_followed_by<R: FollowsRepo>(repo: &R, user: i64, other: i64) -> Result<bool, ApiError> {
    Ok(repo.follow_exists(other, user)?)
}

/// Follow `target` as the caller. Following yourself is rejected up front;
/// following someone twice is an integrity violation.
pub fn follow<R>(repo: &R, identity: Identity, target: i64) -> Result<(), ApiError>
where
    R: UserRepo + FollowsRepo,
{
    let me = identity.require()?;
    if me == target {
        return Err(ApiError::Validation("You cannot follow yourself.".into()));
    }
    repo.user_by_id(target)?.ok_or(ApiError::NotFound)?;

    repo.insert_follow(me, target)?;
    info!("User {} now follows {}", me, target);
    Ok(())
}

pub fn unfollow<R: FollowsRepo>(repo: &R, identity: Identity, target: i64) -> Result<(), ApiError> {
    let me = identity.require()?;

    if !repo.delete_follow(me, target)? {
        return Err(ApiError::NotFound);
    }
    info!("User {} stopped following {}", me, target);
    Ok(())
}

/// Users following `user_id`.
pub fn followers<R>(repo: &R, identity: Identity, user_id: i64) -> Result<Vec<User>, ApiError>
where
    R: UserRepo + FollowsRepo,
{
    identity.require()?;
    repo.user_by_id(user_id)?.ok_or(ApiError::NotFound)?;
    Ok(repo.followers(user_id)?.into_iter().map(User::from).collect())
}

/// Users `user_id` follows.
pub fn following<R>(repo: &R, identity: Identity, user_id: i64) -> Result<Vec<User>, ApiError>
where
    R: UserRepo + FollowsRepo,
{
    identity.require()?;
    repo.user_by_id(user_id)?.ok_or(ApiError::NotFound)?;
    Ok(repo.following(user_id)?.into_iter().map(User::from).collect())
}

/// Messages `user_id` has liked.
pub fn liked_messages<R>(repo: &R, identity: Identity, user_id: i64) -> Result<Vec<MessageResponse>, ApiError>
where
    R: UserRepo + LikesRepo,
{
    identity.require()?;
    repo.user_by_id(user_id)?.ok_or(ApiError::NotFound)?;
    Ok(repo
        .liked_messages(user_id)?
        .into_iter()
        .map(message_response)
        .collect())
}

/// Like the message, or take the like back if it is already there.
/// Returns whether the caller likes it afterwards.
pub fn toggle_like<R>(repo: &R, identity: Identity, message_id: i64) -> Result<bool, ApiError>
where
    R: MessageRepo + LikesRepo,
{
    let me = identity.require()?;
    repo.message_by_id(message_id)?.ok_or(ApiError::NotFound)?;
    Ok(repo.toggle_like(me, message_id)?)
}
