//! Signup, login and the owner-gated profile operations.

use tracing::{error, info};

use warbler_db::models::{NewUser, UserChanges};
use warbler_db::{FollowsRepo, LikesRepo, MessageRepo, UserRepo};
use warbler_types::api::{ProfileResponse, SignupRequest, UpdateProfileRequest};
use warbler_types::models::{DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL, User};

use crate::credentials::{hash_password, verify_missing, verify_password};
use crate::error::ApiError;
use crate::graph;
use crate::policy::Identity;
use crate::posts::message_response;

/// Messages shown on a profile page.
const PROFILE_MESSAGE_LIMIT: u32 = 100;

/// Create a user with a hashed password.
///
/// A missing or empty password is a validation error and nothing is hashed
/// or stored. A missing username or email goes to the store as NULL and is
/// rejected there as an integrity violation, same as a duplicate.
pub fn signup<R: UserRepo>(repo: &R, req: &SignupRequest) -> Result<User, ApiError> {
    let password = req
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::Validation("Password must not be empty.".into()))?;

    let password_hash = hash_password(password)?;
    let image_url = req
        .image_url
        .as_deref()
        .filter(|url| !url.is_empty())
        .unwrap_or(DEFAULT_IMAGE_URL);

    let row = repo.insert_user(&NewUser {
        username: req.username.as_deref(),
        email: req.email.as_deref(),
        password_hash: &password_hash,
        image_url,
    })?;

    info!("User {} signed up as {}", row.id, row.username);
    Ok(row.into())
}

/// Signup followed by `open` (normally: start the first session), as one
/// unit. When `open` fails the new account is deleted again, so a retry with
/// the same username and email does not hit a uniqueness conflict.
pub fn signup_then<R, F, T>(repo: &R, req: &SignupRequest, open: F) -> Result<(User, T), ApiError>
where
    R: UserRepo,
    F: FnOnce(&R, &User) -> Result<T, ApiError>,
{
    let user = signup(repo, req)?;

    match open(repo, &user) {
        Ok(out) => Ok((user, out)),
        Err(e) => {
            if let Err(cleanup) = repo.delete_user(user.id) {
                error!("Failed to roll back signup of user {}: {}", user.id, cleanup);
            }
            Err(e)
        }
    }
}

/// The user when `username` exists and `password` matches, `None` otherwise.
pub fn authenticate<R: UserRepo>(
    repo: &R,
    username: &str,
    password: &str,
) -> Result<Option<User>, ApiError> {
    let Some(row) = repo.user_by_username(username)? else {
        verify_missing(password);
        return Ok(None);
    };

    if !verify_password(password, &row.password) {
        return Ok(None);
    }
    Ok(Some(row.into()))
}

pub fn list_users<R: UserRepo>(repo: &R, query: Option<&str>) -> Result<Vec<User>, ApiError> {
    let query = query.map(str::trim).filter(|q| !q.is_empty());
    let rows = repo.search_users(query)?;
    Ok(rows.into_iter().map(User::from).collect())
}

pub fn show_profile<R>(repo: &R, identity: Identity, user_id: i64) -> Result<ProfileResponse, ApiError>
where
    R: UserRepo + MessageRepo + FollowsRepo + LikesRepo,
{
    let viewer = identity.require()?;
    let user = repo.user_by_id(user_id)?.ok_or(ApiError::NotFound)?;

    let messages = repo
        .messages_by_user(user_id, PROFILE_MESSAGE_LIMIT)?
        .into_iter()
        .map(message_response)
        .collect();

    let is_own_profile = viewer == user_id;
    let is_following = !is_own_profile && graph::is_following(repo, viewer, user_id)?;

    Ok(ProfileResponse {
        user: user.into(),
        messages,
        followers_count: repo.followers(user_id)?.len(),
        following_count: repo.following(user_id)?.len(),
        likes_count: repo.liked_messages(user_id)?.len(),
        is_own_profile,
        is_following,
    })
}

/// Edit your own profile. The current password must be supplied; a wrong
/// one is treated like any other failed ownership check.
pub fn update_profile<R: UserRepo>(
    repo: &R,
    identity: Identity,
    user_id: i64,
    req: &UpdateProfileRequest,
) -> Result<User, ApiError> {
    identity.require_owner(user_id)?;
    let current = repo.user_by_id(user_id)?.ok_or(ApiError::NotFound)?;

    if !verify_password(&req.password, &current.password) {
        return Err(ApiError::Unauthorized);
    }

    if req.username.as_deref().is_some_and(str::is_empty) {
        return Err(ApiError::Validation("Username must not be empty.".into()));
    }
    if req.email.as_deref().is_some_and(str::is_empty) {
        return Err(ApiError::Validation("Email must not be empty.".into()));
    }

    // Clearing an image falls back to the default picture
    let changes = UserChanges {
        username: req.username.as_deref(),
        email: req.email.as_deref(),
        image_url: req
            .image_url
            .as_deref()
            .map(|url| if url.is_empty() { DEFAULT_IMAGE_URL } else { url }),
        header_image_url: req
            .header_image_url
            .as_deref()
            .map(|url| if url.is_empty() { DEFAULT_HEADER_IMAGE_URL } else { url }),
        bio: req.bio.as_deref(),
        location: req.location.as_deref(),
    };

    let row = repo.update_user(user_id, &changes)?.ok_or(ApiError::NotFound)?;
    info!("User {} updated their profile", user_id);
    Ok(row.into())
}

/// Delete your own account together with everything that references it.
pub fn delete_account<R: UserRepo>(repo: &R, identity: Identity, user_id: i64) -> Result<(), ApiError> {
    identity.require_owner(user_id)?;

    if !repo.delete_user(user_id)? {
        return Err(ApiError::NotFound);
    }
    info!("User {} deleted their account", user_id);
    Ok(())
}
