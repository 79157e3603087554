//! Creating, reading and deleting messages.

use chrono::Utc;
use tracing::info;

use warbler_db::models::MessageRow;
use warbler_db::{LikesRepo, MessageRepo};
use warbler_types::api::{MessageDetailResponse, MessageResponse};
use warbler_types::models::{MAX_MESSAGE_LEN, User};

use crate::error::ApiError;
use crate::policy::Identity;

/// Messages shown on the home timeline.
const TIMELINE_LIMIT: u32 = 100;

pub(crate) fn message_response(mut row: MessageRow) -> MessageResponse {
    let author_username = std::mem::take(&mut row.author_username);
    MessageResponse {
        message: row.into(),
        author_username,
    }
}

pub fn create_message<R: MessageRepo>(
    repo: &R,
    identity: Identity,
    text: &str,
) -> Result<MessageResponse, ApiError> {
    let author = identity.require()?;

    let len = text.chars().count();
    if len == 0 || len > MAX_MESSAGE_LEN {
        return Err(ApiError::Validation(format!(
            "Message text must be 1 to {MAX_MESSAGE_LEN} characters."
        )));
    }

    let row = repo.insert_message(author, text, Utc::now())?;
    Ok(message_response(row))
}

/// A single message and the users who liked it. Readable without logging in.
pub fn show_message<R>(repo: &R, message_id: i64) -> Result<MessageDetailResponse, ApiError>
where
    R: MessageRepo + LikesRepo,
{
    let row = repo.message_by_id(message_id)?.ok_or(ApiError::NotFound)?;
    let liked_by = repo.liked_by(message_id)?.into_iter().map(User::from).collect();

    Ok(MessageDetailResponse {
        message: message_response(row),
        liked_by,
    })
}

/// Only the author may delete. Anything else leaves the message in place.
pub fn delete_message<R: MessageRepo>(
    repo: &R,
    identity: Identity,
    message_id: i64,
) -> Result<(), ApiError> {
    identity.require()?;
    let row = repo.message_by_id(message_id)?.ok_or(ApiError::NotFound)?;
    identity.require_owner(row.user_id)?;

    if !repo.delete_message(message_id)? {
        return Err(ApiError::NotFound);
    }
    info!("Message {} deleted by user {}", message_id, row.user_id);
    Ok(())
}

/// The caller's own messages plus those of everyone they follow.
pub fn timeline<R: MessageRepo>(repo: &R, identity: Identity) -> Result<Vec<MessageResponse>, ApiError> {
    let viewer = identity.require()?;
    let rows = repo.timeline(viewer, TIMELINE_LIMIT)?;
    Ok(rows.into_iter().map(message_response).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use warbler_db::models::NewUser;
    use warbler_db::{Database, UserRepo};

    fn seed(db: &Database, username: &str) -> i64 {
        let email = format!("{username}@test.com");
        db.insert_user(&NewUser {
            username: Some(username),
            email: Some(&email),
            password_hash: "HASHED_PASSWORD",
            image_url: "/static/images/default-pic.png",
        })
        .unwrap()
        .id
    }

    #[test]
    fn create_message_requires_login() {
        let db = Database::open_in_memory().unwrap();
        let me = seed(&db, "testuser");

        assert!(matches!(
            create_message(&db, Identity::Anonymous, "Hello"),
            Err(ApiError::Unauthorized)
        ));

        let msg = create_message(&db, Identity::Authenticated(me), "Hello").unwrap();
        assert_eq!(msg.message.text, "Hello");
        assert_eq!(msg.message.user_id, me);
        assert_eq!(msg.author_username, "testuser");
    }

    #[test]
    fn create_message_checks_length() {
        let db = Database::open_in_memory().unwrap();
        let me = Identity::Authenticated(seed(&db, "testuser"));

        assert!(matches!(create_message(&db, me, ""), Err(ApiError::Validation(_))));
        assert!(matches!(
            create_message(&db, me, &"a".repeat(141)),
            Err(ApiError::Validation(_))
        ));
        assert!(create_message(&db, me, &"é".repeat(140)).is_ok());
    }

    #[test]
    fn only_author_can_delete() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed(&db, "alice");
        let bob = seed(&db, "bob");
        let msg = create_message(&db, Identity::Authenticated(alice), "hi").unwrap();

        assert!(matches!(
            delete_message(&db, Identity::Anonymous, msg.message.id),
            Err(ApiError::Unauthorized)
        ));
        assert!(show_message(&db, msg.message.id).is_ok());

        assert!(matches!(
            delete_message(&db, Identity::Authenticated(bob), msg.message.id),
            Err(ApiError::Unauthorized)
        ));
        assert_eq!(show_message(&db, msg.message.id).unwrap().message.message.text, "hi");

        delete_message(&db, Identity::Authenticated(alice), msg.message.id).unwrap();
        assert!(matches!(show_message(&db, msg.message.id), Err(ApiError::NotFound)));
        assert!(matches!(
            delete_message(&db, Identity::Authenticated(alice), msg.message.id),
            Err(ApiError::NotFound)
        ));
    }

    #[test]
    fn anonymous_delete_of_missing_message_is_unauthorized() {
        let db = Database::open_in_memory().unwrap();

        assert!(matches!(
            delete_message(&db, Identity::Anonymous, 999),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn timeline_requires_login() {
        let db = Database::open_in_memory().unwrap();
        let me = seed(&db, "testuser");
        create_message(&db, Identity::Authenticated(me), "mine").unwrap();

        assert!(matches!(timeline(&db, Identity::Anonymous), Err(ApiError::Unauthorized)));
        assert_eq!(timeline(&db, Identity::Authenticated(me)).unwrap().len(), 1);
    }
}
