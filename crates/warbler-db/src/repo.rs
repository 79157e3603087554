//! Repository seams over the store. `Database` implements all of them;
//! callers name only the ones they need.

use chrono::{DateTime, Utc};

use crate::Result;
use crate::models::{LikeRow, MessageRow, NewUser, SessionRow, UserChanges, UserRow};

pub trait UserRepo {
    fn insert_user(&self, new: &NewUser<'_>) -> Result<UserRow>;
    fn user_by_id(&self, id: i64) -> Result<Option<UserRow>>;
    fn user_by_username(&self, username: &str) -> Result<Option<UserRow>>;
    /// All users, or those whose username contains `query` literally (case-sensitive).
    fn search_users(&self, query: Option<&str>) -> Result<Vec<UserRow>>;
    fn update_user(&self, id: i64, changes: &UserChanges<'_>) -> Result<Option<UserRow>>;
    /// Deletes the user and, by cascade, their messages, follows, likes and sessions.
    fn delete_user(&self, id: i64) -> Result<bool>;
}

pub trait MessageRepo {
    fn insert_message(&self, user_id: i64, text: &str, timestamp: DateTime<Utc>) -> Result<MessageRow>;
    fn message_by_id(&self, id: i64) -> Result<Option<MessageRow>>;
    /// Newest first.
    fn messages_by_user(&self, user_id: i64, limit: u32) -> Result<Vec<MessageRow>>;
    /// Messages by `user_id` and everyone they follow, newest first.
    fn timeline(&self, user_id: i64, limit: u32) -> Result<Vec<MessageRow>>;
    /// Deletes the message and, by cascade, its likes.
    fn delete_message(&self, id: i64) -> Result<bool>;
}

pub trait FollowsRepo {
    fn insert_follow(&self, follower_id: i64, followed_id: i64) -> Result<()>;
    fn delete_follow(&self, follower_id: i64, followed_id: i64) -> Result<bool>;
    fn follow_exists(&self, follower_id: i64, followed_id: i64) -> Result<bool>;
    /// Users following `user_id`.
    fn followers(&self, user_id: i64) -> Result<Vec<UserRow>>;
    /// Users `user_id` follows.
    fn following(&self, user_id: i64) -> Result<Vec<UserRow>>;
}

pub trait LikesRepo {
    fn insert_like(&self, user_id: i64, message_id: i64) -> Result<LikeRow>;
    fn delete_like(&self, user_id: i64, message_id: i64) -> Result<bool>;
    /// Removes the like if present, inserts it otherwise. Returns true when inserted.
    fn toggle_like(&self, user_id: i64, message_id: i64) -> Result<bool>;
    /// Users who liked `message_id`.
    fn liked_by(&self, message_id: i64) -> Result<Vec<UserRow>>;
    /// Messages `user_id` liked, newest first.
    fn liked_messages(&self, user_id: i64) -> Result<Vec<MessageRow>>;
}

pub trait SessionRepo {
    fn insert_session(&self, session: &SessionRow) -> Result<()>;
    /// The session, if it exists and has not expired at `now`.
    fn active_session(&self, id: &str, now: DateTime<Utc>) -> Result<Option<SessionRow>>;
    fn delete_session(&self, id: &str) -> Result<bool>;
}
