use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::models::{LikeRow, MessageRow, NewUser, SessionRow, UserChanges, UserRow};
use crate::repo::{FollowsRepo, LikesRepo, MessageRepo, SessionRepo, UserRepo};
use crate::{Database, Result};

const USER_COLUMNS: &str =
    "u.id, u.username, u.email, u.password, u.image_url, u.header_image_url, u.bio, u.location";

// JOIN users so every message carries its author's username (no N+1)
const MESSAGE_SELECT: &str = "SELECT m.id, m.text, m.timestamp, m.user_id, u.username
     FROM messages m
     JOIN users u ON m.user_id = u.id";

// -- Users --

impl UserRepo for Database {
    fn insert_user(&self, new: &NewUser<'_>) -> Result<UserRow> {
        self.with_tx(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password, image_url) VALUES (?1, ?2, ?3, ?4)",
                params![new.username, new.email, new.password_hash, new.image_url],
            )?;
            let id = conn.last_insert_rowid();
            query_user(conn, "u.id = ?1", id)?.ok_or(rusqlite::Error::QueryReturnedNoRows.into())
        })
    }

    fn user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.id = ?1", id))
    }

    fn user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.username = ?1", username))
    }

    fn search_users(&self, query: Option<&str>) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users u
                 WHERE ?1 IS NULL OR instr(u.username, ?1) > 0
                 ORDER BY u.id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([query], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn update_user(&self, id: i64, changes: &UserChanges<'_>) -> Result<Option<UserRow>> {
        self.with_tx(|conn| {
            let updated = conn.execute(
                "UPDATE users SET
                    username = COALESCE(?2, username),
                    email = COALESCE(?3, email),
                    image_url = COALESCE(?4, image_url),
                    header_image_url = COALESCE(?5, header_image_url),
                    bio = COALESCE(?6, bio),
                    location = COALESCE(?7, location)
                 WHERE id = ?1",
                params![
                    id,
                    changes.username,
                    changes.email,
                    changes.image_url,
                    changes.header_image_url,
                    changes.bio,
                    changes.location
                ],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_user(conn, "u.id = ?1", id)
        })
    }

    fn delete_user(&self, id: i64) -> Result<bool> {
        self.with_tx(|conn| Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])? > 0))
    }
}

// -- Messages --

impl MessageRepo for Database {
    fn insert_message(&self, user_id: i64, text: &str, timestamp: DateTime<Utc>) -> Result<MessageRow> {
        self.with_tx(|conn| {
            conn.execute(
                "INSERT INTO messages (text, timestamp, user_id) VALUES (?1, ?2, ?3)",
                params![text, timestamp, user_id],
            )?;
            let id = conn.last_insert_rowid();
            query_message(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows.into())
        })
    }

    fn message_by_id(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    fn messages_by_user(&self, user_id: i64, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                "WHERE m.user_id = ?1 ORDER BY m.timestamp DESC, m.id DESC LIMIT ?2",
                params![user_id, limit],
            )
        })
    }

    fn timeline(&self, user_id: i64, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                "WHERE m.user_id = ?1
                    OR m.user_id IN (SELECT user_being_followed_id FROM follows WHERE user_following_id = ?1)
                 ORDER BY m.timestamp DESC, m.id DESC
                 LIMIT ?2",
                params![user_id, limit],
            )
        })
    }

    fn delete_message(&self, id: i64) -> Result<bool> {
        self.with_tx(|conn| Ok(conn.execute("DELETE FROM messages WHERE id = ?1", [id])? > 0))
    }
}

// -- Follows --

impl FollowsRepo for Database {
    fn insert_follow(&self, follower_id: i64, followed_id: i64) -> Result<()> {
        self.with_tx(|conn| {
            conn.execute(
                "INSERT INTO follows (user_being_followed_id, user_following_id) VALUES (?1, ?2)",
                params![followed_id, follower_id],
            )?;
            Ok(())
        })
    }

    fn delete_follow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        self.with_tx(|conn| {
            let removed = conn.execute(
                "DELETE FROM follows WHERE user_being_followed_id = ?1 AND user_following_id = ?2",
                params![followed_id, follower_id],
            )?;
            Ok(removed > 0)
        })
    }

    fn follow_exists(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM follows WHERE user_being_followed_id = ?1 AND user_following_id = ?2",
                    params![followed_id, follower_id],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    fn followers(&self, user_id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            query_users(
                conn,
                "JOIN follows f ON f.user_following_id = u.id WHERE f.user_being_followed_id = ?1",
                user_id,
            )
        })
    }

    fn following(&self, user_id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            query_users(
                conn,
                "JOIN follows f ON f.user_being_followed_id = u.id WHERE f.user_following_id = ?1",
                user_id,
            )
        })
    }
}

// -- Likes --

impl LikesRepo for Database {
    fn insert_like(&self, user_id: i64, message_id: i64) -> Result<LikeRow> {
        self.with_tx(|conn| {
            conn.execute(
                "INSERT INTO likes (user_id, message_id) VALUES (?1, ?2)",
                params![user_id, message_id],
            )?;
            Ok(LikeRow {
                id: conn.last_insert_rowid(),
                user_id,
                message_id,
            })
        })
    }

    fn delete_like(&self, user_id: i64, message_id: i64) -> Result<bool> {
        self.with_tx(|conn| {
            let removed = conn.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
                params![user_id, message_id],
            )?;
            Ok(removed > 0)
        })
    }

    fn toggle_like(&self, user_id: i64, message_id: i64) -> Result<bool> {
        self.with_tx(|conn| {
            let removed = conn.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
                params![user_id, message_id],
            )?;
            if removed > 0 {
                return Ok(false);
            }

            conn.execute(
                "INSERT INTO likes (user_id, message_id) VALUES (?1, ?2)",
                params![user_id, message_id],
            )?;
            Ok(true)
        })
    }

    fn liked_by(&self, message_id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            query_users(
                conn,
                "JOIN likes l ON l.user_id = u.id WHERE l.message_id = ?1",
                message_id,
            )
        })
    }

    fn liked_messages(&self, user_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                "JOIN likes l ON l.message_id = m.id
                 WHERE l.user_id = ?1
                 ORDER BY m.timestamp DESC, m.id DESC",
                params![user_id],
            )
        })
    }
}

// -- Sessions --

impl SessionRepo for Database {
    fn insert_session(&self, session: &SessionRow) -> Result<()> {
        self.with_tx(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
                params![session.id, session.user_id, session.created_at, session.expires_at],
            )?;
            Ok(())
        })
    }

    fn active_session(&self, id: &str, now: DateTime<Utc>) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(SessionRow {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            created_at: row.get(2)?,
                            expires_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row.filter(|s| s.expires_at > now))
        })
    }

    fn delete_session(&self, id: &str) -> Result<bool> {
        self.with_tx(|conn| Ok(conn.execute("DELETE FROM sessions WHERE id = ?1", [id])? > 0))
    }
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        image_url: row.get(4)?,
        header_image_url: row.get(5)?,
        bio: row.get(6)?,
        location: row.get(7)?,
    })
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        text: row.get(1)?,
        timestamp: row.get(2)?,
        user_id: row.get(3)?,
        author_username: row.get(4)?,
    })
}

fn query_user<P: rusqlite::ToSql>(conn: &Connection, filter: &str, value: P) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE {filter}");
    let row = conn.query_row(&sql, [value], map_user).optional()?;
    Ok(row)
}

fn query_users(conn: &Connection, clause: &str, id: i64) -> Result<Vec<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u {clause} ORDER BY u.id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([id], map_user)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_message(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1");
    let row = conn.query_row(&sql, [id], map_message).optional()?;
    Ok(row)
}

fn query_messages(conn: &Connection, clause: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<MessageRow>> {
    let sql = format!("{MESSAGE_SELECT} {clause}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, map_message)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbError;
    use chrono::Duration;

    fn new_user<'a>(username: &'a str, email: &'a str) -> NewUser<'a> {
        NewUser {
            username: Some(username),
            email: Some(email),
            password_hash: "HASHED_PASSWORD",
            image_url: "/static/images/default-pic.png",
        }
    }

    fn seed_user(db: &Database, username: &str) -> UserRow {
        let email = format!("{username}@test.com");
        db.insert_user(&new_user(username, &email)).unwrap()
    }

    #[test]
    fn new_user_has_no_messages_or_followers() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");

        assert_eq!(u.header_image_url, "/static/images/warbler-hero.jpg");
        assert!(db.messages_by_user(u.id, 100).unwrap().is_empty());
        assert!(db.followers(u.id).unwrap().is_empty());
        assert!(db.following(u.id).unwrap().is_empty());
    }

    #[test]
    fn user_ids_increase_by_one() {
        let db = Database::open_in_memory().unwrap();
        let u1 = seed_user(&db, "testuser");
        let u2 = seed_user(&db, "testuser2");

        assert_eq!(u2.id, u1.id + 1);
    }

    #[test]
    fn duplicate_username_is_integrity_violation_and_keeps_first_row() {
        let db = Database::open_in_memory().unwrap();
        let first = seed_user(&db, "testuser");

        let err = db
            .insert_user(&new_user("testuser", "other@test.com"))
            .unwrap_err();
        assert!(err.is_integrity(), "unexpected error: {err}");

        let stored = db.user_by_username("testuser").unwrap().unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(db.search_users(None).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_email_is_integrity_violation() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "testuser");

        let err = db
            .insert_user(&new_user("testuser2", "testuser@test.com"))
            .unwrap_err();
        assert!(matches!(err, DbError::Integrity(_)));
    }

    #[test]
    fn null_username_or_email_is_integrity_violation() {
        let db = Database::open_in_memory().unwrap();

        let no_username = NewUser {
            username: None,
            ..new_user("", "a@test.com")
        };
        let no_email = NewUser {
            email: None,
            ..new_user("someone", "")
        };

        assert!(db.insert_user(&no_username).unwrap_err().is_integrity());
        assert!(db.insert_user(&no_email).unwrap_err().is_integrity());
        assert!(db.search_users(None).unwrap().is_empty());
    }

    #[test]
    fn search_matches_username_substring() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "alice");
        seed_user(&db, "malice");
        seed_user(&db, "bob");

        let names: Vec<String> = db
            .search_users(Some("lic"))
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["alice", "malice"]);
        assert_eq!(db.search_users(None).unwrap().len(), 3);
    }

    #[test]
    fn search_treats_query_literally_and_case_sensitively() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "alice");
        seed_user(&db, "Bob");
        seed_user(&db, "snake_case");

        let names = |q: &str| -> Vec<String> {
            db.search_users(Some(q))
                .unwrap()
                .into_iter()
                .map(|u| u.username)
                .collect()
        };

        assert_eq!(names("_"), vec!["snake_case"]);
        assert!(names("%").is_empty());
        assert!(names("bob").is_empty());
        assert_eq!(names("Bob"), vec!["Bob"]);
    }

    #[test]
    fn update_user_keeps_unset_fields() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");

        let changes = UserChanges {
            bio: Some("hello"),
            ..Default::default()
        };
        let updated = db.update_user(u.id, &changes).unwrap().unwrap();

        assert_eq!(updated.bio.as_deref(), Some("hello"));
        assert_eq!(updated.username, "testuser");
        assert_eq!(updated.email, u.email);
        assert!(db.update_user(u.id + 100, &changes).unwrap().is_none());
    }

    #[test]
    fn message_belongs_to_owner() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");

        let m = db.insert_message(u.id, "test message", Utc::now()).unwrap();

        assert_eq!(m.user_id, u.id);
        assert_eq!(m.text, "test message");
        assert_eq!(m.author_username, "testuser");
        assert_eq!(db.messages_by_user(u.id, 100).unwrap().len(), 1);
    }

    #[test]
    fn message_for_missing_user_is_integrity_violation() {
        let db = Database::open_in_memory().unwrap();

        let err = db.insert_message(42, "orphan", Utc::now()).unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn overlong_message_is_integrity_violation() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");

        let err = db
            .insert_message(u.id, &"x".repeat(141), Utc::now())
            .unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn messages_are_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");
        let now = Utc::now();

        db.insert_message(u.id, "older", now - Duration::minutes(5)).unwrap();
        db.insert_message(u.id, "newer", now).unwrap();

        let texts: Vec<String> = db
            .messages_by_user(u.id, 100)
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["newer", "older"]);
    }

    #[test]
    fn follows_are_directed() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");
        let u2 = seed_user(&db, "testuser2");

        db.insert_follow(u.id, u2.id).unwrap();

        assert!(db.follow_exists(u.id, u2.id).unwrap());
        assert!(!db.follow_exists(u2.id, u.id).unwrap());
        assert_eq!(db.followers(u2.id).unwrap()[0].id, u.id);
        assert_eq!(db.following(u.id).unwrap()[0].id, u2.id);
        assert!(db.followers(u.id).unwrap().is_empty());
    }

    #[test]
    fn duplicate_and_self_follows_are_rejected() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");
        let u2 = seed_user(&db, "testuser2");

        db.insert_follow(u.id, u2.id).unwrap();
        assert!(db.insert_follow(u.id, u2.id).unwrap_err().is_integrity());
        assert!(db.insert_follow(u.id, u.id).unwrap_err().is_integrity());
        assert_eq!(db.following(u.id).unwrap().len(), 1);
    }

    #[test]
    fn delete_follow_reports_whether_it_existed() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");
        let u2 = seed_user(&db, "testuser2");

        db.insert_follow(u.id, u2.id).unwrap();
        assert!(db.delete_follow(u.id, u2.id).unwrap());
        assert!(!db.delete_follow(u.id, u2.id).unwrap());
        assert!(!db.follow_exists(u.id, u2.id).unwrap());
    }

    #[test]
    fn likes_are_visible_from_both_sides() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");
        let u2 = seed_user(&db, "testuser2");
        let m = db.insert_message(u.id, "test message", Utc::now()).unwrap();

        db.insert_like(u2.id, m.id).unwrap();

        assert_eq!(db.liked_by(m.id).unwrap().len(), 1);
        assert_eq!(db.liked_messages(u2.id).unwrap().len(), 1);
        assert!(db.liked_messages(u.id).unwrap().is_empty());
    }

    #[test]
    fn duplicate_like_is_integrity_violation() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");
        let m = db.insert_message(u.id, "test message", Utc::now()).unwrap();

        db.insert_like(u.id, m.id).unwrap();
        assert!(db.insert_like(u.id, m.id).unwrap_err().is_integrity());
        assert_eq!(db.liked_by(m.id).unwrap().len(), 1);
    }

    #[test]
    fn toggle_like_alternates() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");
        let m = db.insert_message(u.id, "test message", Utc::now()).unwrap();

        assert!(db.toggle_like(u.id, m.id).unwrap());
        assert!(!db.toggle_like(u.id, m.id).unwrap());
        assert!(db.liked_by(m.id).unwrap().is_empty());
        assert!(!db.delete_like(u.id, m.id).unwrap());
    }

    #[test]
    fn deleting_message_removes_its_likes() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");
        let u2 = seed_user(&db, "testuser2");
        let m = db.insert_message(u.id, "test message", Utc::now()).unwrap();
        db.insert_like(u2.id, m.id).unwrap();

        assert!(db.delete_message(m.id).unwrap());

        assert!(db.message_by_id(m.id).unwrap().is_none());
        assert!(db.liked_messages(u2.id).unwrap().is_empty());
        assert!(db.messages_by_user(u.id, 100).unwrap().is_empty());
    }

    #[test]
    fn deleting_user_cascades() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");
        let u2 = seed_user(&db, "testuser2");
        let m = db.insert_message(u.id, "test message", Utc::now()).unwrap();
        let m2 = db.insert_message(u2.id, "other message", Utc::now()).unwrap();
        db.insert_follow(u.id, u2.id).unwrap();
        db.insert_follow(u2.id, u.id).unwrap();
        db.insert_like(u.id, m2.id).unwrap();
        db.insert_like(u2.id, m.id).unwrap();

        assert!(db.delete_user(u.id).unwrap());

        assert!(db.user_by_id(u.id).unwrap().is_none());
        assert!(db.message_by_id(m.id).unwrap().is_none());
        assert!(db.followers(u2.id).unwrap().is_empty());
        assert!(db.following(u2.id).unwrap().is_empty());
        assert!(db.liked_by(m2.id).unwrap().is_empty());
        assert!(db.liked_messages(u2.id).unwrap().is_empty());
        assert!(db.message_by_id(m2.id).unwrap().is_some());
    }

    #[test]
    fn timeline_includes_self_and_followed_only() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");
        let u2 = seed_user(&db, "testuser2");
        let u3 = seed_user(&db, "testuser3");
        db.insert_message(u.id, "mine", Utc::now()).unwrap();
        db.insert_message(u2.id, "followed", Utc::now()).unwrap();
        db.insert_message(u3.id, "stranger", Utc::now()).unwrap();
        db.insert_follow(u.id, u2.id).unwrap();

        let mut texts: Vec<String> = db
            .timeline(u.id, 100)
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        texts.sort();
        assert_eq!(texts, vec!["followed", "mine"]);
    }

    #[test]
    fn sessions_expire_and_can_be_deleted() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");
        let now = Utc::now();

        let live = SessionRow {
            id: "live".into(),
            user_id: u.id,
            created_at: now,
            expires_at: now + Duration::days(1),
        };
        let stale = SessionRow {
            id: "stale".into(),
            expires_at: now - Duration::seconds(1),
            ..live.clone()
        };
        db.insert_session(&live).unwrap();
        db.insert_session(&stale).unwrap();

        assert_eq!(db.active_session("live", now).unwrap().unwrap().user_id, u.id);
        assert!(db.active_session("stale", now).unwrap().is_none());

        assert!(db.delete_session("live").unwrap());
        assert!(db.active_session("live", now).unwrap().is_none());
    }
}
