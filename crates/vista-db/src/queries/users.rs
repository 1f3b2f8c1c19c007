use rusqlite::{Connection, Row, params};
use tracing::{debug, info};
use vista_types::api::{FollowToggle, UpdateProfileRequest, UserProfile, UserSummary};
use vista_types::models::NotificationKind;

use super::{OptionalExt, ensure_user, insert_notification, remove_notification};
use crate::models::{NewNotification, NewUser, UserRow};
use crate::time::parse_timestamp;
use crate::{Database, DbError, Result};

// ?1 is the viewer id, NULL for anonymous readers.
const SUMMARY_COLUMNS: &str = "u.id, u.username, u.name, u.avatar, u.bio, u.location, u.is_verified,
    EXISTS(SELECT 1 FROM follows f WHERE f.follower_id = ?1 AND f.following_id = u.id)";

impl Database {
    // -- Reads --

    pub fn get_users(&self, viewer: Option<i64>) -> Result<Vec<UserSummary>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SUMMARY_COLUMNS} FROM users u ORDER BY u.created_at DESC, u.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([viewer], summary_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Profile with post/follower/following counts. `None` if no such user.
    pub fn get_user_by_id(&self, id: i64, viewer: Option<i64>) -> Result<Option<UserProfile>> {
        self.with_conn(|conn| query_profile(conn, id, viewer))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_row(conn, "email", email))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_row(conn, "username", username))
    }

    pub fn get_user_row(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_row(conn, "id", id))
    }

    /// Users following `user_id`, most recent follow first.
    pub fn get_followers(&self, user_id: i64, viewer: Option<i64>) -> Result<Vec<UserSummary>> {
        self.with_conn(|conn| {
            ensure_user(conn, user_id)?;
            let sql = format!(
                "SELECT {SUMMARY_COLUMNS}
                 FROM follows e JOIN users u ON u.id = e.follower_id
                 WHERE e.following_id = ?2
                 ORDER BY e.created_at DESC, e.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![viewer, user_id], summary_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Users `user_id` follows, most recent follow first.
    pub fn get_following(&self, user_id: i64, viewer: Option<i64>) -> Result<Vec<UserSummary>> {
        self.with_conn(|conn| {
            ensure_user(conn, user_id)?;
            let sql = format!(
                "SELECT {SUMMARY_COLUMNS}
                 FROM follows e JOIN users u ON u.id = e.following_id
                 WHERE e.follower_id = ?2
                 ORDER BY e.created_at DESC, e.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![viewer, user_id], summary_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Writes --

    /// Insert a user after checking that the email and username are free.
    /// The UNIQUE constraints still back the check if two writers race.
    pub fn create_user(&self, new: &NewUser<'_>) -> Result<UserRow> {
        let username = new.username.trim();
        let name = new.name.trim();
        if username.is_empty() {
            return Err(DbError::Validation("Username is required".into()));
        }
        if name.is_empty() {
            return Err(DbError::Validation("Name is required".into()));
        }

        self.with_tx(|tx| {
            if let Some(email) = new.email {
                if query_user_row(tx, "email", email)?.is_some() {
                    return Err(DbError::Validation("Email already exists".into()));
                }
            }
            if query_user_row(tx, "username", username)?.is_some() {
                return Err(DbError::Validation("Username already exists".into()));
            }

            tx.execute(
                "INSERT INTO users (username, email, password, name, avatar, bio, location)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    username,
                    new.email,
                    new.password_hash,
                    name,
                    new.avatar,
                    new.bio,
                    new.location
                ],
            )?;
            let id = tx.last_insert_rowid();
            info!("Created user {} ({})", id, username);

            query_user_row(tx, "id", id)?.ok_or(DbError::NotFound("user"))
        })
    }

    /// Apply a profile edit. Only the user themself may edit their profile.
    pub fn update_profile(&self, id: i64, req: &UpdateProfileRequest) -> Result<UserProfile> {
        if req.user_id != id {
            return Err(DbError::Forbidden("You can only edit your own profile".into()));
        }
        if let Some(name) = &req.name {
            if name.trim().is_empty() {
                return Err(DbError::Validation("Name is required".into()));
            }
        }

        self.with_tx(|tx| {
            ensure_user(tx, id)?;
            tx.execute(
                "UPDATE users SET
                    name = COALESCE(?2, name),
                    avatar = COALESCE(?3, avatar),
                    bio = COALESCE(?4, bio),
                    location = COALESCE(?5, location),
                    website = COALESCE(?6, website),
                    is_private = COALESCE(?7, is_private)
                 WHERE id = ?1",
                params![
                    id,
                    req.name.as_deref().map(str::trim),
                    req.avatar,
                    req.bio,
                    req.location,
                    req.website,
                    req.is_private
                ],
            )?;
            debug!("Updated profile of user {}", id);

            query_profile(tx, id, Some(id))?.ok_or(DbError::NotFound("user"))
        })
    }

    /// Follow `target_id` if `follower_id` does not follow them yet, otherwise
    /// unfollow. A new follow notifies the target; unfollowing withdraws it.
    pub fn toggle_user_follow(&self, follower_id: i64, target_id: i64) -> Result<FollowToggle> {
        if follower_id == target_id {
            return Err(DbError::Validation("Cannot follow yourself".into()));
        }

        self.with_tx(|tx| {
            ensure_user(tx, follower_id)?;
            ensure_user(tx, target_id)?;

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM follows WHERE follower_id = ?1 AND following_id = ?2",
                    params![follower_id, target_id],
                    |row| row.get(0),
                )
                .optional()?;

            let is_following = if let Some(edge_id) = existing {
                tx.execute("DELETE FROM follows WHERE id = ?1", [edge_id])?;
                remove_notification(
                    tx,
                    NotificationKind::Follow,
                    target_id,
                    follower_id,
                    None,
                    None,
                )?;
                false
            } else {
                tx.execute(
                    "INSERT INTO follows (follower_id, following_id) VALUES (?1, ?2)",
                    params![follower_id, target_id],
                )?;
                insert_notification(
                    tx,
                    &NewNotification {
                        user_id: target_id,
                        actor_id: Some(follower_id),
                        kind: NotificationKind::Follow,
                        post_id: None,
                        comment_id: None,
                        text: Some("started following you."),
                    },
                )?;
                true
            };

            debug!(
                "User {} {} user {}",
                follower_id,
                if is_following { "followed" } else { "unfollowed" },
                target_id
            );
            Ok(FollowToggle { is_following })
        })
    }
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: row.get(0)?,
        username: row.get(1)?,
        name: row.get(2)?,
        avatar: row.get(3)?,
        bio: row.get(4)?,
        location: row.get(5)?,
        is_verified: row.get(6)?,
        is_following: row.get(7)?,
    })
}

fn query_profile(conn: &Connection, id: i64, viewer: Option<i64>) -> Result<Option<UserProfile>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, u.name, u.avatar, u.bio, u.location, u.website,
                u.is_verified, u.is_private, u.created_at,
                (SELECT COUNT(*) FROM posts p WHERE p.user_id = u.id),
                (SELECT COUNT(*) FROM follows f WHERE f.following_id = u.id),
                (SELECT COUNT(*) FROM follows f WHERE f.follower_id = u.id),
                EXISTS(SELECT 1 FROM follows f WHERE f.follower_id = ?2 AND f.following_id = u.id)
         FROM users u WHERE u.id = ?1",
    )?;

    let profile = stmt
        .query_row(params![id, viewer], |row| {
            Ok(UserProfile {
                id: row.get(0)?,
                username: row.get(1)?,
                name: row.get(2)?,
                avatar: row.get(3)?,
                bio: row.get(4)?,
                location: row.get(5)?,
                website: row.get(6)?,
                is_verified: row.get(7)?,
                is_private: row.get(8)?,
                created_at: parse_timestamp(&row.get::<_, String>(9)?),
                posts: row.get(10)?,
                followers: row.get(11)?,
                following: row.get(12)?,
                is_following: row.get(13)?,
            })
        })
        .optional()?;

    Ok(profile)
}

/// `column` is one of the fixed identifiers above, never caller input.
fn query_user_row<V: rusqlite::ToSql>(
    conn: &Connection,
    column: &'static str,
    value: V,
) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, email, password, name, avatar, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                name: row.get(4)?,
                avatar: row.get(5)?,
                created_at: row.get(6)?,
            })
        })
        .optional()?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{db, user};

    #[test]
    fn follow_toggle_round_trip() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");

        assert!(db.toggle_user_follow(a, b).unwrap().is_following);
        let profile = db.get_user_by_id(b, Some(a)).unwrap().unwrap();
        assert!(profile.is_following);
        assert_eq!(profile.followers, 1);

        let follower_view = db.get_user_by_id(a, Some(b)).unwrap().unwrap();
        assert_eq!(follower_view.following, 1);
        assert!(!follower_view.is_following);

        assert!(!db.toggle_user_follow(a, b).unwrap().is_following);
        let profile = db.get_user_by_id(b, Some(a)).unwrap().unwrap();
        assert!(!profile.is_following);
        assert_eq!(profile.followers, 0);
        assert!(db.get_notifications(b).unwrap().is_empty());
    }

    #[test]
    fn follow_notifies_target() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");

        db.toggle_user_follow(a, b).unwrap();
        let notes = db.get_notifications(b).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::Follow);
        assert_eq!(notes[0].actor.as_ref().unwrap().id, a);
    }

    #[test]
    fn self_follow_fails_and_changes_nothing() {
        let db = db();
        let a = user(&db, "alice");

        let err = db.toggle_user_follow(a, a).unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        let profile = db.get_user_by_id(a, Some(a)).unwrap().unwrap();
        assert_eq!(profile.followers, 0);
        assert_eq!(profile.following, 0);
        assert!(db.get_notifications(a).unwrap().is_empty());
    }

    #[test]
    fn follow_unknown_user_is_not_found() {
        let db = db();
        let a = user(&db, "alice");
        assert!(matches!(
            db.toggle_user_follow(a, 999),
            Err(DbError::NotFound("user"))
        ));
    }

    #[test]
    fn users_list_marks_followed_only_for_viewer() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let c = user(&db, "carol");
        db.toggle_user_follow(a, b).unwrap();

        let as_a = db.get_users(Some(a)).unwrap();
        assert_eq!(as_a.len(), 3);
        for u in &as_a {
            assert_eq!(u.is_following, u.id == b, "user {}", u.username);
        }

        let anon = db.get_users(None).unwrap();
        assert!(anon.iter().all(|u| !u.is_following));

        let as_c = db.get_users(Some(c)).unwrap();
        assert!(as_c.iter().all(|u| !u.is_following));
    }

    #[test]
    fn followers_and_following_lists() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let c = user(&db, "carol");
        db.toggle_user_follow(a, c).unwrap();
        db.toggle_user_follow(b, c).unwrap();
        db.toggle_user_follow(c, a).unwrap();

        let followers = db.get_followers(c, Some(c)).unwrap();
        let ids: Vec<i64> = followers.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![b, a]);
        // c follows a back but not b
        assert!(followers.iter().find(|u| u.id == a).unwrap().is_following);
        assert!(!followers.iter().find(|u| u.id == b).unwrap().is_following);

        let following = db.get_following(c, None).unwrap();
        assert_eq!(following.len(), 1);
        assert_eq!(following[0].id, a);

        assert!(matches!(
            db.get_followers(404, None),
            Err(DbError::NotFound("user"))
        ));
    }

    #[test]
    fn missing_profile_is_none() {
        let db = db();
        assert!(db.get_user_by_id(42, None).unwrap().is_none());
    }

    #[test]
    fn duplicate_email_and_username_rejected() {
        let db = db();
        db.create_user(&NewUser {
            username: "alice",
            email: Some("alice@example.com"),
            name: "Alice",
            ..Default::default()
        })
        .unwrap();

        let dup_email = db.create_user(&NewUser {
            username: "alice2",
            email: Some("alice@example.com"),
            name: "Alice",
            ..Default::default()
        });
        match dup_email {
            Err(DbError::Validation(msg)) => assert_eq!(msg, "Email already exists"),
            other => panic!("expected validation error, got {:?}", other.map(|u| u.id)),
        }

        let dup_name = db.create_user(&NewUser {
            username: "alice",
            name: "Other",
            ..Default::default()
        });
        assert!(matches!(dup_name, Err(DbError::Validation(_))));

        assert_eq!(db.get_users(None).unwrap().len(), 1);
    }

    #[test]
    fn profile_counts_posts() {
        let db = db();
        let a = user(&db, "alice");
        crate::queries::test_support::post(&db, a);
        crate::queries::test_support::post(&db, a);

        assert_eq!(db.get_user_by_id(a, None).unwrap().unwrap().posts, 2);
    }

    #[test]
    fn profile_edit_only_by_owner() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");

        let req = UpdateProfileRequest {
            user_id: b,
            bio: Some("hijacked".into()),
            ..Default::default()
        };
        assert!(matches!(db.update_profile(a, &req), Err(DbError::Forbidden(_))));

        let req = UpdateProfileRequest {
            user_id: a,
            bio: Some("Photographer".into()),
            website: Some("https://alice.example".into()),
            is_private: Some(true),
            ..Default::default()
        };
        let profile = db.update_profile(a, &req).unwrap();
        assert_eq!(profile.bio.as_deref(), Some("Photographer"));
        assert_eq!(profile.name, "alice");
        assert!(profile.is_private);
    }
}
