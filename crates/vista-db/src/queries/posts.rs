use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use tracing::{debug, info};
use vista_types::api::{LikeToggle, PostView, SaveToggle};
use vista_types::models::NotificationKind;

use super::{OptionalExt, ensure_user, insert_notification, remove_notification, user_ref_at};
use crate::models::NewNotification;
use crate::time::{parse_timestamp, time_ago};
use crate::{Database, DbError, Result};

// ?1 is the viewer id. A NULL viewer matches no join row, so anonymous
// readers always see isLiked = isSaved = false.
const POST_SELECT: &str = "SELECT p.id, p.image, p.caption, p.location, p.likes, p.comments, p.created_at,
        u.id, u.username, u.name, u.avatar, u.is_verified,
        EXISTS(SELECT 1 FROM post_likes l WHERE l.post_id = p.id AND l.user_id = ?1),
        EXISTS(SELECT 1 FROM saved_posts s WHERE s.post_id = p.id AND s.user_id = ?1)
    FROM posts p JOIN users u ON u.id = p.user_id";

impl Database {
    // -- Reads --

    /// Feed: every post, newest first, annotated for `viewer`.
    pub fn get_posts(&self, viewer: Option<i64>) -> Result<Vec<PostView>> {
        self.with_conn(|conn| {
            let now = Utc::now();
            let sql = format!("{POST_SELECT} ORDER BY p.created_at DESC, p.id DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([viewer], |row| post_from_row(row, now))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_post(&self, id: i64, viewer: Option<i64>) -> Result<Option<PostView>> {
        self.with_conn(|conn| query_post(conn, id, viewer))
    }

    /// Posts authored by `user_id`, newest first.
    pub fn get_user_posts(&self, user_id: i64, viewer: Option<i64>) -> Result<Vec<PostView>> {
        self.with_conn(|conn| {
            ensure_user(conn, user_id)?;
            let now = Utc::now();
            let sql = format!("{POST_SELECT} WHERE p.user_id = ?2 ORDER BY p.created_at DESC, p.id DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![viewer, user_id], |row| post_from_row(row, now))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Posts `user_id` has saved, most recently saved first.
    pub fn get_saved_posts(&self, user_id: i64) -> Result<Vec<PostView>> {
        self.with_conn(|conn| {
            ensure_user(conn, user_id)?;
            let now = Utc::now();
            let sql = format!(
                "{POST_SELECT} JOIN saved_posts sv ON sv.post_id = p.id AND sv.user_id = ?1
                 ORDER BY sv.created_at DESC, sv.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], |row| post_from_row(row, now))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Writes --

    /// Create a post. The author is sent a `new_post` notification about
    /// their own post.
    pub fn create_post(
        &self,
        user_id: i64,
        image: &str,
        caption: Option<&str>,
        location: Option<&str>,
    ) -> Result<PostView> {
        if image.trim().is_empty() {
            return Err(DbError::Validation("Image is required".into()));
        }

        self.with_tx(|tx| {
            ensure_user(tx, user_id)?;
            tx.execute(
                "INSERT INTO posts (user_id, image, caption, location) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, image, caption, location],
            )?;
            let post_id = tx.last_insert_rowid();

            insert_notification(
                tx,
                &NewNotification {
                    user_id,
                    actor_id: Some(user_id),
                    kind: NotificationKind::NewPost,
                    post_id: Some(post_id),
                    comment_id: None,
                    text: Some("Your post has been shared."),
                },
            )?;

            info!("User {} created post {}", user_id, post_id);
            query_post(tx, post_id, Some(user_id))?.ok_or(DbError::NotFound("post"))
        })
    }

    /// Delete a post and, through cascading keys, its comments, likes, saves
    /// and notifications. Only the author may delete.
    pub fn delete_post(&self, post_id: i64, user_id: i64) -> Result<()> {
        self.with_tx(|tx| {
            let owner = post_owner(tx, post_id)?;
            if owner != user_id {
                return Err(DbError::Forbidden("Not authorized to delete this post".into()));
            }

            tx.execute("DELETE FROM posts WHERE id = ?1", [post_id])?;
            info!("User {} deleted post {}", user_id, post_id);
            Ok(())
        })
    }

    /// Like the post if `user_id` has not liked it yet, otherwise unlike.
    /// The `likes` counter moves with the join row and never drops below 0.
    pub fn toggle_post_like(&self, post_id: i64, user_id: i64) -> Result<LikeToggle> {
        self.with_tx(|tx| {
            let owner = post_owner(tx, post_id)?;
            ensure_user(tx, user_id)?;

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
                    params![post_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;

            let is_liked = if let Some(like_id) = existing {
                tx.execute("DELETE FROM post_likes WHERE id = ?1", [like_id])?;
                tx.execute(
                    "UPDATE posts SET likes = MAX(likes - 1, 0) WHERE id = ?1",
                    [post_id],
                )?;
                remove_notification(tx, NotificationKind::Like, owner, user_id, Some(post_id), None)?;
                false
            } else {
                tx.execute(
                    "INSERT INTO post_likes (post_id, user_id) VALUES (?1, ?2)",
                    params![post_id, user_id],
                )?;
                tx.execute("UPDATE posts SET likes = likes + 1 WHERE id = ?1", [post_id])?;
                if owner != user_id {
                    insert_notification(
                        tx,
                        &NewNotification {
                            user_id: owner,
                            actor_id: Some(user_id),
                            kind: NotificationKind::Like,
                            post_id: Some(post_id),
                            comment_id: None,
                            text: Some("liked your post."),
                        },
                    )?;
                }
                true
            };

            let likes: i64 =
                tx.query_row("SELECT likes FROM posts WHERE id = ?1", [post_id], |row| row.get(0))?;

            debug!("User {} like on post {} -> {} ({} likes)", user_id, post_id, is_liked, likes);
            Ok(LikeToggle { is_liked, likes })
        })
    }

    /// Save or unsave a post. Saves are private and notify nobody.
    pub fn toggle_post_save(&self, post_id: i64, user_id: i64) -> Result<SaveToggle> {
        self.with_tx(|tx| {
            post_owner(tx, post_id)?;
            ensure_user(tx, user_id)?;

            let removed = tx.execute(
                "DELETE FROM saved_posts WHERE post_id = ?1 AND user_id = ?2",
                params![post_id, user_id],
            )?;

            let is_saved = if removed > 0 {
                false
            } else {
                tx.execute(
                    "INSERT INTO saved_posts (post_id, user_id) VALUES (?1, ?2)",
                    params![post_id, user_id],
                )?;
                true
            };

            debug!("User {} save on post {} -> {}", user_id, post_id, is_saved);
            Ok(SaveToggle { is_saved })
        })
    }
}

pub(crate) fn post_owner(conn: &Connection, post_id: i64) -> Result<i64> {
    conn.query_row("SELECT user_id FROM posts WHERE id = ?1", [post_id], |row| row.get(0))
        .optional()?
        .ok_or(DbError::NotFound("post"))
}

fn query_post(conn: &Connection, id: i64, viewer: Option<i64>) -> Result<Option<PostView>> {
    let now = Utc::now();
    let sql = format!("{POST_SELECT} WHERE p.id = ?2");
    let mut stmt = conn.prepare(&sql)?;

    let post = stmt
        .query_row(params![viewer, id], |row| post_from_row(row, now))
        .optional()?;

    Ok(post)
}

fn post_from_row(row: &Row<'_>, now: DateTime<Utc>) -> rusqlite::Result<PostView> {
    let created_at = parse_timestamp(&row.get::<_, String>(6)?);

    Ok(PostView {
        id: row.get(0)?,
        image: row.get(1)?,
        caption: row.get(2)?,
        location: row.get(3)?,
        likes: row.get(4)?,
        comments: row.get(5)?,
        user: user_ref_at(row, 7)?,
        is_liked: row.get(12)?,
        is_saved: row.get(13)?,
        time_ago: time_ago(created_at, now),
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{db, post, user};

    fn reject_notifications(db: &Database) {
        db.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER reject_notifications BEFORE INSERT ON notifications
                 BEGIN SELECT RAISE(ABORT, 'notifications unavailable'); END;",
            )?;
            Ok(())
        })
        .unwrap();
    }

    fn count(db: &Database, sql: &str) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row(sql, [], |row| row.get(0))?))
            .unwrap()
    }

    #[test]
    fn failed_notification_rolls_back_like() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let p = post(&db, a);
        reject_notifications(&db);

        assert!(db.toggle_post_like(p, b).is_err());

        let view = db.get_post(p, Some(b)).unwrap().unwrap();
        assert_eq!(view.likes, 0);
        assert!(!view.is_liked);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM post_likes"), 0);
    }

    #[test]
    fn failed_notification_rolls_back_comment() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let p = post(&db, a);
        reject_notifications(&db);

        assert!(db.create_comment(p, b, "lovely").is_err());

        assert_eq!(db.get_post(p, None).unwrap().unwrap().comments, 0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM comments"), 0);
    }

    #[test]
    fn like_scenario_notifies_owner() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let p = post(&db, a);

        let toggled = db.toggle_post_like(p, b).unwrap();
        assert_eq!(toggled, LikeToggle { is_liked: true, likes: 1 });

        let view = db.get_post(p, Some(b)).unwrap().unwrap();
        assert!(view.is_liked);
        assert_eq!(view.likes, 1);

        let likes: Vec<_> = db
            .get_notifications(a)
            .unwrap()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::Like)
            .collect();
        assert_eq!(likes.len(), 1);
        assert_eq!(likes[0].actor.as_ref().unwrap().id, b);
        assert_eq!(likes[0].post_id, Some(p));

        let toggled = db.toggle_post_like(p, b).unwrap();
        assert_eq!(toggled, LikeToggle { is_liked: false, likes: 0 });
        let view = db.get_post(p, Some(b)).unwrap().unwrap();
        assert!(!view.is_liked);
        assert_eq!(view.likes, 0);
    }

    #[test]
    fn liking_own_post_does_not_notify() {
        let db = db();
        let a = user(&db, "alice");
        let p = post(&db, a);

        db.toggle_post_like(p, a).unwrap();
        let notes = db.get_notifications(a).unwrap();
        assert!(notes.iter().all(|n| n.kind != NotificationKind::Like));
    }

    #[test]
    fn likes_counter_never_negative() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let p = post(&db, a);

        // Counter drifted below the join table, e.g. a hand edit.
        db.with_conn(|conn| {
            conn.execute("INSERT INTO post_likes (post_id, user_id) VALUES (?1, ?2)", [p, b])?;
            Ok(())
        })
        .unwrap();

        let toggled = db.toggle_post_like(p, b).unwrap();
        assert!(!toggled.is_liked);
        assert_eq!(toggled.likes, 0);

        for _ in 0..5 {
            let t = db.toggle_post_like(p, b).unwrap();
            assert!(t.likes >= 0);
        }
    }

    #[test]
    fn anonymous_feed_has_no_personal_flags() {
        let db = db();
        let a = user(&db, "alice");
        let p = post(&db, a);
        db.toggle_post_like(p, a).unwrap();
        db.toggle_post_save(p, a).unwrap();

        let feed = db.get_posts(None).unwrap();
        assert_eq!(feed.len(), 1);
        assert!(!feed[0].is_liked);
        assert!(!feed[0].is_saved);
        assert_eq!(feed[0].likes, 1);

        let mine = db.get_posts(Some(a)).unwrap();
        assert!(mine[0].is_liked);
        assert!(mine[0].is_saved);
    }

    #[test]
    fn feed_is_newest_first_with_author() {
        let db = db();
        let a = user(&db, "alice");
        let first = post(&db, a);
        let second = post(&db, a);

        let feed = db.get_posts(None).unwrap();
        let ids: Vec<i64> = feed.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second, first]);
        assert_eq!(feed[0].user.username, "alice");
        assert_eq!(feed[0].time_ago, "Just now");
    }

    #[test]
    fn save_toggle_and_saved_list() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let p1 = post(&db, a);
        let p2 = post(&db, a);

        assert!(db.toggle_post_save(p1, b).unwrap().is_saved);
        assert!(db.toggle_post_save(p2, b).unwrap().is_saved);

        let saved = db.get_saved_posts(b).unwrap();
        let ids: Vec<i64> = saved.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![p2, p1]);
        assert!(saved.iter().all(|p| p.is_saved));

        assert!(!db.toggle_post_save(p1, b).unwrap().is_saved);
        assert_eq!(db.get_saved_posts(b).unwrap().len(), 1);
        assert!(db.get_saved_posts(a).unwrap().is_empty());
    }

    #[test]
    fn create_post_notifies_author_about_own_post() {
        let db = db();
        let a = user(&db, "alice");
        let p = post(&db, a);

        let notes = db.get_notifications(a).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::NewPost);
        assert_eq!(notes[0].post_id, Some(p));
        assert_eq!(notes[0].actor.as_ref().unwrap().id, a);
    }

    #[test]
    fn create_post_requires_image_and_author() {
        let db = db();
        let a = user(&db, "alice");
        assert!(matches!(
            db.create_post(a, "  ", None, None),
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            db.create_post(77, "x.jpg", None, None),
            Err(DbError::NotFound("user"))
        ));
    }

    #[test]
    fn non_owner_delete_changes_nothing() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let p = post(&db, a);
        db.toggle_post_like(p, b).unwrap();

        assert!(matches!(db.delete_post(p, b), Err(DbError::Forbidden(_))));
        let view = db.get_post(p, Some(b)).unwrap().unwrap();
        assert_eq!(view.likes, 1);
        assert!(view.is_liked);
    }

    #[test]
    fn owner_delete_cascades() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let p = post(&db, a);
        db.toggle_post_like(p, b).unwrap();
        db.create_comment(p, b, "nice").unwrap();

        db.delete_post(p, a).unwrap();
        assert!(db.get_post(p, None).unwrap().is_none());
        assert!(db.get_notifications(a).unwrap().is_empty());

        let leftover: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT (SELECT COUNT(*) FROM post_likes) + (SELECT COUNT(*) FROM comments)",
                    [],
                    |r| r.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(leftover, 0);

        assert!(matches!(db.delete_post(p, a), Err(DbError::NotFound("post"))));
    }

    #[test]
    fn toggles_on_missing_post_are_not_found() {
        let db = db();
        let a = user(&db, "alice");
        assert!(matches!(db.toggle_post_like(5, a), Err(DbError::NotFound("post"))));
        assert!(matches!(db.toggle_post_save(5, a), Err(DbError::NotFound("post"))));
    }
}
