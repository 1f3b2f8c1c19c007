use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use tracing::{debug, info};
use vista_types::api::{CommentView, LikeToggle};
use vista_types::models::NotificationKind;

use super::posts::post_owner;
use super::{OptionalExt, ensure_user, insert_notification, remove_notification, user_ref_at};
use crate::models::NewNotification;
use crate::time::{parse_timestamp, time_ago};
use crate::{Database, DbError, Result};

// ?1 is the viewer id.
const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, c.text, c.created_at,
        u.id, u.username, u.name, u.avatar, u.is_verified,
        (SELECT COUNT(*) FROM comment_likes cl WHERE cl.comment_id = c.id),
        EXISTS(SELECT 1 FROM comment_likes cl WHERE cl.comment_id = c.id AND cl.user_id = ?1)
    FROM comments c JOIN users u ON u.id = c.user_id";

impl Database {
    /// Comments on a post, newest first.
    pub fn get_comments(&self, post_id: i64, viewer: Option<i64>) -> Result<Vec<CommentView>> {
        self.with_conn(|conn| {
            post_owner(conn, post_id)?;
            let now = Utc::now();
            let sql = format!("{COMMENT_SELECT} WHERE c.post_id = ?2 ORDER BY c.created_at DESC, c.id DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![viewer, post_id], |row| comment_from_row(row, now))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Add a comment, bump the post's counter and notify the post author
    /// unless they wrote the comment.
    pub fn create_comment(&self, post_id: i64, user_id: i64, text: &str) -> Result<CommentView> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DbError::Validation("Comment text is required".into()));
        }

        self.with_tx(|tx| {
            let owner = post_owner(tx, post_id)?;
            ensure_user(tx, user_id)?;

            tx.execute(
                "INSERT INTO comments (post_id, user_id, text) VALUES (?1, ?2, ?3)",
                params![post_id, user_id, text],
            )?;
            let comment_id = tx.last_insert_rowid();
            tx.execute("UPDATE posts SET comments = comments + 1 WHERE id = ?1", [post_id])?;

            if owner != user_id {
                insert_notification(
                    tx,
                    &NewNotification {
                        user_id: owner,
                        actor_id: Some(user_id),
                        kind: NotificationKind::Comment,
                        post_id: Some(post_id),
                        comment_id: Some(comment_id),
                        text: Some(text),
                    },
                )?;
            }

            info!("User {} commented {} on post {}", user_id, comment_id, post_id);
            query_comment(tx, comment_id, Some(user_id))?.ok_or(DbError::NotFound("comment"))
        })
    }

    /// Delete a comment. Only its author may delete it; the post's counter
    /// drops by one, floored at 0.
    pub fn delete_comment(&self, comment_id: i64, user_id: i64) -> Result<()> {
        self.with_tx(|tx| {
            let (author, post_id) = comment_owner(tx, comment_id)?;
            if author != user_id {
                return Err(DbError::Forbidden("Not authorized to delete this comment".into()));
            }

            tx.execute("DELETE FROM comments WHERE id = ?1", [comment_id])?;
            tx.execute(
                "UPDATE posts SET comments = MAX(comments - 1, 0) WHERE id = ?1",
                [post_id],
            )?;

            info!("User {} deleted comment {}", user_id, comment_id);
            Ok(())
        })
    }

    /// Like or unlike a comment. `likes` is counted from the join table.
    pub fn toggle_comment_like(&self, comment_id: i64, user_id: i64) -> Result<LikeToggle> {
        self.with_tx(|tx| {
            let (author, post_id) = comment_owner(tx, comment_id)?;
            ensure_user(tx, user_id)?;

            let removed = tx.execute(
                "DELETE FROM comment_likes WHERE comment_id = ?1 AND user_id = ?2",
                params![comment_id, user_id],
            )?;

            let is_liked = if removed > 0 {
                remove_notification(
                    tx,
                    NotificationKind::Like,
                    author,
                    user_id,
                    Some(post_id),
                    Some(comment_id),
                )?;
                false
            } else {
                tx.execute(
                    "INSERT INTO comment_likes (comment_id, user_id) VALUES (?1, ?2)",
                    params![comment_id, user_id],
                )?;
                if author != user_id {
                    insert_notification(
                        tx,
                        &NewNotification {
                            user_id: author,
                            actor_id: Some(user_id),
                            kind: NotificationKind::Like,
                            post_id: Some(post_id),
                            comment_id: Some(comment_id),
                            text: Some("liked your comment."),
                        },
                    )?;
                }
                true
            };

            let likes: i64 = tx.query_row(
                "SELECT COUNT(*) FROM comment_likes WHERE comment_id = ?1",
                [comment_id],
                |row| row.get(0),
            )?;

            debug!("User {} like on comment {} -> {}", user_id, comment_id, is_liked);
            Ok(LikeToggle { is_liked, likes })
        })
    }
}

/// (author id, post id) of a comment.
fn comment_owner(conn: &Connection, comment_id: i64) -> Result<(i64, i64)> {
    conn.query_row(
        "SELECT user_id, post_id FROM comments WHERE id = ?1",
        [comment_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?
    .ok_or(DbError::NotFound("comment"))
}

fn query_comment(conn: &Connection, id: i64, viewer: Option<i64>) -> Result<Option<CommentView>> {
    let now = Utc::now();
    let sql = format!("{COMMENT_SELECT} WHERE c.id = ?2");
    let mut stmt = conn.prepare(&sql)?;

    let comment = stmt
        .query_row(params![viewer, id], |row| comment_from_row(row, now))
        .optional()?;

    Ok(comment)
}

fn comment_from_row(row: &Row<'_>, now: DateTime<Utc>) -> rusqlite::Result<CommentView> {
    let created_at = parse_timestamp(&row.get::<_, String>(3)?);

    Ok(CommentView {
        id: row.get(0)?,
        post_id: row.get(1)?,
        text: row.get(2)?,
        user: user_ref_at(row, 4)?,
        likes: row.get(9)?,
        is_liked: row.get(10)?,
        time_ago: time_ago(created_at, now),
        created_at,
    })
}
