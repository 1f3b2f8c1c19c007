use chrono::Utc;
use rusqlite::{Connection, params};
use tracing::{debug, warn};
use vista_types::api::{NotificationView, UserRef};
use vista_types::models::NotificationKind;

use super::{OptionalExt, ensure_user};
use crate::models::NewNotification;
use crate::time::{parse_timestamp, time_ago};
use crate::{Database, DbError, Result};

impl Database {
    /// Notifications addressed to `user_id`, newest first, with the actor's
    /// public fields and the referenced post's image.
    pub fn get_notifications(&self, user_id: i64) -> Result<Vec<NotificationView>> {
        self.with_conn(|conn| {
            let now = Utc::now();
            let mut stmt = conn.prepare(
                "SELECT n.id, n.type, n.post_id, n.comment_id, n.text, n.is_read, n.created_at,
                        a.id, a.username, a.name, a.avatar, a.is_verified,
                        p.image
                 FROM notifications n
                 LEFT JOIN users a ON a.id = n.actor_id
                 LEFT JOIN posts p ON p.id = n.post_id
                 WHERE n.user_id = ?1
                 ORDER BY n.created_at DESC, n.id DESC",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    let id: i64 = row.get(0)?;
                    let raw_kind: String = row.get(1)?;
                    let created_at = parse_timestamp(&row.get::<_, String>(6)?);

                    let actor = match row.get::<_, Option<i64>>(7)? {
                        Some(actor_id) => Some(UserRef {
                            id: actor_id,
                            username: row.get(8)?,
                            name: row.get(9)?,
                            avatar: row.get(10)?,
                            is_verified: row.get(11)?,
                        }),
                        None => None,
                    };

                    // Rows with a kind this build does not know are skipped, not fatal.
                    let kind = match raw_kind.parse::<NotificationKind>() {
                        Ok(kind) => kind,
                        Err(e) => {
                            warn!("Skipping notification {}: {}", id, e);
                            return Ok(None);
                        }
                    };

                    Ok(Some(NotificationView {
                        id,
                        kind,
                        actor,
                        post_id: row.get(2)?,
                        post_image: row.get(12)?,
                        comment_id: row.get(3)?,
                        text: row.get(4)?,
                        is_read: row.get(5)?,
                        time_ago: time_ago(created_at, now),
                        created_at,
                    }))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let views = rows.into_iter().flatten().collect();
            Ok(views)
        })
    }

    pub fn unread_notification_count(&self, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
                [user_id],
                |row| row.get(0),
            )?)
        })
    }

    /// Mark one notification read. Only its recipient may do so.
    pub fn mark_notification_read(&self, id: i64, user_id: i64) -> Result<()> {
        self.with_tx(|tx| {
            let recipient: i64 = tx
                .query_row("SELECT user_id FROM notifications WHERE id = ?1", [id], |row| {
                    row.get(0)
                })
                .optional()?
                .ok_or(DbError::NotFound("notification"))?;

            if recipient != user_id {
                return Err(DbError::Forbidden("Not your notification".into()));
            }

            tx.execute("UPDATE notifications SET is_read = 1 WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Mark every unread notification of `user_id` read; returns how many changed.
    pub fn mark_all_notifications_read(&self, user_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            ensure_user(conn, user_id)?;
            let updated = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
                [user_id],
            )?;
            debug!("Marked {} notifications read for user {}", updated, user_id);
            Ok(updated)
        })
    }
}

pub(crate) fn insert_notification(conn: &Connection, n: &NewNotification<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO notifications (user_id, actor_id, type, post_id, comment_id, text)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            n.user_id,
            n.actor_id,
            n.kind.as_str(),
            n.post_id,
            n.comment_id,
            n.text
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Delete the notification an undone like or follow produced.
pub(crate) fn remove_notification(
    conn: &Connection,
    kind: NotificationKind,
    recipient: i64,
    actor: i64,
    post_id: Option<i64>,
    comment_id: Option<i64>,
) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM notifications
         WHERE type = ?1 AND user_id = ?2 AND actor_id = ?3 AND post_id IS ?4 AND comment_id IS ?5",
        params![kind.as_str(), recipient, actor, post_id, comment_id],
    )?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{db, post, user};

    #[test]
    fn mark_read_checks_recipient() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        db.toggle_user_follow(b, a).unwrap();
        let note = db.get_notifications(a).unwrap().remove(0);
        assert!(!note.is_read);

        assert!(matches!(
            db.mark_notification_read(note.id, b),
            Err(DbError::Forbidden(_))
        ));
        assert!(matches!(
            db.mark_notification_read(9999, a),
            Err(DbError::NotFound("notification"))
        ));

        db.mark_notification_read(note.id, a).unwrap();
        assert!(db.get_notifications(a).unwrap()[0].is_read);
    }

    #[test]
    fn mark_all_read_and_unread_count() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let p = post(&db, a);
        db.toggle_post_like(p, b).unwrap();
        db.create_comment(p, b, "wow").unwrap();

        assert_eq!(db.unread_notification_count(a).unwrap(), 3);
        assert_eq!(db.mark_all_notifications_read(a).unwrap(), 3);
        assert_eq!(db.unread_notification_count(a).unwrap(), 0);
        assert_eq!(db.mark_all_notifications_read(a).unwrap(), 0);
    }

    #[test]
    fn view_carries_post_image() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let p = post(&db, a);
        db.toggle_post_like(p, b).unwrap();

        let like = db
            .get_notifications(a)
            .unwrap()
            .into_iter()
            .find(|n| n.kind == NotificationKind::Like)
            .unwrap();
        assert_eq!(like.post_image.as_deref(), Some("https://img.example/p.jpg"));
        assert_eq!(like.actor.unwrap().username, "bob");
    }

    #[test]
    fn unknown_kind_is_skipped() {
        let db = db();
        let a = user(&db, "alice");
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (user_id, type) VALUES (?1, 'mention')",
                [a],
            )?;
            Ok(())
        })
        .unwrap();

        assert!(db.get_notifications(a).unwrap().is_empty());
    }
}
