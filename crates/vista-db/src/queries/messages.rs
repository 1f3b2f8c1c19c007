use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use tracing::debug;
use vista_types::api::MessageView;
use vista_types::models::NotificationKind;

use super::{OptionalExt, ensure_user, insert_notification, user_ref_at};
use crate::models::NewNotification;
use crate::time::{parse_timestamp, time_ago};
use crate::{Database, DbError, Result};

const MESSAGE_SELECT: &str = "SELECT m.id, m.sender_id, m.receiver_id, m.text, m.image_url, m.is_read, m.created_at,
        u.id, u.username, u.name, u.avatar, u.is_verified
    FROM messages m JOIN users u ON u.id = m.sender_id";

impl Database {
    /// Send a direct message and notify the receiver.
    pub fn send_message(
        &self,
        sender_id: i64,
        receiver_id: i64,
        text: &str,
        image_url: Option<&str>,
    ) -> Result<MessageView> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DbError::Validation("Message text is required".into()));
        }
        if sender_id == receiver_id {
            return Err(DbError::Validation("Cannot message yourself".into()));
        }

        self.with_tx(|tx| {
            ensure_user(tx, sender_id)?;
            ensure_user(tx, receiver_id)?;

            tx.execute(
                "INSERT INTO messages (sender_id, receiver_id, text, image_url) VALUES (?1, ?2, ?3, ?4)",
                params![sender_id, receiver_id, text, image_url],
            )?;
            let id = tx.last_insert_rowid();

            insert_notification(
                tx,
                &NewNotification {
                    user_id: receiver_id,
                    actor_id: Some(sender_id),
                    kind: NotificationKind::Message,
                    post_id: None,
                    comment_id: None,
                    text: Some(text),
                },
            )?;

            debug!("Message {} from {} to {}", id, sender_id, receiver_id);
            query_message(tx, id, sender_id)?.ok_or(DbError::NotFound("message"))
        })
    }

    /// Both directions of the conversation between two users, newest first.
    pub fn get_messages(&self, user_id: i64, other_user_id: i64) -> Result<Vec<MessageView>> {
        self.with_conn(|conn| {
            let now = Utc::now();
            let sql = format!(
                "{MESSAGE_SELECT}
                 WHERE (m.sender_id = ?1 AND m.receiver_id = ?2) OR (m.sender_id = ?2 AND m.receiver_id = ?1)
                 ORDER BY m.created_at DESC, m.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![user_id, other_user_id], |row| {
                    message_from_row(row, user_id, now)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Mark messages `other_user_id` sent to `user_id` read.
    pub fn mark_conversation_read(&self, user_id: i64, other_user_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE messages SET is_read = 1
                 WHERE receiver_id = ?1 AND sender_id = ?2 AND is_read = 0",
                params![user_id, other_user_id],
            )?;
            Ok(updated)
        })
    }
}

fn query_message(conn: &Connection, id: i64, requester: i64) -> Result<Option<MessageView>> {
    let now = Utc::now();
    let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1");
    let mut stmt = conn.prepare(&sql)?;

    let message = stmt
        .query_row([id], |row| message_from_row(row, requester, now))
        .optional()?;

    Ok(message)
}

fn message_from_row(
    row: &Row<'_>,
    requester: i64,
    now: DateTime<Utc>,
) -> rusqlite::Result<MessageView> {
    let sender_id: i64 = row.get(1)?;
    let created_at = parse_timestamp(&row.get::<_, String>(6)?);

    Ok(MessageView {
        id: row.get(0)?,
        sender: user_ref_at(row, 7)?,
        sender_id,
        receiver_id: row.get(2)?,
        text: row.get(3)?,
        image_url: row.get(4)?,
        is_read: row.get(5)?,
        is_mine: sender_id == requester,
        time_ago: time_ago(created_at, now),
        created_at,
    })
}
