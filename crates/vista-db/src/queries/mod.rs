//! Aggregation (read) and mutation (write) operations over the social graph.
//!
//! Reads build view records in one statement per list, computing viewer
//! relative flags with correlated `EXISTS` sub-selects. Writes that touch more
//! than one table run inside `Database::with_tx`.

mod comments;
mod messages;
mod notifications;
mod posts;
mod stories;
mod users;

pub use stories::STORY_TTL_HOURS;

pub(crate) use notifications::{insert_notification, remove_notification};

use rusqlite::{Connection, Row};
use vista_types::api::UserRef;

use crate::{DbError, Result};

/// Read `id, username, name, avatar, is_verified` of a joined user,
/// starting at column `offset`.
pub(crate) fn user_ref_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<UserRef> {
    Ok(UserRef {
        id: row.get(offset)?,
        username: row.get(offset + 1)?,
        name: row.get(offset + 2)?,
        avatar: row.get(offset + 3)?,
        is_verified: row.get(offset + 4)?,
    })
}

pub(crate) fn ensure_user(conn: &Connection, id: i64) -> Result<()> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM users WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;

    found.map(|_| ()).ok_or(DbError::NotFound("user"))
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
