use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, Row, params};
use tracing::{debug, info};
use vista_types::api::{StorySeen, StoryView, StoryViewer};

use super::{OptionalExt, ensure_user, user_ref_at};
use crate::time::{format_timestamp, parse_timestamp, time_ago};
use crate::{Database, DbError, Result};

/// Stories disappear this long after they are posted.
pub const STORY_TTL_HOURS: i64 = 24;

// ?1 is the viewer id, ?2 the current time. Expired stories never match.
const STORY_SELECT: &str = "SELECT s.id, s.image, s.is_live, s.created_at, s.expires_at,
        u.id, u.username, u.name, u.avatar, u.is_verified,
        EXISTS(SELECT 1 FROM story_views v WHERE v.story_id = s.id AND v.viewer_id = ?1)
    FROM stories s JOIN users u ON u.id = s.user_id
    WHERE s.expires_at > ?2";

impl Database {
    /// Live (unexpired) stories, newest first. `isSeen` and `isYourStory`
    /// are relative to `viewer`.
    pub fn get_stories(&self, viewer: Option<i64>) -> Result<Vec<StoryView>> {
        self.with_conn(|conn| {
            let now = Utc::now();
            let sql = format!("{STORY_SELECT} ORDER BY s.created_at DESC, s.id DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![viewer, format_timestamp(now)], |row| {
                    story_from_row(row, viewer, now)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn create_story(&self, user_id: i64, image: &str, is_live: bool) -> Result<StoryView> {
        if image.trim().is_empty() {
            return Err(DbError::Validation("Image is required".into()));
        }

        self.with_tx(|tx| {
            ensure_user(tx, user_id)?;
            let expires_at = Utc::now() + Duration::hours(STORY_TTL_HOURS);
            let id = insert_story(tx, user_id, image, is_live, expires_at)?;
            info!("User {} posted story {}", user_id, id);

            query_story(tx, id, Some(user_id))?.ok_or(DbError::NotFound("story"))
        })
    }

    /// Record that `viewer_id` saw the story. Repeat views and the author's
    /// own views leave no extra rows.
    pub fn view_story(&self, story_id: i64, viewer_id: i64) -> Result<StorySeen> {
        self.with_tx(|tx| {
            let author = live_story_author(tx, story_id)?;
            ensure_user(tx, viewer_id)?;

            if author != viewer_id {
                tx.execute(
                    "INSERT OR IGNORE INTO story_views (story_id, viewer_id) VALUES (?1, ?2)",
                    params![story_id, viewer_id],
                )?;
            }
            Ok(StorySeen { is_seen: true })
        })
    }

    /// Who has seen a story, most recent view first.
    pub fn get_story_viewers(&self, story_id: i64) -> Result<Vec<StoryViewer>> {
        self.with_conn(|conn| {
            live_story_author(conn, story_id)?;
            let now = Utc::now();
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.name, u.avatar, u.is_verified, v.created_at
                 FROM story_views v JOIN users u ON u.id = v.viewer_id
                 WHERE v.story_id = ?1
                 ORDER BY v.created_at DESC, v.id DESC",
            )?;

            let rows = stmt
                .query_map([story_id], |row| {
                    let viewed_at = parse_timestamp(&row.get::<_, String>(5)?);
                    Ok(StoryViewer {
                        user: user_ref_at(row, 0)?,
                        time_ago: time_ago(viewed_at, now),
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Delete stories past their expiry; returns how many were removed.
    pub fn purge_expired_stories(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM stories WHERE expires_at <= ?1",
                [format_timestamp(Utc::now())],
            )?;
            if removed > 0 {
                debug!("Purged {} expired stories", removed);
            }
            Ok(removed)
        })
    }
}

pub(crate) fn insert_story(
    conn: &Connection,
    user_id: i64,
    image: &str,
    is_live: bool,
    expires_at: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO stories (user_id, image, is_live, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, image, is_live, format_timestamp(expires_at)],
    )?;
    Ok(conn.last_insert_rowid())
}

fn query_story(conn: &Connection, id: i64, viewer: Option<i64>) -> Result<Option<StoryView>> {
    let now = Utc::now();
    let sql = format!("{STORY_SELECT} AND s.id = ?3");
    let mut stmt = conn.prepare(&sql)?;

    let story = stmt
        .query_row(params![viewer, format_timestamp(now), id], |row| {
            story_from_row(row, viewer, now)
        })
        .optional()?;

    Ok(story)
}

fn story_from_row(
    row: &Row<'_>,
    viewer: Option<i64>,
    now: DateTime<Utc>,
) -> rusqlite::Result<StoryView> {
    let created_at = parse_timestamp(&row.get::<_, String>(3)?);
    let user = user_ref_at(row, 5)?;

    Ok(StoryView {
        id: row.get(0)?,
        image: row.get(1)?,
        is_live: row.get(2)?,
        expires_at: parse_timestamp(&row.get::<_, String>(4)?),
        is_seen: row.get(10)?,
        is_your_story: viewer == Some(user.id),
        user,
        time_ago: time_ago(created_at, now),
    })
}

/// Author of a story that has not expired yet.
fn live_story_author(conn: &Connection, story_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT user_id FROM stories WHERE id = ?1 AND expires_at > ?2",
        params![story_id, format_timestamp(Utc::now())],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(DbError::NotFound("story"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{db, user};

    #[test]
    fn stories_flags_for_viewer() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let s = db.create_story(a, "story.jpg", false).unwrap();
        assert!(s.is_your_story);
        assert!(s.expires_at > Utc::now() + Duration::hours(23));

        let before = db.get_stories(Some(b)).unwrap();
        assert_eq!(before.len(), 1);
        assert!(!before[0].is_seen);
        assert!(!before[0].is_your_story);

        assert!(db.view_story(s.id, b).unwrap().is_seen);
        assert!(db.view_story(s.id, b).unwrap().is_seen);
        assert!(db.get_stories(Some(b)).unwrap()[0].is_seen);

        let anon = db.get_stories(None).unwrap();
        assert!(!anon[0].is_seen && !anon[0].is_your_story);
    }

    #[test]
    fn viewers_listed_once_and_author_not_recorded() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let c = user(&db, "carol");
        let s = db.create_story(a, "story.jpg", true).unwrap();

        db.view_story(s.id, a).unwrap();
        db.view_story(s.id, b).unwrap();
        db.view_story(s.id, c).unwrap();
        db.view_story(s.id, b).unwrap();

        let viewers: Vec<i64> = db
            .get_story_viewers(s.id)
            .unwrap()
            .iter()
            .map(|v| v.user.id)
            .collect();
        assert_eq!(viewers, vec![c, b]);
    }

    #[test]
    fn expired_stories_hidden_and_purged() {
        let db = db();
        let a = user(&db, "alice");
        let expired = db
            .with_conn(|conn| insert_story(conn, a, "old.jpg", false, Utc::now() - Duration::hours(1)))
            .unwrap();
        let live = db.create_story(a, "new.jpg", false).unwrap();

        let ids: Vec<i64> = db.get_stories(None).unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![live.id]);
        assert!(matches!(db.view_story(expired, a), Err(DbError::NotFound("story"))));

        assert_eq!(db.purge_expired_stories().unwrap(), 1);
        assert_eq!(db.purge_expired_stories().unwrap(), 0);
        assert_eq!(db.get_stories(None).unwrap().len(), 1);
    }

    #[test]
    fn create_returns_the_inserted_story() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let older = db.create_story(b, "bob.jpg", false).unwrap();

        let mine = db.create_story(a, "alice-live.jpg", true).unwrap();
        assert_ne!(mine.id, older.id);
        assert_eq!(mine.image, "alice-live.jpg");
        assert!(mine.is_live);
        assert_eq!(mine.user.id, a);
        assert!(mine.is_your_story);
        assert!(!mine.is_seen);
        assert_eq!(mine.time_ago, "Just now");
    }

    #[test]
    fn story_requires_image() {
        let db = db();
        let a = user(&db, "alice");
        assert!(matches!(db.create_story(a, "", false), Err(DbError::Validation(_))));
    }
}
