use rusqlite::ErrorCode;
use thiserror::Error;

/// Error kinds surfaced by the data layer. The HTTP layer maps each kind to
/// a status code; nothing downstream inspects the message text.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Rejected input: self-follow, empty text, duplicate username/email.
    #[error("{0}")]
    Validation(String),

    /// The caller does not own the row it tried to change.
    #[error("{0}")]
    Forbidden(String),

    /// A UNIQUE, CHECK or foreign key constraint refused the write.
    #[error("constraint violation: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("database lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<rusqlite::Error> for DbError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(err, msg) if err.code == ErrorCode::ConstraintViolation => {
                DbError::Conflict(msg.unwrap_or_else(|| err.to_string()))
            }
            other => DbError::Sqlite(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn unique_violation_is_conflict() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();

        let err: DbError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, DbError::Conflict(_)), "got {:?}", err);
    }

    #[test]
    fn syntax_error_stays_sqlite() {
        let conn = Connection::open_in_memory().unwrap();
        let err: DbError = conn.execute("NOT SQL", []).unwrap_err().into();
        assert!(matches!(err, DbError::Sqlite(_)));
    }
}
