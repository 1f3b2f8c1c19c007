//! Database row types for writes and credential lookups.
//! Read paths build the view records in `vista_types::api` directly.

use vista_types::models::NotificationKind;

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: String,
    pub avatar: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Default)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: Option<&'a str>,
    pub password_hash: Option<&'a str>,
    pub name: &'a str,
    pub avatar: Option<&'a str>,
    pub bio: Option<&'a str>,
    pub location: Option<&'a str>,
}

pub struct NewNotification<'a> {
    pub user_id: i64,
    pub actor_id: Option<i64>,
    pub kind: NotificationKind,
    pub post_id: Option<i64>,
    pub comment_id: Option<i64>,
    pub text: Option<&'a str>,
}
