pub mod auth;
pub mod comments;
pub mod error;
pub mod messages;
pub mod notifications;
pub mod posts;
pub mod stories;
pub mod users;

use std::sync::Arc;

use axum::{
    Json, Router,
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use tracing::error;

use vista_db::Database;

pub use error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

/// Every REST route, mounted under `/api`, plus `/health`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify", post(auth::verify))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/{id}", get(users::get_user).put(users::update_profile))
        .route("/users/{id}/posts", get(posts::user_posts))
        .route("/users/{id}/follow", post(users::toggle_follow))
        .route("/users/{id}/followers", get(users::followers))
        .route("/users/{id}/following", get(users::following))
        .route("/posts", get(posts::feed).post(posts::create_post))
        .route("/posts/saved", get(posts::saved_posts))
        .route("/posts/{id}", get(posts::get_post).delete(posts::delete_post))
        .route("/posts/{id}/like", post(posts::toggle_like))
        .route("/posts/{id}/save", post(posts::toggle_save))
        .route(
            "/posts/{id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/comments/{id}", delete(comments::delete_comment))
        .route("/comments/{id}/like", post(comments::toggle_like))
        .route("/stories", get(stories::list_stories).post(stories::create_story))
        .route("/stories/{id}/view", post(stories::view_story))
        .route("/stories/{id}/viewers", get(stories::story_viewers))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/messages", get(messages::conversation).post(messages::send_message))
        .route("/messages/read", post(messages::mark_read));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Run a database call on the blocking pool so SQLite work never stalls the
/// async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> vista_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}

/// Success body for deletes and other writes with nothing to return.
pub(crate) fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}
