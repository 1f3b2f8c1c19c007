use axum::{Json, extract::State, response::IntoResponse};

use vista_types::api::{ActorRequest, UnreadCount, UpdatedCount, ViewerQuery};

use crate::error::{ApiJson, ApiPath, ApiQuery};
use crate::{ApiError, AppState, blocking, success};

fn recipient(q: ViewerQuery) -> Result<i64, ApiError> {
    q.user_id
        .ok_or_else(|| ApiError::BadRequest("userId is required".into()))
}

pub async fn list_notifications(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<ViewerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = recipient(q)?;
    let notes = blocking(&state, move |db| db.get_notifications(user_id)).await?;
    Ok(Json(notes))
}

pub async fn unread_count(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<ViewerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = recipient(q)?;
    let count = blocking(&state, move |db| db.unread_notification_count(user_id)).await?;
    Ok(Json(UnreadCount { count }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ActorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(&state, move |db| db.mark_notification_read(id, req.user_id)).await?;
    Ok(success())
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ActorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = blocking(&state, move |db| db.mark_all_notifications_read(req.user_id)).await?;
    Ok(Json(UpdatedCount { updated }))
}
