use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use vista_types::api::{ActorRequest, CreateCommentRequest, ViewerQuery};

use crate::error::{ApiJson, ApiPath, ApiQuery};
use crate::{ApiError, AppState, blocking, success};

pub async fn list_comments(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<i64>,
    ApiQuery(q): ApiQuery<ViewerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let comments = blocking(&state, move |db| db.get_comments(post_id, q.user_id)).await?;
    Ok(Json(comments))
}

pub async fn create_comment(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<i64>,
    ApiJson(req): ApiJson<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = blocking(&state, move |db| db.create_comment(post_id, req.user_id, &req.text)).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ActorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(&state, move |db| db.delete_comment(id, req.user_id)).await?;
    Ok(success())
}

pub async fn toggle_like(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ActorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let toggle = blocking(&state, move |db| db.toggle_comment_like(id, req.user_id)).await?;
    Ok(Json(toggle))
}
