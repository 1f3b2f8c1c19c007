use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use vista_types::api::{ActorRequest, CreatePostRequest, ViewerQuery};

use crate::error::{ApiJson, ApiPath, ApiQuery};
use crate::{ApiError, AppState, blocking, success};

/// The whole feed, newest first, annotated for `?userId=`.
pub async fn feed(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<ViewerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let posts = blocking(&state, move |db| db.get_posts(q.user_id)).await?;
    Ok(Json(posts))
}

pub async fn get_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(q): ApiQuery<ViewerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let post = blocking(&state, move |db| db.get_post(id, q.user_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".into()))?;
    Ok(Json(post))
}

pub async fn user_posts(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
    ApiQuery(q): ApiQuery<ViewerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let posts = blocking(&state, move |db| db.get_user_posts(user_id, q.user_id)).await?;
    Ok(Json(posts))
}

pub async fn saved_posts(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<ViewerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = q
        .user_id
        .ok_or_else(|| ApiError::BadRequest("userId is required".into()))?;
    let posts = blocking(&state, move |db| db.get_saved_posts(user_id)).await?;
    Ok(Json(posts))
}

pub async fn create_post(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = blocking(&state, move |db| {
        db.create_post(
            req.user_id,
            &req.image,
            req.caption.as_deref(),
            req.location.as_deref(),
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ActorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(&state, move |db| db.delete_post(id, req.user_id)).await?;
    Ok(success())
}

pub async fn toggle_like(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ActorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let toggle = blocking(&state, move |db| db.toggle_post_like(id, req.user_id)).await?;
    Ok(Json(toggle))
}

pub async fn toggle_save(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ActorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let toggle = blocking(&state, move |db| db.toggle_post_save(id, req.user_id)).await?;
    Ok(Json(toggle))
}
