use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use vista_types::api::{ActorRequest, CreateStoryRequest, ViewerQuery};

use crate::error::{ApiJson, ApiPath, ApiQuery};
use crate::{ApiError, AppState, blocking};

pub async fn list_stories(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<ViewerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let stories = blocking(&state, move |db| db.get_stories(q.user_id)).await?;
    Ok(Json(stories))
}

pub async fn create_story(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateStoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let story = blocking(&state, move |db| db.create_story(req.user_id, &req.image, req.is_live)).await?;
    Ok((StatusCode::CREATED, Json(story)))
}

pub async fn view_story(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ActorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let seen = blocking(&state, move |db| db.view_story(id, req.user_id)).await?;
    Ok(Json(seen))
}

pub async fn story_viewers(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let viewers = blocking(&state, move |db| db.get_story_viewers(id)).await?;
    Ok(Json(viewers))
}
