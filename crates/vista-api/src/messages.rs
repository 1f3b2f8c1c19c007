use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use vista_types::api::{ConversationQuery, ConversationRequest, SendMessageRequest, UpdatedCount};

use crate::error::{ApiJson, ApiQuery};
use crate::{ApiError, AppState, blocking};

/// `?userId=&otherUserId=`: both directions, newest first.
pub async fn conversation(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<ConversationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = blocking(&state, move |db| db.get_messages(q.user_id, q.other_user_id)).await?;
    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = blocking(&state, move |db| {
        db.send_message(req.sender_id, req.receiver_id, &req.text, req.image_url.as_deref())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = blocking(&state, move |db| {
        db.mark_conversation_read(req.user_id, req.other_user_id)
    })
    .await?;
    Ok(Json(UpdatedCount { updated }))
}
