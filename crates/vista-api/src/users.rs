use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use vista_db::models::NewUser;
use vista_types::api::{CreateUserRequest, FollowRequest, UpdateProfileRequest, ViewerQuery};

use crate::error::{ApiJson, ApiPath, ApiQuery};
use crate::{ApiError, AppState, blocking};

pub async fn list_users(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<ViewerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let users = blocking(&state, move |db| db.get_users(q.user_id)).await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(q): ApiQuery<ViewerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user = blocking(&state, move |db| db.get_user_by_id(id, q.user_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(user))
}

/// Profile without credentials. Such users can be followed and post, but
/// cannot log in.
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = blocking(&state, move |db| {
        let row = db.create_user(&NewUser {
            username: &req.username,
            name: &req.name,
            avatar: req.avatar.as_deref(),
            bio: req.bio.as_deref(),
            location: req.location.as_deref(),
            ..Default::default()
        })?;
        db.get_user_by_id(row.id, None)
    })
    .await?
    .ok_or(ApiError::Internal)?;

    info!("Created profile {} ({})", profile.id, profile.username);
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = blocking(&state, move |db| db.update_profile(id, &req)).await?;
    Ok(Json(profile))
}

pub async fn toggle_follow(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<FollowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let toggle = blocking(&state, move |db| db.toggle_user_follow(req.follower_id, id)).await?;
    Ok(Json(toggle))
}

pub async fn followers(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(q): ApiQuery<ViewerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let users = blocking(&state, move |db| db.get_followers(id, q.user_id)).await?;
    Ok(Json(users))
}

pub async fn following(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(q): ApiQuery<ViewerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let users = blocking(&state, move |db| db.get_following(id, q.user_id)).await?;
    Ok(Json(users))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::test_support::{app, call, create_user};

    #[tokio::test]
    async fn follow_toggle_and_counts() {
        let app = app();
        let a = create_user(&app, "alice").await;
        let b = create_user(&app, "bob").await;

        let uri = format!("/api/users/{}/follow", a);
        let (status, body) = call(&app, Method::POST, &uri, Some(json!({ "followerId": b }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isFollowing"], true);

        let (_, profile) = call(&app, Method::GET, &format!("/api/users/{}?userId={}", a, b), None).await;
        assert_eq!(profile["followers"], 1);
        assert_eq!(profile["following"], 0);
        assert_eq!(profile["isFollowing"], true);

        let (_, followers) = call(&app, Method::GET, &format!("/api/users/{}/followers", a), None).await;
        assert_eq!(followers[0]["id"], b);
        let (_, following) = call(&app, Method::GET, &format!("/api/users/{}/following", b), None).await;
        assert_eq!(following[0]["id"], a);

        let (_, body) = call(&app, Method::POST, &uri, Some(json!({ "followerId": b }))).await;
        assert_eq!(body["isFollowing"], false);
        let (_, profile) = call(&app, Method::GET, &format!("/api/users/{}?userId={}", a, b), None).await;
        assert_eq!(profile["followers"], 0);
        assert_eq!(profile["isFollowing"], false);
    }

    #[tokio::test]
    async fn self_follow_is_bad_request() {
        let app = app();
        let a = create_user(&app, "alice").await;
        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/users/{}/follow", a),
            Some(json!({ "followerId": a })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Cannot follow yourself");
    }

    #[tokio::test]
    async fn list_annotates_following_for_viewer() {
        let app = app();
        let a = create_user(&app, "alice").await;
        let b = create_user(&app, "bob").await;
        call(&app, Method::POST, &format!("/api/users/{}/follow", a), Some(json!({ "followerId": b }))).await;

        let (_, users) = call(&app, Method::GET, &format!("/api/users?userId={}", b), None).await;
        let alice = users.as_array().unwrap().iter().find(|u| u["id"] == a).unwrap();
        assert_eq!(alice["isFollowing"], true);

        let (_, users) = call(&app, Method::GET, "/api/users", None).await;
        assert!(users.as_array().unwrap().iter().all(|u| u["isFollowing"] == false));
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/api/users/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "User not found");

        let (status, _) = call(&app, Method::GET, "/api/users/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn duplicate_username_rejected() {
        let app = app();
        create_user(&app, "alice").await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/users",
            Some(json!({ "username": "alice", "name": "Another" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Username already exists");
    }

    #[tokio::test]
    async fn only_owner_edits_profile() {
        let app = app();
        let a = create_user(&app, "alice").await;
        let b = create_user(&app, "bob").await;
        let uri = format!("/api/users/{}", a);

        let (status, _) = call(&app, Method::PUT, &uri, Some(json!({ "userId": b, "bio": "hacked" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            &app,
            Method::PUT,
            &uri,
            Some(json!({ "userId": a, "bio": "Photographer", "isPrivate": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["bio"], "Photographer");
        assert_eq!(body["isPrivate"], true);
        assert_eq!(body["name"], "alice");
    }
}
