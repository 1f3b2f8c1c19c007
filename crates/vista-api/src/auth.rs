use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{error, info};

use vista_db::models::{NewUser, UserRow};
use vista_types::api::{AuthResponse, AuthUser, LoginRequest, RegisterRequest, VerifyRequest, VerifyResponse};
use vista_types::models::Claims;

use crate::error::ApiJson;
use crate::{ApiError, AppState, blocking};

/// bcrypt work factor for stored credentials.
const BCRYPT_COST: u32 = 10;

const TOKEN_TTL_DAYS: i64 = 30;

const MIN_PASSWORD_LEN: usize = 6;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::BadRequest("A valid email is required".into()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let password_hash = hash_password(req.password).await?;
    let avatar = default_avatar(req.name.trim());

    let user = blocking(&state, move |db| {
        db.create_user(&NewUser {
            username: &req.username,
            email: Some(&email),
            password_hash: Some(&password_hash),
            name: &req.name,
            avatar: avatar.as_deref(),
            ..Default::default()
        })
    })
    .await?;

    let token = create_token(&state.jwt_secret, user.id, user.email.as_deref().unwrap_or_default())
        .map_err(|e| {
            error!("Token signing failed: {}", e);
            ApiError::Internal
        })?;

    info!("Registered user {} ({})", user.id, user.username);
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: auth_user(user),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let bad_credentials = || ApiError::Unauthorized("Invalid email or password".into());

    let email = req.email.trim().to_lowercase();
    let user = blocking(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or_else(bad_credentials)?;

    // Profiles created without credentials cannot log in.
    let stored = user.password.clone().ok_or_else(bad_credentials)?;
    let password = req.password;
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &stored))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(|e| {
            error!("Stored hash for user {} unreadable: {}", user.id, e);
            ApiError::Internal
        })?;
    if !valid {
        return Err(bad_credentials());
    }

    let token = create_token(&state.jwt_secret, user.id, user.email.as_deref().unwrap_or_default())
        .map_err(|e| {
            error!("Token signing failed: {}", e);
            ApiError::Internal
        })?;

    Ok(Json(AuthResponse {
        token,
        user: auth_user(user),
    }))
}

pub async fn verify(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = decode_token(&state.jwt_secret, &req.token)?;

    let user = blocking(&state, move |db| db.get_user_row(claims.user_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(VerifyResponse {
        user: auth_user(user),
    }))
}

pub fn create_token(secret: &str, user_id: i64, email: &str) -> jsonwebtoken::errors::Result<String> {
    let claims = Claims {
        user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Fails closed: malformed, expired or wrongly signed tokens are all
/// "Invalid token".
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized("Invalid token".into()))
}

async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Internal
        })
}

fn default_avatar(name: &str) -> Option<String> {
    url::Url::parse_with_params(
        "https://ui-avatars.com/api/",
        &[("name", name), ("background", "C6FF00"), ("color", "000")],
    )
    .ok()
    .map(String::from)
}

fn auth_user(row: UserRow) -> AuthUser {
    AuthUser {
        id: row.id,
        username: row.username,
        email: row.email.unwrap_or_default(),
        name: row.name,
        avatar: row.avatar,
    }
}
