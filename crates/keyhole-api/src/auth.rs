use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use keyhole_types::api::{AuthResponse, Claims, LoginRequest, SignupRequest, UpdateProfileRequest};
use keyhole_types::models::{OwnerProfile, UserProfile};

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::users::generate_key;

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    if !req.email.contains('@') {
        return Err(ApiError::Validation("Invalid email format".into()));
    }
    if req.full_name.trim().is_empty() {
        return Err(ApiError::Validation("Full name is required".into()));
    }
    if req.password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }

    let email = req.email.clone();
    let existing = state.with_db(move |db| db.get_user_by_email(&email)).await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Email already in use".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {e}")))?
        .to_string();

    let user_id = Uuid::new_v4();
    // Every account starts with a usable key; the gate stays off until
    // the owner explicitly sets one (private_key_set stays false).
    let private_key = generate_key();
    let created_at = Utc::now();

    let insert_email = req.email.clone();
    let insert_name = req.full_name.clone();
    let insert_key = private_key.clone();
    state
        .with_db(move |db| {
            db.create_user(
                &user_id.to_string(),
                &insert_email,
                &insert_name,
                &password_hash,
                &insert_key,
                &created_at.to_rfc3339(),
            )
        })
        .await?;

    let token = create_token(&state.jwt_secret, user_id, &req.email)?;

    let user = OwnerProfile {
        user: UserProfile {
            id: user_id,
            email: req.email,
            full_name: req.full_name,
            profile_pic: String::new(),
            created_at,
        },
        private_key,
        private_key_set: false,
    };

    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = req.email.clone();
    let user = state
        .with_db(move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash unreadable: {e}")))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id = convert::parse_id(&user.id, "user id");
    let token = create_token(&state.jwt_secret, user_id, &user.email)?;

    Ok(Json(AuthResponse {
        user: convert::owner_profile(user),
        token,
    }))
}

pub async fn check(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<OwnerProfile>> {
    let id = claims.sub.to_string();
    let user = state
        .with_db(move |db| db.get_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(convert::owner_profile(user)))
}

/// Uploads the new picture through the image host and stores the hosted
/// URL on the profile.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<OwnerProfile>> {
    if req.profile_pic.is_empty() {
        return Err(ApiError::Validation("Profile picture is required".into()));
    }

    let host = state
        .images
        .clone()
        .ok_or_else(|| ApiError::Upstream("Image host is not configured".into()))?;

    let hosted_url = host
        .upload(&req.profile_pic)
        .await
        .map_err(|e| ApiError::Upstream(format!("Profile picture upload failed: {e:#}")))?;

    let id = claims.sub.to_string();
    let user = state
        .with_db(move |db| {
            db.update_profile_pic(&id, &hosted_url)?;
            db.get_user_by_id(&id)
        })
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(convert::owner_profile(user)))
}

fn create_token(secret: &str, user_id: Uuid, email: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("token encoding failed: {e}")))
}
