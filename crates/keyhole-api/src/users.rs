use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use keyhole_types::api::{
    Claims, SetPrivateKeyRequest, VerifyPrivateKeyRequest, VerifyPrivateKeyResponse,
};
use keyhole_types::models::{OwnerProfile, UserProfile};

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::gate;
use crate::state::AppState;

/// Keys must hold at least this many characters when set by the owner.
const MIN_KEY_LENGTH: usize = 4;

/// Random 8-character hex token, used for the signup default and for
/// rotation.
pub(crate) fn generate_key() -> String {
    hex::encode(rand::random::<[u8; 4]>())
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub email: Option<String>,
}

pub async fn search_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<UserProfile>>> {
    let term = query
        .email
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("Email query parameter is required".into()))?;

    let me = claims.sub.to_string();
    let users = state
        .with_db(move |db| db.search_users_by_email(&term, &me))
        .await?;

    Ok(Json(users.into_iter().map(convert::user_profile).collect()))
}

pub async fn set_private_key(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetPrivateKeyRequest>,
) -> ApiResult<Json<OwnerProfile>> {
    if req.private_key.len() < MIN_KEY_LENGTH {
        return Err(ApiError::Validation(
            "Private key must be at least 4 characters".into(),
        ));
    }

    store_key(&state, claims.sub, req.private_key).await
}

pub async fn generate_private_key(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<OwnerProfile>> {
    store_key(&state, claims.sub, generate_key()).await
}

/// Persists a new key and returns the owner's refreshed profile. The
/// previous key is simply gone; established conversations are
/// unaffected since the gate only runs on first contact.
async fn store_key(
    state: &AppState,
    user_id: Uuid,
    private_key: String,
) -> ApiResult<Json<OwnerProfile>> {
    let id = user_id.to_string();
    let user = state
        .with_db(move |db| {
            if !db.set_private_key(&id, &private_key)? {
                return Ok(None);
            }
            db.get_user_by_id(&id)
        })
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(convert::owner_profile(user)))
}

/// Pre-validate a key before composing a first message. Same trim and
/// exact-compare rule as the send path; success echoes the canonical
/// stored key so the client can cache it for the send.
pub async fn verify_private_key(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<VerifyPrivateKeyRequest>,
) -> ApiResult<(StatusCode, Json<VerifyPrivateKeyResponse>)> {
    let Some(candidate) = req.private_key.filter(|k| !k.trim().is_empty()) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(VerifyPrivateKeyResponse {
                message: "Private key is required".into(),
                is_valid: false,
                verified_key: None,
            }),
        ));
    };

    let id = user_id.to_string();
    let Some(user) = state.with_db(move |db| db.get_user_by_id(&id)).await? else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(VerifyPrivateKeyResponse {
                message: "User not found".into(),
                is_valid: false,
                verified_key: None,
            }),
        ));
    };

    if gate::keys_match(&user.private_key, &candidate) {
        debug!("{} verified the key for {}", claims.sub, user_id);
        Ok((
            StatusCode::OK,
            Json(VerifyPrivateKeyResponse {
                message: "Private key verified successfully".into(),
                is_valid: true,
                verified_key: Some(user.private_key.trim().to_string()),
            }),
        ))
    } else {
        Ok((
            StatusCode::FORBIDDEN,
            Json(VerifyPrivateKeyResponse {
                message: gate::INVALID_KEY_MESSAGE.into(),
                is_valid: false,
                verified_key: None,
            }),
        ))
    }
}
