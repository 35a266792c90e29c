use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use keyhole_types::api::{Claims, ConversationDeleted, SendMessageRequest};
use keyhole_types::events::GatewayEvent;
use keyhole_types::models::{ChatMessage, UserProfile};

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::gate;
use crate::images;
use crate::state::AppState;

/// Sidebar listing: everyone the caller has a conversation with,
/// resolved to the credential-free profile projection.
pub async fn get_sidebar_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<UserProfile>>> {
    let me = claims.sub.to_string();
    let users = state
        .with_db(move |db| {
            let partners = db.conversation_partner_ids(&me)?;
            db.get_users_by_ids(&partners)
        })
        .await?;

    Ok(Json(users.into_iter().map(convert::user_profile).collect()))
}

/// Every message between the caller and the named user, both
/// directions, in insertion order.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let me = claims.sub.to_string();
    let other = id.to_string();
    let rows = state
        .with_db(move |db| db.messages_between(&me, &other))
        .await?;

    Ok(Json(rows.into_iter().map(convert::chat_message).collect()))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let receiver_id = id;
    let sender_id = claims.sub;

    if req.text.trim().is_empty() && req.images.is_empty() {
        return Err(ApiError::Validation(
            "Message must include text or at least one image".into(),
        ));
    }

    let rid = receiver_id.to_string();
    let receiver = state
        .with_db(move |db| db.get_user_by_id(&rid))
        .await?
        .ok_or_else(|| ApiError::NotFound("Receiver not found".into()))?;

    let (sid, rid) = (sender_id.to_string(), receiver_id.to_string());
    let prior_exists = state
        .with_db(move |db| db.has_messages_between(&sid, &rid))
        .await?;

    // The gate only bites on first contact; see crate::gate.
    if let Err(rejection) =
        gate::check_first_contact(&receiver, prior_exists, req.private_key.as_deref())
    {
        debug!("first-contact key check failed for {} -> {}", sender_id, receiver_id);
        return Err(rejection);
    }

    let image_urls = if req.images.is_empty() {
        Vec::new()
    } else {
        let host = state
            .images
            .clone()
            .ok_or_else(|| ApiError::Upstream("Image host is not configured".into()))?;
        images::upload_all(&req.images, |img| {
            let host = host.clone();
            async move { host.upload(&img).await }
        })
        .await?
    };

    let message_id = Uuid::new_v4();
    let created_at = Utc::now();
    let images_json = serde_json::to_string(&image_urls)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("encoding image list: {e}")))?;

    let (mid, sid, rid, text) = (
        message_id.to_string(),
        sender_id.to_string(),
        receiver_id.to_string(),
        req.text.clone(),
    );
    state
        .with_db(move |db| {
            db.insert_message(&mid, &sid, &rid, &text, &images_json, &created_at.to_rfc3339())
        })
        .await?;

    let message = ChatMessage {
        id: message_id,
        sender_id,
        receiver_id,
        text: req.text,
        images: image_urls,
        created_at,
    };

    // Best-effort push to the receiver; the sender has this response.
    state
        .registry
        .send_to_user(receiver_id, GatewayEvent::NewMessage(message.clone()))
        .await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Only the original sender may delete a message. The other party is
/// notified over the gateway, if connected.
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let mid = id.to_string();
    let message = state
        .with_db(move |db| db.get_message(&mid))
        .await?
        .ok_or_else(|| ApiError::NotFound("Message not found".into()))?;

    if message.sender_id != claims.sub.to_string() {
        return Err(ApiError::forbidden("You can only delete your own messages"));
    }

    let mid = id.to_string();
    state.with_db(move |db| db.delete_message(&mid)).await?;

    let receiver_id = convert::parse_id(&message.receiver_id, "receiver id");
    state
        .registry
        .send_to_user(receiver_id, GatewayEvent::MessageDeleted(id))
        .await;

    Ok(Json(json!({ "message": "Message deleted successfully" })))
}

/// Bulk-delete the whole conversation with the named user. Single
/// statement on the store side, so no partial state is ever visible.
pub async fn delete_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<ConversationDeleted>> {
    let (me, other) = (claims.sub.to_string(), user_id.to_string());
    let count = state
        .with_db(move |db| db.delete_conversation(&me, &other))
        .await?;

    state
        .registry
        .send_to_user(user_id, GatewayEvent::ConversationDeleted(claims.sub))
        .await;

    Ok(Json(ConversationDeleted {
        message: "Conversation deleted successfully".into(),
        count,
    }))
}
