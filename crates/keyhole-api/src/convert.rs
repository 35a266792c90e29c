//! Row-to-API conversions. Rows hold ids and timestamps as text; a
//! corrupt value is logged and replaced with a default rather than
//! failing the whole response.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use keyhole_db::models::{MessageRow, UserRow};
use keyhole_types::models::{ChatMessage, OwnerProfile, UserProfile};

pub(crate) fn parse_id(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

fn parse_timestamp(raw: &str, what: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt {} timestamp '{}': {}", what, raw, e);
        DateTime::default()
    })
}

/// The credential-free projection shown to other users.
pub fn user_profile(row: UserRow) -> UserProfile {
    UserProfile {
        id: parse_id(&row.id, "user id"),
        created_at: parse_timestamp(&row.created_at, "user"),
        email: row.email,
        full_name: row.full_name,
        profile_pic: row.profile_pic,
    }
}

/// The owner's own view, private key included.
pub fn owner_profile(row: UserRow) -> OwnerProfile {
    let private_key = row.private_key.clone();
    let private_key_set = row.private_key_set;
    OwnerProfile {
        user: user_profile(row),
        private_key,
        private_key_set,
    }
}

pub fn chat_message(row: MessageRow) -> ChatMessage {
    let images: Vec<String> = serde_json::from_str(&row.images).unwrap_or_else(|e| {
        warn!("Corrupt images payload on message '{}': {}", row.id, e);
        Vec::new()
    });

    ChatMessage {
        id: parse_id(&row.id, "message id"),
        sender_id: parse_id(&row.sender_id, "sender id"),
        receiver_id: parse_id(&row.receiver_id, "receiver id"),
        created_at: parse_timestamp(&row.created_at, "message"),
        text: row.text,
        images,
    }
}
