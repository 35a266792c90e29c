use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user as seen by *other* users: credential fields (password hash,
/// private key) are never part of this projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub profile_pic: String,
    pub created_at: DateTime<Utc>,
}

/// A user's own view of their account. Carries the private key fields,
/// which only the owner may see. Kept as a distinct type so a key can
/// never leak through the plain `UserProfile` projection by accident.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerProfile {
    #[serde(flatten)]
    pub user: UserProfile,
    pub private_key: String,
    pub private_key_set: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub text: String,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}
