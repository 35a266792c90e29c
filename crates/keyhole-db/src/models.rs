/// Database row types that map directly to SQLite rows.
/// Distinct from keyhole-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub profile_pic: String,
    pub private_key: String,
    pub private_key_set: bool,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    /// JSON-encoded array of hosted image URLs
    pub images: String,
    pub created_at: String,
}
