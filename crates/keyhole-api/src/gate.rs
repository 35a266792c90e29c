//! The first-contact access gate. A conversation's very first message
//! must prove knowledge of the receiver's private key; once any message
//! exists between the pair, the gate never runs again.

use keyhole_db::models::UserRow;

use crate::error::ApiError;

pub const INVALID_KEY_MESSAGE: &str =
    "Invalid private key. You need the correct private key to start a conversation with this user.";

/// Exact, case-sensitive comparison after trimming surrounding
/// whitespace on both sides.
pub fn keys_match(stored: &str, candidate: &str) -> bool {
    stored.trim() == candidate.trim()
}

/// Authorize a message from a sender to `receiver`.
///
/// Pure check: no key mutation, no attempt counting. Rejections carry
/// `requiresKey` so the client knows to prompt for the key.
pub fn check_first_contact(
    receiver: &UserRow,
    prior_exists: bool,
    candidate_key: Option<&str>,
) -> Result<(), ApiError> {
    // Established conversations never require the key again.
    if prior_exists {
        return Ok(());
    }

    // Receivers still on their auto-generated default are open to anyone.
    if !receiver.private_key_set {
        return Ok(());
    }

    match candidate_key {
        Some(candidate) if keys_match(&receiver.private_key, candidate) => Ok(()),
        _ => Err(ApiError::requires_key(INVALID_KEY_MESSAGE)),
    }
}
