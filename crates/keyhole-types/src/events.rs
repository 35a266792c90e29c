use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ChatMessage;

/// Events sent over the WebSocket gateway. Best-effort only: an event
/// whose target has no live connection is dropped, never queued.
/// Durable history always lives in the message store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
#[serde(rename_all_fields = "camelCase")]
pub enum GatewayEvent {
    /// Server confirms a successful identify handshake
    Ready { user_id: Uuid },

    /// Full list of currently-online user ids, sent to every client
    /// whenever anyone connects or disconnects
    #[serde(rename = "getOnlineUsers")]
    OnlineUsers(Vec<Uuid>),

    /// A message was created; delivered to the receiver only
    NewMessage(ChatMessage),

    /// A message was deleted; delivered to the conversation's other party
    MessageDeleted(Uuid),

    /// A whole conversation was deleted; the payload is the deleter's id,
    /// delivered to the other party
    ConversationDeleted(Uuid),

    /// Download-coordination payload relayed verbatim between clients
    ImageDownload(serde_json::Value),
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Ask the server to relay a download-coordination payload to the
    /// connection named by the payload's `recipientId` field
    DownloadImage(serde_json::Value),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_users_uses_wire_name() {
        let event = GatewayEvent::OnlineUsers(vec![]);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"getOnlineUsers\""), "got: {json}");
    }

    #[test]
    fn commands_round_trip() {
        let raw = r#"{"type":"downloadImage","data":{"recipientId":"8e7f0cf4-9dd0-4ec5-a55f-9e660b2ad71c","fileName":"a.png"}}"#;
        let cmd: GatewayCommand = serde_json::from_str(raw).unwrap();
        match cmd {
            GatewayCommand::DownloadImage(data) => {
                assert_eq!(data["fileName"], "a.png");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
