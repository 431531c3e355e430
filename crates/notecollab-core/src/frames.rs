//! Realtime wire frames.
//!
//! Frames are JSON text messages tagged by `type`:
//!
//! ```text
//! client → server   {"type":"edit","payload":<any>}
//!                   {"type":"flush"}
//! server → client   {"type":"joined","noteId":7,"connectionId":"7:…","permission":"write"}
//!                   {"type":"edit","noteId":7,"payload":<any>,"sequence":1}
//!                   {"type":"error","code":"forbidden","message":"…"}
//! ```
//!
//! Payloads are relayed untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{NoteId, PermissionTier};

/// Close code sent when a join is rejected for missing or invalid evidence.
pub const CLOSE_UNAUTHORIZED: u16 = 4401;
/// Close code sent when the note does not exist (authenticated callers only).
pub const CLOSE_NOT_FOUND: u16 = 4404;
/// Close code sent when a member was evicted for not draining its queue.
pub const CLOSE_SLOW_CONSUMER: u16 = 4408;
/// Close code sent when a peer stopped answering pings.
pub const CLOSE_IDLE_TIMEOUT: u16 = 4409;
/// Close code sent on server shutdown.
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// A frame sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// A new document snapshot to broadcast.
    Edit(EditFrame),
    /// Ask the server to persist the latest edit now.
    Flush,
}

/// Body of an inbound edit frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditFrame {
    /// Opaque document content.
    pub payload: Value,
}

/// A frame sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Sent once after the connection was admitted to the room.
    Joined(JoinedFrame),
    /// An edit published by another member of the room.
    Edit(EditDelivery),
    /// A rejected request on an open connection.
    Error(ErrorFrame),
}

/// Admission details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedFrame {
    pub note_id: NoteId,
    pub connection_id: String,
    pub permission: PermissionTier,
}

/// An edit delivered to a room member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditDelivery {
    /// The room the edit was published in.
    pub note_id: NoteId,
    /// Opaque document content.
    pub payload: Value,
    /// Per-room sequence number, starting at 1.
    pub sequence: u64,
}

/// Error details for a request made over an open connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrame {
    /// Machine-readable code (`forbidden`, `bad_frame`, `closed`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl ErrorFrame {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_edit_frame() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"edit","payload":"hello"}"#).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Edit(EditFrame {
                payload: json!("hello")
            })
        );
    }

    #[test]
    fn test_parse_flush_frame() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type":"flush"}"#).unwrap();
        assert_eq!(frame, ClientFrame::Flush);
    }

    #[test]
    fn test_unknown_frame_type_rejected() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"delete"}"#).is_err());
    }

    #[test]
    fn test_edit_delivery_serialization() {
        let frame = ServerFrame::Edit(EditDelivery {
            note_id: NoteId(7),
            payload: json!("hello"),
            sequence: 1,
        });
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({"type": "edit", "noteId": 7, "payload": "hello", "sequence": 1})
        );
    }

    #[test]
    fn test_joined_serialization() {
        let frame = ServerFrame::Joined(JoinedFrame {
            note_id: NoteId(3),
            connection_id: "3:abc".to_string(),
            permission: PermissionTier::Read,
        });
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"type\":\"joined\""));
        assert!(json.contains("\"connectionId\":\"3:abc\""));
        assert!(json.contains("\"permission\":\"read\""));
    }
}
