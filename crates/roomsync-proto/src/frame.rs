//! Tagged frames exchanged over the persistent connection.
//!
//! Every frame is one JSON object whose `type` field selects the variant. The
//! remaining fields are variant-specific.
//!
//! # Invariants
//!
//! - Exhaustive Variants: each `type` string maps to exactly one variant. The
//!   `kind()` methods return the wire discriminant and are kept in sync with the
//!   serde renames by the round-trip tests.
//!
//! - Forward Compatibility: a server frame with an unrecognized `type` decodes
//!   to [`ServerFrame::Unknown`] instead of failing, so newer servers can add
//!   push events without breaking older clients. A recognized `type` with
//!   missing or mistyped fields is a decode error.

use serde::{Deserialize, Serialize};

use crate::{
    Message, MessageId, Reaction, RoomId, UserId,
    errors::{ProtocolError, Result},
};

/// Maximum accepted inbound frame size in bytes (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1 << 20;

/// Frames written by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Subscribe this connection to room broadcasts.
    JoinRoom {
        /// Room to join.
        room_id: RoomId,
    },
    /// Unsubscribe this connection from room broadcasts.
    LeaveRoom {
        /// Room to leave.
        room_id: RoomId,
    },
    /// Local typing start/stop announcement.
    Typing {
        /// Room being typed in.
        room_id: RoomId,
        /// `true` on start, `false` on stop.
        is_typing: bool,
    },
    /// Add a reaction to a message.
    MessageReaction {
        /// Room containing the message.
        room_id: RoomId,
        /// Target message.
        message_id: MessageId,
        /// Reaction to add.
        reaction: Reaction,
    },
    /// Mark a message as read.
    ReadReceipt {
        /// Room containing the message.
        room_id: RoomId,
        /// Message that was read.
        message_id: MessageId,
    },
}

impl ClientFrame {
    /// Wire discriminant of this frame.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::Typing { .. } => "typing",
            Self::MessageReaction { .. } => "message_reaction",
            Self::ReadReceipt { .. } => "read_receipt",
        }
    }

    /// Room this frame targets.
    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::JoinRoom { room_id }
            | Self::LeaveRoom { room_id }
            | Self::Typing { room_id, .. }
            | Self::MessageReaction { room_id, .. }
            | Self::ReadReceipt { room_id, .. } => room_id,
        }
    }

    /// Serialize to JSON text.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Parse JSON text written by a client.
    pub fn decode(text: &str) -> Result<Self> {
        check_size(text)?;
        serde_json::from_str(text).map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}

/// Push of a newly created message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Room the message was posted to.
    pub room_id: RoomId,
    /// The message itself.
    pub message: Message,
}

/// Server fan-out of the current typer set for a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingUpdate {
    /// Room the set applies to.
    pub room_id: RoomId,
    /// Everyone currently typing, as tracked by the server.
    #[serde(default)]
    pub users: Vec<String>,
}

/// A reaction was added to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionAdded {
    /// Target message.
    pub message_id: MessageId,
    /// Room of the message. Some servers omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// The added reaction.
    pub reaction: Reaction,
}

/// A message was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDeleted {
    /// Removed message.
    pub message_id: MessageId,
    /// Room of the message. Some servers omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
}

/// Another user read a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
    /// Message that was read.
    pub message_id: MessageId,
    /// Room of the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Reader's id.
    pub user_id: UserId,
    /// Reader's display name.
    #[serde(default)]
    pub username: String,
}

/// A user joined or left a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipNotice {
    /// Affected room.
    pub room_id: RoomId,
    /// Affected user.
    pub user_id: UserId,
    /// Display name.
    pub username: String,
    /// Server timestamp (ISO-8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A user came online or went offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatus {
    /// Affected user.
    pub user_id: UserId,
    /// Display name.
    pub username: String,
    /// Whether the user now has a live connection.
    pub is_online: bool,
    /// Last-seen timestamp, sent on offline transitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
}

/// Frames pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// A message was posted.
    NewMessage(NewMessage),
    /// The typer set of a room changed.
    Typing(TypingUpdate),
    /// A reaction was added.
    MessageReaction(ReactionAdded),
    /// A message was deleted.
    MessageDeleted(MessageDeleted),
    /// A message was read.
    ReadReceipt(ReadReceipt),
    /// A user joined a room.
    UserJoined(MembershipNotice),
    /// A user left a room.
    UserLeft(MembershipNotice),
    /// A user's presence changed.
    UserStatus(UserStatus),
    /// Frame type this client does not know about.
    #[serde(other)]
    Unknown,
}

impl ServerFrame {
    /// Wire discriminant of this frame.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "new_message",
            Self::Typing(_) => "typing",
            Self::MessageReaction(_) => "message_reaction",
            Self::MessageDeleted(_) => "message_deleted",
            Self::ReadReceipt(_) => "read_receipt",
            Self::UserJoined(_) => "user_joined",
            Self::UserLeft(_) => "user_left",
            Self::UserStatus(_) => "user_status",
            Self::Unknown => "unknown",
        }
    }

    /// Room this frame concerns. `None` for global or room-less frames.
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            Self::NewMessage(event) => Some(&event.room_id),
            Self::Typing(event) => Some(&event.room_id),
            Self::MessageReaction(event) => event.room_id.as_ref(),
            Self::MessageDeleted(event) => event.room_id.as_ref(),
            Self::ReadReceipt(event) => event.room_id.as_ref(),
            Self::UserJoined(event) | Self::UserLeft(event) => Some(&event.room_id),
            Self::UserStatus(_) | Self::Unknown => None,
        }
    }

    /// Serialize to JSON text.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Parse JSON text pushed by the server.
    pub fn decode(text: &str) -> Result<Self> {
        check_size(text)?;
        serde_json::from_str(text).map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}

fn check_size(text: &str) -> Result<()> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { size: text.len(), max: MAX_FRAME_SIZE });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_room_wire_format() {
        let frame = ClientFrame::JoinRoom { room_id: RoomId::from("general") };
        insta::assert_snapshot!(frame.encode().unwrap(), @r#"{"type":"join_room","room_id":"general"}"#);
    }

    #[test]
    fn typing_wire_format() {
        let frame = ClientFrame::Typing { room_id: RoomId::Numeric(3), is_typing: true };
        insta::assert_snapshot!(frame.encode().unwrap(), @r#"{"type":"typing","room_id":3,"is_typing":true}"#);
    }

    #[test]
    fn decodes_new_message_push() {
        let text = r#"{"type":"new_message","room_id":"general","message":{"id":3,"room_id":"general","author":"bob","content":"hey","kind":"text","timestamp":"t"}}"#;

        let frame = ServerFrame::decode(text).unwrap();

        let ServerFrame::NewMessage(event) = frame else {
            panic!("expected new_message, got {frame:?}");
        };
        assert_eq!(event.message.id, 3);
        assert_eq!(event.room_id, RoomId::from("general"));
    }

    #[test]
    fn decodes_typing_fan_out() {
        let text = r#"{"type":"typing","room_id":1,"users":["alice","bob"]}"#;
        let frame = ServerFrame::decode(text).unwrap();

        assert_eq!(
            frame,
            ServerFrame::Typing(TypingUpdate {
                room_id: RoomId::Numeric(1),
                users: vec!["alice".into(), "bob".into()],
            })
        );
    }

    #[test]
    fn reaction_without_room_decodes() {
        let text = r#"{"type":"message_reaction","message_id":9,"reaction":{"emoji":"🔥","user_id":2},"user_id":2,"username":"eve"}"#;
        let frame = ServerFrame::decode(text).unwrap();

        let ServerFrame::MessageReaction(event) = frame else {
            panic!("expected message_reaction, got {frame:?}");
        };
        assert_eq!(event.message_id, 9);
        assert!(event.room_id.is_none());
        assert_eq!(event.reaction.user_id, Some(2));
    }

    #[test]
    fn unknown_type_is_forward_compatible() {
        let frame = ServerFrame::decode(r#"{"type":"room_renamed","room_id":1}"#).unwrap();
        assert_eq!(frame, ServerFrame::Unknown);
        assert_eq!(frame.kind(), "unknown");
    }

    #[test]
    fn known_type_with_bad_fields_is_an_error() {
        let result = ServerFrame::decode(r#"{"type":"message_deleted"}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn not_json_is_an_error() {
        let err = ServerFrame::decode("{not json").unwrap_err();
        assert!(err.is_malformed_input());
    }

    #[test]
    fn missing_type_is_an_error() {
        assert!(ServerFrame::decode(r#"{"room_id":1}"#).is_err());
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let text = format!(r#"{{"type":"typing","room_id":"{}"}}"#, "x".repeat(MAX_FRAME_SIZE));
        assert!(matches!(ServerFrame::decode(&text), Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn kind_matches_serde_tag() {
        let frames = [
            ClientFrame::JoinRoom { room_id: 1.into() },
            ClientFrame::LeaveRoom { room_id: 1.into() },
            ClientFrame::Typing { room_id: 1.into(), is_typing: false },
            ClientFrame::MessageReaction {
                room_id: 1.into(),
                message_id: 2,
                reaction: Reaction::new("👍", "me"),
            },
            ClientFrame::ReadReceipt { room_id: 1.into(), message_id: 2 },
        ];

        for frame in frames {
            let value: serde_json::Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
            assert_eq!(value["type"], frame.kind());
        }
    }
}
