//! Chat records carried inside frames and returned by bulk reads.

use serde::{Deserialize, Serialize};

use crate::{MessageId, RoomId, UserId};

/// Message content kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text message.
    #[default]
    Text,
    /// File attachment. Images are delivered as files.
    #[serde(alias = "image")]
    File,
    /// Server-generated notice.
    System,
}

/// A reaction attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    /// Emoji glyph.
    pub emoji: String,
    /// Display name of the reacting user.
    #[serde(default, alias = "username")]
    pub author: String,
    /// Reacting user's id, when the server includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

impl Reaction {
    /// Reaction by a named author.
    pub fn new(emoji: impl Into<String>, author: impl Into<String>) -> Self {
        Self { emoji: emoji.into(), author: author.into(), user_id: None }
    }
}

/// A chat message.
///
/// Unknown fields sent by the server (avatars, edit flags, read flags) are
/// ignored on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique server-assigned id.
    pub id: MessageId,
    /// Room the message belongs to.
    pub room_id: RoomId,
    /// Author display name.
    #[serde(alias = "username")]
    pub author: String,
    /// Message body.
    pub content: String,
    /// Content kind.
    #[serde(default, alias = "message_type")]
    pub kind: MessageKind,
    /// Server timestamp (ISO-8601), kept opaque. The store never re-sorts.
    #[serde(default)]
    pub timestamp: String,
    /// Attachment location for file messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// Reactions in arrival order.
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

impl Message {
    /// Text message with no reactions.
    pub fn text(
        id: MessageId,
        room_id: impl Into<RoomId>,
        author: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            room_id: room_id.into(),
            author: author.into(),
            content: content.into(),
            kind: MessageKind::Text,
            timestamp: String::new(),
            file_url: None,
            reactions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_server_message_shape() {
        let json = r#"{
            "id": 12,
            "content": "hi",
            "message_type": "image",
            "file_url": "/uploads/cat.png",
            "user_id": 3,
            "username": "alice",
            "avatar_url": "",
            "room_id": 1,
            "is_edited": false,
            "timestamp": "2024-05-01T10:00:00",
            "reactions": [{"id": 1, "emoji": "👍", "user_id": 4, "username": "bob"}]
        }"#;

        let message: Message = serde_json::from_str(json).unwrap();

        assert_eq!(message.id, 12);
        assert_eq!(message.author, "alice");
        assert_eq!(message.kind, MessageKind::File);
        assert_eq!(message.room_id, RoomId::Numeric(1));
        assert_eq!(message.reactions, vec![Reaction {
            emoji: "👍".into(),
            author: "bob".into(),
            user_id: Some(4),
        }]);
    }

    #[test]
    fn missing_optional_fields_default() {
        let json = r#"{"id": 1, "room_id": "general", "author": "a", "content": "x"}"#;
        let message: Message = serde_json::from_str(json).unwrap();

        assert_eq!(message.kind, MessageKind::Text);
        assert!(message.reactions.is_empty());
        assert!(message.timestamp.is_empty());
    }
}
