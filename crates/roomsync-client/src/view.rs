//! Snapshot of reconciled state for the rendering layer.

use roomsync_core::ConnectionState;
use roomsync_proto::{Message, RoomId};

/// Everything a renderer needs, published after every runtime step that
/// changed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatView {
    /// Connection state.
    pub connection: ConnectionState,
    /// Reconnect attempts exhausted.
    pub permanently_disconnected: bool,
    /// Active room.
    pub active_room: Option<RoomId>,
    /// Messages of the active room, oldest first.
    pub messages: Vec<Message>,
    /// History load outstanding.
    pub loading: bool,
    /// Error of the last failed history load.
    pub last_error: Option<String>,
    /// Other users typing in the active room.
    pub typing_users: Vec<String>,
    /// Users the server reports as online.
    pub online_users: Vec<String>,
}

impl Default for ChatView {
    fn default() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            permanently_disconnected: false,
            active_room: None,
            messages: Vec::new(),
            loading: false,
            last_error: None,
            typing_users: Vec::new(),
            online_users: Vec::new(),
        }
    }
}

impl ChatView {
    /// Whether frames can currently be sent.
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Open
    }

    /// Ids of the visible messages, in order.
    pub fn message_ids(&self) -> Vec<roomsync_proto::MessageId> {
        self.messages.iter().map(|m| m.id).collect()
    }
}
