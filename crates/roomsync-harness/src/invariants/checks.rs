//! Standard invariant checks.

use std::collections::HashSet;

use roomsync_core::ConnectionState;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// Every message id appears at most once in a client's log.
pub struct UniqueMessageIds;

impl Invariant for UniqueMessageIds {
    fn name(&self) -> &'static str {
        "unique_message_ids"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let mut seen = HashSet::new();
            for message in &client.view.messages {
                if !seen.insert(message.id) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "{}: message {} listed twice",
                            client.username, message.id
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// The log only holds messages of the active room, and is empty without one.
pub struct MessagesInActiveRoom;

impl Invariant for MessagesInActiveRoom {
    fn name(&self) -> &'static str {
        "messages_in_active_room"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let view = &client.view;
            let stray = view
                .messages
                .iter()
                .find(|m| view.active_room.as_ref() != Some(&m.room_id));
            if let Some(message) = stray {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{}: message {} of room {} shown while active room is {:?}",
                        client.username, message.id, message.room_id, view.active_room
                    ),
                });
            }
        }
        Ok(())
    }
}

/// A client never lists itself among the users typing.
pub struct TypingExcludesSelf;

impl Invariant for TypingExcludesSelf {
    fn name(&self) -> &'static str {
        "typing_excludes_self"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if client.view.typing_users.iter().any(|u| *u == client.username) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{}: listed as typing to itself", client.username),
                });
            }
        }
        Ok(())
    }
}

/// Remote typing state is dropped whenever the connection is not open.
pub struct NoTypingWhileOffline;

impl Invariant for NoTypingWhileOffline {
    fn name(&self) -> &'static str {
        "no_typing_while_offline"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let view = &client.view;
            if view.connection != ConnectionState::Open && !view.typing_users.is_empty() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{}: {:?} typing while {:?}",
                        client.username, view.typing_users, view.connection
                    ),
                });
            }
        }
        Ok(())
    }
}
