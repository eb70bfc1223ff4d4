//! Message reconciliation store.
//!
//! Authoritative ordered log of the active room. Merges three sources: bulk
//! history loads, pushed `new_message` frames, and reaction/deletion deltas.
//!
//! # Invariants
//!
//! - Unique Ids: a message id appears at most once in the log.
//!
//! - Room Isolation: events naming a room other than the active one never
//!   change the log.
//!
//! - Last Writer By Room: a history load is applied only if its ticket is the
//!   most recent one issued and the active room has not changed since.
//!
//! - Load Merge: pushes that arrive while a load is in flight survive it, and
//!   deletions that arrive meanwhile are not undone by it.
//!
//! - Arrival Order: pushed messages are appended; the log is never re-sorted.

use std::collections::HashSet;

use roomsync_proto::{Message, MessageDeleted, MessageId, NewMessage, ReactionAdded, RoomId};

/// Proof that a history load was requested.
///
/// Hand the ticket back with the result. Stale tickets are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    room: RoomId,
    generation: u64,
}

impl LoadTicket {
    /// Room the load is for.
    pub fn room(&self) -> &RoomId {
        &self.room
    }
}

/// Message log for the active room.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    active_room: Option<RoomId>,
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
    generation: u64,
    loading: bool,
    last_error: Option<String>,
    pushed_during_load: HashSet<MessageId>,
    deleted_during_load: HashSet<MessageId>,
}

impl MessageStore {
    /// Empty store with no active room.
    pub fn new() -> Self {
        Self::default()
    }

    /// Active room.
    pub fn active_room(&self) -> Option<&RoomId> {
        self.active_room.as_ref()
    }

    /// Messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Whether a message with `id` is in the log.
    pub fn contains(&self, id: MessageId) -> bool {
        self.ids.contains(&id)
    }

    /// Whether a history load is outstanding.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Error of the most recent failed load for the active room.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Make `room` active, clear the log, and issue a load ticket.
    ///
    /// Any ticket issued before this call becomes stale.
    pub fn switch_room(&mut self, room: RoomId) -> LoadTicket {
        self.reset();
        self.active_room = Some(room.clone());
        self.loading = true;
        tracing::debug!(%room, generation = self.generation, "history load started");
        LoadTicket { room, generation: self.generation }
    }

    /// Issue a fresh load ticket for the active room, keeping the log.
    ///
    /// Returns `None` without an active room. Older tickets become stale, so
    /// when loads overlap the most recently issued one wins.
    pub fn reload(&mut self) -> Option<LoadTicket> {
        let room = self.active_room.clone()?;
        self.generation += 1;
        self.loading = true;
        self.last_error = None;
        tracing::debug!(%room, generation = self.generation, "history reload started");
        Some(LoadTicket { room, generation: self.generation })
    }

    /// Drop the active room and clear the log.
    pub fn clear_room(&mut self) {
        self.reset();
        self.active_room = None;
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.messages.clear();
        self.ids.clear();
        self.loading = false;
        self.last_error = None;
        self.pushed_during_load.clear();
        self.deleted_during_load.clear();
    }

    fn is_current(&self, ticket: &LoadTicket) -> bool {
        ticket.generation == self.generation && self.active_room.as_ref() == Some(&ticket.room)
    }

    /// Apply a finished history load.
    ///
    /// The fetched sequence replaces the log. Messages pushed while the load
    /// was in flight and missing from the history are kept after it, and
    /// messages deleted meanwhile stay deleted. Returns `false` for a stale
    /// ticket.
    pub fn complete_load(&mut self, ticket: &LoadTicket, history: Vec<Message>) -> bool {
        if !self.is_current(ticket) {
            tracing::debug!(room = %ticket.room, "discarding stale history load");
            return false;
        }

        let current = std::mem::take(&mut self.messages);
        let pushed = std::mem::take(&mut self.pushed_during_load);
        let deleted = std::mem::take(&mut self.deleted_during_load);
        self.ids.clear();

        let history = history.into_iter().filter(|m| !deleted.contains(&m.id));
        let kept = current.into_iter().filter(|m| pushed.contains(&m.id));
        for message in history.chain(kept) {
            if self.ids.insert(message.id) {
                self.messages.push(message);
            }
        }

        self.loading = false;
        self.last_error = None;
        tracing::debug!(room = %ticket.room, count = self.messages.len(), "history loaded");
        true
    }

    /// Record a failed history load. Returns `false` for a stale ticket.
    pub fn fail_load(&mut self, ticket: &LoadTicket, error: impl Into<String>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        let error = error.into();
        tracing::warn!(room = %ticket.room, %error, "history load failed");
        self.loading = false;
        self.last_error = Some(error);
        self.pushed_during_load.clear();
        self.deleted_during_load.clear();
        true
    }

    /// Append a pushed message. Returns whether the log changed.
    pub fn apply_new_message(&mut self, event: &NewMessage) -> bool {
        if self.active_room.as_ref() != Some(&event.room_id) {
            return false;
        }
        if !self.ids.insert(event.message.id) {
            tracing::debug!(id = event.message.id, "ignoring duplicate message");
            return false;
        }
        if self.loading {
            self.pushed_during_load.insert(event.message.id);
        }
        self.messages.push(event.message.clone());
        true
    }

    /// Attach a reaction. Returns whether the log changed.
    pub fn apply_reaction(&mut self, event: &ReactionAdded) -> bool {
        if !self.names_active_room(event.room_id.as_ref()) {
            return false;
        }
        let Some(message) = self.messages.iter_mut().find(|m| m.id == event.message_id) else {
            return false;
        };
        message.reactions.push(event.reaction.clone());
        true
    }

    /// Remove a deleted message. Returns whether the log changed.
    pub fn apply_deletion(&mut self, event: &MessageDeleted) -> bool {
        if !self.names_active_room(event.room_id.as_ref()) {
            return false;
        }
        if self.loading {
            self.deleted_during_load.insert(event.message_id);
        }
        if !self.ids.remove(&event.message_id) {
            return false;
        }
        self.messages.retain(|m| m.id != event.message_id);
        true
    }

    /// Room-less deltas are matched by id alone.
    fn names_active_room(&self, room: Option<&RoomId>) -> bool {
        match room {
            Some(room) => self.active_room.as_ref() == Some(room),
            None => self.active_room.is_some(),
        }
    }
}
