//! Room session controller.
//!
//! Tracks the single active room and which connection epoch it was announced
//! on. Emits `join_room` whenever a room is active on an open connection and
//! has not been announced on that connection yet, and `leave_room` when a room
//! announced on the current connection is abandoned.
//!
//! # State Machine
//!
//! ```text
//!            select            open
//! ┌────────┐ ─────> ┌──────────┐ ────> ┌────────────────────┐
//! │ NoRoom │        │ Selected │       │ Joined(room,epoch) │
//! └────────┘ <───── └──────────┘ <──── └────────────────────┘
//!            clear                drop
//! ```
//!
//! # Invariants
//!
//! - Join Once Per Epoch: `join_room` for a given room is emitted at most once
//!   per connection epoch.

use roomsync_proto::{ClientFrame, RoomId};

/// Session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomSessionState {
    /// No active room.
    NoRoom,
    /// Active room not yet announced on the current connection.
    Selected(RoomId),
    /// Active room announced on connection `epoch`.
    Joined {
        /// Active room.
        room: RoomId,
        /// Connection epoch the join was sent on.
        epoch: u64,
    },
}

/// Room session controller.
#[derive(Debug, Clone)]
pub struct RoomSession {
    state: RoomSessionState,
    /// Epoch of the open connection, `None` while not open.
    open_epoch: Option<u64>,
}

impl Default for RoomSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomSession {
    /// Session with no active room and no connection.
    pub fn new() -> Self {
        Self { state: RoomSessionState::NoRoom, open_epoch: None }
    }

    /// Current state.
    pub fn state(&self) -> &RoomSessionState {
        &self.state
    }

    /// Active room, joined or not.
    pub fn active_room(&self) -> Option<&RoomId> {
        match &self.state {
            RoomSessionState::NoRoom => None,
            RoomSessionState::Selected(room) | RoomSessionState::Joined { room, .. } => Some(room),
        }
    }

    /// Whether the active room was announced on the current connection.
    pub fn is_joined(&self) -> bool {
        matches!(self.state, RoomSessionState::Joined { .. })
    }

    /// Make `room` the active room.
    ///
    /// Re-selecting the active room does nothing.
    pub fn select_room(&mut self, room: RoomId) -> Vec<ClientFrame> {
        if self.active_room() == Some(&room) {
            return Vec::new();
        }

        let mut frames = self.leave();
        self.state = RoomSessionState::Selected(room);
        frames.extend(self.try_join());
        frames
    }

    /// Drop the active room.
    pub fn clear(&mut self) -> Vec<ClientFrame> {
        let frames = self.leave();
        self.state = RoomSessionState::NoRoom;
        frames
    }

    /// Connection opened with `epoch`.
    pub fn handle_connected(&mut self, epoch: u64) -> Vec<ClientFrame> {
        self.open_epoch = Some(epoch);
        self.try_join()
    }

    /// Connection lost. The active room will be re-joined on the next open.
    pub fn handle_disconnected(&mut self) {
        self.open_epoch = None;
        if let RoomSessionState::Joined { room, .. } = &self.state {
            tracing::debug!(%room, "room session suspended");
            self.state = RoomSessionState::Selected(room.clone());
        }
    }

    fn try_join(&mut self) -> Vec<ClientFrame> {
        let Some(epoch) = self.open_epoch else {
            return Vec::new();
        };

        let room = match &self.state {
            RoomSessionState::Selected(room) => room.clone(),
            RoomSessionState::Joined { room, epoch: joined } if *joined != epoch => room.clone(),
            RoomSessionState::NoRoom | RoomSessionState::Joined { .. } => return Vec::new(),
        };

        tracing::info!(%room, epoch, "joining room");
        self.state = RoomSessionState::Joined { room: room.clone(), epoch };
        vec![ClientFrame::JoinRoom { room_id: room }]
    }

    fn leave(&mut self) -> Vec<ClientFrame> {
        match &self.state {
            RoomSessionState::Joined { room, epoch } if Some(*epoch) == self.open_epoch => {
                tracing::info!(%room, "leaving room");
                vec![ClientFrame::LeaveRoom { room_id: room.clone() }]
            },
            _ => Vec::new(),
        }
    }
}
