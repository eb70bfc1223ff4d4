//! Typing indicators in both directions.
//!
//! [`TypingDebouncer`] turns a burst of local keystrokes into one
//! `typing: true` announcement and one `typing: false` announcement after the
//! burst ends. [`RemoteTyping`] keeps the per-room set of other users the
//! server reports as typing and lets it decay after a period of silence.
//!
//! Both are driven with explicit instants and expose their next deadline so
//! the driver can sleep exactly until something is due.

use std::{collections::HashMap, time::Duration};

use roomsync_proto::{ClientFrame, RoomId, TypingUpdate};

use crate::env::MonotonicInstant;

/// Inactivity after the last keystroke before typing-stop is announced.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Silence after which a remote typing set is dropped.
pub const DEFAULT_REMOTE_TTL: Duration = Duration::from_secs(1);

/// Typing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingConfig {
    /// Local inactivity timeout.
    pub idle_timeout: Duration,
    /// Remote typing set lifetime.
    pub remote_ttl: Duration,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self { idle_timeout: DEFAULT_IDLE_TIMEOUT, remote_ttl: DEFAULT_REMOTE_TTL }
    }
}

/// Local typing announcer.
///
/// # Invariants
///
/// - Paired Announcements: every start is followed by exactly one stop for the
///   same room, and no second start is sent while typing.
#[derive(Debug, Clone)]
pub struct TypingDebouncer<I: MonotonicInstant> {
    idle_timeout: Duration,
    typing_in: Option<RoomId>,
    idle_deadline: Option<I>,
}

impl<I: MonotonicInstant> TypingDebouncer<I> {
    /// Idle debouncer.
    pub fn new(idle_timeout: Duration) -> Self {
        Self { idle_timeout, typing_in: None, idle_deadline: None }
    }

    /// Whether a start has been announced without a stop.
    pub fn is_typing(&self) -> bool {
        self.typing_in.is_some()
    }

    /// When the pending stop is due.
    pub fn deadline(&self) -> Option<I> {
        self.idle_deadline
    }

    /// Local input changed in `room`.
    ///
    /// Starts typing on non-empty input. Any input, empty or not, pushes the
    /// stop deadline back while typing.
    pub fn input(&mut self, room: &RoomId, non_empty: bool, now: I) -> Vec<ClientFrame> {
        let mut frames = Vec::new();

        if self.typing_in.as_ref().is_some_and(|current| current != room) {
            frames.extend(self.stop());
        }

        if self.typing_in.is_none() {
            if !non_empty {
                return frames;
            }
            self.typing_in = Some(room.clone());
            frames.push(ClientFrame::Typing { room_id: room.clone(), is_typing: true });
        }

        self.idle_deadline = Some(now + self.idle_timeout);
        frames
    }

    /// Announce stop if the idle deadline has passed.
    pub fn tick(&mut self, now: I) -> Vec<ClientFrame> {
        match self.idle_deadline {
            Some(deadline) if now >= deadline => self.stop(),
            _ => Vec::new(),
        }
    }

    /// Announce stop immediately (message submitted, room switched, link lost).
    pub fn stop(&mut self) -> Vec<ClientFrame> {
        self.idle_deadline = None;
        match self.typing_in.take() {
            Some(room_id) => vec![ClientFrame::Typing { room_id, is_typing: false }],
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct TypingSet<I> {
    users: Vec<String>,
    expires_at: I,
}

/// Who else is typing, per room.
///
/// # Invariants
///
/// - Never contains the local user.
/// - Each update replaces the whole set for its room.
#[derive(Debug, Clone)]
pub struct RemoteTyping<I: MonotonicInstant> {
    local_user: String,
    ttl: Duration,
    rooms: HashMap<RoomId, TypingSet<I>>,
}

impl<I: MonotonicInstant> RemoteTyping<I> {
    /// Empty tracker that filters out `local_user`.
    pub fn new(local_user: impl Into<String>, ttl: Duration) -> Self {
        Self { local_user: local_user.into(), ttl, rooms: HashMap::new() }
    }

    /// Replace the typing set of the update's room. Returns whether the
    /// visible set changed.
    pub fn apply(&mut self, update: &TypingUpdate, now: I) -> bool {
        let mut users: Vec<String> = Vec::with_capacity(update.users.len());
        for user in &update.users {
            if *user != self.local_user && !users.contains(user) {
                users.push(user.clone());
            }
        }

        if users.is_empty() {
            return self.rooms.remove(&update.room_id).is_some();
        }

        let previous = self.rooms.insert(update.room_id.clone(), TypingSet {
            users: users.clone(),
            expires_at: now + self.ttl,
        });
        previous.is_none_or(|set| set.users != users)
    }

    /// Drop sets that have been silent for the TTL. Returns whether anything
    /// was dropped.
    pub fn expire(&mut self, now: I) -> bool {
        let before = self.rooms.len();
        self.rooms.retain(|_, set| set.expires_at > now);
        self.rooms.len() != before
    }

    /// Users typing in `room`, in server order.
    pub fn users(&self, room: &RoomId) -> &[String] {
        self.rooms.get(room).map_or(&[], |set| set.users.as_slice())
    }

    /// Earliest expiry across all rooms.
    pub fn next_expiry(&self) -> Option<I> {
        self.rooms.values().map(|set| set.expires_at).min()
    }

    /// Forget every set.
    pub fn clear(&mut self) {
        self.rooms.clear();
    }
}
