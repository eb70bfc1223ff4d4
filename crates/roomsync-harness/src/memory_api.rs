//! In-memory [`RoomApi`].
//!
//! Stores room histories in a map, assigns message ids, and can echo created
//! messages through a [`SimServer`] the way a real server broadcasts them.
//! Per-room latency and failures let tests race history loads against room
//! switches and pushes.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use roomsync_client::{ApiError, RoomApi};
use roomsync_proto::{Message, NewMessage, RoomId, ServerFrame};

use crate::SimServer;

#[derive(Debug, Default)]
struct ApiState {
    rooms: HashMap<RoomId, Vec<Message>>,
    next_id: u64,
    joins: Vec<RoomId>,
    fetches: Vec<RoomId>,
    failing: HashSet<RoomId>,
    latency: HashMap<RoomId, Duration>,
}

/// Shared in-memory room API. Clones refer to the same data.
#[derive(Debug, Clone)]
pub struct MemoryRoomApi {
    author: String,
    state: Arc<Mutex<ApiState>>,
    echo: Option<SimServer>,
}

impl MemoryRoomApi {
    /// Empty API posting messages as `author`.
    pub fn new(author: impl Into<String>) -> Self {
        let state = ApiState { next_id: 1, ..ApiState::default() };
        Self { author: author.into(), state: Arc::new(Mutex::new(state)), echo: None }
    }

    /// Broadcast created messages as `new_message` frames through `server`.
    #[must_use]
    pub fn with_echo(mut self, server: SimServer) -> Self {
        self.echo = Some(server);
        self
    }

    fn lock(&self) -> MutexGuard<'_, ApiState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed `room` with messages. Ids above the current counter advance it.
    pub fn seed(&self, room: impl Into<RoomId>, messages: Vec<Message>) {
        let mut state = self.lock();
        if let Some(max) = messages.iter().map(|m| m.id).max() {
            state.next_id = state.next_id.max(max + 1);
        }
        state.rooms.entry(room.into()).or_default().extend(messages);
    }

    /// Delay history fetches for `room`.
    pub fn set_latency(&self, room: impl Into<RoomId>, latency: Duration) {
        self.lock().latency.insert(room.into(), latency);
    }

    /// Make history fetches for `room` fail.
    pub fn fail_room(&self, room: impl Into<RoomId>) {
        self.lock().failing.insert(room.into());
    }

    /// Rooms joined through the API, in order.
    pub fn joins(&self) -> Vec<RoomId> {
        self.lock().joins.clone()
    }

    /// Rooms whose history was fetched, in order.
    pub fn fetches(&self) -> Vec<RoomId> {
        self.lock().fetches.clone()
    }

    /// Stored history of `room`.
    pub fn history(&self, room: &RoomId) -> Vec<Message> {
        self.lock().rooms.get(room).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl RoomApi for MemoryRoomApi {
    async fn fetch_room_messages(&self, room: &RoomId) -> Result<Vec<Message>, ApiError> {
        let latency = {
            let mut state = self.lock();
            state.fetches.push(room.clone());
            state.latency.get(room).copied().unwrap_or_default()
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let state = self.lock();
        if state.failing.contains(room) {
            return Err(ApiError::Status { status: 500, message: "history unavailable".into() });
        }
        Ok(state.rooms.get(room).cloned().unwrap_or_default())
    }

    async fn post_join_room(&self, room: &RoomId) -> Result<(), ApiError> {
        self.lock().joins.push(room.clone());
        Ok(())
    }

    async fn create_message(&self, room: &RoomId, content: &str) -> Result<Message, ApiError> {
        let message = {
            let mut state = self.lock();
            let id = state.next_id;
            state.next_id += 1;
            let message = Message::text(id, room.clone(), self.author.clone(), content);
            state.rooms.entry(room.clone()).or_default().push(message.clone());
            message
        };

        if let Some(server) = &self.echo {
            server.push(&ServerFrame::NewMessage(NewMessage {
                room_id: room.clone(),
                message: message.clone(),
            }));
        }
        Ok(message)
    }
}
