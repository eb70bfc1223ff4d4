//! Seams to the outside world.
//!
//! [`Connector`] creates a fresh [`Link`] for every connection attempt; the
//! runtime never reuses a link after it closed. [`RoomApi`] is the
//! request/response collaborator for bulk reads and writes.

use std::future::Future;

use async_trait::async_trait;
use roomsync_proto::{Message, RoomId};

use crate::error::{ApiError, TransportError};

/// Opens socket links.
///
/// # Implementations
///
/// - **Production**: [`crate::WsConnector`] over tokio-tungstenite
/// - **Simulation**: `roomsync_harness::SimConnector` with a scripted server
pub trait Connector: Send + Sync + 'static {
    /// Link type produced by this connector.
    type Link: Link;

    /// Open a link to `url` and complete the handshake.
    fn connect(&self, url: &str) -> impl Future<Output = Result<Self::Link, TransportError>> + Send;
}

/// One open socket.
pub trait Link: Send + 'static {
    /// Write one text frame.
    fn send(&mut self, text: String) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Next text frame. `None` once the peer closed the link.
    ///
    /// Must be cancel-safe: the runtime drops this future whenever another
    /// event wins the race and calls it again later.
    fn recv(&mut self) -> impl Future<Output = Option<Result<String, TransportError>>> + Send;

    /// Close the link. Errors are ignored; the link is discarded afterwards.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Request/response API for bulk reads and writes.
#[async_trait]
pub trait RoomApi: Send + Sync {
    /// Room history, oldest first.
    async fn fetch_room_messages(&self, room: &RoomId) -> Result<Vec<Message>, ApiError>;

    /// Record membership of the current user in `room`.
    async fn post_join_room(&self, room: &RoomId) -> Result<(), ApiError>;

    /// Post a text message. Returns the stored message.
    async fn create_message(&self, room: &RoomId, content: &str) -> Result<Message, ApiError>;
}
