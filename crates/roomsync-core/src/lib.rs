//! Synchronization core for Roomsync
//!
//! Pure state machines that keep a client's view of chat rooms consistent with
//! the server over an unreliable long-lived connection. Nothing in this crate
//! performs I/O or reads a clock: callers pass `now` in and execute the
//! returned actions, so the same code runs in production and in simulated
//! time.
//!
//! # Components
//!
//! - [`ConnectionManager`]: connection lifecycle and reconnection policy
//! - [`Dispatcher`]: typed event bus with dynamic subscriptions
//! - [`RoomSession`]: join/leave announcements for the active room
//! - [`MessageStore`]: reconciled message log of the active room
//! - [`TypingDebouncer`], [`RemoteTyping`]: typing indicators
//! - [`Presence`]: online users

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod dispatcher;
pub mod env;
pub mod error;
pub mod presence;
pub mod room;
pub mod store;
pub mod typing;

pub use connection::{
    ConnectionAction, ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState,
};
pub use dispatcher::{Dispatcher, Event, EventKind, Subscription};
pub use env::{Environment, MonotonicInstant};
pub use error::{ConnectionError, HandlerError, UnknownEventKind};
pub use presence::Presence;
pub use room::{RoomSession, RoomSessionState};
pub use store::{LoadTicket, MessageStore};
pub use typing::{RemoteTyping, TypingConfig, TypingDebouncer};
