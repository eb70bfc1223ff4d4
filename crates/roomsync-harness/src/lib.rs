//! Test harness for Roomsync clients.
//!
//! In-memory implementations of the client's external seams, so full
//! runtimes can be exercised deterministically on a paused tokio clock.
//!
//! - [`SimServer`], [`SimConnector`]: scripted push server and links to it
//! - [`MemoryRoomApi`]: request/response API backed by a map
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties of published views that must
//! hold after every step. Use [`InvariantRegistry::standard()`] for the
//! common set.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod memory_api;
pub mod sim_connector;
pub mod sim_server;

pub use invariants::{
    ClientSnapshot, Invariant, InvariantRegistry, InvariantResult, MessagesInActiveRoom,
    NoTypingWhileOffline, SystemSnapshot, TypingExcludesSelf, UniqueMessageIds, Violation,
};
pub use memory_api::MemoryRoomApi;
pub use sim_connector::{SimConnector, SimLink};
pub use sim_server::SimServer;
