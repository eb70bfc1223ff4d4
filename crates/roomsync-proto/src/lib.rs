//! Roomsync wire protocol.
//!
//! Frames are JSON text records carrying a discriminant `type` field. Client
//! frames ([`ClientFrame`]) and server frames ([`ServerFrame`]) are closed
//! tagged unions, so every consumer matches exhaustively instead of branching
//! on strings.
//!
//! # Components
//!
//! - [`ClientFrame`]: announcements the client writes to the socket
//! - [`ServerFrame`]: push events the server delivers
//! - [`Message`], [`Reaction`]: the chat records carried inside frames
//! - [`RoomId`]: room identifier accepting both numeric and named ids

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod frame;
pub mod ids;
pub mod message;

pub use errors::{ProtocolError, Result};
pub use frame::{
    ClientFrame, MAX_FRAME_SIZE, MembershipNotice, MessageDeleted, NewMessage, ReactionAdded,
    ReadReceipt, ServerFrame, TypingUpdate, UserStatus,
};
pub use ids::{MessageId, RoomId, UserId};
pub use message::{Message, MessageKind, Reaction};
