//! Error types for the synchronization core.
//!
//! Connection errors cover preconditions and transport failures of the
//! connection manager. Handler errors are returned by event subscribers and
//! never escape the dispatcher.

use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors raised by the connection manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// `connect()` was called without a usable credential.
    #[error("missing credential: a non-empty token is required to connect")]
    MissingCredential,

    /// A frame was sent while the connection was not open.
    #[error("not connected: cannot send in state {state:?}")]
    NotConnected {
        /// State at the time of the send.
        state: ConnectionState,
    },

    /// Configured endpoint is not a valid URL.
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),

    /// Transport rejected the opening handshake.
    #[error("handshake rejected: {0}")]
    Handshake(String),

    /// Connection was torn down by `disconnect()` before it opened.
    #[error("connection closed before it opened")]
    Cancelled,

    /// Frame could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Underlying transport failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ConnectionError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Handshake and transport failures feed the reconnection policy.
    /// Precondition failures (missing credential, bad URL) never fix
    /// themselves.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Handshake(_) | Self::Transport(_) | Self::NotConnected { .. })
    }
}

impl From<roomsync_proto::ProtocolError> for ConnectionError {
    fn from(err: roomsync_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<url::ParseError> for ConnectionError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

/// Error returned by an event handler.
///
/// The dispatcher logs it and carries on with the remaining handlers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("handler failed: {0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Handler error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Event kind name that does not match any [`crate::EventKind`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown event kind: {0}")]
pub struct UnknownEventKind(pub String);
