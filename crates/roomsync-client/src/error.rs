//! Error types for the client runtime.
//!
//! Transport and API errors describe failures of the two external
//! collaborators. [`ClientError`] is what callers of [`crate::SyncClient`]
//! see.

use roomsync_core::ConnectionError;
use thiserror::Error;

/// Socket transport errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Endpoint unreachable.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Server refused the opening handshake.
    #[error("handshake rejected: {0}")]
    Handshake(String),

    /// Read or write on an open socket failed.
    #[error("stream error: {0}")]
    Stream(String),
}

impl From<TransportError> for ConnectionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Handshake(reason) => Self::Handshake(reason),
            TransportError::Connect(reason) | TransportError::Stream(reason) => {
                Self::Transport(reason)
            },
        }
    }
}

/// Request/response API errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Request could not be sent or the response not read.
    #[error("request failed: {0}")]
    Request(String),

    /// Server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// Response body did not match the expected shape.
    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Errors returned to callers of [`crate::SyncClient`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// Connection precondition or handshake failure.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// API request failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Operation needs an active room.
    #[error("no active room")]
    NoActiveRoom,

    /// The runtime task has stopped.
    #[error("sync runtime stopped")]
    RuntimeStopped,
}
