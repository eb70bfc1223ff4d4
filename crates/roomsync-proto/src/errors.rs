//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame could not be serialized to JSON.
    #[error("frame encode failed: {0}")]
    Encode(String),

    /// Inbound text is not a valid frame.
    #[error("frame decode failed: {0}")]
    Decode(String),

    /// Inbound text exceeds [`crate::MAX_FRAME_SIZE`].
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Size of the rejected frame in bytes.
        size: usize,
        /// Configured maximum.
        max: usize,
    },
}

impl ProtocolError {
    /// Whether the error came from undecodable inbound data.
    ///
    /// Malformed inbound frames are dropped by the connection manager; encode
    /// failures point at a local bug instead.
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::FrameTooLarge { .. })
    }
}
