//! Client configuration.

use roomsync_core::{ConnectionConfig, TypingConfig};

/// Default capacity of the command channel between handles and the runtime.
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;

/// Everything needed to build a [`crate::SyncRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Socket endpoint and reconnection policy.
    pub connection: ConnectionConfig,
    /// Typing timeouts.
    pub typing: TypingConfig,
    /// Local display name. Filtered out of typing sets and used as reaction
    /// author.
    pub username: String,
    /// Capacity of the command channel.
    pub command_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            typing: TypingConfig::default(),
            username: String::new(),
            command_capacity: DEFAULT_COMMAND_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Default configuration for `username`.
    pub fn for_user(username: impl Into<String>) -> Self {
        Self { username: username.into(), ..Self::default() }
    }
}
