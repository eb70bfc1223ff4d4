//! Identifier types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-assigned message identifier.
pub type MessageId = u64;

/// Server-assigned user identifier.
pub type UserId = u64;

/// Room identifier.
///
/// Servers in the wild use either integer primary keys or slugs such as
/// `"general"`. The representation received on the wire is preserved so the
/// identifier is echoed back exactly as the server issued it.
///
/// # Invariants
///
/// - `Numeric(1)` and `Named("1")` are distinct rooms. No coercion happens
///   between the two forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoomId {
    /// Integer room id.
    Numeric(u64),
    /// Named room id.
    Named(String),
}

impl From<u64> for RoomId {
    fn from(id: u64) -> Self {
        Self::Numeric(id)
    }
}

impl From<&str> for RoomId {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for RoomId {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl RoomId {
    /// Parse a user-supplied id: all-digit input becomes numeric.
    pub fn parse(input: &str) -> Self {
        match input.parse::<u64>() {
            Ok(id) => Self::Numeric(id),
            Err(_) => Self::Named(input.to_string()),
        }
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}
