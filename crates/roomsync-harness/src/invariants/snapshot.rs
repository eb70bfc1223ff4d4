//! Observable state snapshots for invariant checking.
//!
//! Invariants run against snapshots rather than live runtimes so a check sees
//! one consistent view even while the runtime keeps processing events.

use roomsync_client::ChatView;

/// Snapshot of every simulated client.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Per-client state.
    pub clients: Vec<ClientSnapshot>,
}

impl SystemSnapshot {
    /// Snapshot with no clients.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot of a single client.
    pub fn single(client: ClientSnapshot) -> Self {
        Self { clients: vec![client] }
    }

    /// Add a client snapshot.
    pub fn add_client(&mut self, client: ClientSnapshot) {
        self.clients.push(client);
    }
}

/// Observable state of one client.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    /// Local display name.
    pub username: String,
    /// Published view at capture time.
    pub view: ChatView,
}

impl ClientSnapshot {
    /// Capture `view` for the client named `username`.
    pub fn new(username: impl Into<String>, view: ChatView) -> Self {
        Self { username: username.into(), view }
    }
}
