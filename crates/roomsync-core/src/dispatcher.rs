//! Event dispatcher.
//!
//! Registry of handlers keyed by [`EventKind`]. Every parsed inbound frame and
//! every connection lifecycle change is delivered to all handlers registered
//! for its kind, in registration order.
//!
//! # Invariants
//!
//! - Snapshot Iteration: dispatch clones the handler list before invoking
//!   anything, so handlers may subscribe or unsubscribe (themselves included)
//!   without affecting the event in flight.
//!
//! - Handler Isolation: a handler that returns an error or panics is logged
//!   and skipped. The remaining handlers for the same event still run.

use std::{
    collections::HashMap,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use roomsync_proto::ServerFrame;

use crate::{
    connection::ConnectionEvent,
    error::{HandlerError, UnknownEventKind},
};

/// Registry key for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `new_message` frame.
    NewMessage,
    /// `typing` frame.
    Typing,
    /// `message_reaction` frame.
    MessageReaction,
    /// `message_deleted` frame.
    MessageDeleted,
    /// `read_receipt` frame.
    ReadReceipt,
    /// `user_joined` frame.
    UserJoined,
    /// `user_left` frame.
    UserLeft,
    /// `user_status` frame.
    UserStatus,
    /// Connection opened.
    Connected,
    /// Connection closed unexpectedly.
    Disconnected,
    /// Reconnect attempts exhausted.
    DisconnectedPermanent,
}

impl EventKind {
    /// Every kind, in wire-name order.
    pub const ALL: [Self; 11] = [
        Self::NewMessage,
        Self::Typing,
        Self::MessageReaction,
        Self::MessageDeleted,
        Self::ReadReceipt,
        Self::UserJoined,
        Self::UserLeft,
        Self::UserStatus,
        Self::Connected,
        Self::Disconnected,
        Self::DisconnectedPermanent,
    ];

    /// Event name as used on the wire and in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewMessage => "new_message",
            Self::Typing => "typing",
            Self::MessageReaction => "message_reaction",
            Self::MessageDeleted => "message_deleted",
            Self::ReadReceipt => "read_receipt",
            Self::UserJoined => "user_joined",
            Self::UserLeft => "user_left",
            Self::UserStatus => "user_status",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::DisconnectedPermanent => "disconnected_permanent",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// Something subscribers can observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Parsed server frame.
    Frame(ServerFrame),
    /// Connection lifecycle change.
    Lifecycle(ConnectionEvent),
}

impl Event {
    /// Registry key. `None` for frames of unknown type, which are never
    /// delivered.
    pub fn kind(&self) -> Option<EventKind> {
        let kind = match self {
            Self::Frame(frame) => match frame {
                ServerFrame::NewMessage(_) => EventKind::NewMessage,
                ServerFrame::Typing(_) => EventKind::Typing,
                ServerFrame::MessageReaction(_) => EventKind::MessageReaction,
                ServerFrame::MessageDeleted(_) => EventKind::MessageDeleted,
                ServerFrame::ReadReceipt(_) => EventKind::ReadReceipt,
                ServerFrame::UserJoined(_) => EventKind::UserJoined,
                ServerFrame::UserLeft(_) => EventKind::UserLeft,
                ServerFrame::UserStatus(_) => EventKind::UserStatus,
                ServerFrame::Unknown => return None,
            },
            Self::Lifecycle(ConnectionEvent::Connected { .. }) => EventKind::Connected,
            Self::Lifecycle(ConnectionEvent::Disconnected { .. }) => EventKind::Disconnected,
            Self::Lifecycle(ConnectionEvent::DisconnectedPermanent) => {
                EventKind::DisconnectedPermanent
            },
        };
        Some(kind)
    }
}

impl From<ServerFrame> for Event {
    fn from(frame: ServerFrame) -> Self {
        Self::Frame(frame)
    }
}

impl From<ConnectionEvent> for Event {
    fn from(event: ConnectionEvent) -> Self {
        Self::Lifecycle(event)
    }
}

type Handler = Arc<dyn Fn(&Event) -> Result<(), HandlerError> + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<(u64, Handler)>>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // Handlers never run under the lock, so a poisoned registry is still consistent.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Event dispatcher.
///
/// Cheap to clone; clones share one registry.
#[derive(Clone, Default)]
pub struct Dispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = lock(&self.registry);
        let counts: HashMap<_, _> =
            registry.handlers.iter().map(|(kind, list)| (kind.as_str(), list.len())).collect();
        f.debug_struct("Dispatcher").field("handlers", &counts).finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`.
    ///
    /// The handler stays registered until [`Subscription::unsubscribe`] is
    /// called. Dropping the subscription does not unsubscribe.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.handlers.entry(kind).or_default().push((id, Arc::new(handler)));

        tracing::debug!(%kind, id, "handler registered");
        Subscription { kind, id, registry: Arc::downgrade(&self.registry) }
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        lock(&self.registry).handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `event` to every handler registered for its kind.
    ///
    /// Returns the number of handlers that completed successfully.
    pub fn dispatch(&self, event: &Event) -> usize {
        let Some(kind) = event.kind() else {
            tracing::debug!("dropping event of unknown kind");
            return 0;
        };

        let snapshot: Vec<Handler> = {
            let registry = lock(&self.registry);
            match registry.handlers.get(&kind) {
                Some(list) => list.iter().map(|(_, handler)| Arc::clone(handler)).collect(),
                None => return 0,
            }
        };

        let mut succeeded = 0;
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => succeeded += 1,
                Ok(Err(error)) => tracing::warn!(%kind, %error, "event handler failed"),
                Err(_) => tracing::error!(%kind, "event handler panicked"),
            }
        }
        succeeded
    }
}

/// Handle returned by [`Dispatcher::on`].
#[derive(Debug, Clone)]
pub struct Subscription {
    kind: EventKind,
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Kind this subscription listens to.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Remove the handler. Idempotent; a no-op once removed or after the
    /// dispatcher is gone.
    pub fn unsubscribe(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = lock(&registry);
        if let Some(list) = registry.handlers.get_mut(&self.kind) {
            list.retain(|(id, _)| *id != self.id);
            if list.is_empty() {
                registry.handlers.remove(&self.kind);
            }
        }
    }
}
