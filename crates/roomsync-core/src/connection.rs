//! Connection lifecycle state machine.
//!
//! Owns the policy for one persistent socket: opening it with a credential,
//! writing frames while open, and reconnecting after unexpected closes with a
//! capped retry count and a fixed backoff. Uses the action pattern: methods
//! take time as input and return actions for the driver to execute. The
//! transport itself lives in the driver and is recreated for every attempt.
//!
//! # State Machine
//!
//! ```text
//!                 connect()                 open
//! ┌──────────────┐ ────────> ┌────────────┐ ─────> ┌──────┐
//! │ Disconnected │           │ Connecting │        │ Open │
//! └──────────────┘ <──────── └────────────┘        └──────┘
//!        ^  ^       closed/failed  ^                 │  │
//!        │  │                      │ reconnect due   │  │ disconnect()
//!        │  └──────────────────────┼─────────────────┘  ↓
//!        │        unexpected close │              ┌─────────┐
//!        └─────────────────────────┼───────────── │ Closing │
//!                  closed          │              └─────────┘
//! ```
//!
//! # Invariants
//!
//! - Bounded Retries: at most `max_retries` reconnects are scheduled between
//!   two successful opens. The close after the last one emits
//!   [`ConnectionEvent::DisconnectedPermanent`] exactly once.
//!
//! - Reset-on-Success: every successful open sets the retry count to zero.
//!
//! - Explicit Disconnect Is Terminal: after `disconnect()` no reconnect fires
//!   until the next `connect()`.

use std::time::Duration;

use roomsync_proto::{ClientFrame, ServerFrame};
use url::Url;

use crate::{env::MonotonicInstant, error::ConnectionError};

/// Reconnect attempts allowed between two successful opens.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Fixed delay before each reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Endpoint used when none is configured.
pub const DEFAULT_URL: &str = "ws://localhost:8000/ws";

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport. A reconnect may be scheduled.
    Disconnected,
    /// Handshake in flight.
    Connecting,
    /// Handshake completed, frames flow.
    Open,
    /// Local teardown requested, waiting for the transport to close.
    Closing,
}

/// Lifecycle notifications for subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Transport opened. `epoch` increments on every open.
    Connected {
        /// Connection epoch of this open.
        epoch: u64,
    },
    /// Transport closed unexpectedly.
    Disconnected {
        /// Whether a reconnect has been scheduled.
        retrying: bool,
    },
    /// Retries exhausted. Terminal until the next explicit `connect()`.
    DisconnectedPermanent,
}

/// Actions returned by the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Create a fresh transport and start the handshake.
    OpenTransport {
        /// Endpoint including the credential query parameter.
        url: String,
    },
    /// Tear down the current transport.
    CloseTransport,
    /// Write this text frame.
    SendText(String),
    /// A reconnect was scheduled; the deadline is in
    /// [`ConnectionManager::next_deadline`].
    ScheduleReconnect {
        /// 1-based attempt number.
        attempt: u32,
        /// Delay until the attempt.
        delay: Duration,
    },
    /// Deliver a lifecycle event to subscribers.
    Emit(ConnectionEvent),
}

/// Connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Socket endpoint. The credential is appended as a `token` query pair.
    pub url: String,
    /// Reconnect attempts allowed between successful opens.
    pub max_retries: u32,
    /// Fixed delay before each reconnect.
    pub reconnect_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Connection manager state machine.
///
/// Pure: no I/O, no clock. Generic over the instant type so tests can drive it
/// with virtual time.
#[derive(Debug, Clone)]
pub struct ConnectionManager<I: MonotonicInstant> {
    state: ConnectionState,
    config: ConnectionConfig,
    /// Endpoint with credential, fixed by the last `connect()`.
    endpoint: Option<String>,
    retry_count: u32,
    epoch: u64,
    reconnect_at: Option<I>,
    permanent: bool,
}

impl<I: MonotonicInstant> ConnectionManager<I> {
    /// Create a manager in [`ConnectionState::Disconnected`].
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            config,
            endpoint: None,
            retry_count: 0,
            epoch: 0,
            reconnect_at: None,
            permanent: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether frames can be sent.
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Reconnects scheduled since the last successful open.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Number of successful opens so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether retries were exhausted.
    pub fn is_permanently_disconnected(&self) -> bool {
        self.permanent
    }

    /// Pending reconnect deadline, if any.
    pub fn next_deadline(&self) -> Option<I> {
        self.reconnect_at
    }

    /// Configuration in use.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Start connecting with `credential`.
    ///
    /// Idempotent: when already open or connecting no second transport is
    /// created and no actions are returned. Otherwise the retry counter and
    /// any permanent-failure flag are reset.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::MissingCredential` if the credential is absent or
    ///   blank
    /// - `ConnectionError::InvalidUrl` if the configured endpoint cannot be
    ///   parsed
    pub fn connect(
        &mut self,
        credential: Option<&str>,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        let credential = credential.map(str::trim).filter(|c| !c.is_empty());
        let Some(credential) = credential else {
            return Err(ConnectionError::MissingCredential);
        };

        if matches!(self.state, ConnectionState::Open | ConnectionState::Connecting) {
            tracing::debug!(state = ?self.state, "connect ignored, connection already active");
            return Ok(Vec::new());
        }

        let mut url = Url::parse(&self.config.url)?;
        url.query_pairs_mut().append_pair("token", credential);
        let url = String::from(url);

        self.endpoint = Some(url.clone());
        self.retry_count = 0;
        self.permanent = false;
        self.reconnect_at = None;
        self.state = ConnectionState::Connecting;

        tracing::info!(endpoint = %self.config.url, "connecting");
        Ok(vec![ConnectionAction::OpenTransport { url }])
    }

    /// Handshake completed.
    pub fn handle_open(&mut self) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Connecting {
            tracing::debug!(state = ?self.state, "ignoring open for abandoned attempt");
            return Vec::new();
        }

        self.state = ConnectionState::Open;
        self.retry_count = 0;
        self.epoch += 1;
        tracing::info!(epoch = self.epoch, "connection open");

        vec![ConnectionAction::Emit(ConnectionEvent::Connected { epoch: self.epoch })]
    }

    /// Handshake failed. Counts as an unexpected close.
    pub fn handle_open_failed(&mut self, error: &ConnectionError, now: I) -> Vec<ConnectionAction> {
        tracing::warn!(%error, "connection attempt failed");
        self.handle_closed(now)
    }

    /// Transport closed.
    ///
    /// A close following `disconnect()` settles in `Disconnected` and is
    /// announced without retry. Any other close runs the reconnection policy.
    pub fn handle_closed(&mut self, now: I) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Disconnected => Vec::new(),
            ConnectionState::Closing => {
                self.state = ConnectionState::Disconnected;
                vec![ConnectionAction::Emit(ConnectionEvent::Disconnected { retrying: false })]
            },
            ConnectionState::Open | ConnectionState::Connecting => {
                self.state = ConnectionState::Disconnected;
                self.schedule_reconnect(now)
            },
        }
    }

    fn schedule_reconnect(&mut self, now: I) -> Vec<ConnectionAction> {
        if self.retry_count < self.config.max_retries {
            self.retry_count += 1;
            let delay = self.config.reconnect_delay;
            self.reconnect_at = Some(now + delay);
            tracing::info!(attempt = self.retry_count, ?delay, "reconnect scheduled");

            return vec![
                ConnectionAction::Emit(ConnectionEvent::Disconnected { retrying: true }),
                ConnectionAction::ScheduleReconnect { attempt: self.retry_count, delay },
            ];
        }

        let mut actions =
            vec![ConnectionAction::Emit(ConnectionEvent::Disconnected { retrying: false })];
        if !self.permanent {
            self.permanent = true;
            tracing::warn!(retries = self.retry_count, "reconnect attempts exhausted");
            actions.push(ConnectionAction::Emit(ConnectionEvent::DisconnectedPermanent));
        }
        actions
    }

    /// Fire a due reconnect.
    pub fn tick(&mut self, now: I) -> Vec<ConnectionAction> {
        let Some(deadline) = self.reconnect_at else {
            return Vec::new();
        };
        if now < deadline || self.state != ConnectionState::Disconnected {
            return Vec::new();
        }

        self.reconnect_at = None;
        let Some(url) = self.endpoint.clone() else {
            return Vec::new();
        };

        self.state = ConnectionState::Connecting;
        tracing::info!(attempt = self.retry_count, "reconnecting");
        vec![ConnectionAction::OpenTransport { url }]
    }

    /// Tear the connection down and suppress reconnection.
    ///
    /// Safe to call in any state, including before the first `connect()`.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        self.retry_count = self.config.max_retries;
        self.reconnect_at = None;

        match self.state {
            ConnectionState::Open | ConnectionState::Connecting => {
                tracing::info!("disconnecting");
                self.state = ConnectionState::Closing;
                vec![ConnectionAction::CloseTransport]
            },
            ConnectionState::Closing | ConnectionState::Disconnected => Vec::new(),
        }
    }

    /// Serialize `frame` for writing.
    ///
    /// Frames are never queued: a send while not open is dropped.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotConnected` if the connection is not open
    /// - `ConnectionError::Protocol` if the frame cannot be encoded
    pub fn send(&self, frame: &ClientFrame) -> Result<ConnectionAction, ConnectionError> {
        if self.state != ConnectionState::Open {
            return Err(ConnectionError::NotConnected { state: self.state });
        }
        Ok(ConnectionAction::SendText(frame.encode()?))
    }

    /// Parse inbound text.
    ///
    /// Malformed frames are logged and dropped. Unknown frame types are
    /// dropped silently.
    pub fn handle_incoming(&self, text: &str) -> Option<ServerFrame> {
        match ServerFrame::decode(text) {
            Ok(ServerFrame::Unknown) => {
                tracing::debug!("dropping frame of unknown type");
                None
            },
            Ok(frame) => Some(frame),
            Err(error) => {
                tracing::warn!(%error, len = text.len(), "dropping malformed frame");
                None
            },
        }
    }
}
