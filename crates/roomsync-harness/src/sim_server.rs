//! Scripted in-memory chat server.
//!
//! `SimServer` stands in for the push side of a real server. Tests drive it
//! explicitly: accept or reject handshakes, push frames to every open link,
//! drop links to simulate network loss, and inspect what the client wrote.
//! Links are plain tokio channels, so everything runs on a paused clock.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use roomsync_client::TransportError;
use roomsync_proto::{ClientFrame, ServerFrame};
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct ServerState {
    /// Open links (`link_id` → sender toward the client).
    links: BTreeMap<u64, mpsc::UnboundedSender<String>>,
    next_link_id: u64,
    /// Every URL a handshake was attempted with, in order.
    attempts: Vec<String>,
    /// Handshakes still to reject.
    reject_remaining: u32,
    reject_all: bool,
    handshake_delay: Duration,
    /// Frames received from clients, decoded.
    received: Vec<ClientFrame>,
    /// Text that failed to decode.
    malformed: Vec<String>,
}

/// Handle to a shared simulated server. Clones refer to the same server.
#[derive(Debug, Clone, Default)]
pub struct SimServer {
    state: Arc<Mutex<ServerState>>,
}

/// Server side of an accepted link.
#[derive(Debug)]
pub(crate) struct Accepted {
    pub(crate) id: u64,
    pub(crate) inbound: mpsc::UnboundedReceiver<String>,
}

impl SimServer {
    /// Server accepting every handshake immediately.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reject the next `count` handshakes.
    pub fn reject_next(&self, count: u32) {
        self.lock().reject_remaining = count;
    }

    /// Reject every handshake until called again with `false`.
    pub fn reject_all(&self, reject: bool) {
        self.lock().reject_all = reject;
    }

    /// Delay before a handshake completes.
    pub fn set_handshake_delay(&self, delay: Duration) {
        self.lock().handshake_delay = delay;
    }

    pub(crate) fn handshake_delay(&self) -> Duration {
        self.lock().handshake_delay
    }

    /// Record a handshake attempt and accept or reject it.
    pub(crate) fn accept(&self, url: &str) -> Result<Accepted, TransportError> {
        let mut state = self.lock();
        state.attempts.push(url.to_string());

        if state.reject_all || state.reject_remaining > 0 {
            state.reject_remaining = state.reject_remaining.saturating_sub(1);
            tracing::debug!(url, "sim server rejecting handshake");
            return Err(TransportError::Handshake("401 Unauthorized".into()));
        }

        let (tx, inbound) = mpsc::unbounded_channel();
        let id = state.next_link_id;
        state.next_link_id += 1;
        state.links.insert(id, tx);
        Ok(Accepted { id, inbound })
    }

    /// Record text written by a client on link `id`.
    pub(crate) fn receive(&self, id: u64, text: String) -> Result<(), TransportError> {
        let mut state = self.lock();
        if !state.links.contains_key(&id) {
            return Err(TransportError::Stream("link closed".into()));
        }
        match ClientFrame::decode(&text) {
            Ok(frame) => state.received.push(frame),
            Err(_) => state.malformed.push(text),
        }
        Ok(())
    }

    /// Forget link `id` after the client closed it.
    pub(crate) fn release(&self, id: u64) {
        self.lock().links.remove(&id);
    }

    /// Send a frame to every open link.
    pub fn push(&self, frame: &ServerFrame) {
        match frame.encode() {
            Ok(text) => self.push_raw(&text),
            Err(error) => tracing::error!(%error, "sim server cannot encode frame"),
        }
    }

    /// Send raw text to every open link.
    pub fn push_raw(&self, text: &str) {
        let state = self.lock();
        for tx in state.links.values() {
            let _ = tx.send(text.to_string());
        }
    }

    /// Close every open link from the server side.
    pub fn drop_links(&self) {
        let dropped = std::mem::take(&mut self.lock().links);
        tracing::debug!(count = dropped.len(), "sim server dropping links");
    }

    /// Number of currently open links.
    pub fn open_links(&self) -> usize {
        self.lock().links.len()
    }

    /// Number of handshake attempts so far.
    pub fn attempts(&self) -> usize {
        self.lock().attempts.len()
    }

    /// URLs of all handshake attempts.
    pub fn attempt_urls(&self) -> Vec<String> {
        self.lock().attempts.clone()
    }

    /// Frames received from clients, in arrival order.
    pub fn received(&self) -> Vec<ClientFrame> {
        self.lock().received.clone()
    }

    /// Drain the received frames.
    pub fn take_received(&self) -> Vec<ClientFrame> {
        std::mem::take(&mut self.lock().received)
    }

    /// Received text that was not a valid client frame.
    pub fn malformed(&self) -> Vec<String> {
        self.lock().malformed.clone()
    }
}
