//! Connector and link over a [`SimServer`].

use roomsync_client::{Connector, Link, TransportError};
use tokio::sync::mpsc;

use crate::SimServer;

/// [`Connector`] opening links to a [`SimServer`].
#[derive(Debug, Clone)]
pub struct SimConnector {
    server: SimServer,
}

impl SimConnector {
    /// Connector for `server`.
    pub fn new(server: SimServer) -> Self {
        Self { server }
    }
}

impl Connector for SimConnector {
    type Link = SimLink;

    async fn connect(&self, url: &str) -> Result<SimLink, TransportError> {
        let delay = self.server.handshake_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let accepted = self.server.accept(url)?;
        Ok(SimLink { id: accepted.id, inbound: accepted.inbound, server: self.server.clone() })
    }
}

/// Client side of a simulated link.
#[derive(Debug)]
pub struct SimLink {
    id: u64,
    inbound: mpsc::UnboundedReceiver<String>,
    server: SimServer,
}

impl Link for SimLink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.server.receive(self.id, text)
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.server.release(self.id);
        self.inbound.close();
    }
}

impl Drop for SimLink {
    fn drop(&mut self) {
        self.server.release(self.id);
    }
}
