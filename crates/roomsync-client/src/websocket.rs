//! WebSocket transport over tokio-tungstenite.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite};

use crate::{
    error::TransportError,
    transport::{Connector, Link},
};

/// Production [`Connector`] opening `ws://` and `wss://` links.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    /// New connector.
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WsConnector {
    type Link = WsLink;

    async fn connect(&self, url: &str) -> Result<WsLink, TransportError> {
        tracing::debug!(url = %redact(url), "opening websocket");
        let (stream, _response) =
            tokio_tungstenite::connect_async(url).await.map_err(connect_error)?;
        Ok(WsLink { stream })
    }
}

/// One open WebSocket.
#[derive(Debug)]
pub struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Link for WsLink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(tungstenite::Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Stream(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(tungstenite::Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(tungstenite::Message::Close(frame)) => {
                    tracing::debug!(?frame, "close frame received");
                    return None;
                },
                // Pings are answered by tungstenite on the next read or write.
                Ok(
                    tungstenite::Message::Ping(_)
                    | tungstenite::Message::Pong(_)
                    | tungstenite::Message::Frame(_),
                ) => {},
                Ok(tungstenite::Message::Binary(bytes)) => {
                    tracing::debug!(len = bytes.len(), "ignoring binary frame");
                },
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return None;
                },
                Err(e) => return Some(Err(TransportError::Stream(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(error) = self.stream.close(None).await {
            tracing::debug!(%error, "close failed");
        }
    }
}

fn connect_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::Http(response) => {
            TransportError::Handshake(response.status().to_string())
        },
        tungstenite::Error::Url(e) => TransportError::Connect(e.to_string()),
        other => TransportError::Connect(other.to_string()),
    }
}

/// Strip the query so credentials never reach the logs.
fn redact(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}
