//! Async runtime for Roomsync
//!
//! Drives the state machines from `roomsync-core` over a real (or simulated)
//! socket and a request/response API. A single [`SyncRuntime`] task owns all
//! state; any number of cloned [`SyncClient`] handles send it commands and
//! observe the published [`ChatView`].
//!
//! ```no_run
//! # async fn demo() -> Result<(), roomsync_client::ClientError> {
//! use std::sync::Arc;
//!
//! use roomsync_client::{ClientConfig, HttpRoomApi, SyncClient, SystemEnv, WsConnector};
//! use roomsync_core::EventKind;
//!
//! let api = Arc::new(HttpRoomApi::new("http://localhost:8000", "token"));
//! let config = ClientConfig::for_user("alice");
//! let (client, _task) = SyncClient::spawn(config, WsConnector::new(), api, SystemEnv::new());
//!
//! client.on(EventKind::NewMessage, |event| {
//!     tracing::info!(?event, "message");
//!     Ok(())
//! });
//! client.connect("token").await?;
//! client.select_room("general").await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod client;
pub mod config;
pub mod env;
pub mod error;
#[cfg(feature = "transport")]
pub mod http;
pub mod runtime;
pub mod transport;
pub mod view;
#[cfg(feature = "transport")]
pub mod websocket;

pub use client::SyncClient;
pub use config::{ClientConfig, DEFAULT_COMMAND_CAPACITY};
pub use env::SystemEnv;
pub use error::{ApiError, ClientError, TransportError};
#[cfg(feature = "transport")]
pub use http::HttpRoomApi;
pub use runtime::SyncRuntime;
pub use transport::{Connector, Link, RoomApi};
pub use view::ChatView;
#[cfg(feature = "transport")]
pub use websocket::{WsConnector, WsLink};
