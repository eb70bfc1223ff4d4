//! Handle for controlling a running [`SyncRuntime`].

use std::sync::Arc;

use roomsync_core::{Dispatcher, Environment, Event, EventKind, HandlerError, Subscription};
use roomsync_proto::{Message, MessageId, RoomId};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::{
    ChatView, ClientConfig, SyncRuntime,
    error::ClientError,
    runtime::Command,
    transport::{Connector, RoomApi},
};

/// Cloneable handle to a sync runtime.
///
/// Every method forwards a command to the runtime task. Methods that only
/// announce something (typing, reactions, read receipts) return once the
/// command is queued; sends while disconnected are dropped and logged by the
/// runtime.
#[derive(Debug, Clone)]
pub struct SyncClient {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<ChatView>,
    dispatcher: Dispatcher,
}

impl SyncClient {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        view: watch::Receiver<ChatView>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self { commands, view, dispatcher }
    }

    /// Build a runtime and spawn it on the current tokio runtime.
    pub fn spawn<C, E>(
        config: ClientConfig,
        connector: C,
        api: Arc<dyn RoomApi>,
        env: E,
    ) -> (Self, JoinHandle<()>)
    where
        C: Connector,
        E: Environment,
    {
        let (runtime, client) = SyncRuntime::new(config, connector, api, env);
        let handle = tokio::spawn(runtime.run());
        (client, handle)
    }

    async fn command(&self, command: Command) -> Result<(), ClientError> {
        self.commands.send(command).await.map_err(|_| ClientError::RuntimeStopped)
    }

    /// Connect with `credential` and wait for the handshake.
    ///
    /// Returns immediately when already open. Concurrent calls share one
    /// attempt. A failed handshake is returned here and also starts the
    /// reconnection policy.
    pub async fn connect(&self, credential: impl Into<String>) -> Result<(), ClientError> {
        self.connect_with(Some(credential.into())).await
    }

    /// Like [`SyncClient::connect`] with an optional credential.
    pub async fn connect_with(&self, credential: Option<String>) -> Result<(), ClientError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Connect { credential, reply }).await?;
        rx.await.map_err(|_| ClientError::RuntimeStopped)?
    }

    /// Close the connection and stop reconnecting.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Disconnect { reply }).await?;
        rx.await.map_err(|_| ClientError::RuntimeStopped)
    }

    /// Make `room` the active room: join it and load its history.
    pub async fn select_room(&self, room: impl Into<RoomId>) -> Result<(), ClientError> {
        self.command(Command::SelectRoom(room.into())).await
    }

    /// Fetch the active room's history again.
    ///
    /// The current log stays visible until the fetch completes. When reloads
    /// overlap, only the most recent one is applied.
    pub async fn reload(&self) -> Result<(), ClientError> {
        self.command(Command::Reload).await
    }

    /// Leave the active room.
    pub async fn clear_room(&self) -> Result<(), ClientError> {
        self.command(Command::ClearRoom).await
    }

    /// Report the current content of the input box.
    pub async fn input(&self, text: &str) -> Result<(), ClientError> {
        self.command(Command::Input { non_empty: !text.is_empty() }).await
    }

    /// Post a message to the active room. Stops typing first.
    ///
    /// The stored message is merged into the log right away; the server's
    /// `new_message` echo is de-duplicated.
    pub async fn submit(&self, content: impl Into<String>) -> Result<Message, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Submit { content: content.into(), reply }).await?;
        rx.await.map_err(|_| ClientError::RuntimeStopped)?
    }

    /// React to a message in the active room.
    pub async fn react(
        &self,
        message_id: MessageId,
        emoji: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.command(Command::React { message_id, emoji: emoji.into() }).await
    }

    /// Mark a message in the active room as read.
    pub async fn mark_read(&self, message_id: MessageId) -> Result<(), ClientError> {
        self.command(Command::MarkRead { message_id }).await
    }

    /// Stop the runtime. Disconnects first.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.command(Command::Shutdown).await
    }

    /// Subscribe to events of `kind`.
    ///
    /// Handlers run on the runtime task after the view was published, so
    /// [`SyncClient::view`] already reflects the event. Handlers must not
    /// block on other [`SyncClient`] methods.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.dispatcher.on(kind, handler)
    }

    /// Latest published view.
    pub fn view(&self) -> ChatView {
        self.view.borrow().clone()
    }

    /// Receiver notified whenever the view changes.
    pub fn watch(&self) -> watch::Receiver<ChatView> {
        self.view.clone()
    }

    /// Wait until the view satisfies `predicate` and return it.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<ChatView, ClientError>
    where
        F: FnMut(&ChatView) -> bool,
    {
        let mut view = self.view.clone();
        let matched = view
            .wait_for(|current| predicate(current))
            .await
            .map_err(|_| ClientError::RuntimeStopped)?;
        Ok(matched.clone())
    }
}
