//! Single-task runtime driving the synchronization state machines.
//!
//! The runtime owns the connection manager, room session, message store and
//! typing state, and is the only code that touches them. It waits on five
//! sources with `tokio::select!`:
//!
//! - commands from [`SyncClient`] handles
//! - the in-flight handshake of a connection attempt
//! - inbound frames from the open link
//! - completed API requests (history loads, posted messages)
//! - the earliest pending deadline (reconnect, typing stop, typing expiry)
//!
//! Each wake-up is handled to completion before the next, so inbound frames
//! are processed strictly in transport order. Internal state is updated and a
//! fresh [`ChatView`] published before subscribers are notified.

use std::{collections::VecDeque, future::pending, sync::Arc};

use futures::future::BoxFuture;
use roomsync_core::{
    ConnectionAction, ConnectionError, ConnectionEvent, ConnectionManager, Dispatcher,
    Environment, Event, LoadTicket, MessageStore, Presence, RemoteTyping, RoomSession,
    TypingDebouncer,
};
use roomsync_proto::{ClientFrame, Message, MessageId, NewMessage, Reaction, RoomId, ServerFrame};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinSet,
};

use crate::{
    ChatView, ClientConfig, SyncClient,
    error::{ApiError, ClientError, TransportError},
    transport::{Connector, Link, RoomApi},
};

/// Requests from [`SyncClient`] handles.
#[derive(Debug)]
pub(crate) enum Command {
    Connect { credential: Option<String>, reply: oneshot::Sender<Result<(), ClientError>> },
    Disconnect { reply: oneshot::Sender<()> },
    SelectRoom(RoomId),
    Reload,
    ClearRoom,
    Input { non_empty: bool },
    Submit { content: String, reply: oneshot::Sender<Result<Message, ClientError>> },
    React { message_id: MessageId, emoji: String },
    MarkRead { message_id: MessageId },
    Shutdown,
}

/// Result of a request running off the runtime task.
enum Completion {
    Loaded {
        ticket: LoadTicket,
        result: Result<Vec<Message>, ApiError>,
    },
    Posted {
        room: RoomId,
        result: Result<Message, ApiError>,
        reply: oneshot::Sender<Result<Message, ClientError>>,
    },
}

type PendingOpen<L> = BoxFuture<'static, Result<L, TransportError>>;

/// Runtime owning all synchronization state.
///
/// # Type Parameters
///
/// - `C`: socket connector
/// - `E`: time source
pub struct SyncRuntime<C, E>
where
    C: Connector,
    E: Environment,
{
    env: E,
    connector: Arc<C>,
    api: Arc<dyn RoomApi>,
    username: String,

    connection: ConnectionManager<E::Instant>,
    dispatcher: Dispatcher,
    session: RoomSession,
    store: MessageStore,
    typing: TypingDebouncer<E::Instant>,
    remote_typing: RemoteTyping<E::Instant>,
    presence: Presence,

    link: Option<C::Link>,
    pending_open: Option<PendingOpen<C::Link>>,
    connect_waiters: Vec<oneshot::Sender<Result<(), ClientError>>>,
    tasks: JoinSet<Completion>,

    commands: mpsc::Receiver<Command>,
    view: watch::Sender<ChatView>,
}

impl<C, E> SyncRuntime<C, E>
where
    C: Connector,
    E: Environment,
{
    /// Build a runtime and the handle that controls it.
    ///
    /// Nothing happens until [`SyncRuntime::run`] is awaited.
    pub fn new(
        config: ClientConfig,
        connector: C,
        api: Arc<dyn RoomApi>,
        env: E,
    ) -> (Self, SyncClient) {
        let (commands_tx, commands) = mpsc::channel(config.command_capacity.max(1));
        let (view, view_rx) = watch::channel(ChatView::default());
        let dispatcher = Dispatcher::new();
        let client = SyncClient::new(commands_tx, view_rx, dispatcher.clone());

        let runtime = Self {
            env,
            connector: Arc::new(connector),
            api,
            connection: ConnectionManager::new(config.connection),
            dispatcher,
            session: RoomSession::new(),
            store: MessageStore::new(),
            typing: TypingDebouncer::new(config.typing.idle_timeout),
            remote_typing: RemoteTyping::new(config.username.clone(), config.typing.remote_ttl),
            presence: Presence::new(),
            username: config.username,
            link: None,
            pending_open: None,
            connect_waiters: Vec::new(),
            tasks: JoinSet::new(),
            commands,
            view,
        };
        (runtime, client)
    }

    /// Run until [`SyncClient::shutdown`] is called or every handle is
    /// dropped.
    pub async fn run(mut self) {
        tracing::debug!("sync runtime started");

        loop {
            let deadline = self.next_deadline();

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                result = open_opt(&mut self.pending_open) => {
                    self.pending_open = None;
                    self.handle_open_result(result).await;
                },
                incoming = recv_opt(&mut self.link) => self.handle_incoming(incoming).await,
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => match joined {
                    Ok(completion) => self.handle_completion(completion),
                    Err(error) => tracing::error!(%error, "background request aborted"),
                },
                () = sleep_opt(&self.env, deadline) => self.handle_tick().await,
            }

            self.publish();
        }

        self.disconnect().await;
        self.tasks.abort_all();
        self.publish();
        tracing::debug!("sync runtime stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { credential, reply } => self.connect(credential, reply).await,
            Command::Disconnect { reply } => {
                self.disconnect().await;
                let _ = reply.send(());
            },
            Command::SelectRoom(room) => self.select_room(room).await,
            Command::Reload => match self.store.reload() {
                Some(ticket) => self.spawn_load(ticket, false),
                None => tracing::warn!("reload without an active room"),
            },
            Command::ClearRoom => {
                let mut frames = self.typing.stop();
                frames.extend(self.session.clear());
                self.send_frames(frames).await;
                self.store.clear_room();
            },
            Command::Input { non_empty } => {
                let Some(room) = self.session.active_room().cloned() else {
                    return;
                };
                // Typing is only announced on an open link.
                if !self.connection.is_open() {
                    return;
                }
                let now = self.env.now();
                let frames = self.typing.input(&room, non_empty, now);
                self.send_frames(frames).await;
            },
            Command::Submit { content, reply } => self.submit(content, reply).await,
            Command::React { message_id, emoji } => {
                let Some(room_id) = self.session.active_room().cloned() else {
                    tracing::warn!("reaction without an active room");
                    return;
                };
                let reaction = Reaction::new(emoji, self.username.clone());
                let frame = ClientFrame::MessageReaction { room_id, message_id, reaction };
                self.send_frames(vec![frame]).await;
            },
            Command::MarkRead { message_id } => {
                let Some(room_id) = self.session.active_room().cloned() else {
                    return;
                };
                self.send_frames(vec![ClientFrame::ReadReceipt { room_id, message_id }]).await;
            },
            Command::Shutdown => {},
        }
    }

    async fn connect(
        &mut self,
        credential: Option<String>,
        reply: oneshot::Sender<Result<(), ClientError>>,
    ) {
        match self.connection.connect(credential.as_deref()) {
            Err(error) => {
                tracing::warn!(%error, "connect rejected");
                let _ = reply.send(Err(error.into()));
            },
            Ok(actions) => {
                if self.connection.is_open() {
                    let _ = reply.send(Ok(()));
                } else {
                    self.connect_waiters.push(reply);
                }
                self.drive(actions).await;
            },
        }
    }

    async fn disconnect(&mut self) {
        let frames = self.typing.stop();
        self.send_frames(frames).await;

        let actions = self.connection.disconnect();
        self.drive(actions).await;

        self.session.handle_disconnected();
        self.remote_typing.clear();
        self.resolve_waiters(Err(ConnectionError::Cancelled));
    }

    async fn select_room(&mut self, room: RoomId) {
        if self.session.active_room() == Some(&room) {
            return;
        }

        let mut frames = self.typing.stop();
        frames.extend(self.session.select_room(room.clone()));
        self.send_frames(frames).await;

        let ticket = self.store.switch_room(room);
        self.spawn_load(ticket, true);
    }

    /// Fetch history for `ticket` off the runtime task, joining the room
    /// first when `join` is set.
    fn spawn_load(&mut self, ticket: LoadTicket, join: bool) {
        let api = Arc::clone(&self.api);
        self.tasks.spawn(async move {
            let room = ticket.room().clone();
            if join {
                if let Err(error) = api.post_join_room(&room).await {
                    tracing::warn!(%room, %error, "join request failed");
                }
            }
            let result = api.fetch_room_messages(&room).await;
            Completion::Loaded { ticket, result }
        });
    }

    async fn submit(
        &mut self,
        content: String,
        reply: oneshot::Sender<Result<Message, ClientError>>,
    ) {
        let Some(room) = self.session.active_room().cloned() else {
            let _ = reply.send(Err(ClientError::NoActiveRoom));
            return;
        };

        let frames = self.typing.stop();
        self.send_frames(frames).await;

        let api = Arc::clone(&self.api);
        self.tasks.spawn(async move {
            let result = api.create_message(&room, &content).await;
            Completion::Posted { room, result, reply }
        });
    }

    async fn handle_open_result(&mut self, result: Result<C::Link, TransportError>) {
        match result {
            Ok(link) => {
                self.link = Some(link);
                let actions = self.connection.handle_open();
                self.drive(actions).await;
            },
            Err(error) => {
                let error = ConnectionError::from(error);
                self.resolve_waiters(Err(error.clone()));
                let now = self.env.now();
                let actions = self.connection.handle_open_failed(&error, now);
                self.drive(actions).await;
            },
        }
    }

    async fn handle_incoming(&mut self, incoming: Option<Result<String, TransportError>>) {
        match incoming {
            Some(Ok(text)) => {
                if let Some(frame) = self.connection.handle_incoming(&text) {
                    self.route(&frame);
                    self.publish();
                    self.dispatcher.dispatch(&Event::Frame(frame));
                }
            },
            Some(Err(error)) => {
                tracing::warn!(%error, "link failed");
                self.link_lost().await;
            },
            None => {
                tracing::info!("link closed by server");
                self.link_lost().await;
            },
        }
    }

    /// Apply a frame to internal state before subscribers see it.
    fn route(&mut self, frame: &ServerFrame) {
        tracing::debug!(kind = frame.kind(), "routing frame");
        match frame {
            ServerFrame::NewMessage(event) => {
                self.store.apply_new_message(event);
            },
            ServerFrame::MessageReaction(event) => {
                self.store.apply_reaction(event);
            },
            ServerFrame::MessageDeleted(event) => {
                self.store.apply_deletion(event);
            },
            ServerFrame::Typing(update) => {
                let now = self.env.now();
                self.remote_typing.apply(update, now);
            },
            ServerFrame::UserStatus(status) => {
                self.presence.apply(status);
            },
            ServerFrame::ReadReceipt(_)
            | ServerFrame::UserJoined(_)
            | ServerFrame::UserLeft(_)
            | ServerFrame::Unknown => {},
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Loaded { ticket, result: Ok(history) } => {
                self.store.complete_load(&ticket, history);
            },
            Completion::Loaded { ticket, result: Err(error) } => {
                self.store.fail_load(&ticket, error.to_string());
            },
            Completion::Posted { room, result, reply } => {
                let result = match result {
                    Ok(message) => {
                        let event = NewMessage { room_id: room, message: message.clone() };
                        self.store.apply_new_message(&event);
                        Ok(message)
                    },
                    Err(error) => {
                        tracing::warn!(%error, "posting message failed");
                        Err(ClientError::from(error))
                    },
                };
                let _ = reply.send(result);
            },
        }
    }

    async fn handle_tick(&mut self) {
        let now = self.env.now();

        let frames = self.typing.tick(now);
        self.send_frames(frames).await;

        self.remote_typing.expire(now);

        let actions = self.connection.tick(now);
        self.drive(actions).await;
    }

    async fn link_lost(&mut self) {
        self.link = None;
        let now = self.env.now();
        let actions = self.connection.handle_closed(now);
        self.drive(actions).await;
    }

    async fn send_frames(&mut self, frames: Vec<ClientFrame>) {
        let mut actions = Vec::with_capacity(frames.len());
        for frame in frames {
            match self.connection.send(&frame) {
                Ok(action) => actions.push(action),
                Err(error) => {
                    tracing::warn!(kind = frame.kind(), %error, "dropping outbound frame");
                },
            }
        }
        self.drive(actions).await;
    }

    /// Execute connection actions, including any they cause in turn.
    async fn drive(&mut self, actions: Vec<ConnectionAction>) {
        let mut queue: VecDeque<ConnectionAction> = actions.into();

        while let Some(action) = queue.pop_front() {
            match action {
                ConnectionAction::OpenTransport { url } => {
                    self.link = None;
                    let connector = Arc::clone(&self.connector);
                    self.pending_open =
                        Some(Box::pin(async move { connector.connect(&url).await }));
                },
                ConnectionAction::CloseTransport => {
                    self.pending_open = None;
                    if let Some(mut link) = self.link.take() {
                        link.close().await;
                    }
                    let now = self.env.now();
                    queue.extend(self.connection.handle_closed(now));
                },
                ConnectionAction::SendText(text) => {
                    let Some(link) = self.link.as_mut() else {
                        continue;
                    };
                    if let Err(error) = link.send(text).await {
                        tracing::warn!(%error, "write failed");
                        self.link = None;
                        let now = self.env.now();
                        queue.extend(self.connection.handle_closed(now));
                    }
                },
                ConnectionAction::ScheduleReconnect { attempt, delay } => {
                    tracing::debug!(attempt, ?delay, "reconnect pending");
                },
                ConnectionAction::Emit(event) => {
                    for frame in self.on_lifecycle(event) {
                        match self.connection.send(&frame) {
                            Ok(action) => queue.push_back(action),
                            Err(error) => tracing::warn!(%error, "dropping outbound frame"),
                        }
                    }
                },
            }
        }
    }

    /// Update internal state for a lifecycle change, notify subscribers, and
    /// return frames to send.
    fn on_lifecycle(&mut self, event: ConnectionEvent) -> Vec<ClientFrame> {
        let frames = match event {
            ConnectionEvent::Connected { epoch } => {
                self.resolve_waiters(Ok(()));
                self.session.handle_connected(epoch)
            },
            ConnectionEvent::Disconnected { .. } => {
                self.session.handle_disconnected();
                // Nothing can be sent on a dead link.
                let _unsent = self.typing.stop();
                self.remote_typing.clear();
                self.presence.clear();
                Vec::new()
            },
            ConnectionEvent::DisconnectedPermanent => Vec::new(),
        };
        self.publish();
        self.dispatcher.dispatch(&Event::Lifecycle(event));
        frames
    }

    fn resolve_waiters(&mut self, result: Result<(), ConnectionError>) {
        for waiter in self.connect_waiters.drain(..) {
            let _ = waiter.send(result.clone().map_err(ClientError::from));
        }
    }

    fn next_deadline(&self) -> Option<E::Instant> {
        [self.connection.next_deadline(), self.typing.deadline(), self.remote_typing.next_expiry()]
            .into_iter()
            .flatten()
            .min()
    }

    fn snapshot(&self) -> ChatView {
        let active_room = self.store.active_room().cloned();
        ChatView {
            connection: self.connection.state(),
            permanently_disconnected: self.connection.is_permanently_disconnected(),
            typing_users: active_room
                .as_ref()
                .map(|room| self.remote_typing.users(room).to_vec())
                .unwrap_or_default(),
            active_room,
            messages: self.store.messages().to_vec(),
            loading: self.store.is_loading(),
            last_error: self.store.last_error().map(str::to_string),
            online_users: self.presence.online_users(),
        }
    }

    fn publish(&self) {
        let view = self.snapshot();
        self.view.send_if_modified(|current| {
            if *current == view {
                return false;
            }
            *current = view;
            true
        });
    }
}

async fn open_opt<L>(pending_open: &mut Option<PendingOpen<L>>) -> Result<L, TransportError> {
    match pending_open {
        Some(handshake) => handshake.await,
        None => pending().await,
    }
}

async fn recv_opt<L: Link>(link: &mut Option<L>) -> Option<Result<String, TransportError>> {
    match link {
        Some(link) => link.recv().await,
        None => pending().await,
    }
}

async fn sleep_opt<E: Environment>(env: &E, deadline: Option<E::Instant>) {
    match deadline {
        Some(deadline) => env.sleep(env.until(deadline)).await,
        None => pending().await,
    }
}
