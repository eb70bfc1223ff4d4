//! Runtime behaviour against a scripted server on a paused clock.
//!
//! Every test drives a full `SyncRuntime` through `SyncClient` handles. Time
//! only advances when all tasks are idle, so sleeps in these tests are exact.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use roomsync_client::{ChatView, ClientConfig, ClientError, SyncClient, SystemEnv};
use roomsync_core::{ConnectionError, ConnectionState, EventKind, HandlerError};
use roomsync_harness::{
    ClientSnapshot, InvariantRegistry, MemoryRoomApi, SimConnector, SimServer, SystemSnapshot,
};
use roomsync_proto::{
    ClientFrame, Message, MessageDeleted, NewMessage, Reaction, ReactionAdded, RoomId, ServerFrame,
    TypingUpdate, UserStatus,
};
use tokio::task::JoinHandle;

struct Fixture {
    server: SimServer,
    api: MemoryRoomApi,
    client: SyncClient,
    task: JoinHandle<()>,
}

fn fixture() -> Fixture {
    let server = SimServer::new();
    let api = MemoryRoomApi::new("alice").with_echo(server.clone());
    fixture_with(server, api)
}

fn fixture_with(server: SimServer, api: MemoryRoomApi) -> Fixture {
    let (client, task) = SyncClient::spawn(
        ClientConfig::for_user("alice"),
        SimConnector::new(server.clone()),
        Arc::new(api.clone()),
        SystemEnv::new(),
    );
    Fixture { server, api, client, task }
}

/// Let the runtime drain everything it can do without time passing.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn room(name: &str) -> RoomId {
    RoomId::from(name)
}

/// Wait until `name` is active and its history load has finished.
async fn loaded(client: &SyncClient, name: &str) -> ChatView {
    let target = room(name);
    client.wait_for(|v| v.active_room.as_ref() == Some(&target) && !v.loading).await.unwrap()
}

fn typing_frames(frames: &[ClientFrame]) -> Vec<bool> {
    frames
        .iter()
        .filter_map(|f| match f {
            ClientFrame::Typing { is_typing, .. } => Some(*is_typing),
            _ => None,
        })
        .collect()
}

fn push_message(server: &SimServer, id: u64, room_id: &str) {
    server.push(&ServerFrame::NewMessage(NewMessage {
        room_id: room(room_id),
        message: Message::text(id, room_id, "bob", format!("message {id}")),
    }));
}

fn assert_invariants(view: ChatView, context: &str) {
    let snapshot = SystemSnapshot::single(ClientSnapshot::new("alice", view));
    InvariantRegistry::standard().assert_all(&snapshot, context);
}

#[tokio::test(start_paused = true)]
async fn connect_then_select_joins_and_loads_history() {
    let f = fixture();
    f.api.seed("general", vec![
        Message::text(1, "general", "bob", "hi"),
        Message::text(2, "general", "carol", "hey"),
    ]);

    f.client.connect("tok").await.unwrap();
    f.client.select_room("general").await.unwrap();
    let view = f.client.wait_for(|v| !v.loading && !v.messages.is_empty()).await.unwrap();

    assert_eq!(view.connection, ConnectionState::Open);
    assert_eq!(view.message_ids(), vec![1, 2]);
    assert_eq!(f.server.received(), vec![ClientFrame::JoinRoom { room_id: room("general") }]);
    assert_eq!(f.api.joins(), vec![room("general")]);
    assert!(f.server.attempt_urls()[0].contains("token=tok"));
    assert_invariants(view, "after initial load");
}

#[tokio::test(start_paused = true)]
async fn missing_credential_never_opens_a_link() {
    let f = fixture();

    let result = f.client.connect("   ").await;

    assert_eq!(result, Err(ClientError::Connection(ConnectionError::MissingCredential)));
    let result = f.client.connect_with(None).await;
    assert_eq!(result, Err(ClientError::Connection(ConnectionError::MissingCredential)));
    settle().await;
    assert_eq!(f.server.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn room_selected_offline_is_joined_once_connected() {
    let f = fixture();

    f.client.select_room("general").await.unwrap();
    settle().await;
    assert!(f.server.received().is_empty());

    f.client.connect("tok").await.unwrap();
    settle().await;

    assert_eq!(f.server.received(), vec![ClientFrame::JoinRoom { room_id: room("general") }]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_connects_share_one_attempt() {
    let f = fixture();
    f.server.set_handshake_delay(Duration::from_millis(100));

    let (a, b) = tokio::join!(f.client.connect("tok"), f.client.connect("tok"));

    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(f.server.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn switching_rooms_discards_stale_history() {
    let f = fixture();
    f.api.seed("a", vec![Message::text(1, "a", "bob", "old room")]);
    f.api.seed("b", vec![Message::text(2, "b", "bob", "new room")]);
    f.api.set_latency("a", Duration::from_millis(500));

    f.client.connect("tok").await.unwrap();
    f.client.select_room("a").await.unwrap();
    f.client.select_room("b").await.unwrap();
    loaded(&f.client, "b").await;

    // Let the slow load for "a" complete.
    tokio::time::sleep(Duration::from_secs(1)).await;

    let view = f.client.view();
    assert_eq!(view.message_ids(), vec![2]);
    assert_eq!(f.server.received(), vec![
        ClientFrame::JoinRoom { room_id: room("a") },
        ClientFrame::LeaveRoom { room_id: room("a") },
        ClientFrame::JoinRoom { room_id: room("b") },
    ]);
    assert_invariants(view, "after stale load");
}

#[tokio::test(start_paused = true)]
async fn pushes_during_load_survive_the_load() {
    let f = fixture();
    f.api.seed("general", vec![Message::text(1, "general", "bob", "history")]);
    f.api.set_latency("general", Duration::from_millis(200));

    f.client.connect("tok").await.unwrap();
    f.client.select_room("general").await.unwrap();
    settle().await;
    assert!(f.client.view().loading);

    push_message(&f.server, 9, "general");
    let view = f.client.wait_for(|v| !v.loading).await.unwrap();

    assert_eq!(view.message_ids(), vec![1, 9]);
}

#[tokio::test(start_paused = true)]
async fn deletions_during_load_are_not_undone() {
    let f = fixture();
    f.api.seed(
        "general",
        vec![Message::text(1, "general", "bob", "one"), Message::text(2, "general", "bob", "two")],
    );
    f.api.set_latency("general", Duration::from_millis(200));

    f.client.connect("tok").await.unwrap();
    f.client.select_room("general").await.unwrap();
    settle().await;
    assert!(f.client.view().loading);

    f.server.push(&ServerFrame::MessageDeleted(MessageDeleted {
        message_id: 2,
        room_id: Some(room("general")),
    }));
    let view = f.client.wait_for(|v| !v.loading).await.unwrap();

    assert_eq!(view.message_ids(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn reload_refetches_the_active_room() {
    let f = fixture();
    f.api.seed("general", vec![Message::text(1, "general", "bob", "one")]);
    f.client.select_room("general").await.unwrap();
    loaded(&f.client, "general").await;

    f.api.seed("general", vec![Message::text(2, "general", "bob", "two")]);
    f.client.reload().await.unwrap();
    let view = f.client.wait_for(|v| v.message_ids() == vec![1, 2]).await.unwrap();

    assert!(!view.loading);
    assert_eq!(f.api.fetches(), vec![room("general"), room("general")]);
    assert_eq!(f.api.joins(), vec![room("general")]);
}

#[tokio::test(start_paused = true)]
async fn overlapping_reloads_apply_only_the_newest() {
    let f = fixture();
    f.api.seed("general", vec![Message::text(1, "general", "bob", "one")]);
    f.client.select_room("general").await.unwrap();
    loaded(&f.client, "general").await;

    // The older reload is slower and finishes last.
    f.api.set_latency("general", Duration::from_millis(500));
    f.client.reload().await.unwrap();
    settle().await;
    f.api.seed("general", vec![Message::text(2, "general", "bob", "two")]);
    f.api.set_latency("general", Duration::from_millis(100));
    f.client.reload().await.unwrap();

    let view = f.client.wait_for(|v| !v.loading).await.unwrap();
    assert_eq!(view.message_ids(), vec![1, 2]);

    f.api.seed("general", vec![Message::text(3, "general", "bob", "three")]);
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(f.api.fetches().len(), 3);
    assert_eq!(f.client.view().message_ids(), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn reload_without_room_is_ignored() {
    let f = fixture();
    f.client.reload().await.unwrap();
    settle().await;

    assert!(f.api.fetches().is_empty());
    assert!(!f.client.view().loading);
}

#[tokio::test(start_paused = true)]
async fn failed_load_is_reported_in_the_view() {
    let f = fixture();
    f.api.fail_room("general");

    f.client.select_room("general").await.unwrap();
    let view = loaded(&f.client, "general").await;

    assert!(view.messages.is_empty());
    assert!(view.last_error.as_deref().is_some_and(|e| e.contains("500")));
}

#[tokio::test(start_paused = true)]
async fn foreign_room_events_are_ignored() {
    let f = fixture();
    f.api.seed("general", vec![Message::text(1, "general", "bob", "hi")]);
    f.client.connect("tok").await.unwrap();
    f.client.select_room("general").await.unwrap();
    loaded(&f.client, "general").await;

    push_message(&f.server, 5, "random");
    f.server.push(&ServerFrame::MessageDeleted(MessageDeleted {
        message_id: 1,
        room_id: Some(room("random")),
    }));
    settle().await;

    assert_eq!(f.client.view().message_ids(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn reactions_and_deletions_apply_to_the_log() {
    let f = fixture();
    f.api.seed("general", vec![
        Message::text(1, "general", "bob", "hi"),
        Message::text(2, "general", "bob", "oops"),
    ]);
    f.client.connect("tok").await.unwrap();
    f.client.select_room("general").await.unwrap();
    loaded(&f.client, "general").await;

    f.server.push(&ServerFrame::MessageReaction(ReactionAdded {
        message_id: 1,
        room_id: None,
        reaction: Reaction::new("👍", "carol"),
    }));
    f.server.push(&ServerFrame::MessageDeleted(MessageDeleted { message_id: 2, room_id: None }));
    settle().await;

    let view = f.client.view();
    assert_eq!(view.message_ids(), vec![1]);
    assert_eq!(view.messages[0].reactions, vec![Reaction::new("👍", "carol")]);
}

#[tokio::test(start_paused = true)]
async fn submitted_message_and_its_echo_appear_once() {
    let f = fixture();
    f.client.connect("tok").await.unwrap();
    f.client.select_room("general").await.unwrap();
    loaded(&f.client, "general").await;

    let message = f.client.submit("hello").await.unwrap();
    settle().await;

    let view = f.client.view();
    assert_eq!(view.message_ids(), vec![message.id]);
    assert_eq!(view.messages[0].content, "hello");
    assert_invariants(view, "after echo");
}

#[tokio::test(start_paused = true)]
async fn submit_without_room_fails() {
    let f = fixture();
    f.client.connect("tok").await.unwrap();

    assert_eq!(f.client.submit("hello").await, Err(ClientError::NoActiveRoom));
}

#[tokio::test(start_paused = true)]
async fn typing_burst_sends_one_start_and_one_stop() {
    let f = fixture();
    f.client.connect("tok").await.unwrap();
    f.client.select_room("general").await.unwrap();
    settle().await;
    f.server.take_received();

    for text in ["h", "he", "hel", "hell"] {
        f.client.input(text).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    assert_eq!(typing_frames(&f.server.received()), vec![true]);

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(typing_frames(&f.server.received()), vec![true, false]);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(typing_frames(&f.server.received()), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn typing_burst_spanning_connect_is_paired() {
    let f = fixture();
    f.client.select_room("general").await.unwrap();
    f.client.input("h").await.unwrap();
    settle().await;

    f.client.connect("tok").await.unwrap();
    for text in ["he", "hel", "hell"] {
        f.client.input(text).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(typing_frames(&f.server.received()), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn submit_stops_typing_immediately() {
    let f = fixture();
    f.client.connect("tok").await.unwrap();
    f.client.select_room("general").await.unwrap();
    settle().await;
    f.server.take_received();

    f.client.input("hi").await.unwrap();
    f.client.submit("hi").await.unwrap();
    settle().await;
    assert_eq!(typing_frames(&f.server.received()), vec![true, false]);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(typing_frames(&f.server.received()), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn reaction_and_read_receipt_frames() {
    let f = fixture();
    f.client.connect("tok").await.unwrap();

    // No active room: nothing to announce.
    f.client.react(1, "👍").await.unwrap();
    f.client.mark_read(1).await.unwrap();
    settle().await;
    assert!(f.server.received().is_empty());

    f.client.select_room(7u64).await.unwrap();
    f.client.react(1, "👍").await.unwrap();
    f.client.mark_read(1).await.unwrap();
    settle().await;

    assert_eq!(f.server.received(), vec![
        ClientFrame::JoinRoom { room_id: RoomId::Numeric(7) },
        ClientFrame::MessageReaction {
            room_id: RoomId::Numeric(7),
            message_id: 1,
            reaction: Reaction::new("👍", "alice"),
        },
        ClientFrame::ReadReceipt { room_id: RoomId::Numeric(7), message_id: 1 },
    ]);
}

#[tokio::test(start_paused = true)]
async fn remote_typing_excludes_self_and_expires() {
    let f = fixture();
    f.client.connect("tok").await.unwrap();
    f.client.select_room("general").await.unwrap();
    settle().await;

    f.server.push(&ServerFrame::Typing(TypingUpdate {
        room_id: room("general"),
        users: vec!["bob".into(), "alice".into()],
    }));
    let view = f.client.wait_for(|v| !v.typing_users.is_empty()).await.unwrap();
    assert_eq!(view.typing_users, vec!["bob".to_string()]);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(f.client.view().typing_users.is_empty());
}

#[tokio::test(start_paused = true)]
async fn reconnects_and_rejoins_after_link_loss() {
    let f = fixture();
    f.client.connect("tok").await.unwrap();
    f.client.select_room("general").await.unwrap();
    settle().await;
    f.server.take_received();

    f.server.drop_links();
    f.client.wait_for(|v| !v.is_connected()).await.unwrap();
    let view = f.client.wait_for(ChatView::is_connected).await.unwrap();

    assert!(!view.permanently_disconnected);
    assert_eq!(f.server.attempts(), 2);
    assert_eq!(f.server.received(), vec![ClientFrame::JoinRoom { room_id: room("general") }]);
}

#[tokio::test(start_paused = true)]
async fn presence_is_forgotten_when_the_link_drops() {
    let f = fixture();
    f.client.connect("tok").await.unwrap();
    f.server.push(&ServerFrame::UserStatus(UserStatus {
        user_id: 7,
        username: "bob".into(),
        is_online: true,
        last_seen: None,
    }));
    let view = f.client.wait_for(|v| !v.online_users.is_empty()).await.unwrap();
    assert_eq!(view.online_users, vec!["bob".to_string()]);

    f.server.drop_links();
    let view = f.client.wait_for(|v| !v.is_connected()).await.unwrap();
    assert!(view.online_users.is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_announce_permanent_failure_once() {
    let f = fixture();
    let permanent = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&permanent);
    f.client.on(EventKind::DisconnectedPermanent, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    f.client.connect("tok").await.unwrap();
    f.server.reject_all(true);
    f.server.drop_links();
    let view = f.client.wait_for(|v| v.permanently_disconnected).await.unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(view.connection, ConnectionState::Disconnected);
    assert_eq!(f.server.attempts(), 6);
    assert_eq!(permanent.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn rejected_first_handshake_fails_connect_but_retries() {
    let f = fixture();
    f.server.reject_next(1);

    let result = f.client.connect("tok").await;

    assert!(matches!(result, Err(ClientError::Connection(ConnectionError::Handshake(_)))));
    f.client.wait_for(ChatView::is_connected).await.unwrap();
    assert_eq!(f.server.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn explicit_disconnect_stops_reconnecting() {
    let f = fixture();
    let disconnects = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&disconnects);
    f.client.on(EventKind::Disconnected, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    f.client.connect("tok").await.unwrap();
    f.client.select_room("general").await.unwrap();
    f.client.input("draft").await.unwrap();
    settle().await;

    f.client.disconnect().await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    let view = f.client.view();
    assert_eq!(view.connection, ConnectionState::Disconnected);
    assert_eq!(f.server.attempts(), 1);
    assert_eq!(f.server.open_links(), 0);
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(typing_frames(&f.server.received()), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn failing_handler_does_not_starve_others() {
    let f = fixture();
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    let observer = f.client.clone();

    f.client.on(EventKind::NewMessage, |_| Err(HandlerError::new("boom")));
    f.client.on(EventKind::NewMessage, |_| panic!("handler bug"));
    f.client.on(EventKind::NewMessage, move |_| {
        // The view is already up to date when subscribers run.
        assert_eq!(observer.view().message_ids(), vec![3]);
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    f.client.connect("tok").await.unwrap();
    f.client.select_room("general").await.unwrap();
    loaded(&f.client, "general").await;
    push_message(&f.server, 3, "general");
    settle().await;

    assert_eq!(delivered.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_runtime() {
    let f = fixture();
    f.client.connect("tok").await.unwrap();

    f.client.shutdown().await.unwrap();
    f.task.await.unwrap();

    assert_eq!(f.server.open_links(), 0);
    assert_eq!(f.client.select_room("general").await, Err(ClientError::RuntimeStopped));
}
