//! Property-based tests for frame encoding/decoding
//!
//! Generates arbitrary client and server frames and checks that the JSON codec
//! is lossless, that the `type` tag always matches `kind()`, and that decoding
//! arbitrary text never panics.

use proptest::prelude::*;
use roomsync_proto::{
    ClientFrame, Message, MessageDeleted, MessageKind, NewMessage, Reaction, ReactionAdded,
    RoomId, ServerFrame, TypingUpdate, UserStatus,
};

fn arbitrary_room() -> impl Strategy<Value = RoomId> {
    prop_oneof![any::<u64>().prop_map(RoomId::Numeric), "[a-z]{1,12}".prop_map(RoomId::Named),]
}

fn arbitrary_reaction() -> impl Strategy<Value = Reaction> {
    ("[😀👍🔥❤]", "[a-z]{1,8}", proptest::option::of(any::<u64>())).prop_map(
        |(emoji, author, user_id)| Reaction { emoji, author, user_id },
    )
}

fn arbitrary_message() -> impl Strategy<Value = Message> {
    (
        any::<u64>(),
        arbitrary_room(),
        "[a-z]{1,8}",
        ".{0,64}",
        prop_oneof![Just(MessageKind::Text), Just(MessageKind::File), Just(MessageKind::System)],
        prop::collection::vec(arbitrary_reaction(), 0..4),
    )
        .prop_map(|(id, room_id, author, content, kind, reactions)| Message {
            id,
            room_id,
            author,
            content,
            kind,
            timestamp: "2024-01-01T00:00:00".into(),
            file_url: None,
            reactions,
        })
}

fn arbitrary_client_frame() -> impl Strategy<Value = ClientFrame> {
    prop_oneof![
        arbitrary_room().prop_map(|room_id| ClientFrame::JoinRoom { room_id }),
        arbitrary_room().prop_map(|room_id| ClientFrame::LeaveRoom { room_id }),
        (arbitrary_room(), any::<bool>())
            .prop_map(|(room_id, is_typing)| ClientFrame::Typing { room_id, is_typing }),
        (arbitrary_room(), any::<u64>(), arbitrary_reaction()).prop_map(
            |(room_id, message_id, reaction)| ClientFrame::MessageReaction {
                room_id,
                message_id,
                reaction,
            }
        ),
        (arbitrary_room(), any::<u64>())
            .prop_map(|(room_id, message_id)| ClientFrame::ReadReceipt { room_id, message_id }),
    ]
}

fn arbitrary_server_frame() -> impl Strategy<Value = ServerFrame> {
    prop_oneof![
        arbitrary_message().prop_map(|message| ServerFrame::NewMessage(NewMessage {
            room_id: message.room_id.clone(),
            message,
        })),
        (arbitrary_room(), prop::collection::vec("[a-z]{1,8}", 0..5))
            .prop_map(|(room_id, users)| ServerFrame::Typing(TypingUpdate { room_id, users })),
        (any::<u64>(), proptest::option::of(arbitrary_room()), arbitrary_reaction()).prop_map(
            |(message_id, room_id, reaction)| ServerFrame::MessageReaction(ReactionAdded {
                message_id,
                room_id,
                reaction,
            })
        ),
        (any::<u64>(), proptest::option::of(arbitrary_room())).prop_map(|(message_id, room_id)| {
            ServerFrame::MessageDeleted(MessageDeleted { message_id, room_id })
        }),
        (any::<u64>(), "[a-z]{1,8}", any::<bool>()).prop_map(|(user_id, username, is_online)| {
            ServerFrame::UserStatus(UserStatus { user_id, username, is_online, last_seen: None })
        }),
    ]
}

#[test]
fn prop_client_frame_roundtrip() {
    proptest!(|(frame in arbitrary_client_frame())| {
        let text = frame.encode().expect("encode should succeed");
        let decoded = ClientFrame::decode(&text).expect("decode should succeed");

        // PROPERTY: Round-trip must be identity
        prop_assert_eq!(decoded, frame);
    });
}

#[test]
fn prop_server_frame_roundtrip() {
    proptest!(|(frame in arbitrary_server_frame())| {
        let text = frame.encode().expect("encode should succeed");
        let decoded = ServerFrame::decode(&text).expect("decode should succeed");

        prop_assert_eq!(decoded, frame);
    });
}

#[test]
fn prop_type_tag_matches_kind() {
    proptest!(|(frame in arbitrary_server_frame())| {
        let text = frame.encode().expect("encode should succeed");
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");

        // PROPERTY: `kind()` names the wire discriminant
        prop_assert_eq!(value["type"].as_str(), Some(frame.kind()));
    });
}

#[test]
fn prop_decode_arbitrary_text_never_panics() {
    proptest!(|(text in ".{0,256}")| {
        // PROPERTY: garbage input yields Ok or Err, never a panic
        let _ = ServerFrame::decode(&text);
    });
}

#[test]
fn prop_unknown_type_decodes_to_unknown() {
    proptest!(|(tag in "x_[a-z]{1,12}", room in any::<u64>())| {
        let text = format!(r#"{{"type":"{tag}","room_id":{room}}}"#);
        let decoded = ServerFrame::decode(&text).expect("unknown types are accepted");

        prop_assert_eq!(decoded, ServerFrame::Unknown);
    });
}
