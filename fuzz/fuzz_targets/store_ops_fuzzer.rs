//! Fuzz target for MessageStore
//!
//! # Strategy
//!
//! - Interleave room switches, reloads, load completions (current and stale tickets),
//!   pushes, reactions and deletions across a handful of rooms
//! - Room ids mix numeric and named forms, including `Named("1")` next to
//!   `Numeric(1)`
//!
//! # Invariants
//!
//! - Message ids in the log are unique
//! - Every message in the log belongs to the active room
//! - No active room means an empty log

#![no_main]

use std::collections::HashSet;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use roomsync_core::{LoadTicket, MessageStore};
use roomsync_proto::{Message, MessageDeleted, NewMessage, Reaction, ReactionAdded, RoomId};

#[derive(Debug, Clone, Arbitrary)]
enum RoomChoice {
    Numeric(u8),
    NamedDigit(u8),
    General,
}

impl RoomChoice {
    fn room(&self) -> RoomId {
        match self {
            Self::Numeric(n) => RoomId::Numeric(u64::from(n % 3)),
            Self::NamedDigit(n) => RoomId::Named((n % 3).to_string()),
            Self::General => RoomId::from("general"),
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
enum StoreOp {
    Switch(RoomChoice),
    Reload,
    Clear,
    CompleteLoad { ticket: u8, ids: Vec<u8> },
    FailLoad { ticket: u8 },
    Push { room: RoomChoice, id: u8 },
    React { room: Option<RoomChoice>, id: u8 },
    Delete { room: Option<RoomChoice>, id: u8 },
}

fuzz_target!(|ops: Vec<StoreOp>| {
    let mut store = MessageStore::new();
    let mut tickets: Vec<LoadTicket> = Vec::new();

    for op in ops {
        match op {
            StoreOp::Switch(choice) => tickets.push(store.switch_room(choice.room())),
            StoreOp::Reload => tickets.extend(store.reload()),
            StoreOp::Clear => store.clear_room(),
            StoreOp::CompleteLoad { ticket, ids } => {
                if tickets.is_empty() {
                    continue;
                }
                let ticket = &tickets[usize::from(ticket) % tickets.len()];
                let history = ids
                    .iter()
                    .map(|id| Message::text(u64::from(*id), ticket.room().clone(), "f", "x"))
                    .collect();
                store.complete_load(ticket, history);
            },
            StoreOp::FailLoad { ticket } => {
                if tickets.is_empty() {
                    continue;
                }
                let ticket = &tickets[usize::from(ticket) % tickets.len()];
                store.fail_load(ticket, "fuzz");
            },
            StoreOp::Push { room, id } => {
                let room_id = room.room();
                let message = Message::text(u64::from(id), room_id.clone(), "f", "x");
                store.apply_new_message(&NewMessage { room_id, message });
            },
            StoreOp::React { room, id } => {
                store.apply_reaction(&ReactionAdded {
                    message_id: u64::from(id),
                    room_id: room.map(|r| r.room()),
                    reaction: Reaction::new("+", "f"),
                });
            },
            StoreOp::Delete { room, id } => {
                store.apply_deletion(&MessageDeleted {
                    message_id: u64::from(id),
                    room_id: room.map(|r| r.room()),
                });
            },
        }

        let mut seen = HashSet::new();
        for message in store.messages() {
            assert!(seen.insert(message.id), "duplicate id {}", message.id);
            assert_eq!(Some(&message.room_id), store.active_room(), "foreign message in log");
        }
        if store.active_room().is_none() {
            assert!(store.messages().is_empty());
        }
    }
});
