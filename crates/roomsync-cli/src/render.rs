//! Plain-text rendering of chat state.

use std::{collections::HashSet, fmt::Write as _};

use roomsync_client::ChatView;
use roomsync_core::{ConnectionEvent, Event};
use roomsync_proto::{Message, MessageKind, ServerFrame};

/// One message as a single line.
pub fn message(message: &Message) -> String {
    let mut line = format!("[{}] {}: ", message.id, message.author);
    match (message.kind, &message.file_url) {
        (MessageKind::File, Some(url)) => {
            let _ = write!(line, "<file {url}>");
        },
        _ => line.push_str(&message.content),
    }
    if !message.reactions.is_empty() {
        let emojis: Vec<_> = message.reactions.iter().map(|r| r.emoji.as_str()).collect();
        let _ = write!(line, "  ({})", emojis.join(" "));
    }
    line
}

/// The whole visible log of `view`, one message per line.
pub fn history(view: &ChatView) -> String {
    let header = match &view.active_room {
        Some(room) => format!("-- {room} ({} messages) --", view.messages.len()),
        None => "-- no room --".to_string(),
    };
    std::iter::once(header).chain(view.messages.iter().map(message)).collect::<Vec<_>>().join("\n")
}

/// Lines describing what changed between two published views.
///
/// A finished load prints the whole log (or the load error). Otherwise only
/// messages whose id was not visible before are printed, so the output
/// follows the reconciled log rather than raw deliveries.
pub fn changes(previous: &ChatView, current: &ChatView) -> Vec<String> {
    let mut lines = Vec::new();

    if previous.loading && !current.loading {
        match &current.last_error {
            Some(error) => lines.push(format!("* could not load history: {error}")),
            None => lines.push(history(current)),
        }
    } else if !current.loading && previous.active_room == current.active_room {
        let seen: HashSet<_> = previous.messages.iter().map(|m| m.id).collect();
        lines.extend(current.messages.iter().filter(|m| !seen.contains(&m.id)).map(message));
    }

    if previous.typing_users != current.typing_users {
        lines.extend(typing(&current.typing_users));
    }
    lines
}

/// Notice line for an event, or `None` when the event is not shown.
pub fn event(event: &Event) -> Option<String> {
    match event {
        Event::Frame(ServerFrame::UserJoined(notice)) => {
            Some(format!("* {} joined {}", notice.username, notice.room_id))
        },
        Event::Frame(ServerFrame::UserLeft(notice)) => {
            Some(format!("* {} left {}", notice.username, notice.room_id))
        },
        Event::Lifecycle(ConnectionEvent::Connected { .. }) => Some("* connected".to_string()),
        Event::Lifecycle(ConnectionEvent::Disconnected { retrying: true }) => {
            Some("* connection lost, retrying".to_string())
        },
        Event::Lifecycle(ConnectionEvent::Disconnected { retrying: false }) => {
            Some("* disconnected".to_string())
        },
        Event::Lifecycle(ConnectionEvent::DisconnectedPermanent) => {
            Some("* giving up; restart to reconnect".to_string())
        },
        Event::Frame(_) => None,
    }
}

/// Typing indicator line, or `None` when nobody types.
pub fn typing(users: &[String]) -> Option<String> {
    match users {
        [] => None,
        [one] => Some(format!("* {one} is typing")),
        many => Some(format!("* {} are typing", many.join(", "))),
    }
}
