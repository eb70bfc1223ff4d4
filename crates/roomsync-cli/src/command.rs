//! Parsing of input lines.

use roomsync_proto::{MessageId, RoomId};
use thiserror::Error;

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/join <room>`
    Join(RoomId),
    /// `/leave`
    Leave,
    /// `/reload`
    Reload,
    /// `/react <message-id> <emoji>`
    React(MessageId, String),
    /// `/read <message-id>`
    Read(MessageId),
    /// `/quit`
    Quit,
    /// Anything not starting with `/`.
    Say(String),
}

/// Rejected input line.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Line was blank.
    #[error("nothing to send")]
    Empty,
    /// Unknown slash command.
    #[error("unknown command /{0}")]
    Unknown(String),
    /// Known command with bad arguments.
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl Command {
    /// Parse a line. Leading and trailing whitespace is ignored.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Self::Say(line.to_string()));
        };

        let mut words = rest.split_whitespace();
        let name = words.next().unwrap_or_default();
        match name {
            "join" => match (words.next(), words.next()) {
                (Some(room), None) => Ok(Self::Join(RoomId::parse(room))),
                _ => Err(ParseError::Usage("/join <room>")),
            },
            "leave" => Ok(Self::Leave),
            "reload" => Ok(Self::Reload),
            "react" => {
                let id = words.next().and_then(|w| w.parse().ok());
                match (id, words.next(), words.next()) {
                    (Some(id), Some(emoji), None) => Ok(Self::React(id, emoji.to_string())),
                    _ => Err(ParseError::Usage("/react <message-id> <emoji>")),
                }
            },
            "read" => match words.next().and_then(|w| w.parse().ok()) {
                Some(id) => Ok(Self::Read(id)),
                None => Err(ParseError::Usage("/read <message-id>")),
            },
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_said() {
        assert_eq!(Command::parse("  hello there "), Ok(Command::Say("hello there".into())));
    }

    #[test]
    fn join_parses_numeric_and_named_rooms() {
        assert_eq!(Command::parse("/join 4"), Ok(Command::Join(RoomId::Numeric(4))));
        assert_eq!(Command::parse("/join general"), Ok(Command::Join(RoomId::from("general"))));
        assert_eq!(Command::parse("/join"), Err(ParseError::Usage("/join <room>")));
    }

    #[test]
    fn bare_commands() {
        assert_eq!(Command::parse("/leave"), Ok(Command::Leave));
        assert_eq!(Command::parse("/reload"), Ok(Command::Reload));
        assert_eq!(Command::parse("/exit"), Ok(Command::Quit));
    }

    #[test]
    fn react_needs_id_and_emoji() {
        assert_eq!(Command::parse("/react 12 👍"), Ok(Command::React(12, "👍".into())));
        assert!(matches!(Command::parse("/react x 👍"), Err(ParseError::Usage(_))));
        assert!(matches!(Command::parse("/react 12"), Err(ParseError::Usage(_))));
    }

    #[test]
    fn rejects_blank_and_unknown() {
        assert_eq!(Command::parse("   "), Err(ParseError::Empty));
        assert_eq!(Command::parse("/dance"), Err(ParseError::Unknown("dance".into())));
        assert_eq!(Command::parse("/"), Err(ParseError::Unknown(String::new())));
    }
}
