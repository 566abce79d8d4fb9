//! `FromStr` for [`Message`].

use std::borrow::Cow;
use std::str::FromStr;

use crate::error::{MessageParseError, ProtocolError};
use crate::prefix::Prefix;

use super::grammar::{self, RawTag};
use super::tags::unescape_tag_value;
use super::types::{Message, Tag};

/// Intern common tag keys to avoid allocations.
#[inline]
fn intern_tag_key(key: &str) -> Cow<'static, str> {
    match key {
        "msgid" => Cow::Borrowed("msgid"),
        "time" => Cow::Borrowed("time"),
        "batch" => Cow::Borrowed("batch"),
        "account" => Cow::Borrowed("account"),
        "label" => Cow::Borrowed("label"),
        _ => Cow::Owned(key.to_owned()),
    }
}

fn owned_tag((key, value): RawTag<'_>) -> Tag {
    Tag(intern_tag_key(key), value.map(unescape_tag_value))
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Message, Self::Err> {
        let line = s.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(ProtocolError::InvalidMessage {
                string: s.to_owned(),
                cause: MessageParseError::EmptyMessage,
            });
        }
        if line.starts_with('@') && !line.contains(' ') {
            return Err(ProtocolError::InvalidMessage {
                string: s.to_owned(),
                cause: MessageParseError::UnterminatedTags,
            });
        }

        let parts = grammar::split(line).map_err(|err| ProtocolError::InvalidMessage {
            string: s.to_owned(),
            cause: MessageParseError::ParseContext {
                position: err.position,
                context: format!("{:?}", err.kind),
            },
        })?;

        Ok(Message {
            tags: parts
                .tags
                .map(|tags| tags.into_iter().map(owned_tag).collect()),
            prefix: parts.source.map(Prefix::new_from_str),
            command: parts.command.to_ascii_uppercase(),
            params: parts.params.into_iter().map(str::to_owned).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_ping() {
        let msg: Message = "PING :server\r\n".parse().unwrap();
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.params, vec!["server"]);
    }

    #[test]
    fn test_parse_full_line() {
        let msg: Message = "@time=2023-01-01T00:00:00Z;+draft/x=a\\sb :nick!user@host PRIVMSG #ch :Hi there"
            .parse()
            .unwrap();
        assert_eq!(msg.server_time(), Some("2023-01-01T00:00:00Z"));
        assert_eq!(msg.tag_value("+draft/x"), Some("a b"));
        assert_eq!(msg.source_nickname(), Some("nick"));
        assert_eq!(msg.params, vec!["#ch", "Hi there"]);
    }

    #[test]
    fn test_lowercase_command_is_normalized() {
        let msg: Message = "privmsg #ch :x".parse().unwrap();
        assert_eq!(msg.command, "PRIVMSG");
    }

    #[test]
    fn test_empty_and_garbage() {
        assert!(matches!(
            "".parse::<Message>(),
            Err(ProtocolError::InvalidMessage {
                cause: MessageParseError::EmptyMessage,
                ..
            })
        ));
        assert!(matches!(
            "\r\n".parse::<Message>(),
            Err(ProtocolError::InvalidMessage {
                cause: MessageParseError::EmptyMessage,
                ..
            })
        ));
        assert!(matches!(
            "@a=b".parse::<Message>(),
            Err(ProtocolError::InvalidMessage {
                cause: MessageParseError::UnterminatedTags,
                ..
            })
        ));
        assert!(":only-a-prefix".parse::<Message>().is_err());
    }
}
