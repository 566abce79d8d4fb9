use std::borrow::Cow;

use crate::ctcp::{Ctcp, CtcpKind};
use crate::prefix::Prefix;

/// An IRCv3 message tag: key and optional value.
///
/// A tag without a value is a presence flag.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct Tag(pub Cow<'static, str>, pub Option<String>);

impl Tag {
    /// Create a new tag.
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Tag(Cow::Owned(key.into()), value)
    }

    /// The tag key.
    pub fn key(&self) -> &str {
        &self.0
    }

    /// The tag value, if any.
    pub fn value(&self) -> Option<&str> {
        self.1.as_deref()
    }
}

/// An owned, decomposed IRC line.
///
/// # Example
///
/// ```
/// use slirc_proto::Message;
///
/// let msg: Message = ":nick!user@host PRIVMSG #channel :Hello!".parse().unwrap();
/// assert_eq!(msg.command, "PRIVMSG");
/// assert_eq!(msg.params, vec!["#channel", "Hello!"]);
/// assert_eq!(msg.text(), Some("Hello!"));
/// ```
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Message {
    /// IRCv3 message tags (e.g., `time`, `msgid`).
    pub tags: Option<Vec<Tag>>,
    /// Message prefix/source (e.g., `nick!user@host`).
    pub prefix: Option<Prefix>,
    /// The command token, uppercased, or a three-digit numeric.
    pub command: String,
    /// Parameters in wire order, the trailing one included.
    pub params: Vec<String>,
}

impl Message {
    /// Build a message from a command and its parameters.
    pub fn new<C, I, P>(command: C, params: I) -> Self
    where
        C: Into<String>,
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Message {
            tags: None,
            prefix: None,
            command: command.into().to_ascii_uppercase(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Attach a source prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: Prefix) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Attach a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: Option<&str>) -> Self {
        self.tags
            .get_or_insert_with(Vec::new)
            .push(Tag::new(key, value.map(str::to_owned)));
        self
    }

    /// Create a PRIVMSG message to a target with text.
    #[must_use]
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        let params: [String; 2] = [target.into(), text.into()];
        Message::new("PRIVMSG", params)
    }

    /// Create a NOTICE message to a target with text.
    #[must_use]
    pub fn notice(target: impl Into<String>, text: impl Into<String>) -> Self {
        let params: [String; 2] = [target.into(), text.into()];
        Message::new("NOTICE", params)
    }

    /// The nickname from the prefix, if the source is a user.
    pub fn source_nickname(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nick)
    }

    /// Get the value of a tag by key.
    ///
    /// Returns `Some("")` for a presence-only tag.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .as_ref()?
            .iter()
            .find(|tag| tag.key() == key)
            .map(|tag| tag.value().unwrap_or(""))
    }

    /// Whether a tag with this key is present, with or without a value.
    pub fn has_tag(&self, key: &str) -> bool {
        self.tag_value(key).is_some()
    }

    /// The `server-time` tag value.
    pub fn server_time(&self) -> Option<&str> {
        self.tag_value("time")
    }

    /// The numeric code for three-digit commands.
    pub fn numeric(&self) -> Option<u16> {
        if self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit()) {
            self.command.parse().ok()
        } else {
            None
        }
    }

    /// Whether the command is a numeric reply.
    pub fn is_numeric(&self) -> bool {
        self.numeric().is_some()
    }

    /// The error code for numerics in the 400–599 range.
    pub fn error(&self) -> Option<u16> {
        self.numeric().filter(|n| (400..600).contains(n))
    }

    /// The first parameter, the target of most commands.
    pub fn target(&self) -> Option<&str> {
        self.params.first().map(String::as_str)
    }

    /// The last parameter, the free-form text of most commands.
    pub fn text(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Whether the first parameter names a channel, given the server's
    /// channel type characters and STATUSMSG prefixes.
    pub fn is_channel_target(&self, chantypes: &[char], statusmsg: &[char]) -> bool {
        self.target().is_some_and(|target| {
            let target = target.trim_start_matches(|c| statusmsg.contains(&c));
            target.starts_with(|c| chantypes.contains(&c))
        })
    }

    fn is_chat(&self) -> bool {
        self.command == "PRIVMSG" || self.command == "NOTICE"
    }

    /// The CTCP payload of a PRIVMSG/NOTICE.
    pub fn ctcp(&self) -> Option<Ctcp<'_>> {
        if !self.is_chat() {
            return None;
        }
        self.text().and_then(Ctcp::parse)
    }

    /// Whether this is a CTCP PRIVMSG/NOTICE.
    pub fn is_ctcp(&self) -> bool {
        self.ctcp().is_some()
    }

    /// Whether this is a CTCP ACTION.
    pub fn is_action(&self) -> bool {
        self.ctcp().is_some_and(|c| c.kind == CtcpKind::Action)
    }

    /// The text of a CTCP ACTION.
    pub fn action_text(&self) -> Option<&str> {
        self.ctcp()
            .filter(|c| c.kind == CtcpKind::Action)
            .map(|c| c.params.unwrap_or(""))
    }

    /// The CTCP payload without delimiters, e.g. `VERSION` or `PING 123`.
    pub fn ctcp_message(&self) -> Option<&str> {
        self.ctcp().map(|c| c.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uppercases_command() {
        let msg = Message::new("privmsg", ["#c", "hi"]);
        assert_eq!(msg.command, "PRIVMSG");
    }

    #[test]
    fn test_numeric_and_error() {
        let msg: Message = ":server 404 bot #chan :Cannot send".parse().unwrap();
        assert!(msg.is_numeric());
        assert_eq!(msg.numeric(), Some(404));
        assert_eq!(msg.error(), Some(404));

        let msg: Message = ":server 001 bot :Welcome".parse().unwrap();
        assert_eq!(msg.error(), None);

        let msg: Message = "PING :x".parse().unwrap();
        assert!(!msg.is_numeric());
    }

    #[test]
    fn test_tags_flag_and_value() {
        let msg: Message = "@key=value;flag :n!u@h PRIVMSG #c :x".parse().unwrap();
        assert_eq!(msg.tag_value("key"), Some("value"));
        assert_eq!(msg.tag_value("flag"), Some(""));
        assert!(msg.has_tag("flag"));
        assert!(!msg.has_tag("missing"));
    }

    #[test]
    fn test_action_detection() {
        let msg: Message = ":n!u@h PRIVMSG #c :\x01ACTION dances\x01".parse().unwrap();
        assert!(msg.is_ctcp());
        assert!(msg.is_action());
        assert_eq!(msg.action_text(), Some("dances"));
        assert_eq!(msg.ctcp_message(), Some("ACTION dances"));
    }

    #[test]
    fn test_ctcp_only_on_chat_commands() {
        let msg: Message = ":n!u@h TOPIC #c :\x01VERSION\x01".parse().unwrap();
        assert!(!msg.is_ctcp());
    }

    #[test]
    fn test_channel_target_with_statusmsg() {
        let msg: Message = ":n!u@h PRIVMSG @#chan :hi".parse().unwrap();
        assert!(msg.is_channel_target(&['#'], &['@', '+']));
        assert!(!msg.is_channel_target(&['#'], &[]));

        let msg: Message = ":n!u@h PRIVMSG bot :hi".parse().unwrap();
        assert!(!msg.is_channel_target(&['#', '&'], &['@']));
    }
}
