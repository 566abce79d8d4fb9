//! A decoded line with its identities resolved against the registries.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use slirc_proto::{FormattedStringExt, Message, Prefix};

use crate::handlers::Event;
use crate::link::Link;
use crate::state::{Channel, ChannelList, User, UserList};
use crate::target::{Target, TargetRef};

/// An incoming line as handlers see it.
pub struct IncomingMessage {
    /// The line as received, without terminator.
    pub raw: String,
    pub message: Message,
    /// The sending user, for user prefixes.
    pub user: Option<Arc<User>>,
    /// The channel the line concerns, if any.
    pub channel: Option<Arc<Channel>>,
    /// The channel, or else the sending user.
    pub target: Option<TargetRef>,
    /// The sending server, for server prefixes.
    pub server: Option<String>,
    /// Occupant mode of a STATUSMSG target such as `@#chan`.
    pub statusmsg_mode: Option<char>,
    /// `server-time` if the server sent one, else the time of receipt.
    pub time: DateTime<Utc>,
    link: Arc<Link>,
}

impl IncomingMessage {
    pub fn new(
        raw: impl Into<String>,
        message: Message,
        link: Arc<Link>,
        users: &UserList,
        channels: &ChannelList,
    ) -> Self {
        let (user, server) = match &message.prefix {
            Some(Prefix::ServerName(name)) => (None, Some(name.clone())),
            Some(prefix @ Prefix::Nickname(..)) => {
                let user = prefix
                    .nick()
                    .map(|nick| users.find_ensure(nick, prefix.user(), prefix.host()));
                (user, None)
            }
            None => (None, None),
        };

        let (channel, statusmsg_mode) = resolve_channel(&message, &link, channels);
        let target = match (&channel, &user) {
            (Some(channel), _) => Some(TargetRef::Channel(Arc::clone(channel))),
            (None, Some(user)) => Some(TargetRef::User(Arc::clone(user))),
            (None, None) => None,
        };

        let time = message
            .server_time()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map_or_else(Utc::now, |t| t.with_timezone(&Utc));

        Self {
            raw: raw.into(),
            message,
            user,
            channel,
            target,
            server,
            statusmsg_mode,
            time,
            link,
        }
    }

    pub fn command(&self) -> &str {
        &self.message.command
    }

    pub fn params(&self) -> &[String] {
        &self.message.params
    }

    /// The last parameter.
    pub fn text(&self) -> Option<&str> {
        self.message.text()
    }

    pub fn is_channel(&self) -> bool {
        self.channel.is_some()
    }

    pub fn is_ctcp(&self) -> bool {
        self.message.is_ctcp()
    }

    pub fn is_action(&self) -> bool {
        self.message.is_action()
    }

    pub fn action_text(&self) -> Option<&str> {
        self.message.action_text()
    }

    /// The CTCP command, e.g. `VERSION`.
    pub fn ctcp_command(&self) -> Option<String> {
        self.message.ctcp().map(|c| c.kind.as_str().to_string())
    }

    /// The CTCP arguments after the command.
    pub fn ctcp_args(&self) -> Vec<&str> {
        self.message.ctcp().map(|c| c.args()).unwrap_or_default()
    }

    /// The error numeric, for replies in the 400–599 range.
    pub fn error(&self) -> Option<u16> {
        self.message.error()
    }

    /// The text a handler pattern is matched against for `event`.
    pub fn match_text(&self, event: &Event, strip_formatting: bool) -> Cow<'_, str> {
        let text = match event {
            Event::Ctcp => self.message.ctcp_message(),
            Event::Action => self.message.action_text(),
            _ => self.message.text(),
        }
        .unwrap_or_default();

        if strip_formatting {
            text.strip_formatting()
        } else {
            Cow::Borrowed(text)
        }
    }

    /// Reply in the channel, or privately when there is none. With
    /// `prefix`, channel replies are addressed to the sender by nick.
    pub fn reply(&self, text: &str, prefix: bool) {
        let text = match (&self.channel, &self.user, prefix) {
            (Some(_), Some(user), true) => {
                let nick = user.nick();
                Cow::Owned(
                    text.lines()
                        .map(|line| format!("{nick}: {line}"))
                        .collect::<Vec<_>>()
                        .join("\n"),
                )
            }
            _ => Cow::Borrowed(text),
        };
        self.with_reply_target(|target| target.send(&text));
    }

    /// Like [`reply`](Self::reply) with formatting and control codes removed.
    pub fn safe_reply(&self, text: &str, prefix: bool) {
        self.reply(&slirc_proto::colors::sanitize(text), prefix);
    }

    pub fn action_reply(&self, text: &str) {
        self.with_reply_target(|target| target.action(text));
    }

    pub fn safe_action_reply(&self, text: &str) {
        self.with_reply_target(|target| target.safe_action(text));
    }

    /// Answer a CTCP request with a NOTICE to the sender.
    pub fn ctcp_reply(&self, answer: &str) {
        let (Some(user), Some(command)) = (&self.user, self.ctcp_command()) else {
            return;
        };
        user.notice(&format!("\x01{command} {answer}\x01"));
    }

    /// A STATUSMSG line is answered to the same status group.
    fn with_reply_target(&self, f: impl FnOnce(&dyn Target)) {
        if let (Some(channel), Some(mode)) = (&self.channel, self.statusmsg_mode) {
            let symbol = self.link.isupport().prefix().prefix_for_mode(mode);
            if let Some(symbol) = symbol {
                let target = StatusTarget {
                    name: format!("{symbol}{}", channel.name()),
                    link: &self.link,
                };
                return f(&target);
            }
        }
        if let Some(target) = &self.target {
            f(target);
        }
    }
}

/// A channel name with a STATUSMSG prefix, e.g. `@#chan`.
struct StatusTarget<'a> {
    name: String,
    link: &'a Link,
}

impl Target for StatusTarget<'_> {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn link(&self) -> &Link {
        self.link
    }
}

fn resolve_channel(
    message: &Message,
    link: &Link,
    channels: &ChannelList,
) -> (Option<Arc<Channel>>, Option<char>) {
    let params = &message.params;
    if params.is_empty() {
        return (None, None);
    }

    let position = match message.command.as_str() {
        "INVITE" | "324" | "367" => Some(1),
        "353" => Some(2),
        _ => None,
    };
    if let Some(position) = position {
        let channel = params.get(position).map(|name| channels.find_ensure(name));
        return (channel, None);
    }

    let mut found = channel_name(&params[0], link);
    if found.is_none() && message.is_numeric() && params.len() > 1 {
        found = channel_name(&params[1], link);
    }
    match found {
        Some((name, mode)) => (Some(channels.find_ensure(name)), mode),
        None => (None, None),
    }
}

/// Split an optional STATUSMSG prefix off a channel name.
fn channel_name<'a>(s: &'a str, link: &Link) -> Option<(&'a str, Option<char>)> {
    let isupport = link.isupport();
    let chantypes = isupport.chantypes();
    let mut chars = s.chars();
    let first = chars.next()?;

    if isupport.statusmsg().contains(&first)
        && chars.next().is_some_and(|c| chantypes.contains(&c))
    {
        let mode = isupport.prefix().mode_for_prefix(first);
        return Some((&s[first.len_utf8()..], mode));
    }
    chantypes.contains(&first).then_some((s, None))
}

impl fmt::Debug for IncomingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingMessage")
            .field("raw", &self.raw)
            .field("user", &self.user.as_ref().map(|u| u.nick()))
            .field("channel", &self.channel.as_ref().map(|c| c.name()))
            .field("statusmsg_mode", &self.statusmsg_mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::network::OutgoingQueue;

    struct Fixture {
        link: Arc<Link>,
        users: UserList,
        channels: ChannelList,
    }

    impl Fixture {
        fn new() -> Self {
            let link = Arc::new(Link::new(
                &Config::new("irc.example.org"),
                Arc::new(OutgoingQueue::new()),
            ));
            link.set_own_mask("bot!bot@host".into());
            let params: Vec<String> = ["bot", "PREFIX=(ov)@+", "STATUSMSG=@+", "x"]
                .map(String::from)
                .to_vec();
            link.apply_isupport(&params);
            Self {
                users: UserList::new(Arc::clone(&link), "bot"),
                channels: ChannelList::new(Arc::clone(&link)),
                link,
            }
        }

        fn parse(&self, line: &str) -> IncomingMessage {
            let message: Message = line.parse().unwrap();
            IncomingMessage::new(line, message, Arc::clone(&self.link), &self.users, &self.channels)
        }

        fn sent(&self) -> Vec<String> {
            std::iter::from_fn(|| self.link.queue().pop()).collect()
        }
    }

    #[test]
    fn test_resolves_user_and_channel() {
        let fx = Fixture::new();
        let m = fx.parse(":alice!a@example.com PRIVMSG #Rust :hello");
        assert_eq!(m.user.as_ref().unwrap().nick(), "alice");
        assert_eq!(m.channel.as_ref().unwrap().name(), "#Rust");
        assert!(matches!(m.target, Some(TargetRef::Channel(_))));
        assert!(m.server.is_none());

        let m = fx.parse(":alice!a@example.com PRIVMSG bot :hi");
        assert!(m.channel.is_none());
        assert!(matches!(m.target, Some(TargetRef::User(_))));
    }

    #[test]
    fn test_server_prefix() {
        let fx = Fixture::new();
        let m = fx.parse(":irc.example.org 001 bot :Welcome");
        assert_eq!(m.server.as_deref(), Some("irc.example.org"));
        assert!(m.user.is_none());
    }

    #[test]
    fn test_channel_parameter_positions() {
        let fx = Fixture::new();
        let m = fx.parse(":srv.example 353 bot = #chan :@alice bob");
        assert_eq!(m.channel.unwrap().name(), "#chan");
        let m = fx.parse(":srv.example 324 bot #modes +nt");
        assert_eq!(m.channel.unwrap().name(), "#modes");
        let m = fx.parse(":alice!a@h INVITE bot #invited");
        assert_eq!(m.channel.unwrap().name(), "#invited");
        let m = fx.parse(":srv.example 332 bot #topic :the topic");
        assert_eq!(m.channel.unwrap().name(), "#topic");
    }

    #[test]
    fn test_statusmsg_target() {
        let fx = Fixture::new();
        let m = fx.parse(":alice!a@h PRIVMSG @#chan :ops only");
        assert_eq!(m.channel.as_ref().unwrap().name(), "#chan");
        assert_eq!(m.statusmsg_mode, Some('o'));

        m.reply("noted", false);
        assert_eq!(fx.sent(), ["PRIVMSG @#chan :noted"]);
    }

    #[test]
    fn test_reply_with_prefix() {
        let fx = Fixture::new();
        let m = fx.parse(":alice!a@h PRIVMSG #chan :!ping");
        m.reply("pong\nagain", true);
        assert_eq!(
            fx.sent(),
            ["PRIVMSG #chan :alice: pong", "PRIVMSG #chan :alice: again"]
        );

        let m = fx.parse(":alice!a@h PRIVMSG bot :!ping");
        m.reply("pong", true);
        assert_eq!(fx.sent(), ["PRIVMSG alice :pong"]);
    }

    #[test]
    fn test_ctcp_reply_and_match_text() {
        let fx = Fixture::new();
        let m = fx.parse(":alice!a@h PRIVMSG bot :\x01VERSION\x01");
        assert_eq!(m.ctcp_command().as_deref(), Some("VERSION"));
        assert_eq!(m.match_text(&Event::Ctcp, false), "VERSION");
        m.ctcp_reply("slirc 0.1");
        assert_eq!(fx.sent(), ["NOTICE alice :\x01VERSION slirc 0.1\x01"]);

        let m = fx.parse(":alice!a@h PRIVMSG #c :\x01ACTION \x02waves\x02\x01");
        assert_eq!(m.match_text(&Event::Action, true), "waves");
        assert_eq!(m.match_text(&Event::Message, false), "\x01ACTION \x02waves\x02\x01");
    }

    #[test]
    fn test_server_time() {
        let fx = Fixture::new();
        let m = fx.parse("@time=2024-01-02T03:04:05.000Z :alice!a@h PRIVMSG #c :hi");
        assert_eq!(m.time.to_rfc3339(), "2024-01-02T03:04:05+00:00");
    }
}
