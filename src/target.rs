//! Anything a message can be sent to.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use slirc_proto::colors;
use slirc_proto::split_message;

use crate::link::Link;
use crate::state::{Channel, ChannelList, User, UserList};

/// A channel or user that accepts `PRIVMSG` and `NOTICE`.
///
/// Multi-line text is sent line by line, and each line is split to fit
/// the 512-byte limit with the configured continuation markers.
pub trait Target {
    /// The name used on the wire.
    fn name(&self) -> String;

    fn link(&self) -> &Link;

    /// Last chance to rewrite text before it is split and queued.
    fn prepare<'a>(&self, text: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(text)
    }

    fn send(&self, text: &str) {
        deliver(self, "PRIVMSG", text);
    }

    /// Send with formatting and control characters removed.
    fn safe_send(&self, text: &str) {
        self.send(&colors::sanitize(text));
    }

    fn notice(&self, text: &str) {
        deliver(self, "NOTICE", text);
    }

    fn safe_notice(&self, text: &str) {
        self.notice(&colors::sanitize(text));
    }

    /// Send a CTCP ACTION. Only the first line of `text` is used.
    fn action(&self, text: &str) {
        let line = text.lines().next().unwrap_or_default();
        self.link()
            .send(format!("PRIVMSG {} :\x01ACTION {}\x01", self.name(), line));
    }

    fn safe_action(&self, text: &str) {
        self.action(&colors::sanitize(text));
    }

    /// Send a CTCP request, e.g. `VERSION`.
    fn ctcp(&self, message: &str) {
        self.send(&format!("\x01{message}\x01"));
    }
}

fn deliver<T: Target + ?Sized>(target: &T, command: &str, text: &str) {
    let text = target.prepare(text);
    let name = target.name();
    let link = target.link();
    let prefix = format!(":{} {command} {name} :", link.own_mask());
    let (split_start, split_end) = link.split_markers();

    for line in text.lines() {
        for chunk in split_message(line, &prefix, split_start, split_end) {
            link.send(format!("{command} {name} :{}", chunk.rendered));
        }
    }
}

/// A resolved message target.
#[derive(Clone)]
pub enum TargetRef {
    Channel(Arc<Channel>),
    User(Arc<User>),
}

impl TargetRef {
    /// Resolve a bare name: channel names (by CHANTYPES) become channels,
    /// everything else a user.
    pub fn concretize(name: &str, link: &Link, channels: &ChannelList, users: &UserList) -> Self {
        if link.is_channel(name) {
            TargetRef::Channel(channels.find_ensure(name))
        } else {
            TargetRef::User(users.find_ensure(name, None, None))
        }
    }

    pub fn as_channel(&self) -> Option<&Arc<Channel>> {
        match self {
            TargetRef::Channel(channel) => Some(channel),
            TargetRef::User(_) => None,
        }
    }

    pub fn as_user(&self) -> Option<&Arc<User>> {
        match self {
            TargetRef::User(user) => Some(user),
            TargetRef::Channel(_) => None,
        }
    }
}

impl Target for TargetRef {
    fn name(&self) -> String {
        match self {
            TargetRef::Channel(channel) => channel.name(),
            TargetRef::User(user) => user.name(),
        }
    }

    fn link(&self) -> &Link {
        match self {
            TargetRef::Channel(channel) => Target::link(channel.as_ref()),
            TargetRef::User(user) => Target::link(user.as_ref()),
        }
    }

    fn prepare<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match self {
            TargetRef::Channel(channel) => channel.prepare(text),
            TargetRef::User(user) => user.prepare(text),
        }
    }
}

/// Targets compare by casefolded name.
impl PartialEq for TargetRef {
    fn eq(&self, other: &Self) -> bool {
        let link = Target::link(self);
        link.fold(&self.name()) == link.fold(&other.name())
    }
}

impl Eq for TargetRef {}

impl fmt::Debug for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetRef::Channel(channel) => f.debug_tuple("Channel").field(&channel.name()).finish(),
            TargetRef::User(user) => f.debug_tuple("User").field(&user.nick()).finish(),
        }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
