//! Events handlers subscribe to, and what a handler execution receives.

use std::fmt;
use std::sync::Arc;

use slirc_proto::ModeChange;
use tokio_util::sync::CancellationToken;

use crate::client::Client;
use crate::dcc::DccSend;
use crate::message::IncomingMessage;
use crate::state::{Ban, Channel, User};

/// Something that happened on the connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Event {
    /// Every line, before anything else.
    Catchall,
    /// Registration finished (`004`).
    Connect,
    /// The connection ended.
    Disconnect,
    /// A PRIVMSG to a channel or to us.
    Message,
    /// A PRIVMSG or NOTICE sent to us directly.
    Private,
    /// A PRIVMSG or NOTICE sent to a channel.
    Channel,
    Notice,
    Ctcp,
    Action,
    /// An error numeric (400–599).
    Error,
    /// A user left a channel or the network (PART, KICK, QUIT, KILL).
    Leaving,
    ModeChange,
    Op,
    Deop,
    HalfOp,
    DeHalfOp,
    Voice,
    Devoice,
    Owner,
    Deowner,
    Admin,
    Deadmin,
    Ban,
    Unban,
    DccSend,
    Online,
    Offline,
    /// Any raw command or numeric, by its lowercase name.
    Command(String),
    /// Application-defined events.
    Custom(String),
}

impl Event {
    /// `Command` event for a raw command such as `JOIN` or `353`.
    pub fn command(name: &str) -> Self {
        Event::Command(name.to_ascii_lowercase())
    }

    /// Occupant event for a prefix mode change, if the mode has one.
    pub fn for_occupant_mode(mode: char, add: bool) -> Option<Self> {
        let event = match (mode, add) {
            ('o', true) => Event::Op,
            ('o', false) => Event::Deop,
            ('h', true) => Event::HalfOp,
            ('h', false) => Event::DeHalfOp,
            ('v', true) => Event::Voice,
            ('v', false) => Event::Devoice,
            ('q', true) => Event::Owner,
            ('q', false) => Event::Deowner,
            ('a', true) => Event::Admin,
            ('a', false) => Event::Deadmin,
            _ => return None,
        };
        Some(event)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Command(name) => write!(f, "command:{name}"),
            Event::Custom(name) => write!(f, "custom:{name}"),
            other => write!(f, "{}", format!("{other:?}").to_ascii_lowercase()),
        }
    }
}

/// Extra values passed along with an event.
#[derive(Debug, Clone)]
pub enum EventArg {
    User(Arc<User>),
    Ban(Ban),
    Modes(Vec<ModeChange>),
    Dcc(DccSend),
    Text(String),
}

/// Everything one handler execution gets.
#[derive(Clone)]
pub struct EventContext {
    pub client: Client,
    pub event: Event,
    /// The line that caused the event. `None` for `Disconnect` and for
    /// custom events dispatched without one.
    pub message: Option<Arc<IncomingMessage>>,
    /// Capture groups of the handler's pattern; unmatched groups are `None`.
    pub captures: Vec<Option<String>>,
    pub args: Vec<EventArg>,
    /// Cancelled when the handler is stopped.
    pub cancel: CancellationToken,
}

impl EventContext {
    pub fn user(&self) -> Option<&Arc<User>> {
        self.message.as_ref()?.user.as_ref()
    }

    pub fn channel(&self) -> Option<&Arc<Channel>> {
        self.message.as_ref()?.channel.as_ref()
    }

    pub fn capture(&self, index: usize) -> Option<&str> {
        self.captures.get(index)?.as_deref()
    }

    /// The first `User` argument, e.g. the target of an `Op` event.
    pub fn arg_user(&self) -> Option<&Arc<User>> {
        self.args.iter().find_map(|arg| match arg {
            EventArg::User(user) => Some(user),
            _ => None,
        })
    }

    /// Reply to whoever sent the message, if there is one.
    pub fn reply(&self, text: &str) {
        if let Some(message) = &self.message {
            message.reply(text, false);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl fmt::Debug for EventContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventContext")
            .field("event", &self.event)
            .field("message", &self.message.as_ref().map(|m| m.raw.as_str()))
            .field("captures", &self.captures)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_lowercased() {
        assert_eq!(Event::command("PRIVMSG"), Event::Command("privmsg".into()));
        assert_eq!(Event::command("353").to_string(), "command:353");
    }

    #[test]
    fn test_display() {
        assert_eq!(Event::DeHalfOp.to_string(), "dehalfop");
        assert_eq!(Event::Custom("tick".into()).to_string(), "custom:tick");
    }

    #[test]
    fn test_occupant_events() {
        assert_eq!(Event::for_occupant_mode('o', true), Some(Event::Op));
        assert_eq!(Event::for_occupant_mode('v', false), Some(Event::Devoice));
        assert_eq!(Event::for_occupant_mode('b', true), None);
    }
}
