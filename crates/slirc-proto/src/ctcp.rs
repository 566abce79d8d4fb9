//! CTCP requests and replies carried in PRIVMSG/NOTICE bodies.
//!
//! ```
//! use slirc_proto::ctcp::{Ctcp, CtcpKind};
//!
//! let ctcp = Ctcp::parse("\x01PING 1700000000\x01").unwrap();
//! assert_eq!(ctcp.kind, CtcpKind::Ping);
//! assert_eq!(ctcp.payload, "PING 1700000000");
//! assert_eq!(ctcp.args(), ["1700000000"]);
//! ```

use std::fmt;

/// Marks both ends of a CTCP body.
pub const CTCP_DELIM: char = '\x01';

/// The CTCP command word. Matching is case-sensitive.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[allow(missing_docs)]
pub enum CtcpKind {
    /// `/me`
    Action,
    Version,
    Ping,
    Time,
    Clientinfo,
    Dcc,
    /// Any other command word.
    Unknown(String),
}

const KNOWN: [(&str, CtcpKind); 6] = [
    ("ACTION", CtcpKind::Action),
    ("VERSION", CtcpKind::Version),
    ("PING", CtcpKind::Ping),
    ("TIME", CtcpKind::Time),
    ("CLIENTINFO", CtcpKind::Clientinfo),
    ("DCC", CtcpKind::Dcc),
];

impl CtcpKind {
    /// Classify a command word.
    pub fn parse(name: &str) -> Self {
        KNOWN
            .iter()
            .find(|(known, _)| *known == name)
            .map_or_else(|| Self::Unknown(name.to_owned()), |(_, kind)| kind.clone())
    }

    /// The command word.
    pub fn as_str(&self) -> &str {
        if let Self::Unknown(name) = self {
            return name;
        }
        KNOWN
            .iter()
            .find(|(_, kind)| kind == self)
            .map_or("", |(name, _)| *name)
    }
}

impl fmt::Display for CtcpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A CTCP body, borrowed from the message text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ctcp<'a> {
    /// The command word.
    pub kind: CtcpKind,
    /// Everything between the delimiters, e.g. `ACTION waves`.
    pub payload: &'a str,
    /// The text after the command word, if not empty.
    pub params: Option<&'a str>,
}

impl<'a> Ctcp<'a> {
    /// `None` unless `text` is delimited on both ends and names a command.
    pub fn parse(text: &'a str) -> Option<Self> {
        let payload = text.strip_prefix(CTCP_DELIM)?.strip_suffix(CTCP_DELIM)?;
        let (command, params) = payload.split_once(' ').unwrap_or((payload, ""));
        if command.is_empty() {
            return None;
        }
        Some(Self {
            kind: CtcpKind::parse(command),
            payload,
            params: (!params.is_empty()).then_some(params),
        })
    }

    /// Space-separated words after the command.
    pub fn args(&self) -> Vec<&'a str> {
        self.params
            .map(|p| p.split(' ').filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }
}

impl fmt::Display for Ctcp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CTCP_DELIM}{}{CTCP_DELIM}", self.payload)
    }
}
