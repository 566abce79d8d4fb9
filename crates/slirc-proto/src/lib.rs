//! # slirc-proto
//!
//! IRC protocol primitives for the slirc client: message parsing and
//! serialization, ISUPPORT interpretation, mode strings, CTCP, formatting
//! codes, casemapping and SASL payloads.
//!
//! ## Features
//!
//! - IRC message parsing with IRCv3 tags, prefixes, commands, and parameters
//! - ISUPPORT (RPL_ISUPPORT) tracking with the conventional defaults
//! - Channel and user mode string parsing driven by the server's CHANMODES
//! - Splitting of long outgoing messages on whitespace and UTF-8 boundaries
//! - Optional Tokio codecs with configurable character encodings

#![deny(clippy::all)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! ## Quick Start
//!
//! ```rust
//! use slirc_proto::{Message, Prefix};
//!
//! let privmsg = Message::privmsg("#rust", "Hello, world!")
//!     .with_tag("msgid", Some("abc123"))
//!     .with_prefix(Prefix::new_from_str("bot!bot@example.com"));
//! assert_eq!(
//!     privmsg.to_string(),
//!     "@msgid=abc123 :bot!bot@example.com PRIVMSG #rust :Hello, world!"
//! );
//!
//! let raw = "@time=2023-01-01T12:00:00Z :nick!user@host PRIVMSG #channel :Hello!";
//! let message: Message = raw.parse().expect("valid IRC message");
//! assert_eq!(message.server_time(), Some("2023-01-01T12:00:00Z"));
//! assert_eq!(message.source_nickname(), Some("nick"));
//! ```

pub mod casemap;
pub mod colors;
pub mod ctcp;
pub mod error;
#[cfg(feature = "tokio")]
pub mod irc;
pub mod isupport;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;
pub mod mode;
pub mod prefix;
pub mod sasl;
pub mod util;

pub use self::casemap::{irc_eq, irc_to_lower, CaseMapping};
pub use self::colors::FormattedStringExt;
pub use self::ctcp::{Ctcp, CtcpKind};
pub use self::error::{MessageParseError, ModeParseError, ProtocolError};
#[cfg(feature = "tokio")]
pub use self::irc::IrcCodec;
pub use self::isupport::{ChanModes, ISupport, PrefixSpec};
#[cfg(feature = "tokio")]
pub use self::line::LineCodec;
pub use self::message::{Message, Tag};
pub use self::mode::{parse_modes, Direction, ModeChange, ParamModes};
pub use self::prefix::Prefix;
pub use self::util::{split_message, wildcard_match, Chunk};
