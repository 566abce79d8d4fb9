//! ISUPPORT (RPL_ISUPPORT / 005) parsing.
//!
//! # Reference
//! - Modern IRC documentation: <https://modern.ircdocs.horse/isupport.html>

mod parser;
mod table;

pub use parser::{parse_limits, ChanModes, PrefixSpec};
pub use table::{ISupport, Value};
