//! Channel and user mode strings.

mod parse;
mod types;

pub use self::parse::parse_modes;
pub use self::types::{Direction, ModeChange, ParamModes};
