//! Mode change types.

use std::collections::BTreeSet;
use std::fmt;

/// Whether a mode is being set or unset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `+`
    Add,
    /// `-`
    Remove,
}

impl Direction {
    /// The marker character for this direction.
    pub fn as_char(self) -> char {
        match self {
            Direction::Add => '+',
            Direction::Remove => '-',
        }
    }
}

/// A single parsed mode change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeChange {
    /// Set or unset.
    pub direction: Direction,
    /// The mode character.
    pub mode: char,
    /// The consumed parameter, if this mode took one.
    pub param: Option<String>,
}

impl ModeChange {
    /// Create a new mode change.
    pub fn new(direction: Direction, mode: char, param: Option<&str>) -> Self {
        ModeChange {
            direction,
            mode,
            param: param.map(str::to_owned),
        }
    }

    /// Whether this change sets the mode.
    pub fn is_add(&self) -> bool {
        self.direction == Direction::Add
    }
}

impl fmt::Display for ModeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.direction.as_char(), self.mode)?;
        if let Some(param) = &self.param {
            write!(f, " {}", param)?;
        }
        Ok(())
    }
}

/// Which modes consume a parameter in each direction.
///
/// Usually derived from ISUPPORT `CHANMODES` and `PREFIX`; the default
/// table has no parameter modes at all, which suits user modes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParamModes {
    /// Modes taking a parameter when added.
    pub add: BTreeSet<char>,
    /// Modes taking a parameter when removed.
    pub remove: BTreeSet<char>,
}

impl ParamModes {
    /// Build a table from explicit add/remove sets.
    pub fn new(add: impl IntoIterator<Item = char>, remove: impl IntoIterator<Item = char>) -> Self {
        ParamModes {
            add: add.into_iter().collect(),
            remove: remove.into_iter().collect(),
        }
    }

    /// Whether `mode` consumes a parameter in `direction`.
    pub fn takes_param(&self, direction: Direction, mode: char) -> bool {
        match direction {
            Direction::Add => self.add.contains(&mode),
            Direction::Remove => self.remove.contains(&mode),
        }
    }
}
