//! MODE string interpretation.

use crate::error::ModeParseError;

use super::types::{Direction, ModeChange, ParamModes};

/// Interpret a MODE string against a flat parameter list.
///
/// Parameters are consumed left to right, one for each mode character whose
/// class requires a parameter in the current direction. Leftover or missing
/// parameters are errors.
///
/// ```
/// use slirc_proto::mode::{parse_modes, Direction, ModeChange, ParamModes};
///
/// let classes = ParamModes::new(['o', 'v'], ['o', 'v']);
/// let changes = parse_modes("+o-v", &["alice", "bob"], &classes).unwrap();
/// assert_eq!(changes[0], ModeChange::new(Direction::Add, 'o', Some("alice")));
/// assert_eq!(changes[1], ModeChange::new(Direction::Remove, 'v', Some("bob")));
/// ```
pub fn parse_modes<S: AsRef<str>>(
    modes: &str,
    params: &[S],
    param_modes: &ParamModes,
) -> Result<Vec<ModeChange>, ModeParseError> {
    if modes.is_empty() {
        return Err(ModeParseError::EmptyString);
    }

    let mut changes = Vec::new();
    let mut params = params.iter().map(AsRef::<str>::as_ref);
    let mut direction = None;
    // Mode characters seen since the last direction marker.
    let mut run = 0usize;

    for ch in modes.chars() {
        match ch {
            '+' | '-' => {
                if direction.is_some() && run == 0 {
                    return Err(ModeParseError::EmptySequence {
                        modes: modes.to_owned(),
                    });
                }
                direction = Some(if ch == '+' {
                    Direction::Add
                } else {
                    Direction::Remove
                });
                run = 0;
            }
            mode => {
                let Some(direction) = direction else {
                    return Err(ModeParseError::Malformed {
                        modes: modes.to_owned(),
                    });
                };
                let param = if param_modes.takes_param(direction, mode) {
                    Some(
                        params
                            .next()
                            .ok_or(ModeParseError::NotEnoughParameters { mode })?
                            .to_owned(),
                    )
                } else {
                    None
                };
                changes.push(ModeChange {
                    direction,
                    mode,
                    param,
                });
                run += 1;
            }
        }
    }

    if run == 0 {
        return Err(ModeParseError::EmptySequence {
            modes: modes.to_owned(),
        });
    }

    let leftover: Vec<String> = params.map(str::to_owned).collect();
    if !leftover.is_empty() {
        return Err(ModeParseError::TooManyParameters {
            modes: modes.to_owned(),
            params: leftover,
        });
    }

    Ok(changes)
}
