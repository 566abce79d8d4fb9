//! IRCv3 tag value escaping.

use std::borrow::Cow;

/// Raw character and its escape letter, in wire order.
const ESCAPES: [(char, char); 5] = [
    (';', ':'),
    (' ', 's'),
    ('\\', '\\'),
    ('\r', 'r'),
    ('\n', 'n'),
];

fn needs_escape(c: char) -> bool {
    ESCAPES.iter().any(|&(raw, _)| raw == c)
}

/// Escape a tag value for the wire. Borrows when nothing needs escaping.
pub fn escape_tag_value(value: &str) -> Cow<'_, str> {
    if !value.contains(needs_escape) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 4);
    for c in value.chars() {
        match ESCAPES.iter().find(|&&(raw, _)| raw == c) {
            Some(&(_, letter)) => {
                out.push('\\');
                out.push(letter);
            }
            None => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Reverse [`escape_tag_value`].
///
/// An unknown escape yields the escaped character; a lone trailing
/// backslash is dropped.
pub fn unescape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(letter) = chars.next() else { break };
        let raw = ESCAPES
            .iter()
            .find(|&&(_, l)| l == letter)
            .map_or(letter, |&(raw, _)| raw);
        out.push(raw);
    }
    out
}
