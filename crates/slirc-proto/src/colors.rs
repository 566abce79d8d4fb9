//! IRC formatting code handling.
//!
//! # IRC Format Codes
//! - 0x02 (^B): Bold
//! - 0x03 (^C): Color (followed by optional foreground,background)
//! - 0x04: Hex color (followed by optional RRGGBB,RRGGBB)
//! - 0x0F (^O): Reset all formatting
//! - 0x11: Monospace
//! - 0x16 (^V): Reverse/Inverse
//! - 0x1D: Italic
//! - 0x1E: Strikethrough
//! - 0x1F (^_): Underline

use std::borrow::Cow;

const FORMAT_CHARS: &[char] = &[
    '\x02', '\x03', '\x04', '\x0F', '\x11', '\x16', '\x1D', '\x1E', '\x1F',
];

/// Extension trait for handling formatted IRC strings.
pub trait FormattedStringExt<'a> {
    /// Check if the string contains any IRC formatting codes.
    fn is_formatted(&self) -> bool;

    /// Strip all IRC formatting codes from the string.
    ///
    /// Returns `Cow::Borrowed` if no formatting was present.
    fn strip_formatting(self) -> Cow<'a, str>;
}

impl<'a> FormattedStringExt<'a> for &'a str {
    fn is_formatted(&self) -> bool {
        self.contains(FORMAT_CHARS)
    }

    fn strip_formatting(self) -> Cow<'a, str> {
        if !self.is_formatted() {
            return Cow::Borrowed(self);
        }
        Cow::Owned(strip(self))
    }
}

impl FormattedStringExt<'static> for String {
    fn is_formatted(&self) -> bool {
        self.as_str().is_formatted()
    }

    fn strip_formatting(self) -> Cow<'static, str> {
        if !self.is_formatted() {
            return Cow::Owned(self);
        }
        Cow::Owned(strip(&self))
    }
}

fn strip(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\x03' => skip_color(&mut chars, 2, |c| c.is_ascii_digit()),
            '\x04' => skip_color(&mut chars, 6, |c| c.is_ascii_hexdigit()),
            c if FORMAT_CHARS.contains(&c) => {}
            c => out.push(c),
        }
    }
    out
}

/// Consume `fg[,bg]` color arguments, each at most `width` characters long.
///
/// The comma is only consumed when a background value follows it.
fn skip_color<I>(chars: &mut std::iter::Peekable<I>, width: usize, valid: fn(char) -> bool)
where
    I: Iterator<Item = char> + Clone,
{
    let mut taken = 0;
    while taken < width && chars.peek().is_some_and(|&c| valid(c)) {
        chars.next();
        taken += 1;
    }
    if taken == 0 || chars.peek() != Some(&',') {
        return;
    }

    let mut lookahead = chars.clone();
    lookahead.next();
    if !lookahead.peek().is_some_and(|&c| valid(c)) {
        return;
    }

    chars.next();
    let mut taken = 0;
    while taken < width && chars.peek().is_some_and(|&c| valid(c)) {
        chars.next();
        taken += 1;
    }
}

/// Remove formatting and every remaining control character.
///
/// Used for "safe" sends where user-provided text must not be able to inject
/// additional protocol lines or CTCP framing.
pub fn sanitize(s: &str) -> String {
    s.strip_formatting()
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}
