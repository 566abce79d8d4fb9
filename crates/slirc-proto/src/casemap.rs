//! IRC case-mapping functions.
//!
//! Servers announce how nick and channel names compare case-insensitively
//! through the `CASEMAPPING` ISUPPORT token. Every identity key in the client
//! goes through [`CaseMapping::fold`] before it is used for a map lookup.

use std::fmt;
use std::str::FromStr;

/// The casefolding rule advertised by a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaseMapping {
    /// ASCII plus `[]\~` → `{}|^`.
    #[default]
    Rfc1459,
    /// ASCII plus `[]\` → `{}|` (no tilde mapping).
    StrictRfc1459,
    /// Plain ASCII letters only.
    Ascii,
}

impl CaseMapping {
    /// Lowercase a single character under this mapping.
    #[inline]
    pub const fn fold_char(self, c: char) -> char {
        match (self, c) {
            (_, 'A'..='Z') => (c as u8 + 32) as char,
            (CaseMapping::Ascii, _) => c,
            (_, '[') => '{',
            (_, ']') => '}',
            (_, '\\') => '|',
            (CaseMapping::Rfc1459, '~') => '^',
            _ => c,
        }
    }

    /// Lowercase a whole name under this mapping.
    pub fn fold(self, s: &str) -> String {
        s.chars().map(|c| self.fold_char(c)).collect()
    }

    /// Compare two names case-insensitively under this mapping.
    pub fn eq(self, a: &str, b: &str) -> bool {
        a.len() == b.len()
            && a
                .chars()
                .zip(b.chars())
                .all(|(ca, cb)| self.fold_char(ca) == self.fold_char(cb))
    }

    /// The token used in `CASEMAPPING=`.
    pub fn as_str(self) -> &'static str {
        match self {
            CaseMapping::Rfc1459 => "rfc1459",
            CaseMapping::StrictRfc1459 => "strict-rfc1459",
            CaseMapping::Ascii => "ascii",
        }
    }
}

impl FromStr for CaseMapping {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rfc1459" => Ok(CaseMapping::Rfc1459),
            "strict-rfc1459" => Ok(CaseMapping::StrictRfc1459),
            "ascii" => Ok(CaseMapping::Ascii),
            other => Err(other.to_owned()),
        }
    }
}

impl fmt::Display for CaseMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase a string with the default `rfc1459` mapping.
pub fn irc_to_lower(s: &str) -> String {
    CaseMapping::Rfc1459.fold(s)
}

/// Compare two strings with the default `rfc1459` mapping.
pub fn irc_eq(a: &str, b: &str) -> bool {
    CaseMapping::Rfc1459.eq(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rfc1459_specials() {
        let m = CaseMapping::Rfc1459;
        assert_eq!(m.fold("#Channel[1]"), "#channel{1}");
        assert_eq!(m.fold("Nick\\Away"), "nick|away");
        assert_eq!(m.fold("Test~Name"), "test^name");
    }

    #[test]
    fn test_strict_keeps_tilde() {
        let m = CaseMapping::StrictRfc1459;
        assert_eq!(m.fold("A[~]"), "a{~}");
    }

    #[test]
    fn test_ascii_only_letters() {
        let m = CaseMapping::Ascii;
        assert_eq!(m.fold("FOO[bar]"), "foo[bar]");
        assert!(!m.eq("a[", "a{"));
    }

    #[test]
    fn test_parse_tokens() {
        assert_eq!("ascii".parse::<CaseMapping>(), Ok(CaseMapping::Ascii));
        assert_eq!(
            "strict-rfc1459".parse::<CaseMapping>(),
            Ok(CaseMapping::StrictRfc1459)
        );
        assert!("rfc7613".parse::<CaseMapping>().is_err());
    }

    #[test]
    fn test_irc_eq() {
        assert!(irc_eq("hello", "HELLO"));
        assert!(irc_eq("#channel[1]", "#CHANNEL{1}"));
        assert!(!irc_eq("short", "longer"));
    }

    proptest! {
        #[test]
        fn fold_is_idempotent(s in "[ -~]{0,32}") {
            for m in [CaseMapping::Rfc1459, CaseMapping::StrictRfc1459, CaseMapping::Ascii] {
                let once = m.fold(&s);
                prop_assert_eq!(m.fold(&once), once.clone());
                prop_assert!(m.eq(&s, &once));
            }
        }
    }
}
