//! Hostmasks and bans.

use std::fmt;

use chrono::{DateTime, Utc};
use regex::Regex;
use slirc_proto::CaseMapping;

/// A `nick!user@host` pattern with `*` and `?` wildcards.
///
/// `*` matches any run of characters and `?` matches at most one. Matching
/// is case-insensitive under rfc1459 folding.
#[derive(Clone)]
pub struct Mask {
    mask: String,
    regex: Option<Regex>,
}

impl Mask {
    pub fn new(mask: impl Into<String>) -> Self {
        let mask = mask.into();
        let folded = CaseMapping::Rfc1459.fold(&mask);
        let pattern = regex::escape(&folded)
            .replace("\\*", ".*")
            .replace("\\?", ".?");
        let regex = Regex::new(&format!("^{pattern}$")).ok();
        Self { mask, regex }
    }

    /// The mask of a user with known user and host.
    pub fn from_parts(nick: &str, user: &str, host: &str) -> Self {
        Self::new(format!("{nick}!{user}@{host}"))
    }

    pub fn as_str(&self) -> &str {
        &self.mask
    }

    pub fn nick(&self) -> &str {
        self.mask.split('!').next().unwrap_or_default()
    }

    pub fn user(&self) -> &str {
        self.mask
            .split_once('!')
            .map(|(_, rest)| rest.split('@').next().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn host(&self) -> &str {
        self.mask.split_once('@').map_or("", |(_, host)| host)
    }

    /// Whether `target` (a full `nick!user@host`) matches this mask.
    pub fn matches(&self, target: &str) -> bool {
        let folded = CaseMapping::Rfc1459.fold(target);
        self.regex.as_ref().is_some_and(|re| re.is_match(&folded))
    }
}

impl PartialEq for Mask {
    fn eq(&self, other: &Self) -> bool {
        CaseMapping::Rfc1459.eq(&self.mask, &other.mask)
    }
}

impl Eq for Mask {}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Mask").field(&self.mask).finish()
    }
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mask)
    }
}

impl From<&str> for Mask {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// An entry of a channel ban list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ban {
    pub mask: Mask,
    /// Who set the ban, when known.
    pub by: Option<String>,
    pub created_at: DateTime<Utc>,
    /// `$`-prefixed ban understood only by the server, such as `$a:account`.
    pub extended: bool,
}

impl Ban {
    pub fn new(mask: &str, by: Option<&str>, created_at: DateTime<Utc>) -> Self {
        Self {
            mask: Mask::new(mask),
            by: by.map(str::to_owned),
            created_at,
            extended: mask.starts_with('$'),
        }
    }

    /// Whether the ban applies to `hostmask`. Extended bans never match.
    pub fn matches(&self, hostmask: &str) -> bool {
        !self.extended && self.mask.matches(hostmask)
    }
}

impl fmt::Display for Ban {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.mask, f)
    }
}
