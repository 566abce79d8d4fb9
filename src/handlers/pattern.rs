//! Handler match patterns.
//!
//! A pattern is an optional prefix, a body and an optional suffix. Each part
//! is a literal, a regex, or a closure that produces one of those for the
//! message being matched.
//!
//! * A literal body is escaped and the whole pattern is anchored on both
//!   ends; regex prefixes and suffixes keep their own syntax.
//! * A regex (or missing) body is used as written; only a literal prefix
//!   gets a `^` and a literal suffix a `$`.

use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::message::IncomingMessage;

type Resolver = dyn Fn(Option<&IncomingMessage>) -> PatternPart + Send + Sync;

#[derive(Clone)]
pub enum PatternPart {
    Literal(String),
    Regex(Regex),
    Dynamic(Arc<Resolver>),
}

impl PatternPart {
    pub fn dynamic(f: impl Fn(Option<&IncomingMessage>) -> PatternPart + Send + Sync + 'static) -> Self {
        PatternPart::Dynamic(Arc::new(f))
    }

    /// Resolve closures until a literal or regex remains.
    fn resolve(&self, message: Option<&IncomingMessage>) -> PatternPart {
        let mut part = self.clone();
        while let PatternPart::Dynamic(f) = part {
            part = f(message);
        }
        part
    }

    fn is_static(&self) -> bool {
        !matches!(self, PatternPart::Dynamic(_))
    }
}

impl From<&str> for PatternPart {
    fn from(s: &str) -> Self {
        PatternPart::Literal(s.to_string())
    }
}

impl From<String> for PatternPart {
    fn from(s: String) -> Self {
        PatternPart::Literal(s)
    }
}

impl From<Regex> for PatternPart {
    fn from(r: Regex) -> Self {
        PatternPart::Regex(r)
    }
}

impl fmt::Debug for PatternPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternPart::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            PatternPart::Regex(r) => f.debug_tuple("Regex").field(&r.as_str()).finish(),
            PatternPart::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

#[derive(Clone, Default)]
pub struct Pattern {
    pub prefix: Option<PatternPart>,
    pub body: Option<PatternPart>,
    pub suffix: Option<PatternPart>,
    compiled: OnceLock<Regex>,
}

impl Pattern {
    pub fn new(
        prefix: Option<PatternPart>,
        body: Option<PatternPart>,
        suffix: Option<PatternPart>,
    ) -> Self {
        Self {
            prefix,
            body,
            suffix,
            compiled: OnceLock::new(),
        }
    }

    /// A pattern with only a body.
    pub fn body(body: impl Into<PatternPart>) -> Self {
        Self::new(None, Some(body.into()), None)
    }

    /// Matches a CTCP payload whose command is `command`, with or without
    /// arguments.
    pub fn ctcp(command: &str) -> Result<Self, regex::Error> {
        let body = Regex::new(&format!("{}(?:$| .+)", regex::escape(command)))?;
        Ok(Self::new(
            Some(PatternPart::Literal(String::new())),
            Some(PatternPart::Regex(body)),
            None,
        ))
    }

    /// Fill in a missing prefix and suffix.
    pub(crate) fn with_defaults(
        mut self,
        prefix: Option<&PatternPart>,
        suffix: Option<&PatternPart>,
    ) -> Self {
        if self.prefix.is_none() {
            self.prefix = prefix.cloned();
        }
        if self.suffix.is_none() {
            self.suffix = suffix.cloned();
        }
        self.compiled = OnceLock::new();
        self
    }

    fn is_static(&self) -> bool {
        [&self.prefix, &self.body, &self.suffix]
            .into_iter()
            .flatten()
            .all(PatternPart::is_static)
    }

    /// Build the regex for `message`. Patterns without closures are compiled
    /// once.
    pub fn to_regex(&self, message: Option<&IncomingMessage>) -> Result<Regex, regex::Error> {
        if let Some(regex) = self.compiled.get() {
            return Ok(regex.clone());
        }
        let regex = Regex::new(&self.source(message))?;
        if self.is_static() {
            let _ = self.compiled.set(regex.clone());
        }
        Ok(regex)
    }

    fn source(&self, message: Option<&IncomingMessage>) -> String {
        let prefix = self.prefix.as_ref().map(|p| p.resolve(message));
        let suffix = self.suffix.as_ref().map(|p| p.resolve(message));
        let body = self.body.as_ref().map(|p| p.resolve(message));

        match body {
            Some(PatternPart::Literal(body)) => {
                let prefix = match prefix {
                    Some(PatternPart::Literal(s)) => regex::escape(&s),
                    Some(PatternPart::Regex(r)) => {
                        format!("(?:{})", r.as_str().trim_start_matches('^'))
                    }
                    _ => String::new(),
                };
                let suffix = match suffix {
                    Some(PatternPart::Literal(s)) => regex::escape(&s),
                    Some(PatternPart::Regex(r)) => {
                        format!("(?:{})", r.as_str().trim_end_matches('$'))
                    }
                    _ => String::new(),
                };
                format!("^{prefix}{}{suffix}$", regex::escape(&body))
            }
            body => {
                let prefix = match prefix {
                    Some(PatternPart::Literal(s)) => format!("^{}", regex::escape(&s)),
                    Some(PatternPart::Regex(r)) => format!("(?:{})", r.as_str()),
                    _ => String::new(),
                };
                let suffix = match suffix {
                    Some(PatternPart::Literal(s)) => format!("{}$", regex::escape(&s)),
                    Some(PatternPart::Regex(r)) => format!("(?:{})", r.as_str()),
                    _ => String::new(),
                };
                let body = match body {
                    Some(PatternPart::Regex(r)) => r.as_str().to_string(),
                    _ => String::new(),
                };
                format!("{prefix}{body}{suffix}")
            }
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("prefix", &self.prefix)
            .field("body", &self.body)
            .field("suffix", &self.suffix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn re(s: &str) -> PatternPart {
        PatternPart::Regex(Regex::new(s).unwrap())
    }

    #[test]
    fn test_regex_body_used_as_is() {
        let p = Pattern::body(re("foo"));
        let r = p.to_regex(None).unwrap();
        assert!(r.is_match("foo"));
        assert!(r.is_match("a foo b"));
    }

    #[test]
    fn test_regex_affixes() {
        let p = Pattern::new(Some(re("^")), Some(re("foo")), Some(re("$")));
        let r = p.to_regex(None).unwrap();
        assert!(r.is_match("foo"));
        assert!(!r.is_match(" bar foo "));
    }

    #[test]
    fn test_literal_parts_are_escaped_and_anchored() {
        let p = Pattern::new(Some("pre.".into()), Some("foo.".into()), Some("suf.".into()));
        let r = p.to_regex(None).unwrap();
        assert!(r.is_match("pre.foo.suf."));
        assert!(!r.is_match("preXfooXsufX"));
        assert!(!r.is_match("xpre.foo.suf."));
    }

    #[test]
    fn test_literal_anchors_in_regex_body_mode() {
        let p = Pattern::new(Some("!".into()), Some(re("cmd (\\w+)")), Some(".".into()));
        let r = p.to_regex(None).unwrap();
        assert_eq!(r.as_str(), "^!cmd (\\w+)\\.$");
    }

    #[test]
    fn test_regex_prefix_with_literal_body() {
        let p = Pattern::body("ping").with_defaults(Some(&re("^!")), None);
        let r = p.to_regex(None).unwrap();
        assert!(r.is_match("!ping"));
        assert!(!r.is_match("!pingpong"));
        assert!(!r.is_match("ping"));
    }

    #[test]
    fn test_dynamic_parts_are_resolved() {
        let p = Pattern::new(
            Some(PatternPart::dynamic(|_| "^".into())),
            Some(PatternPart::dynamic(|_| PatternPart::dynamic(|_| "foo".into()))),
            Some(PatternPart::dynamic(|_| "$".into())),
        );
        let r = p.to_regex(None).unwrap();
        assert!(r.is_match("^foo$"));
        assert!(!r.is_match("foo"));
        assert!(p.compiled.get().is_none());
    }

    #[test]
    fn test_ctcp_pattern() {
        let r = Pattern::ctcp("VERSION").unwrap().to_regex(None).unwrap();
        assert!(r.is_match("VERSION"));
        assert!(r.is_match("VERSION arg"));
        assert!(!r.is_match("OTHER"));

        let r = Pattern::ctcp("FOO.").unwrap().to_regex(None).unwrap();
        assert!(r.is_match("FOO."));
        assert!(!r.is_match("FOOX"));
    }

    #[test]
    fn test_captures() {
        let p = Pattern::body(re("^!echo (.+)$"));
        let r = p.to_regex(None).unwrap();
        let caps = r.captures("!echo hi there").unwrap();
        assert_eq!(&caps[1], "hi there");
    }
}
