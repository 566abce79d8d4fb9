//! Utility functions for IRC protocol handling.

use crate::casemap::CaseMapping;

/// Maximum line length without the trailing `\r\n`.
pub const MAX_LINE_BYTES: usize = 510;

/// Truncates a string to at most `max_bytes` bytes without breaking
/// a multi-byte UTF-8 codepoint at the end.
///
/// ```
/// use slirc_proto::util::truncate_utf8_safe;
///
/// assert_eq!(truncate_utf8_safe("hello world", 5), "hello");
/// assert_eq!(truncate_utf8_safe("Hello 👋 World", 8), "Hello ");
/// assert_eq!(truncate_utf8_safe("hi", 10), "hi");
/// ```
#[inline]
pub fn truncate_utf8_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    &s[..end]
}

/// One piece of a split outgoing payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// The slice of the original text this chunk covers, including the
    /// whitespace it was split at.
    pub text: &'a str,
    /// What goes on the wire after the command prefix: the text with
    /// continuation markers applied and the split whitespace dropped.
    pub rendered: String,
}

/// Split `text` so that every `prefix + chunk` fits in a 510-byte line.
///
/// `split_end` is appended to every chunk but the last and `split_start`
/// is prepended to every chunk but the first. Splits happen at the last
/// whitespace that fits, or at a character boundary when a single word is
/// too long. The [`Chunk::text`] slices concatenate back to `text`.
///
/// ```
/// use slirc_proto::util::split_message;
///
/// let prefix = "x".repeat(490);
/// let chunks = split_message("alpha beta gamma delta epsilon", &prefix, "... ", " ...");
/// let rendered: Vec<&str> = chunks.iter().map(|c| c.rendered.as_str()).collect();
/// assert_eq!(rendered, ["alpha beta gamma ...", "... delta epsilon"]);
/// ```
pub fn split_message<'a>(
    text: &'a str,
    prefix: &str,
    split_start: &str,
    split_end: &str,
) -> Vec<Chunk<'a>> {
    let budget = MAX_LINE_BYTES.saturating_sub(prefix.len());
    if text.len() <= budget {
        return vec![Chunk {
            text,
            rendered: text.to_owned(),
        }];
    }

    let mut chunks: Vec<Chunk<'a>> = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let lead = if chunks.is_empty() { "" } else { split_start };
        let room = budget.saturating_sub(lead.len());
        if rest.len() <= room {
            chunks.push(Chunk {
                text: rest,
                rendered: format!("{lead}{rest}"),
            });
            break;
        }

        let (body, consumed) = cut(rest, room.saturating_sub(split_end.len()));
        let tail = if consumed == rest.len() { "" } else { split_end };
        chunks.push(Chunk {
            text: &rest[..consumed],
            rendered: format!("{lead}{body}{tail}"),
        });
        rest = &rest[consumed..];
    }
    chunks
}

/// Pick the longest prefix of `rest` that fits in `room` bytes.
///
/// Returns the text to render and the number of bytes consumed, which also
/// covers the whitespace run the cut was made at.
fn cut(rest: &str, room: usize) -> (&str, usize) {
    let window = truncate_utf8_safe(rest, room).len();

    let space = rest
        .char_indices()
        .take_while(|&(i, _)| i <= window)
        .filter(|&(i, c)| i > 0 && c.is_whitespace())
        .last();

    if let Some((at, _)) = space {
        let run_end = rest[at..]
            .find(|c: char| !c.is_whitespace())
            .map_or(rest.len(), |n| at + n);
        return (&rest[..at], run_end);
    }

    // Always make progress, even if one character exceeds the room.
    let end = if window == 0 {
        rest.chars().next().map_or(0, char::len_utf8)
    } else {
        window
    };
    (&rest[..end], end)
}

/// Match a string against a wildcard pattern.
///
/// `*` matches any sequence and `?` matches exactly one character.
/// Comparison is case-insensitive under `rfc1459` casemapping.
///
/// ```
/// use slirc_proto::util::wildcard_match;
///
/// assert!(wildcard_match("*!*@*.example.com", "Nick!user@host.EXAMPLE.com"));
/// assert!(wildcard_match("n?ck", "nick"));
/// assert!(!wildcard_match("n?ck", "nck"));
/// ```
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let fold = |s: &str| -> Vec<char> {
        s.chars()
            .map(|c| CaseMapping::Rfc1459.fold_char(c))
            .collect()
    };
    wildcard_match_impl(&fold(pattern), &fold(text))
}

fn wildcard_match_impl(pattern: &[char], text: &[char]) -> bool {
    let mut p = 0;
    let mut t = 0;
    // Position of the last '*' and the text index it was matched at.
    let mut star_p = None;
    let mut star_t = 0;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star_p = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(sp) = star_p {
            p = sp + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }

    p == pattern.len()
}
