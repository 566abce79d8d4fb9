//! Line grammar.
//!
//! ```text
//! [@tags SPACE] [:source SPACE] command *(SPACE middle) [SPACE :trailing]
//! ```
//!
//! [`split`] cuts a line into borrowed pieces. Tag values are left escaped;
//! [`super::parse`] owns the conversion into a [`super::Message`].

use nom::bytes::complete::{take_till, take_till1};
use nom::character::complete::{alphanumeric1, char, space0, space1};
use nom::combinator::{opt, verify};
use nom::error::ErrorKind;
use nom::multi::{fold_many0, separated_list0};
use nom::sequence::{pair, preceded, terminated};
use nom::IResult;
use smallvec::SmallVec;

/// A raw `key[=value]` tag.
pub(super) type RawTag<'a> = (&'a str, Option<&'a str>);

/// The pieces of one line, borrowed from the input.
#[derive(Debug, PartialEq)]
pub(super) struct Line<'a> {
    pub tags: Option<Vec<RawTag<'a>>>,
    pub source: Option<&'a str>,
    pub command: &'a str,
    pub params: SmallVec<[&'a str; 15]>,
}

/// Where and why a line failed to split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct SyntaxError {
    pub position: usize,
    pub kind: ErrorKind,
}

fn is_line_end(c: char) -> bool {
    c == '\r' || c == '\n'
}

fn tag(input: &str) -> IResult<&str, RawTag<'_>> {
    pair(
        take_till1(|c: char| c == '=' || c == ';' || c == ' '),
        opt(preceded(char('='), take_till(|c: char| c == ';' || c == ' '))),
    )(input)
}

/// `@a=b;c` with empty segments skipped.
fn tags(input: &str) -> IResult<&str, Vec<RawTag<'_>>> {
    let (rest, tags) = preceded(char('@'), separated_list0(char(';'), opt(tag)))(input)?;
    Ok((rest, tags.into_iter().flatten().collect()))
}

fn source(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_till1(|c: char| c == ' '))(input)
}

/// Letters only, or exactly three digits.
fn command(input: &str) -> IResult<&str, &str> {
    verify(alphanumeric1, |cmd: &str| {
        cmd.bytes().all(|b| b.is_ascii_alphabetic())
            || (cmd.len() == 3 && cmd.bytes().all(|b| b.is_ascii_digit()))
    })(input)
}

fn middle(input: &str) -> IResult<&str, &str> {
    preceded(
        space1,
        verify(take_till1(|c: char| c == ' ' || is_line_end(c)), |p: &str| {
            !p.starts_with(':')
        }),
    )(input)
}

fn trailing(input: &str) -> IResult<&str, &str> {
    preceded(pair(space1, char(':')), take_till(is_line_end))(input)
}

fn line(input: &str) -> IResult<&str, Line<'_>> {
    let (input, _) = space0(input)?;
    let (input, tags) = opt(terminated(tags, space1))(input)?;
    let (input, source) = opt(terminated(source, space1))(input)?;
    let (input, command) = command(input)?;
    let (input, mut params) = fold_many0(middle, SmallVec::<[&str; 15]>::new, |mut params, p| {
        params.push(p);
        params
    })(input)?;
    let (input, trailing) = opt(trailing)(input)?;
    params.extend(trailing);
    Ok((
        input,
        Line {
            tags,
            source,
            command,
            params,
        },
    ))
}

/// Split `input` into its parts. Anything after the last parameter is
/// ignored.
pub(super) fn split(input: &str) -> Result<Line<'_>, SyntaxError> {
    match line(input) {
        Ok((_, line)) => Ok(line),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(SyntaxError {
            position: input.len() - e.input.len(),
            kind: e.code,
        }),
        Err(nom::Err::Incomplete(_)) => Err(SyntaxError {
            position: input.len(),
            kind: ErrorKind::Eof,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_command() {
        let line = split("PING").unwrap();
        assert_eq!(line.command, "PING");
        assert_eq!(line.tags, None);
        assert_eq!(line.source, None);
        assert!(line.params.is_empty());
    }

    #[test]
    fn test_full_line() {
        let line =
            split("@msgid=abc;+typing=active;solo :nick!u@h PRIVMSG #rust :hi there").unwrap();
        assert_eq!(
            line.tags,
            Some(vec![
                ("msgid", Some("abc")),
                ("+typing", Some("active")),
                ("solo", None)
            ])
        );
        assert_eq!(line.source, Some("nick!u@h"));
        assert_eq!(line.command, "PRIVMSG");
        assert_eq!(line.params.as_slice(), ["#rust", "hi there"]);
    }

    #[test]
    fn test_empty_tag_segments_are_skipped() {
        let line = split("@;a=1;;b= PING").unwrap();
        assert_eq!(line.tags, Some(vec![("a", Some("1")), ("b", Some(""))]));
    }

    #[test]
    fn test_tag_value_keeps_equals_and_escapes() {
        let line = split("@k=a=b\\sc PING").unwrap();
        assert_eq!(line.tags, Some(vec![("k", Some("a=b\\sc"))]));
    }

    #[test]
    fn test_trailing_forms() {
        assert_eq!(split("PRIVMSG #c :").unwrap().params.as_slice(), ["#c", ""]);
        assert_eq!(
            split("MODE #c +k : ").unwrap().params.as_slice(),
            ["#c", "+k", " "]
        );
        assert_eq!(
            split("TOPIC #c ::-)").unwrap().params.as_slice(),
            ["#c", ":-)"]
        );
    }

    #[test]
    fn test_runs_of_spaces_separate_once() {
        let line = split(":srv   NOTICE   *   :x  y  ").unwrap();
        assert_eq!(line.command, "NOTICE");
        assert_eq!(line.params.as_slice(), ["*", "x  y  "]);

        let line = split("JOIN #a   ").unwrap();
        assert_eq!(line.params.as_slice(), ["#a"]);
    }

    #[test]
    fn test_middle_may_contain_colon() {
        let line = split(":srv 005 bot CHANLIMIT=#:20 :are supported").unwrap();
        assert_eq!(line.params.as_slice(), ["bot", "CHANLIMIT=#:20", "are supported"]);
    }

    #[test]
    fn test_no_parameter_cap() {
        let tokens: Vec<String> = (0..20).map(|i| format!("T{i}=1")).collect();
        let raw = format!(":srv 005 bot {} :are supported", tokens.join(" "));
        let line = split(&raw).unwrap();
        assert_eq!(line.params.len(), 22);
        assert_eq!(line.params[21], "are supported");
    }

    #[test]
    fn test_command_shape() {
        assert_eq!(split("001 bot :hi").unwrap().command, "001");
        assert_eq!(split("privmsg x y").unwrap().command, "privmsg");

        for bad in ["PING2", "12", "1234", ":only-a-source", "@t=1 :src"] {
            assert!(split(bad).is_err(), "{bad:?} should not split");
        }
    }

    #[test]
    fn test_error_position() {
        let err = split(":srv 12 bot").unwrap_err();
        assert_eq!(err.position, 5);
    }
}
