//! Value parsers for individual ISUPPORT tokens.

/// Parsed `PREFIX` ISUPPORT token.
///
/// Maps occupant modes (like `o`, `v`) to their prefix symbols (`@`, `+`),
/// highest rank first.
///
/// # Example
///
/// ```
/// use slirc_proto::isupport::PrefixSpec;
///
/// let spec = PrefixSpec::parse("(ov)@+").unwrap();
/// assert_eq!(spec.prefix_for_mode('o'), Some('@'));
/// assert_eq!(spec.mode_for_prefix('+'), Some('v'));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrefixSpec {
    pairs: Vec<(char, char)>,
}

impl PrefixSpec {
    /// Parse a `PREFIX` value like `(ov)@+`.
    ///
    /// An empty value means the server has no occupant prefixes.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            return Some(PrefixSpec::default());
        }
        let rest = s.strip_prefix('(')?;
        let (modes, symbols) = rest.split_once(')')?;
        if modes.chars().count() != symbols.chars().count() {
            return None;
        }
        Some(PrefixSpec {
            pairs: modes.chars().zip(symbols.chars()).collect(),
        })
    }

    /// Build from explicit `(mode, symbol)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (char, char)>) -> Self {
        PrefixSpec {
            pairs: pairs.into_iter().collect(),
        }
    }

    /// `(mode, symbol)` pairs, highest rank first.
    pub fn pairs(&self) -> &[(char, char)] {
        &self.pairs
    }

    /// The occupant mode characters in rank order.
    pub fn modes(&self) -> impl Iterator<Item = char> + '_ {
        self.pairs.iter().map(|&(m, _)| m)
    }

    /// Whether `mode` is an occupant mode on this server.
    #[inline]
    pub fn is_prefix_mode(&self, mode: char) -> bool {
        self.pairs.iter().any(|&(m, _)| m == mode)
    }

    /// Returns the prefix symbol for a given mode character.
    #[inline]
    pub fn prefix_for_mode(&self, mode: char) -> Option<char> {
        self.pairs.iter().find(|&&(m, _)| m == mode).map(|&(_, p)| p)
    }

    /// Returns the mode character for a given prefix symbol.
    #[inline]
    pub fn mode_for_prefix(&self, prefix: char) -> Option<char> {
        self.pairs.iter().find(|&&(_, p)| p == prefix).map(|&(m, _)| m)
    }

    /// Split leading prefix symbols off a NAMES entry like `@+nick`.
    ///
    /// Returns the occupant modes in the order the symbols appeared.
    pub fn strip_prefixes<'a>(&self, entry: &'a str) -> (Vec<char>, &'a str) {
        let mut modes = Vec::new();
        let mut rest = entry;
        while let Some(c) = rest.chars().next() {
            match self.mode_for_prefix(c) {
                Some(mode) => {
                    modes.push(mode);
                    rest = &rest[c.len_utf8()..];
                }
                None => break,
            }
        }
        (modes, rest)
    }
}

/// Parsed `CHANMODES` ISUPPORT token.
///
/// - **A**: list modes, parameter on add and remove (e.g. `b`)
/// - **B**: parameter on add and remove (e.g. `k`)
/// - **C**: parameter on add only (e.g. `l`)
/// - **D**: never a parameter (e.g. `n`)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChanModes {
    /// Type A: list modes.
    pub a: Vec<char>,
    /// Type B: always take a parameter.
    pub b: Vec<char>,
    /// Type C: take a parameter when set.
    pub c: Vec<char>,
    /// Type D: never take a parameter.
    pub d: Vec<char>,
}

impl ChanModes {
    /// Parse a `CHANMODES` value like `b,k,l,imnpst`.
    ///
    /// Extra groups beyond the fourth are ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split(',');
        let (a, b, c, d) = (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
        Some(ChanModes {
            a: a.chars().collect(),
            b: b.chars().collect(),
            c: c.chars().collect(),
            d: d.chars().collect(),
        })
    }
}

/// Parse a `category:limit` list like `#:20,&:` (CHANLIMIT, TARGMAX,
/// MAXLIST, IDCHAN).
///
/// A missing or empty limit means unbounded (`None`). For CHANLIMIT and
/// MAXLIST a category may group several characters (`#&:20`).
pub fn parse_limits(s: &str) -> Vec<(String, Option<usize>)> {
    s.split(',')
        .filter(|part| !part.is_empty())
        .filter_map(|part| {
            let (key, limit) = part.split_once(':').unwrap_or((part, ""));
            if key.is_empty() {
                return None;
            }
            Some((key.to_owned(), limit.parse::<usize>().ok()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_five_levels() {
        let spec = PrefixSpec::parse("(qaohv)~&@%+").unwrap();
        assert_eq!(
            spec.pairs(),
            &[('q', '~'), ('a', '&'), ('o', '@'), ('h', '%'), ('v', '+')]
        );
        assert!(spec.is_prefix_mode('h'));
        assert!(!spec.is_prefix_mode('b'));
    }

    #[test]
    fn test_prefix_rejects_mismatch() {
        assert!(PrefixSpec::parse("(ov)@").is_none());
        assert!(PrefixSpec::parse("ov@+").is_none());
        assert_eq!(PrefixSpec::parse(""), Some(PrefixSpec::default()));
    }

    #[test]
    fn test_strip_prefixes() {
        let spec = PrefixSpec::parse("(ov)@+").unwrap();
        assert_eq!(spec.strip_prefixes("@+nick"), (vec!['o', 'v'], "nick"));
        assert_eq!(spec.strip_prefixes("nick"), (vec![], "nick"));
    }

    #[test]
    fn test_chanmodes() {
        let cm = ChanModes::parse("beI,k,l,imnpst").unwrap();
        assert_eq!(cm.a, vec!['b', 'e', 'I']);
        assert_eq!(cm.c, vec!['l']);
        assert!(ChanModes::parse("b,k").is_none());
    }

    #[test]
    fn test_limits() {
        assert_eq!(
            parse_limits("PRIVMSG:4,NOTICE:4,JOIN:"),
            vec![
                ("PRIVMSG".to_owned(), Some(4)),
                ("NOTICE".to_owned(), Some(4)),
                ("JOIN".to_owned(), None),
            ]
        );
        assert_eq!(parse_limits("#&:20"), vec![("#&".to_owned(), Some(20))]);
        assert!(parse_limits("").is_empty());
    }
}
