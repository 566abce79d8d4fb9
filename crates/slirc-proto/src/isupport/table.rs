//! The accumulated ISUPPORT table.

use std::collections::HashMap;

use crate::casemap::CaseMapping;
use crate::mode::ParamModes;

use super::parser::{parse_limits, ChanModes, PrefixSpec};

/// A typed ISUPPORT value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// Bare token without `=`.
    Flag,
    /// Free-form string value.
    Str(String),
    /// Numeric limit; `None` is unbounded.
    Number(Option<usize>),
    /// Ordered character list (CHANTYPES, STATUSMSG, ELIST).
    Chars(Vec<char>),
    /// `category:limit` map in server order.
    Limits(Vec<(String, Option<usize>)>),
    /// Occupant prefixes.
    Prefix(PrefixSpec),
    /// Channel mode classes.
    ChanModes(ChanModes),
    /// Casefolding rule.
    CaseMapping(CaseMapping),
}

const NUMBER_KEYS: &[&str] = &[
    "AWAYLEN", "CHANIDLEN", "CHANNELLEN", "HOSTLEN", "KEYLEN", "KICKLEN", "LINELEN",
    "MAXBANS", "MAXCHANNELS", "MAXNICKLEN", "MAXTARGETS", "MODES", "MONITOR", "NICKLEN",
    "SILENCE", "TOPICLEN", "USERLEN", "WATCH",
];
const CHAR_KEYS: &[&str] = &["CHANTYPES", "STATUSMSG", "ELIST"];
const LIMIT_KEYS: &[&str] = &["CHANLIMIT", "IDCHAN", "MAXLIST", "TARGMAX"];

/// Protocol default for a key the server has not announced.
fn default_value(key: &str) -> Option<Value> {
    let value = match key {
        "PREFIX" => Value::Prefix(PrefixSpec::from_pairs([('o', '@'), ('v', '+')])),
        "CHANTYPES" => Value::Chars(vec!['#']),
        "CHANMODES" => Value::ChanModes(ChanModes {
            a: vec!['b'],
            b: vec!['k'],
            c: vec!['l'],
            d: "imnpst".chars().collect(),
        }),
        "CHANLIMIT" => Value::Limits(vec![("#".to_owned(), None)]),
        "CASEMAPPING" => Value::CaseMapping(CaseMapping::Rfc1459),
        "MODES" | "MAXTARGETS" => Value::Number(Some(1)),
        "CHANIDLEN" => Value::Number(Some(5)),
        "NICKLEN" | "TOPICLEN" | "KICKLEN" | "CHANNELLEN" | "AWAYLEN" | "MAXBANS"
        | "MAXCHANNELS" => Value::Number(None),
        "STATUSMSG" | "ELIST" => Value::Chars(Vec::new()),
        "TARGMAX" | "MAXLIST" | "IDCHAN" => Value::Limits(Vec::new()),
        _ => return None,
    };
    Some(value)
}

/// Parse a `KEY=VALUE` value. `None` means a typed key carried a value
/// of the wrong shape.
fn parse_value(key: &str, raw: &str) -> Option<Value> {
    if NUMBER_KEYS.contains(&key) {
        return match raw {
            "" => Some(Value::Number(None)),
            raw => raw.parse().ok().map(|n| Value::Number(Some(n))),
        };
    }
    if CHAR_KEYS.contains(&key) {
        return Some(Value::Chars(raw.chars().collect()));
    }
    if LIMIT_KEYS.contains(&key) {
        return Some(Value::Limits(parse_limits(raw)));
    }
    match key {
        "PREFIX" => PrefixSpec::parse(raw).map(Value::Prefix),
        "CHANMODES" => ChanModes::parse(raw).map(Value::ChanModes),
        "CASEMAPPING" => raw.parse().ok().map(Value::CaseMapping),
        _ => Some(Value::Str(raw.to_owned())),
    }
}

/// Server capabilities built from every `005` line received so far.
///
/// Later announcements overwrite earlier ones key by key; keys never
/// announced read as their protocol default.
///
/// ```
/// use slirc_proto::isupport::ISupport;
///
/// let mut isupport = ISupport::default();
/// isupport.parse_params(&["bot", "PREFIX=(qaohv)~&@%+", "NICKLEN=30", "are supported"]);
/// assert_eq!(isupport.prefix().prefix_for_mode('h'), Some('%'));
/// assert_eq!(isupport.limit("NICKLEN"), Some(30));
/// assert_eq!(isupport.limit("TOPICLEN"), None);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ISupport {
    announced: HashMap<String, Value>,
}

impl ISupport {
    /// Apply the parameters of one `005` reply.
    ///
    /// The leading client nick is skipped, and so is the trailing
    /// human-readable text whenever there is anything besides it.
    pub fn parse_params<S: AsRef<str>>(&mut self, params: &[S]) {
        let mut tokens: Vec<&str> = params.iter().map(AsRef::<str>::as_ref).collect();
        if tokens.len() > 2 {
            tokens.pop();
        }
        for token in tokens.into_iter().skip(1) {
            self.parse_token(token);
        }
    }

    /// Apply a single `KEY`, `KEY=VALUE` or `-KEY` token.
    ///
    /// A malformed value for a typed key leaves the previous value in place.
    pub fn parse_token(&mut self, token: &str) {
        if token.is_empty() {
            return;
        }
        if let Some(key) = token.strip_prefix('-') {
            self.announced.remove(&key.to_ascii_uppercase());
            return;
        }
        match token.split_once('=') {
            Some((key, raw)) => {
                let key = key.to_ascii_uppercase();
                if let Some(value) = parse_value(&key, raw) {
                    self.announced.insert(key, value);
                }
            }
            None => {
                self.announced.insert(token.to_ascii_uppercase(), Value::Flag);
            }
        }
    }

    /// The announced value, falling back to the protocol default.
    pub fn get(&self, key: &str) -> Option<Value> {
        let key = key.to_ascii_uppercase();
        self.announced
            .get(&key)
            .cloned()
            .or_else(|| default_value(&key))
    }

    /// Whether the server announced this key (flags included).
    pub fn is_announced(&self, key: &str) -> bool {
        self.announced.contains_key(&key.to_ascii_uppercase())
    }

    /// A free-form string value such as `NETWORK`.
    pub fn string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// A numeric limit; `None` when unbounded or not a number.
    pub fn limit(&self, key: &str) -> Option<usize> {
        match self.get(key)? {
            Value::Number(n) => n,
            _ => None,
        }
    }

    /// A `category:limit` map such as `CHANLIMIT` or `TARGMAX`.
    pub fn limits(&self, key: &str) -> Vec<(String, Option<usize>)> {
        match self.get(key) {
            Some(Value::Limits(limits)) => limits,
            _ => Vec::new(),
        }
    }

    /// The occupant prefix table.
    pub fn prefix(&self) -> PrefixSpec {
        match self.get("PREFIX") {
            Some(Value::Prefix(spec)) => spec,
            _ => PrefixSpec::default(),
        }
    }

    /// The channel mode classes.
    pub fn chanmodes(&self) -> ChanModes {
        match self.get("CHANMODES") {
            Some(Value::ChanModes(modes)) => modes,
            _ => ChanModes::default(),
        }
    }

    fn chars(&self, key: &str) -> Vec<char> {
        match self.get(key) {
            Some(Value::Chars(chars)) => chars,
            _ => Vec::new(),
        }
    }

    /// Channel type characters.
    pub fn chantypes(&self) -> Vec<char> {
        self.chars("CHANTYPES")
    }

    /// STATUSMSG prefix symbols.
    pub fn statusmsg(&self) -> Vec<char> {
        self.chars("STATUSMSG")
    }

    /// The active casemapping.
    pub fn casemapping(&self) -> CaseMapping {
        match self.get("CASEMAPPING") {
            Some(Value::CaseMapping(mapping)) => mapping,
            _ => CaseMapping::default(),
        }
    }

    /// Casefold a nick or channel name with the active casemapping.
    pub fn fold(&self, name: &str) -> String {
        self.casemapping().fold(name)
    }

    /// Whether `name` starts with a channel type character.
    pub fn is_channel(&self, name: &str) -> bool {
        let chantypes = self.chantypes();
        name.starts_with(|c| chantypes.contains(&c))
    }

    /// Which channel modes consume a parameter in each direction.
    ///
    /// Adding: CHANMODES A, B and C plus occupant modes. Removing: A and B
    /// plus occupant modes.
    pub fn param_modes(&self) -> ParamModes {
        let chanmodes = self.chanmodes();
        let prefix = self.prefix();
        let add = chanmodes
            .a
            .iter()
            .chain(&chanmodes.b)
            .chain(&chanmodes.c)
            .copied()
            .chain(prefix.modes());
        let remove = chanmodes
            .a
            .iter()
            .chain(&chanmodes.b)
            .copied()
            .chain(prefix.modes());
        ParamModes::new(add, remove)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn announce(tokens: &[&str]) -> ISupport {
        let mut params = vec!["bot"];
        params.extend_from_slice(tokens);
        params.push("are supported by this server");
        let mut isupport = ISupport::default();
        isupport.parse_params(&params);
        isupport
    }

    #[test]
    fn test_defaults() {
        let isupport = ISupport::default();
        assert_eq!(isupport.prefix().pairs(), &[('o', '@'), ('v', '+')]);
        assert_eq!(isupport.chantypes(), vec!['#']);
        assert_eq!(isupport.limit("MODES"), Some(1));
        assert_eq!(isupport.limit("NICKLEN"), None);
        assert_eq!(isupport.casemapping(), CaseMapping::Rfc1459);
        assert!(isupport.statusmsg().is_empty());
        assert_eq!(isupport.get("UNKNOWNKEY"), None);
    }

    #[test]
    fn test_prefix_table() {
        let isupport = announce(&["PREFIX=(qaohv)~&@%+"]);
        assert_eq!(
            isupport.prefix().pairs(),
            &[('q', '~'), ('a', '&'), ('o', '@'), ('h', '%'), ('v', '+')]
        );
    }

    #[test]
    fn test_typed_values() {
        let isupport = announce(&[
            "CHANTYPES=#&",
            "STATUSMSG=@+",
            "CHANLIMIT=#:20,&:",
            "TARGMAX=PRIVMSG:4,JOIN:",
            "CASEMAPPING=ascii",
            "NETWORK=ExampleNet",
            "EXCEPTS",
            "TOPICLEN=390",
        ]);
        assert_eq!(isupport.chantypes(), vec!['#', '&']);
        assert_eq!(isupport.statusmsg(), vec!['@', '+']);
        assert_eq!(
            isupport.limits("CHANLIMIT"),
            vec![("#".to_owned(), Some(20)), ("&".to_owned(), None)]
        );
        assert_eq!(isupport.limits("TARGMAX")[0], ("PRIVMSG".to_owned(), Some(4)));
        assert_eq!(isupport.casemapping(), CaseMapping::Ascii);
        assert_eq!(isupport.string("NETWORK").as_deref(), Some("ExampleNet"));
        assert_eq!(isupport.get("EXCEPTS"), Some(Value::Flag));
        assert_eq!(isupport.limit("TOPICLEN"), Some(390));
        assert!(isupport.is_channel("&local"));
    }

    #[test]
    fn test_last_write_wins_and_reset() {
        let mut isupport = announce(&["NICKLEN=9"]);
        isupport.parse_params(&["bot", "NICKLEN=30"]);
        assert_eq!(isupport.limit("NICKLEN"), Some(30));
        isupport.parse_token("-NICKLEN");
        assert_eq!(isupport.limit("NICKLEN"), None);
    }

    #[test]
    fn test_single_word_trailing_text_is_not_a_token() {
        let mut isupport = ISupport::default();
        isupport.parse_params(&["bot", "NICKLEN=30", "supported"]);
        assert_eq!(isupport.limit("NICKLEN"), Some(30));
        assert!(!isupport.is_announced("SUPPORTED"));
    }

    #[test]
    fn test_malformed_typed_values_are_ignored() {
        let mut isupport = announce(&["PREFIX=(ohv)@%+"]);
        isupport.parse_params(&["bot", "CASEMAPPING=rfc7613", "PREFIX=broken", "MODES=lots", "ok"]);
        assert_eq!(isupport.casemapping(), CaseMapping::Rfc1459);
        assert_eq!(isupport.prefix().pairs(), &[('o', '@'), ('h', '%'), ('v', '+')]);
        assert_eq!(isupport.limit("MODES"), Some(1));
    }

    #[test]
    fn test_param_modes() {
        let isupport = announce(&["CHANMODES=beI,k,l,imnpst", "PREFIX=(ohv)@%+"]);
        let classes = isupport.param_modes();
        for mode in ['b', 'e', 'I', 'k', 'l', 'o', 'h', 'v'] {
            assert!(classes.add.contains(&mode), "{mode}");
        }
        assert!(!classes.remove.contains(&'l'));
        assert!(classes.remove.contains(&'k'));
        assert!(!classes.add.contains(&'m'));
    }
}
