//! Feeds a recorded server transcript through the codec and the ISUPPORT
//! and mode machinery, the way a client engine consumes it.

use bytes::BytesMut;
use slirc_proto::{CaseMapping, Direction, IrcCodec, ISupport, Message, ModeChange, parse_modes};
use tokio_util::codec::Decoder;

const TRANSCRIPT: &str = concat!(
    ":irc.example.org 001 bot :Welcome to ExampleNet bot\r\n",
    ":irc.example.org 004 bot irc.example.org InspIRCd-3 iosw biklmnopstv\r\n",
    ":irc.example.org 005 bot CASEMAPPING=ascii CHANMODES=Ibe,k,l,imnpst ",
    "PREFIX=(qaohv)~&@%+ NETWORK=ExampleNet STATUSMSG=~&@%+ :are supported by this server\r\n",
    ":irc.example.org 005 bot NICKLEN=30 TOPICLEN=307 -STATUSMSG :are supported by this server\r\n",
    "garbage that is not a message\r\n",
    ":op!o@host MODE #rust +qo-b alice bob *!*@spam\r\n",
);

fn decode_all(codec: &mut IrcCodec, input: &str) -> Vec<Message> {
    let mut buf = BytesMut::from(input);
    let mut out = Vec::new();
    while let Some(msg) = codec.decode(&mut buf).unwrap() {
        out.push(msg);
    }
    out
}

#[test]
fn transcript_drives_isupport_and_modes() {
    let mut codec = IrcCodec::new("utf-8").unwrap();
    let messages = decode_all(&mut codec, TRANSCRIPT);
    assert_eq!(messages.len(), 6);

    let mut isupport = ISupport::default();
    for msg in messages.iter().filter(|m| m.command == "005") {
        isupport.parse_params(&msg.params);
    }

    assert_eq!(isupport.casemapping(), CaseMapping::Ascii);
    assert_eq!(isupport.string("NETWORK").as_deref(), Some("ExampleNet"));
    assert_eq!(isupport.limit("NICKLEN"), Some(30));
    assert_eq!(isupport.limit("TOPICLEN"), Some(307));
    assert!(isupport.statusmsg().is_empty());
    assert_eq!(isupport.prefix().mode_for_prefix('~'), Some('q'));

    let mode = messages.last().unwrap();
    let changes = parse_modes(&mode.params[1], &mode.params[2..], &isupport.param_modes()).unwrap();
    assert_eq!(
        changes,
        vec![
            ModeChange::new(Direction::Add, 'q', Some("alice")),
            ModeChange::new(Direction::Add, 'o', Some("bob")),
            ModeChange::new(Direction::Remove, 'b', Some("*!*@spam")),
        ]
    );
}

#[test]
fn names_entries_strip_every_prefix() {
    let mut isupport = ISupport::default();
    isupport.parse_params(&["bot", "PREFIX=(qaohv)~&@%+", "are supported"]);
    let prefix = isupport.prefix();

    let (modes, nick) = prefix.strip_prefixes("~@alice");
    assert_eq!(nick, "alice");
    assert_eq!(modes, vec!['q', 'o']);

    let (modes, nick) = prefix.strip_prefixes("bob");
    assert_eq!(nick, "bob");
    assert!(modes.is_empty());
}
