//! Incoming DCC SEND invitations.
//!
//! Only the invitation is parsed; no transfer is ever negotiated.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use crate::state::User;

/// A `DCC SEND` offer received in a CTCP PRIVMSG.
#[derive(Clone)]
pub struct DccSend {
    pub user: Arc<User>,
    /// Offered file name with any directory part removed.
    pub filename: String,
    pub ip: IpAddr,
    pub port: u16,
    pub size: Option<u64>,
}

impl DccSend {
    /// Parse a CTCP payload of the form
    /// `DCC SEND <filename|"quoted filename"> <ip> <port> [size]`.
    pub fn parse(payload: &str, user: Arc<User>) -> Option<Self> {
        let rest = payload.strip_prefix("DCC SEND ")?;

        let (filename, rest) = match rest.strip_prefix('"') {
            Some(quoted) => {
                let (name, rest) = quoted.split_once('"')?;
                (name, rest.strip_prefix(' ')?)
            }
            None => rest.split_once(' ')?,
        };
        if filename.is_empty() {
            return None;
        }

        let mut fields = rest.split(' ');
        let ip = parse_ip(fields.next()?)?;
        let port = fields.next()?.parse().ok()?;
        let size = match fields.next() {
            Some(size) => Some(size.parse().ok()?),
            None => None,
        };
        if fields.next().is_some() {
            return None;
        }

        Some(Self {
            user,
            filename: sanitize_filename(filename),
            ip,
            port,
            size,
        })
    }

    pub fn is_from_private_ip(&self) -> bool {
        match self.ip {
            IpAddr::V4(ip) => ip.is_private(),
            IpAddr::V6(ip) => (ip.segments()[0] & 0xfe00) == 0xfc00,
        }
    }

    pub fn is_from_localhost(&self) -> bool {
        self.ip.is_loopback()
    }
}

/// IPv4 addresses travel as a decimal integer; IPv6 as a literal.
fn parse_ip(s: &str) -> Option<IpAddr> {
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<u32>().ok().map(|n| IpAddr::V4(Ipv4Addr::from(n)));
    }
    s.parse().ok()
}

fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit('/').next().unwrap_or(name);
    base.replace('\\', "")
}

impl fmt::Debug for DccSend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DccSend")
            .field("user", &self.user.nick())
            .field("filename", &self.filename)
            .field("ip", &self.ip)
            .field("port", &self.port)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::link::Link;
    use crate::network::OutgoingQueue;
    use crate::state::UserList;

    fn user() -> Arc<User> {
        let link = Arc::new(Link::new(
            &Config::new("irc.example.org"),
            Arc::new(OutgoingQueue::new()),
        ));
        UserList::new(link, "bot").find_ensure("alice", None, None)
    }

    #[test]
    fn test_parse_plain_filename() {
        let dcc = DccSend::parse("DCC SEND foo.txt 2130706433 12345 12", user()).unwrap();
        assert_eq!(dcc.filename, "foo.txt");
        assert_eq!(dcc.ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(dcc.port, 12345);
        assert_eq!(dcc.size, Some(12));
        assert!(dcc.is_from_localhost());
    }

    #[test]
    fn test_parse_quoted_filename_and_ipv6() {
        let dcc = DccSend::parse("DCC SEND \"my file.txt\" ::1 5000", user()).unwrap();
        assert_eq!(dcc.filename, "my file.txt");
        assert!(dcc.ip.is_ipv6());
        assert_eq!(dcc.size, None);
    }

    #[test]
    fn test_filename_loses_directories() {
        let dcc = DccSend::parse("DCC SEND ../../../tmp/foo.txt 16843009 80 10", user()).unwrap();
        assert_eq!(dcc.filename, "foo.txt");
        let dcc = DccSend::parse("DCC SEND C:\\temp\\foo.txt 16843009 80 10", user()).unwrap();
        assert_eq!(dcc.filename, "C:tempfoo.txt");
    }

    #[test]
    fn test_private_ip() {
        // 192.168.1.50
        let dcc = DccSend::parse("DCC SEND a 3232235826 1 1", user()).unwrap();
        assert!(dcc.is_from_private_ip());
        assert!(!dcc.is_from_localhost());
        // 8.8.8.8
        let dcc = DccSend::parse("DCC SEND a 134744072 1 1", user()).unwrap();
        assert!(!dcc.is_from_private_ip());
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(DccSend::parse("DCC CHAT chat 2130706433 1", user()).is_none());
        assert!(DccSend::parse("DCC SEND foo.txt 2130706433", user()).is_none());
        assert!(DccSend::parse("DCC SEND foo.txt notanip 1 1", user()).is_none());
        assert!(DccSend::parse("DCC SEND \"unterminated 2130706433 1 1", user()).is_none());
    }
}
