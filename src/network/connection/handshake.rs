//! Registration: capability negotiation, SASL and login.
//!
//! The login (`PASS`/`NICK`/`USER`) is sent right after `CAP LS`; the
//! server holds registration until `CAP END`, so SASL can run in between.

use std::collections::VecDeque;
use std::sync::Arc;

use slirc_proto::sasl::{SASL_CHUNK_SIZE, chunk_response, decode_challenge, encode_response};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::link::Link;
use crate::sasl::{SaslMechanism, mechanism_by_name};

/// Capabilities requested when the server offers them.
const WANTED_CAPS: &[&str] = &[
    "away-notify",
    "multi-prefix",
    "sasl",
    "account-notify",
    "extended-join",
    "userhost-in-names",
    "server-time",
];

/// Capability and SASL state of one session.
pub(super) struct Registration {
    offered: Vec<String>,
    enabled: Vec<String>,
    mechanisms: VecDeque<Arc<dyn SaslMechanism>>,
    current: Option<Arc<dyn SaslMechanism>>,
    /// Challenge chunks received so far.
    challenge: String,
    cap_ended: bool,
}

impl Registration {
    pub fn new(config: &Config) -> Self {
        let mechanisms = match (&config.sasl.username, &config.sasl.password) {
            (Some(user), Some(pass)) => config
                .sasl
                .mechanisms
                .iter()
                .filter_map(|name| mechanism_by_name(name, user, pass))
                .collect(),
            _ => VecDeque::new(),
        };
        Self {
            offered: Vec::new(),
            enabled: Vec::new(),
            mechanisms,
            current: None,
            challenge: String::new(),
            cap_ended: false,
        }
    }

    /// Open negotiation and log in.
    pub fn start(&self, link: &Link, config: &Config, nick: &str) {
        link.send("CAP LS");
        if let Some(password) = &config.server.password {
            link.send(format!("PASS {password}"));
        }
        link.send(format!("NICK {nick}"));
        link.send(format!(
            "USER {} 0 * :{}",
            config.identity.user, config.identity.realname
        ));
    }

    pub fn is_enabled(&self, cap: &str) -> bool {
        self.enabled.iter().any(|c| c.eq_ignore_ascii_case(cap))
    }

    /// Handle `CAP <target> <subcommand> [*] :<caps>`.
    pub fn on_cap(&mut self, params: &[String], link: &Link) {
        let Some(subcommand) = params.get(1) else {
            return;
        };
        let caps = params.last().map(String::as_str).unwrap_or_default();
        let more = params.len() > 3 && params[2] == "*";

        match subcommand.to_ascii_uppercase().as_str() {
            "LS" => {
                self.offered.extend(
                    caps.split_whitespace()
                        .map(|cap| cap.split('=').next().unwrap_or(cap).to_string()),
                );
                if more {
                    return;
                }
                let wanted: Vec<&str> = WANTED_CAPS
                    .iter()
                    .copied()
                    .filter(|cap| self.offered.iter().any(|o| o.eq_ignore_ascii_case(cap)))
                    .collect();
                if wanted.is_empty() {
                    self.end(link);
                } else {
                    debug!(caps = ?wanted, "Requesting capabilities");
                    link.send(format!("CAP REQ :{}", wanted.join(" ")));
                }
            }
            "ACK" => {
                self.enabled
                    .extend(caps.split_whitespace().map(str::to_string));
                info!(caps = ?self.enabled, "Capabilities enabled");
                if self.is_enabled("sasl") && !self.mechanisms.is_empty() {
                    self.next_mechanism(link);
                } else {
                    self.end(link);
                }
            }
            "NAK" => {
                warn!(caps = %caps, "Capabilities rejected");
                self.end(link);
            }
            _ => {}
        }
    }

    /// Handle one `AUTHENTICATE` line from the server.
    pub async fn on_authenticate(&mut self, param: &str, link: &Link) {
        let Some(mechanism) = self.current.clone() else {
            return;
        };

        if param != "+" {
            self.challenge.push_str(param);
            if param.len() == SASL_CHUNK_SIZE {
                return;
            }
        }
        let encoded = std::mem::take(&mut self.challenge);

        let challenge = match decode_challenge(if encoded.is_empty() { "+" } else { &encoded }) {
            Ok(challenge) => challenge,
            Err(e) => {
                warn!(mechanism = mechanism.name(), error = %e, "Undecodable SASL challenge");
                link.send("AUTHENTICATE *");
                return;
            }
        };
        match mechanism.respond(&challenge).await {
            Ok(response) => {
                let response = encode_response(&response);
                for chunk in chunk_response(&response) {
                    link.send(format!("AUTHENTICATE {chunk}"));
                }
            }
            Err(e) => {
                warn!(mechanism = mechanism.name(), error = %e, "SASL mechanism failed");
                link.send("AUTHENTICATE *");
            }
        }
    }

    /// `903` (or `907`, already authenticated).
    pub fn on_sasl_success(&mut self, link: &Link) {
        if let Some(mechanism) = self.current.take() {
            info!(mechanism = mechanism.name(), "SASL authentication succeeded");
        }
        self.end(link);
    }

    /// `904`, `905` or `906`: try the next mechanism or give up.
    pub fn on_sasl_failure(&mut self, link: &Link) {
        if let Some(mechanism) = self.current.take() {
            warn!(mechanism = mechanism.name(), "SASL authentication failed");
        }
        self.challenge.clear();
        if self.mechanisms.is_empty() {
            self.end(link);
        } else {
            self.next_mechanism(link);
        }
    }

    fn next_mechanism(&mut self, link: &Link) {
        match self.mechanisms.pop_front() {
            Some(mechanism) => {
                debug!(mechanism = mechanism.name(), "Starting SASL");
                link.send(format!("AUTHENTICATE {}", mechanism.name()));
                self.current = Some(mechanism);
            }
            None => self.end(link),
        }
    }

    fn end(&mut self, link: &Link) {
        if !self.cap_ended {
            self.cap_ended = true;
            link.send("CAP END");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::OutgoingQueue;

    fn setup(sasl: bool) -> (Config, Link) {
        let mut config = Config::new("irc.example.org");
        config.identity.nick = "bot".into();
        config.identity.user = "ident".into();
        config.identity.realname = "Real Name".into();
        if sasl {
            config.sasl.username = Some("user".into());
            config.sasl.password = Some("pass".into());
        }
        let link = Link::new(&config, Arc::new(OutgoingQueue::new()));
        (config, link)
    }

    fn drain(link: &Link) -> Vec<String> {
        std::iter::from_fn(|| link.queue().pop()).collect()
    }

    fn params(line: &[&str]) -> Vec<String> {
        line.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_login_order() {
        let (mut config, link) = setup(false);
        config.server.password = Some("secret".into());
        Registration::new(&config).start(&link, &config, "bot");
        assert_eq!(
            drain(&link),
            vec!["CAP LS", "PASS secret", "NICK bot", "USER ident 0 * :Real Name"]
        );
    }

    #[test]
    fn test_requests_only_wanted_caps() {
        let (config, link) = setup(false);
        let mut reg = Registration::new(&config);
        reg.on_cap(
            &params(&["*", "LS", "*", "multi-prefix sasl=PLAIN,EXTERNAL chghost"]),
            &link,
        );
        assert!(drain(&link).is_empty());
        reg.on_cap(&params(&["*", "LS", "server-time znc.in/playback"]), &link);
        assert_eq!(drain(&link), vec!["CAP REQ :multi-prefix sasl server-time"]);

        reg.on_cap(&params(&["*", "ACK", "multi-prefix sasl server-time"]), &link);
        assert!(reg.is_enabled("server-time"));
        assert_eq!(drain(&link), vec!["CAP END"]);
    }

    #[test]
    fn test_nothing_wanted_ends_negotiation() {
        let (config, link) = setup(false);
        let mut reg = Registration::new(&config);
        reg.on_cap(&params(&["*", "LS", "chghost"]), &link);
        assert_eq!(drain(&link), vec!["CAP END"]);
        reg.on_cap(&params(&["*", "NAK", "chghost"]), &link);
        assert!(drain(&link).is_empty());
    }

    #[tokio::test]
    async fn test_sasl_plain_exchange() {
        let (config, link) = setup(true);
        let mut reg = Registration::new(&config);
        reg.on_cap(&params(&["*", "ACK", "sasl"]), &link);
        assert_eq!(drain(&link), vec!["AUTHENTICATE PLAIN"]);

        reg.on_authenticate("+", &link).await;
        assert_eq!(
            drain(&link),
            vec![format!(
                "AUTHENTICATE {}",
                slirc_proto::sasl::encode_plain("user", "pass")
            )]
        );

        reg.on_sasl_success(&link);
        assert_eq!(drain(&link), vec!["CAP END"]);
    }

    #[tokio::test]
    async fn test_sasl_failure_ends_after_last_mechanism() {
        let (config, link) = setup(true);
        let mut reg = Registration::new(&config);
        reg.on_cap(&params(&["*", "ACK", "sasl"]), &link);
        drain(&link);
        reg.on_sasl_failure(&link);
        assert_eq!(drain(&link), vec!["CAP END"]);
    }

    #[tokio::test]
    async fn test_authenticate_ignored_without_mechanism() {
        let (config, link) = setup(false);
        let mut reg = Registration::new(&config);
        reg.on_authenticate("+", &link).await;
        assert!(drain(&link).is_empty());
    }
}
