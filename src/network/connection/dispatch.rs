//! Routing of incoming lines.
//!
//! Every line is parsed, resolved into an [`IncomingMessage`], run through
//! the updater for its command and only then dispatched. Handlers therefore
//! always see entity state that already reflects the line.
//!
//! Event order per line: `Catchall`, the message events (`Ctcp`,
//! `Channel`/`Private`, `Message`, `Action`, `Notice`, `Error`), whatever the
//! updater produced, and finally `Command(<command>)`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use slirc_proto::{Direction, Message, ModeChange, parse_modes};
use tracing::{debug, error, info, warn};

use super::ConnectionState;
use super::handshake::Registration;
use crate::client::Client;
use crate::dcc::DccSend;
use crate::handlers::{Event, EventArg};
use crate::message::IncomingMessage;
use crate::network::{Ircd, NetworkProfile};
use crate::state::{Ban, Channel, OWN_USER_ID, User};
use crate::target::Target;

type Emit = (Event, Vec<EventArg>);

pub(super) struct Router {
    client: Client,
    registration: Registration,
    registered: bool,
    /// Channels whose NAMES reply is being received.
    names: HashSet<String>,
    /// Channels whose ban list is being received.
    bans: HashSet<String>,
    /// Channels whose owner list is being received.
    owners: HashSet<String>,
    /// Users a `401` arrived for since their last `318`.
    whois_missing: HashSet<u64>,
}

impl Router {
    pub fn new(client: Client) -> Self {
        let registration = Registration::new(client.config());
        Self {
            client,
            registration,
            registered: false,
            names: HashSet::new(),
            bans: HashSet::new(),
            owners: HashSet::new(),
            whois_missing: HashSet::new(),
        }
    }

    /// Send capability negotiation and login.
    pub fn start(&self) {
        self.client.set_state(ConnectionState::AwaitingRegistration);
        self.registration
            .start(self.client.link(), self.client.config(), &self.client.nick());
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub async fn handle_line(&mut self, raw: String) {
        let message: Message = match raw.parse() {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, line = %raw, "Skipping unparseable line");
                return;
            }
        };
        let client = self.client.clone();
        let msg = Arc::new(IncomingMessage::new(
            raw,
            message,
            Arc::clone(client.link()),
            client.users(),
            client.channels(),
        ));

        let mut events: Vec<Emit> = vec![(Event::Catchall, Vec::new())];
        message_events(&msg, &mut events);
        self.update(&msg, &mut events).await;
        events.push((Event::command(msg.command()), Vec::new()));

        for (event, args) in events {
            client
                .handlers()
                .dispatch(&client, event, Some(Arc::clone(&msg)), args);
        }
    }

    async fn update(&mut self, msg: &IncomingMessage, out: &mut Vec<Emit>) {
        let params = msg.params();
        match msg.command() {
            "001" => self.on_welcome(msg),
            "004" => self.on_registered(msg, out),
            "005" => self.on_isupport(msg),
            "CAP" => self.registration.on_cap(params, self.client.link()),
            "AUTHENTICATE" => {
                let param = params.first().map(String::as_str).unwrap_or("+");
                self.registration
                    .on_authenticate(param, self.client.link())
                    .await;
            }
            "903" | "907" => self.registration.on_sasl_success(self.client.link()),
            "904" | "905" | "906" => self.registration.on_sasl_failure(self.client.link()),
            "PING" => {
                let token = params.first().map(String::as_str).unwrap_or_default();
                self.client.link().send(format!("PONG :{token}"));
            }
            "JOIN" => self.on_join(msg, out),
            "PART" => self.on_part(msg, out),
            "KICK" => self.on_kick(msg, out),
            "QUIT" => {
                if let Some(user) = &msg.user {
                    self.leave_network(user, out);
                }
            }
            "KILL" => {
                if let Some(nick) = params.first() {
                    let user = self.client.users().find_ensure(nick, None, None);
                    self.leave_network(&user, out);
                }
            }
            "NICK" => self.on_nick(msg, out),
            "MODE" => self.on_mode(msg, out),
            "TOPIC" => {
                if let Some(channel) = &msg.channel {
                    channel
                        .topic
                        .sync(params.get(1).filter(|t| !t.is_empty()).cloned());
                }
            }
            "PRIVMSG" => self.on_privmsg(msg, out),
            "ACCOUNT" => {
                if let (Some(user), Some(account)) = (&msg.user, params.first()) {
                    user.authname.sync((account != "*").then(|| account.clone()));
                }
            }
            "AWAY" => {
                if let Some(user) = &msg.user {
                    user.away.sync(params.first().cloned());
                }
            }
            "CHGHOST" => self.on_chghost(msg),
            "301" | "311" | "313" | "317" | "319" | "330" | "671" => self.on_whois_reply(msg),
            "318" => self.on_end_of_whois(msg, out),
            "401" => self.on_no_such_nick(msg, out),
            "352" => self.on_who_reply(msg),
            "354" => self.on_whox_reply(msg),
            "324" => self.on_channel_modes(msg),
            "331" => {
                if let Some(channel) = &msg.channel {
                    channel.topic.sync(None);
                }
            }
            "332" => {
                if let Some(channel) = &msg.channel {
                    channel.topic.sync(params.get(2).cloned());
                }
            }
            "353" => self.on_names_reply(msg),
            "366" => {
                if let Some(channel) = &msg.channel {
                    let key = self.key(channel);
                    self.names.remove(&key);
                    channel.users.mark_as_synced();
                }
            }
            "367" => self.on_ban_list(msg),
            "368" => {
                if let Some(channel) = &msg.channel {
                    let key = self.key(channel);
                    self.bans.remove(&key);
                    channel.bans.mark_as_synced();
                }
            }
            "386" => self.on_owner_list(msg),
            "387" => {
                if let Some(channel) = &msg.channel {
                    let key = self.key(channel);
                    self.owners.remove(&key);
                    channel.owners.mark_as_synced();
                }
            }
            "433" => self.on_nick_in_use(msg),
            "730" | "731" => self.on_monitor(msg, out),
            "ERROR" => {
                error!(reason = ?params.first(), "Server closed the link");
            }
            _ => {}
        }
    }

    fn key(&self, channel: &Channel) -> String {
        self.client.link().fold(&channel.name())
    }

    fn on_welcome(&self, msg: &IncomingMessage) {
        let client = &self.client;
        let me = client.me();
        if let Some(nick) = msg.params().first()
            && *nick != me.nick()
        {
            debug!(nick = %nick, "Server assigned a different nick");
            client.users().update_nick(me, nick);
        }
        // "Welcome to the Example Network nick!user@host"
        if let Some(mask) = msg.text().and_then(|t| t.rsplit(' ').next())
            && let Some((_, user, host)) = split_mask(mask)
        {
            client.link().set_own_mask(mask.to_string());
            me.sync_user_host(Some(user), Some(host));
        }
    }

    fn on_registered(&mut self, msg: &IncomingMessage, out: &mut Vec<Emit>) {
        let client = &self.client;
        self.registered = true;
        client.set_state(ConnectionState::Registered);

        if let Some(version) = msg.params().get(2) {
            let ircd = Ircd::detect(version);
            client.link().update_profile(|p| p.ircd = ircd);
        }
        info!(nick = %client.nick(), profile = ?client.link().profile(), "Registered");

        if let Some(modes) = &client.config().identity.modes {
            let modes = modes.trim_start_matches('+');
            if !modes.is_empty() {
                client
                    .link()
                    .send(format!("MODE {} +{modes}", client.nick()));
            }
        }
        out.push((Event::Connect, Vec::new()));
    }

    fn on_isupport(&self, msg: &IncomingMessage) {
        let client = &self.client;
        let link = client.link();
        if link.apply_isupport(msg.params()) {
            info!("Casemapping changed, rekeying users and channels");
            client.users().rekey_all();
            client.channels().rekey_all();
        }
        let network = link.isupport().string("NETWORK");
        if let Some(network) = network {
            link.update_profile(|p| *p = NetworkProfile::new(Some(&network), p.ircd));
        }
    }

    fn on_join(&self, msg: &IncomingMessage, out: &mut Vec<Emit>) {
        let (Some(user), Some(channel)) = (&msg.user, &msg.channel) else {
            return;
        };
        let params = msg.params();

        if self.registration.is_enabled("extended-join") && params.len() >= 3 {
            let account = &params[1];
            user.authname.sync((account != "*").then(|| account.clone()));
            user.realname.sync(params[2].clone());
        }

        channel.add_user(Arc::clone(user), Vec::new());
        if is_me(user) {
            if let (Some(ident), Some(host)) = (
                msg.message.prefix.as_ref().and_then(|p| p.user()),
                msg.message.prefix.as_ref().and_then(|p| p.host()),
            ) {
                self.client
                    .link()
                    .set_own_mask(format!("{}!{ident}@{host}", user.nick()));
            }
            info!(channel = %channel.name(), "Joined");
            channel.sync_modes();
        }
        online(user, true, out);
    }

    fn on_part(&self, msg: &IncomingMessage, out: &mut Vec<Emit>) {
        let (Some(user), Some(channel)) = (&msg.user, &msg.channel) else {
            return;
        };
        self.leave_channel(channel, user);
        out.push((Event::Leaving, vec![EventArg::User(Arc::clone(user))]));
    }

    fn on_kick(&self, msg: &IncomingMessage, out: &mut Vec<Emit>) {
        let (Some(channel), Some(nick)) = (&msg.channel, msg.params().get(1)) else {
            return;
        };
        let target = self.client.users().find_ensure(nick, None, None);
        self.leave_channel(channel, &target);
        out.push((Event::Leaving, vec![EventArg::User(target)]));
    }

    fn leave_channel(&self, channel: &Channel, user: &User) {
        if is_me(user) {
            info!(channel = %channel.name(), "Left channel");
            channel.clear_users();
            channel.unsync_all();
        } else {
            channel.remove_user(user);
        }
    }

    /// QUIT and KILL: the user is gone from every channel.
    fn leave_network(&self, user: &Arc<User>, out: &mut Vec<Emit>) {
        for channel in self.client.channels().with_user(user) {
            channel.remove_user(user);
        }
        user.unsync_all();
        online(user, false, out);
        out.push((Event::Leaving, vec![EventArg::User(Arc::clone(user))]));
    }

    fn on_nick(&self, msg: &IncomingMessage, out: &mut Vec<Emit>) {
        let (Some(user), Some(new_nick)) = (&msg.user, msg.params().first()) else {
            return;
        };
        if is_me(user) {
            let link = self.client.link();
            let mask = link.own_mask();
            let rest = mask.find('!').map_or("", |i| &mask[i..]);
            link.set_own_mask(format!("{new_nick}{rest}"));
            info!(old = %user.nick(), new = %new_nick, "Own nick changed");
        }
        self.client.users().update_nick(user, new_nick);
        online(user, true, out);
    }

    fn on_mode(&self, msg: &IncomingMessage, out: &mut Vec<Emit>) {
        let params = msg.params();
        let (Some(target), Some(modes)) = (params.first(), params.get(1)) else {
            return;
        };
        let client = &self.client;
        let link = client.link();

        let Some(channel) = &msg.channel else {
            if link.fold(target) == link.fold(&client.nick()) {
                let changes = user_mode_changes(modes);
                for change in &changes {
                    client.set_own_mode(change.mode, change.is_add());
                }
                out.push((Event::ModeChange, vec![EventArg::Modes(changes)]));
            }
            return;
        };

        let (param_modes, prefix, list_modes) = {
            let isupport = link.isupport();
            (isupport.param_modes(), isupport.prefix(), isupport.chanmodes().a)
        };
        let changes = match parse_modes(modes, &params[2..], &param_modes) {
            Ok(changes) => changes,
            Err(e) => {
                warn!(channel = %channel.name(), error = %e, "Ignoring unparseable mode change");
                return;
            }
        };
        let owner_mode = link.profile().owner_list_mode();
        let setter = msg
            .user
            .as_ref()
            .map(|u| u.nick())
            .or_else(|| msg.server.clone());

        for change in &changes {
            let add = change.is_add();
            let param = change.param.as_deref();

            if prefix.is_prefix_mode(change.mode) {
                let Some(nick) = param else { continue };
                let user = client.users().find_ensure(nick, None, None);
                channel.set_member_mode(&user, change.mode, add);
                if let Some(event) = Event::for_occupant_mode(change.mode, add) {
                    out.push((event, vec![EventArg::User(user)]));
                }
            } else if change.mode == 'b' {
                let Some(mask) = param else { continue };
                let ban = Ban::new(mask, setter.as_deref(), msg.time);
                channel.bans.modify(|bans| {
                    bans.retain(|b| b.mask != ban.mask);
                    if add {
                        bans.push(ban.clone());
                    }
                });
                let event = if add { Event::Ban } else { Event::Unban };
                out.push((event, vec![EventArg::Ban(ban)]));
            } else if Some(change.mode) == owner_mode {
                let Some(entry) = param else { continue };
                let nick = entry.split('!').next().unwrap_or(entry);
                let user = client.users().find_ensure(nick, None, None);
                channel.owners.modify(|owners| {
                    owners.retain(|o| o.id() != user.id());
                    if add {
                        owners.push(Arc::clone(&user));
                    }
                });
            } else if list_modes.contains(&change.mode) {
                // Exception and invite lists are not tracked.
            } else {
                channel.modes.modify(|table| {
                    if add {
                        table.insert(change.mode, change.param.clone());
                    } else {
                        table.remove(&change.mode);
                    }
                });
            }
        }
        out.push((Event::ModeChange, vec![EventArg::Modes(changes)]));
    }

    fn on_privmsg(&self, msg: &IncomingMessage, out: &mut Vec<Emit>) {
        let Some(user) = &msg.user else {
            return;
        };
        online(user, true, out);

        if let Some(payload) = msg.message.ctcp_message()
            && payload.starts_with("DCC SEND ")
        {
            match DccSend::parse(payload, Arc::clone(user)) {
                Some(send) => out.push((Event::DccSend, vec![EventArg::Dcc(send)])),
                None => warn!(nick = %user.nick(), payload = %payload, "Malformed DCC SEND"),
            }
        }
    }

    fn on_chghost(&self, msg: &IncomingMessage) {
        let Some(user) = &msg.user else {
            return;
        };
        let params = msg.params();
        let (ident, host) = (params.first(), params.get(1));
        user.sync_user_host(ident.map(String::as_str), host.map(String::as_str));
        if is_me(user)
            && let (Some(ident), Some(host)) = (ident, host)
        {
            self.client
                .link()
                .set_own_mask(format!("{}!{ident}@{host}", user.nick()));
        }
    }

    fn whois_user(&self, msg: &IncomingMessage) -> Option<Arc<User>> {
        let nick = msg.params().get(1)?;
        if self.client.link().is_channel(nick) {
            return None;
        }
        Some(self.client.users().find_ensure(nick, None, None))
    }

    fn on_whois_reply(&self, msg: &IncomingMessage) {
        let Some(user) = self.whois_user(msg) else {
            return;
        };
        let params = msg.params();
        let arg = |i: usize| params.get(i).cloned();
        let mut whois = user.whois.lock();

        match msg.command() {
            "301" => whois.away = arg(2),
            "311" => {
                whois.user = arg(2);
                whois.host = arg(3);
                whois.realname = arg(5);
            }
            "313" => whois.oper = true,
            "317" => {
                whois.idle = params.get(2).and_then(|s| s.parse().ok()).unwrap_or(0);
                whois.signed_on_at = params
                    .get(3)
                    .and_then(|s| s.parse::<i64>().ok())
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0));
            }
            "319" => {
                let prefix = self.client.link().isupport().prefix();
                whois.channels.extend(
                    params
                        .get(2)
                        .map(String::as_str)
                        .unwrap_or_default()
                        .split_whitespace()
                        .map(|entry| prefix.strip_prefixes(entry).1.to_string()),
                );
            }
            "330" => whois.authname = arg(2),
            "671" => whois.secure = true,
            _ => {}
        }
    }

    fn on_end_of_whois(&mut self, msg: &IncomingMessage, out: &mut Vec<Emit>) {
        let Some(user) = self.whois_user(msg) else {
            return;
        };
        if !self.whois_missing.remove(&user.id()) {
            online_change(&user, user.end_of_whois(true), out);
        }
    }

    fn on_no_such_nick(&mut self, msg: &IncomingMessage, out: &mut Vec<Emit>) {
        let Some(user) = self.whois_user(msg) else {
            return;
        };
        // Only a 401 answering our own WHOIS is followed by a 318 to swallow.
        if user.in_whois() {
            self.whois_missing.insert(user.id());
            online_change(&user, user.end_of_whois(false), out);
        } else {
            user.unknown.sync(true);
            online(&user, false, out);
        }
    }

    fn on_who_reply(&self, msg: &IncomingMessage) {
        let params = msg.params();
        let (Some(ident), Some(host), Some(nick)) = (params.get(2), params.get(3), params.get(5))
        else {
            return;
        };
        let user = self
            .client
            .users()
            .find_ensure(nick, Some(ident.as_str()), Some(host.as_str()));
        // "<hopcount> <realname>"
        if let Some((_, realname)) = params.get(7).and_then(|s| s.split_once(' ')) {
            user.realname.sync(realname.to_string());
        }
    }

    /// Reply to `WHO #chan %acfhnru`, fields in WHOX order:
    /// channel, user, host, nick, flags, account, realname.
    fn on_whox_reply(&self, msg: &IncomingMessage) {
        let params = msg.params();
        let [_, _, ident, host, nick, _, account, realname, ..] = params else {
            return;
        };
        let user = self
            .client
            .users()
            .find_ensure(nick, Some(ident.as_str()), Some(host.as_str()));
        user.realname.sync(realname.clone());
        user.authname.sync((account != "0").then(|| account.clone()));
    }

    fn on_channel_modes(&self, msg: &IncomingMessage) {
        let Some(channel) = &msg.channel else {
            return;
        };
        let params = msg.params();
        let Some(modes) = params.get(2) else {
            return;
        };
        let args = params.get(3..).unwrap_or_default();
        let (param_modes, prefix) = {
            let isupport = self.client.link().isupport();
            (isupport.param_modes(), isupport.prefix())
        };
        match parse_modes(modes, args, &param_modes) {
            Ok(changes) => {
                let table = changes
                    .into_iter()
                    .filter(|c| c.is_add() && !prefix.is_prefix_mode(c.mode))
                    .map(|c| (c.mode, c.param))
                    .collect();
                channel.modes.sync(table);
            }
            Err(e) => warn!(channel = %channel.name(), error = %e, "Ignoring unparseable channel modes"),
        }
    }

    fn on_names_reply(&mut self, msg: &IncomingMessage) {
        let Some(channel) = &msg.channel else {
            return;
        };
        let key = self.key(channel);
        if self.names.insert(key) {
            channel.clear_users();
        }
        let prefix = self.client.link().isupport().prefix();
        let entries = msg.params().get(3).map(String::as_str).unwrap_or_default();

        for entry in entries.split_whitespace() {
            let (modes, rest) = prefix.strip_prefixes(entry);
            let user = match split_mask(rest) {
                Some((nick, ident, host)) => {
                    self.client
                        .users()
                        .find_ensure(nick, Some(ident), Some(host))
                }
                None => self.client.users().find_ensure(rest, None, None),
            };
            channel.add_user(user, modes);
        }
    }

    fn on_ban_list(&mut self, msg: &IncomingMessage) {
        let Some(channel) = &msg.channel else {
            return;
        };
        let params = msg.params();
        let Some(mask) = params.get(2) else {
            return;
        };
        let key = self.key(channel);
        if self.bans.insert(key) {
            channel.bans.store(Vec::new());
        }
        let created_at = params
            .get(4)
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
            .unwrap_or(msg.time);
        let ban = Ban::new(mask, params.get(3).map(String::as_str), created_at);
        channel.bans.modify(|bans| bans.push(ban));
    }

    fn on_owner_list(&mut self, msg: &IncomingMessage) {
        let Some(channel) = &msg.channel else {
            return;
        };
        let Some(entry) = msg.params().get(2) else {
            return;
        };
        let key = self.key(channel);
        if self.owners.insert(key) {
            channel.owners.store(Vec::new());
        }
        let nick = entry.split('!').next().unwrap_or(entry);
        let user = self.client.users().find_ensure(nick, None, None);
        channel.owners.modify(|owners| owners.push(user));
    }

    fn on_nick_in_use(&self, msg: &IncomingMessage) {
        if self.registered {
            return;
        }
        let client = &self.client;
        let taken = msg
            .params()
            .get(1)
            .cloned()
            .unwrap_or_else(|| client.nick());
        let next = client.generate_next_nick(Some(&taken));
        info!(taken = %taken, next = %next, "Nick in use");
        client.users().update_nick(client.me(), &next);
        client.link().send(format!("NICK {next}"));
    }

    fn on_monitor(&self, msg: &IncomingMessage, out: &mut Vec<Emit>) {
        let is_online = msg.command() == "730";
        let targets = msg.params().get(1).map(String::as_str).unwrap_or_default();
        for target in targets.split(',').filter(|t| !t.is_empty()) {
            let user = match split_mask(target) {
                Some((nick, ident, host)) => {
                    self.client
                        .users()
                        .find_ensure(nick, Some(ident), Some(host))
                }
                None => self.client.users().find_ensure(target, None, None),
            };
            online(&user, is_online, out);
        }
    }
}

/// Events derived from the command alone.
fn message_events(msg: &IncomingMessage, out: &mut Vec<Emit>) {
    let command = msg.command();
    if command == "PRIVMSG" || command == "NOTICE" {
        if msg.is_ctcp() {
            out.push((Event::Ctcp, Vec::new()));
        }
        if msg.is_channel() {
            out.push((Event::Channel, Vec::new()));
        } else {
            out.push((Event::Private, Vec::new()));
        }
        if command == "PRIVMSG" {
            out.push((Event::Message, Vec::new()));
        }
        if msg.is_action() {
            out.push((Event::Action, Vec::new()));
        }
        if command == "NOTICE" {
            out.push((Event::Notice, Vec::new()));
        }
    } else if msg.error().is_some() {
        out.push((Event::Error, Vec::new()));
    }
}

fn is_me(user: &User) -> bool {
    user.id() == OWN_USER_ID
}

fn online(user: &Arc<User>, is_online: bool, out: &mut Vec<Emit>) {
    online_change(user, user.set_online(is_online), out);
}

fn online_change(user: &Arc<User>, change: Option<bool>, out: &mut Vec<Emit>) {
    let event = match change {
        Some(true) => Event::Online,
        Some(false) => Event::Offline,
        None => return,
    };
    out.push((event, vec![EventArg::User(Arc::clone(user))]));
}

/// Split `nick!user@host`.
fn split_mask(mask: &str) -> Option<(&str, &str, &str)> {
    let (nick, rest) = mask.split_once('!')?;
    let (user, host) = rest.split_once('@')?;
    Some((nick, user, host))
}

/// User modes never take parameters the client cares about.
fn user_mode_changes(modes: &str) -> Vec<ModeChange> {
    let mut direction = Direction::Add;
    modes
        .chars()
        .filter_map(|c| match c {
            '+' => {
                direction = Direction::Add;
                None
            }
            '-' => {
                direction = Direction::Remove;
                None
            }
            mode => Some(ModeChange::new(direction, mode, None)),
        })
        .collect()
}
