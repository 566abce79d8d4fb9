//! Channels known to the client.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use slirc_proto::FormattedStringExt;

use super::lists::OWN_USER_ID;
use super::mask::{Ban, Mask};
use super::syncable::Synced;
use super::user::User;
use crate::error::{StrictModeViolation, SyncError};
use crate::link::Link;
use crate::target::Target;

/// A user in a channel with their occupant modes (`o`, `v`, …).
#[derive(Debug, Clone)]
pub struct Member {
    pub user: Arc<User>,
    pub modes: Vec<char>,
}

impl Member {
    pub fn has_mode(&self, mode: char) -> bool {
        self.modes.contains(&mode)
    }
}

/// Channel modes: flag modes map to `None`, parameter modes to their value.
pub type ModeTable = HashMap<char, Option<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attr {
    Users,
    Topic,
    Bans,
    Owners,
    Modes,
}

pub struct Channel {
    name: String,
    link: Arc<Link>,
    in_channel: AtomicBool,
    pub(crate) users: Synced<BTreeMap<u64, Member>>,
    pub(crate) topic: Synced<Option<String>>,
    pub(crate) bans: Synced<Vec<Ban>>,
    pub(crate) owners: Synced<Vec<Arc<User>>>,
    pub(crate) modes: Synced<ModeTable>,
}

impl Channel {
    pub(crate) fn new(name: &str, link: Arc<Link>) -> Self {
        Self {
            name: name.to_owned(),
            link,
            in_channel: AtomicBool::new(false),
            users: Synced::new("users"),
            topic: Synced::new("topic"),
            bans: Synced::new("bans"),
            owners: Synced::new("owners"),
            modes: Synced::new("modes"),
        }
    }

    /// Whether the client itself is in the channel.
    pub fn is_joined(&self) -> bool {
        self.in_channel.load(Ordering::Acquire)
    }

    /// Ask the server for an attribute that is not synced yet.
    ///
    /// While joined, only the topic has to be asked for; everything else
    /// arrives with the join burst.
    fn request(&self, attr: Attr) {
        if self.is_joined() {
            if attr == Attr::Topic {
                self.link.send(format!("TOPIC {}", self.name));
            }
            return;
        }
        match attr {
            Attr::Users => self.link.send(format!("NAMES {}", self.name)),
            Attr::Topic => self.link.send(format!("TOPIC {}", self.name)),
            Attr::Bans => self.link.send(format!("MODE {} +b", self.name)),
            Attr::Owners => match self.link.profile().owner_list_mode() {
                Some(mode) => self.link.send(format!("MODE {} +{mode}", self.name)),
                None => self.owners.mark_as_synced(),
            },
            Attr::Modes => self.link.send(format!("MODE {}", self.name)),
        }
    }

    async fn lazy<T>(&self, cell: &Synced<T>, attr: Attr) -> Result<T, SyncError>
    where
        T: Clone + Default + Send + Sync,
    {
        cell.get(&self.name, || self.request(attr)).await
    }

    /// Every member with their occupant modes.
    pub async fn users(&self) -> Result<Vec<Member>, SyncError> {
        Ok(self.lazy(&self.users, Attr::Users).await?.into_values().collect())
    }

    pub async fn topic(&self) -> Result<Option<String>, SyncError> {
        self.lazy(&self.topic, Attr::Topic).await
    }

    pub async fn bans(&self) -> Result<Vec<Ban>, SyncError> {
        self.lazy(&self.bans, Attr::Bans).await
    }

    /// Entries of the owner list, on ircds that have one.
    pub async fn owners(&self) -> Result<Vec<Arc<User>>, SyncError> {
        self.lazy(&self.owners, Attr::Owners).await
    }

    pub async fn modes(&self) -> Result<ModeTable, SyncError> {
        self.lazy(&self.modes, Attr::Modes).await
    }

    fn member_has(&self, user: &User, mode: char) -> bool {
        self.users
            .with(|users| users.get(&user.id()).is_some_and(|m| m.has_mode(mode)))
    }

    fn members_with(&self, mode: char) -> Vec<Arc<User>> {
        self.users.with(|users| {
            users
                .values()
                .filter(|m| m.has_mode(mode))
                .map(|m| Arc::clone(&m.user))
                .collect()
        })
    }

    pub fn has_user(&self, user: &User) -> bool {
        self.users.with(|users| users.contains_key(&user.id()))
    }

    pub fn is_opped(&self, user: &User) -> bool {
        self.member_has(user, 'o')
    }

    pub fn is_half_opped(&self, user: &User) -> bool {
        self.member_has(user, 'h')
    }

    pub fn is_voiced(&self, user: &User) -> bool {
        self.member_has(user, 'v')
    }

    pub fn ops(&self) -> Vec<Arc<User>> {
        self.members_with('o')
    }

    pub fn half_ops(&self) -> Vec<Arc<User>> {
        self.members_with('h')
    }

    pub fn voiced(&self) -> Vec<Arc<User>> {
        self.members_with('v')
    }

    pub fn admins(&self) -> Vec<Arc<User>> {
        self.members_with('a')
    }

    fn mode_value(&self, mode: char) -> Option<Option<String>> {
        self.modes.with(|modes| modes.get(&mode).cloned())
    }

    /// The `+l` user limit, if set.
    pub fn limit(&self) -> Option<usize> {
        self.mode_value('l').flatten().and_then(|l| l.parse().ok())
    }

    /// The `+k` key, if set and known.
    pub fn key(&self) -> Option<String> {
        self.mode_value('k').flatten()
    }

    pub fn is_secret(&self) -> bool {
        self.mode_value('s').is_some()
    }

    pub fn is_moderated(&self) -> bool {
        self.mode_value('m').is_some()
    }

    pub fn is_invite_only(&self) -> bool {
        self.mode_value('i').is_some()
    }

    /// Invalidate the member list, bans, modes and owners and request them
    /// again.
    pub fn sync_modes(&self) {
        self.users.unsync();
        self.bans.unsync();
        self.modes.unsync();
        self.owners.unsync();

        if self.link.isupport().is_announced("WHOX") {
            self.link.send(format!("WHO {} %acfhnru", self.name));
        } else {
            self.link.send(format!("WHO {}", self.name));
        }
        self.link.send(format!("MODE {} +b", self.name));
        self.link.send(format!("MODE {}", self.name));
        match self.link.profile().owner_list_mode() {
            Some(mode) => self.link.send(format!("MODE {} +{mode}", self.name)),
            None => self.owners.mark_as_synced(),
        }
    }

    /// Join, reusing the known key when none is given.
    pub fn join(&self, key: Option<&str>) {
        let key = key.map(str::to_owned).or_else(|| self.key());
        match key {
            Some(key) => self.link.send(format!("JOIN {} {key}", self.name)),
            None => self.link.send(format!("JOIN {}", self.name)),
        }
    }

    pub fn part(&self, reason: Option<&str>) {
        match reason {
            Some(reason) => self.link.send(format!("PART {} :{reason}", self.name)),
            None => self.link.send(format!("PART {}", self.name)),
        }
    }

    /// Kick a user. In strict mode a reason longer than `KICKLEN` is
    /// refused before anything is sent.
    pub fn kick(&self, nick: &str, reason: Option<&str>) -> Result<(), StrictModeViolation> {
        let reason = reason.unwrap_or_default();
        if self.link.is_strict()
            && let Some(max) = self.link.isupport().limit("KICKLEN")
            && reason.chars().count() > max
        {
            return Err(StrictModeViolation::KickReasonTooLong {
                len: reason.chars().count(),
                max,
            });
        }
        self.link
            .send(format!("KICK {} {nick} :{reason}", self.name));
        Ok(())
    }

    /// Force a user to part (`REMOVE`), on networks that support it.
    pub fn remove(&self, nick: &str, reason: Option<&str>) {
        self.link.send(format!(
            "REMOVE {} {nick} :{}",
            self.name,
            reason.unwrap_or_default()
        ));
    }

    pub fn invite(&self, nick: &str) {
        self.link.send(format!("INVITE {nick} {}", self.name));
    }

    /// Change the topic. In strict mode a topic longer than `TOPICLEN` is
    /// refused before anything is sent.
    pub fn set_topic(&self, topic: &str) -> Result<(), StrictModeViolation> {
        if self.link.is_strict()
            && let Some(max) = self.link.isupport().limit("TOPICLEN")
            && topic.chars().count() > max
        {
            return Err(StrictModeViolation::TopicTooLong {
                len: topic.chars().count(),
                max,
            });
        }
        self.link.send(format!("TOPIC {} :{topic}", self.name));
        Ok(())
    }

    pub fn ban(&self, mask: &str) -> Mask {
        let mask = Mask::new(mask);
        self.set_mode(&format!("+b {mask}"));
        mask
    }

    pub fn unban(&self, mask: &str) -> Mask {
        let mask = Mask::new(mask);
        self.set_mode(&format!("-b {mask}"));
        mask
    }

    pub fn op(&self, nick: &str) {
        self.set_mode(&format!("+o {nick}"));
    }

    pub fn deop(&self, nick: &str) {
        self.set_mode(&format!("-o {nick}"));
    }

    pub fn voice(&self, nick: &str) {
        self.set_mode(&format!("+v {nick}"));
    }

    pub fn devoice(&self, nick: &str) {
        self.set_mode(&format!("-v {nick}"));
    }

    /// Send a raw mode change such as `+m` or `+l 10`.
    pub fn set_mode(&self, modes: &str) {
        self.link.send(format!("MODE {} {modes}", self.name));
    }

    pub fn set_limit(&self, limit: Option<usize>) {
        match limit {
            Some(limit) => self.set_mode(&format!("+l {limit}")),
            None => self.set_mode("-l"),
        }
    }

    pub fn set_key(&self, key: Option<&str>) {
        match key {
            Some(key) => self.set_mode(&format!("+k {key}")),
            None => self.set_mode(&format!("-k {}", self.key().unwrap_or_default())),
        }
    }

    fn toggle(&self, mode: char, on: bool) {
        let sign = if on { '+' } else { '-' };
        self.set_mode(&format!("{sign}{mode}"));
    }

    pub fn set_invite_only(&self, on: bool) {
        self.toggle('i', on);
    }

    pub fn set_moderated(&self, on: bool) {
        self.toggle('m', on);
    }

    pub fn set_secret(&self, on: bool) {
        self.toggle('s', on);
    }

    pub(crate) fn add_user(&self, user: Arc<User>, modes: Vec<char>) {
        if user.id() == OWN_USER_ID {
            self.in_channel.store(true, Ordering::Release);
        }
        self.users.modify(|users| {
            users.insert(user.id(), Member { user, modes });
        });
    }

    pub(crate) fn remove_user(&self, user: &User) {
        if user.id() == OWN_USER_ID {
            self.in_channel.store(false, Ordering::Release);
        }
        self.users.modify(|users| {
            users.remove(&user.id());
        });
    }

    pub(crate) fn clear_users(&self) {
        self.users.modify(BTreeMap::clear);
    }

    /// Add or remove an occupant mode. Returns whether the user is a member.
    pub(crate) fn set_member_mode(&self, user: &User, mode: char, on: bool) -> bool {
        self.users.modify(|users| {
            let Some(member) = users.get_mut(&user.id()) else {
                return false;
            };
            member.modes.retain(|&m| m != mode);
            if on {
                member.modes.push(mode);
            }
            true
        })
    }

    pub(crate) fn unsync_all(&self) {
        self.in_channel.store(false, Ordering::Release);
        self.users.unsync();
        self.topic.unsync();
        self.bans.unsync();
        self.owners.unsync();
        self.modes.unsync();
    }
}

impl Target for Channel {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn link(&self) -> &Link {
        &self.link
    }

    /// Channels with `+c` reject formatted text.
    fn prepare<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if self.mode_value('c').is_some() {
            text.strip_formatting()
        } else {
            Cow::Borrowed(text)
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("joined", &self.is_joined())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
