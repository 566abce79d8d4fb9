//! Users known to the client.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::mask::Mask;
use super::syncable::Synced;
use crate::error::SyncError;
use crate::link::Link;
use crate::target::Target;

/// How often a monitored user is polled on servers without `MONITOR`.
const MONITOR_POLL: Duration = Duration::from_secs(30);

/// Replies collected between `311` and `318`.
#[derive(Debug, Clone, Default)]
pub(crate) struct Whois {
    pub user: Option<String>,
    pub host: Option<String>,
    pub realname: Option<String>,
    pub authname: Option<String>,
    pub away: Option<String>,
    pub idle: u64,
    pub signed_on_at: Option<DateTime<Utc>>,
    pub secure: bool,
    pub oper: bool,
    pub channels: Vec<String>,
}

/// A user on the network, the client itself included.
///
/// Attribute getters are async: when the value is not known yet they send a
/// `WHOIS` and wait for the reply. They must not be called from the reader
/// task.
pub struct User {
    id: u64,
    link: Arc<Link>,
    nick: RwLock<String>,
    last_nick: RwLock<Option<String>>,

    pub(crate) user: Synced<String>,
    pub(crate) host: Synced<String>,
    pub(crate) realname: Synced<String>,
    pub(crate) authname: Synced<Option<String>>,
    pub(crate) away: Synced<Option<String>>,
    pub(crate) idle: Synced<u64>,
    pub(crate) signed_on_at: Synced<Option<DateTime<Utc>>>,
    pub(crate) secure: Synced<bool>,
    pub(crate) oper: Synced<bool>,
    pub(crate) unknown: Synced<bool>,
    pub(crate) channels: Synced<Vec<String>>,
    pub(crate) online: Synced<bool>,

    in_whois: AtomicBool,
    pub(crate) whois: Mutex<Whois>,
    monitored: AtomicBool,
    monitor_task: Mutex<Option<CancellationToken>>,
}

impl User {
    pub(crate) fn new(id: u64, nick: &str, link: Arc<Link>) -> Self {
        Self {
            id,
            link,
            nick: RwLock::new(nick.to_owned()),
            last_nick: RwLock::new(None),
            user: Synced::new("user"),
            host: Synced::new("host"),
            realname: Synced::new("realname"),
            authname: Synced::new("authname"),
            away: Synced::new("away"),
            idle: Synced::new("idle"),
            signed_on_at: Synced::new("signed_on_at"),
            secure: Synced::new("secure"),
            oper: Synced::new("oper"),
            unknown: Synced::new("unknown"),
            channels: Synced::new("channels"),
            online: Synced::new("online"),
            in_whois: AtomicBool::new(false),
            whois: Mutex::new(Whois::default()),
            monitored: AtomicBool::new(false),
            monitor_task: Mutex::new(None),
        }
    }

    /// Stable identity within one client, unaffected by nick changes.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn nick(&self) -> String {
        self.nick.read().clone()
    }

    /// The nick before the most recent change.
    pub fn last_nick(&self) -> Option<String> {
        self.last_nick.read().clone()
    }

    async fn whois_attr<T>(&self, cell: &Synced<T>) -> Result<T, SyncError>
    where
        T: Clone + Default + Send + Sync,
    {
        let nick = self.nick();
        cell.get(&nick, || self.request_whois()).await
    }

    pub async fn user(&self) -> Result<String, SyncError> {
        self.whois_attr(&self.user).await
    }

    pub async fn host(&self) -> Result<String, SyncError> {
        self.whois_attr(&self.host).await
    }

    pub async fn realname(&self) -> Result<String, SyncError> {
        self.whois_attr(&self.realname).await
    }

    /// The services account, if the user is logged in.
    pub async fn authname(&self) -> Result<Option<String>, SyncError> {
        self.whois_attr(&self.authname).await
    }

    /// The away message, if the user is away.
    pub async fn away(&self) -> Result<Option<String>, SyncError> {
        self.whois_attr(&self.away).await
    }

    /// Seconds idle, as of the last WHOIS.
    pub async fn idle(&self) -> Result<u64, SyncError> {
        self.whois_attr(&self.idle).await
    }

    pub async fn signed_on_at(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        self.whois_attr(&self.signed_on_at).await
    }

    /// Whether the user is connected over TLS.
    pub async fn is_secure(&self) -> Result<bool, SyncError> {
        self.whois_attr(&self.secure).await
    }

    pub async fn is_oper(&self) -> Result<bool, SyncError> {
        self.whois_attr(&self.oper).await
    }

    /// Whether the last WHOIS found no such nick.
    pub async fn is_unknown(&self) -> Result<bool, SyncError> {
        self.whois_attr(&self.unknown).await
    }

    /// Channels listed in the last WHOIS.
    pub async fn channels(&self) -> Result<Vec<String>, SyncError> {
        self.whois_attr(&self.channels).await
    }

    pub async fn is_online(&self) -> Result<bool, SyncError> {
        if self.is_monitored() && self.online.is_synced() {
            return Ok(self.online.peek());
        }
        self.whois_attr(&self.online).await
    }

    pub async fn is_authed(&self) -> Result<bool, SyncError> {
        Ok(self.authname().await?.is_some())
    }

    /// `nick!user@host` with whatever is currently known.
    pub fn mask(&self) -> Mask {
        Mask::from_parts(&self.nick(), &self.user.peek(), &self.host.peek())
    }

    /// Whether this user's current hostmask matches `mask`.
    pub fn matches(&self, mask: &str) -> bool {
        Mask::new(mask).matches(self.mask().as_str())
    }

    /// Forget everything learned from WHOIS and ask again.
    pub fn refresh(&self) {
        if self.in_whois.load(Ordering::Acquire) {
            return;
        }
        self.unsync_whois_attrs();
        self.request_whois();
    }

    fn request_whois(&self) {
        if self.in_whois.swap(true, Ordering::AcqRel) {
            return;
        }
        let nick = self.nick();
        if self.link.profile().whois_only_one_argument() {
            self.link.send(format!("WHOIS {nick}"));
        } else {
            self.link.send(format!("WHOIS {nick} {nick}"));
        }
    }

    fn unsync_whois_attrs(&self) {
        self.user.unsync();
        self.host.unsync();
        self.realname.unsync();
        self.authname.unsync();
        self.away.unsync();
        self.idle.unsync();
        self.signed_on_at.unsync();
        self.secure.unsync();
        self.oper.unsync();
        self.unknown.unsync();
        self.channels.unsync();
        self.online.unsync();
    }

    pub(crate) fn unsync_all(&self) {
        self.in_whois.store(false, Ordering::Release);
        self.unsync_whois_attrs();
    }

    /// Record a user and host seen in a message prefix.
    pub(crate) fn sync_user_host(&self, user: Option<&str>, host: Option<&str>) {
        if let Some(user) = user.filter(|u| !u.is_empty()) {
            self.user.sync(user.to_owned());
        }
        if let Some(host) = host.filter(|h| !h.is_empty()) {
            self.host.sync(host.to_owned());
        }
    }

    /// Apply a nick change. The account may be tied to the old nick, so it
    /// is forgotten.
    pub(crate) fn update_nick(&self, new_nick: &str) {
        let old = std::mem::replace(&mut *self.nick.write(), new_nick.to_owned());
        *self.last_nick.write() = Some(old);
        self.authname.unsync();
    }

    pub(crate) fn in_whois(&self) -> bool {
        self.in_whois.load(Ordering::Acquire)
    }

    /// Publish the collected WHOIS reply.
    ///
    /// Returns the online state change to announce, if any.
    pub(crate) fn end_of_whois(&self, found: bool) -> Option<bool> {
        self.in_whois.store(false, Ordering::Release);
        let whois = std::mem::take(&mut *self.whois.lock());

        if !found {
            self.unknown.sync(true);
            self.idle.sync(0);
            self.channels.sync(Vec::new());
            self.authname.sync(None);
            self.away.sync(None);
            self.secure.sync(false);
            self.oper.sync(false);
            self.signed_on_at.sync(None);
            self.realname.mark_as_synced();
            self.user.mark_as_synced();
            self.host.mark_as_synced();
            return self.set_online(false);
        }

        if let Some(user) = whois.user {
            self.user.sync(user);
        } else {
            self.user.mark_as_synced();
        }
        if let Some(host) = whois.host {
            self.host.sync(host);
        } else {
            self.host.mark_as_synced();
        }
        self.realname.sync(whois.realname.unwrap_or_default());
        self.authname.sync(whois.authname);
        self.away.sync(whois.away);
        self.idle.sync(whois.idle);
        self.signed_on_at.sync(whois.signed_on_at);
        self.secure.sync(whois.secure);
        self.oper.sync(whois.oper);
        self.channels.sync(whois.channels);
        self.unknown.sync(false);
        self.set_online(true)
    }

    /// Update the online flag.
    ///
    /// Returns the new state when it changed and the user is monitored, i.e.
    /// when an `Online`/`Offline` event is due.
    pub(crate) fn set_online(&self, online: bool) -> Option<bool> {
        let was = self.online.peek();
        self.online.sync(online);
        (self.is_monitored() && was != online).then_some(online)
    }

    pub fn is_monitored(&self) -> bool {
        self.monitored.load(Ordering::Acquire)
    }

    /// Track whether the user is online.
    ///
    /// Uses `MONITOR` when the server supports it and polls with `WHOIS`
    /// otherwise.
    pub fn monitor(self: &Arc<Self>) {
        if self.monitored.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.link.isupport().is_announced("MONITOR") {
            self.link.send(format!("MONITOR + {}", self.nick()));
            return;
        }

        self.refresh();
        let token = CancellationToken::new();
        *self.monitor_task.lock() = Some(token.clone());
        let user = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + MONITOR_POLL, MONITOR_POLL);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticks.tick() => {
                        let Some(user) = user.upgrade() else { break };
                        user.refresh();
                    }
                }
            }
            debug!("monitor poll stopped");
        });
    }

    pub fn unmonitor(&self) {
        if !self.monitored.swap(false, Ordering::AcqRel) {
            return;
        }
        if self.link.isupport().is_announced("MONITOR") {
            self.link.send(format!("MONITOR - {}", self.nick()));
        }
        if let Some(token) = self.monitor_task.lock().take() {
            token.cancel();
        }
    }
}

impl Drop for User {
    fn drop(&mut self) {
        if let Some(token) = self.monitor_task.get_mut().take() {
            token.cancel();
        }
    }
}

impl Target for User {
    fn name(&self) -> String {
        self.nick()
    }

    fn link(&self) -> &Link {
        &self.link
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("nick", &*self.nick.read())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.nick.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::network::{Ircd, NetworkProfile, OutgoingQueue};

    fn user(nick: &str) -> Arc<User> {
        let link = Arc::new(Link::new(
            &Config::new("irc.example.org"),
            Arc::new(OutgoingQueue::new()),
        ));
        Arc::new(User::new(1, nick, link))
    }

    fn sent(user: &User) -> Vec<String> {
        std::iter::from_fn(|| user.link.queue().pop()).collect()
    }

    #[test]
    fn test_mask_and_match() {
        let user = user("foo");
        user.sync_user_host(Some("u"), Some("h"));
        assert_eq!(user.mask().to_string(), "foo!u@h");
        assert!(user.matches("foo!u@h"));
        assert!(user.matches("FOO!*@*"));
        assert!(!user.matches("bar!*@*"));
    }

    #[test]
    fn test_update_nick_keeps_last_nick() {
        let user = user("foo");
        user.authname.sync(Some("account".into()));
        user.update_nick("bar");
        assert_eq!(user.nick(), "bar");
        assert_eq!(user.last_nick().as_deref(), Some("foo"));
        assert!(!user.authname.is_synced());
    }

    #[tokio::test]
    async fn test_authed() {
        let user = user("foo");
        user.authname.sync(None);
        assert!(!user.is_authed().await.unwrap());
        user.authname.sync(Some("account".into()));
        assert!(user.is_authed().await.unwrap());
    }

    #[test]
    fn test_refresh_sends_whois_once() {
        let user = user("foo");
        user.refresh();
        user.refresh();
        assert_eq!(sent(&user), ["WHOIS foo foo"]);
    }

    #[test]
    fn test_single_argument_whois() {
        let user = user("foo");
        user.link
            .update_profile(|p| *p = NetworkProfile::new(Some("jtv"), Ircd::Unknown));
        user.refresh();
        assert_eq!(sent(&user), ["WHOIS foo"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_read_waits_for_whois() {
        let user = user("foo");
        let reader = {
            let user = Arc::clone(&user);
            tokio::spawn(async move { user.realname().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sent(&user), ["WHOIS foo foo"]);

        {
            let mut whois = user.whois.lock();
            whois.user = Some("u".into());
            whois.host = Some("h".into());
            whois.realname = Some("Real Name".into());
            whois.idle = 123;
            whois.authname = Some("acct".into());
        }
        assert_eq!(user.end_of_whois(true), None);

        assert_eq!(reader.await.unwrap().unwrap(), "Real Name");
        assert_eq!(user.idle().await.unwrap(), 123);
        assert_eq!(user.authname().await.unwrap().as_deref(), Some("acct"));
        assert!(user.is_online().await.unwrap());
        assert!(!user.is_unknown().await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_user_is_offline() {
        let user = user("ghost");
        user.end_of_whois(false);
        assert!(user.is_unknown().await.unwrap());
        assert!(!user.is_online().await.unwrap());
        assert!(user.channels().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_online_changes_reported_when_monitored() {
        let user = user("foo");
        assert_eq!(user.set_online(true), None);

        user.monitor();
        assert_eq!(user.set_online(true), None);
        assert_eq!(user.set_online(false), Some(false));
        assert_eq!(user.set_online(true), Some(true));
        user.unmonitor();
        assert_eq!(user.set_online(false), None);
    }

    #[tokio::test]
    async fn test_monitor_prefers_monitor_command() {
        let user = user("foo");
        let params: Vec<String> = ["bot", "MONITOR=100", "are supported"]
            .map(String::from)
            .to_vec();
        user.link.apply_isupport(&params);

        user.monitor();
        user.unmonitor();
        assert_eq!(sent(&user), ["MONITOR + foo", "MONITOR - foo"]);
    }

    #[tokio::test]
    async fn test_monitor_falls_back_to_whois() {
        let user = user("foo");
        user.monitor();
        assert_eq!(sent(&user), ["WHOIS foo foo"]);
        assert!(user.is_monitored());
        user.unmonitor();
        assert!(!user.is_monitored());
    }
}
