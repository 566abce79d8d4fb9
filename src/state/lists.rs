//! Registries of users and channels.
//!
//! Both are keyed by the casefolded name. Folding always goes through
//! [`Link::fold`] so the server's `CASEMAPPING` applies everywhere; when it
//! changes, [`UserList::rekey_all`] and [`ChannelList::rekey_all`] rebuild
//! the keys.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::channel::Channel;
use super::dashmap_ext::DashMapExt;
use super::user::User;
use crate::link::Link;
use crate::target::Target;

/// Id of the client's own [`User`].
pub const OWN_USER_ID: u64 = 0;

/// Every user the client has seen, itself included.
pub struct UserList {
    link: Arc<Link>,
    users: DashMap<String, Arc<User>>,
    next_id: AtomicU64,
    me: Arc<User>,
}

impl UserList {
    pub fn new(link: Arc<Link>, own_nick: &str) -> Self {
        let me = Arc::new(User::new(OWN_USER_ID, own_nick, Arc::clone(&link)));
        let users = DashMap::new();
        users.insert(link.fold(own_nick), Arc::clone(&me));
        Self {
            link,
            users,
            next_id: AtomicU64::new(OWN_USER_ID + 1),
            me,
        }
    }

    /// The client's own user.
    pub fn me(&self) -> &Arc<User> {
        &self.me
    }

    pub fn find(&self, nick: &str) -> Option<Arc<User>> {
        self.users.get_cloned(&self.link.fold(nick))
    }

    /// Find a user, creating it on first sight. A known user and host are
    /// recorded as synced.
    pub fn find_ensure(&self, nick: &str, user: Option<&str>, host: Option<&str>) -> Arc<User> {
        let found = self
            .users
            .entry(self.link.fold(nick))
            .or_insert_with(|| {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                Arc::new(User::new(id, nick, Arc::clone(&self.link)))
            })
            .clone();
        found.sync_user_host(user, host);
        found
    }

    /// Rename a user and move it to its new key.
    pub fn update_nick(&self, user: &Arc<User>, new_nick: &str) {
        let old_key = self.link.fold(&user.nick());
        self.users
            .remove_if(&old_key, |_, existing| existing.id() == user.id());
        user.update_nick(new_nick);
        self.users
            .insert(self.link.fold(new_nick), Arc::clone(user));
    }

    /// Forget a user. The own user is never removed.
    pub fn delete(&self, user: &User) {
        if user.id() == OWN_USER_ID {
            return;
        }
        let key = self.link.fold(&user.nick());
        self.users
            .remove_if(&key, |_, existing| existing.id() == user.id());
    }

    pub fn all(&self) -> Vec<Arc<User>> {
        self.users.values_cloned()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Recompute every key, after a casemapping change.
    pub fn rekey_all(&self) {
        self.users.rekey_all(|user| self.link.fold(&user.nick()));
    }

    /// Invalidate everything known about every user.
    pub fn unsync_all(&self) {
        for user in self.all() {
            user.unsync_all();
        }
    }
}

/// Every channel the client has seen.
pub struct ChannelList {
    link: Arc<Link>,
    channels: DashMap<String, Arc<Channel>>,
}

impl ChannelList {
    pub fn new(link: Arc<Link>) -> Self {
        Self {
            link,
            channels: DashMap::new(),
        }
    }

    pub fn find(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.get_cloned(&self.link.fold(name))
    }

    pub fn find_ensure(&self, name: &str) -> Arc<Channel> {
        self.channels
            .entry(self.link.fold(name))
            .or_insert_with(|| Arc::new(Channel::new(name, Arc::clone(&self.link))))
            .clone()
    }

    pub fn all(&self) -> Vec<Arc<Channel>> {
        self.channels.values_cloned()
    }

    /// Channels the client is in.
    pub fn joined(&self) -> Vec<Arc<Channel>> {
        self.all().into_iter().filter(|c| c.is_joined()).collect()
    }

    /// Channels `user` is known to be in.
    pub fn with_user(&self, user: &User) -> Vec<Arc<Channel>> {
        self.all()
            .into_iter()
            .filter(|c| c.has_user(user))
            .collect()
    }

    pub fn rekey_all(&self) {
        self.channels.rekey_all(|channel| self.link.fold(&channel.name()));
    }

    pub fn unsync_all(&self) {
        for channel in self.all() {
            channel.unsync_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::network::OutgoingQueue;

    fn link() -> Arc<Link> {
        Arc::new(Link::new(
            &Config::new("irc.example.org"),
            Arc::new(OutgoingQueue::new()),
        ))
    }

    #[test]
    fn test_find_ensure_creates_once() {
        let users = UserList::new(link(), "bot");
        let a = users.find_ensure("NICK", None, None);
        let b = users.find_ensure("nick", None, None);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.nick(), "NICK");
        assert!(users.find("unknown").is_none());
    }

    #[tokio::test]
    async fn test_find_ensure_records_user_and_host() {
        let users = UserList::new(link(), "bot");
        let user = users.find_ensure("nick", None, None);
        users.find_ensure("nick", Some("newuser"), Some("newhost"));
        assert_eq!(user.user().await.unwrap(), "newuser");
        assert_eq!(user.host().await.unwrap(), "newhost");
    }

    #[test]
    fn test_own_user_is_found() {
        let users = UserList::new(link(), "bot");
        let me = users.find_ensure("BOT", None, None);
        assert!(Arc::ptr_eq(&me, users.me()));
        assert_eq!(me.id(), OWN_USER_ID);
        users.delete(&me);
        assert!(users.find("bot").is_some());
    }

    #[test]
    fn test_update_nick_rekeys() {
        let users = UserList::new(link(), "bot");
        let user = users.find_ensure("oldnick", None, None);
        users.update_nick(&user, "newnick");
        assert!(users.find("oldnick").is_none());
        assert!(Arc::ptr_eq(&users.find("NEWNICK").unwrap(), &user));
        assert_eq!(user.last_nick().as_deref(), Some("oldnick"));
    }

    #[test]
    fn test_delete() {
        let users = UserList::new(link(), "bot");
        let user = users.find_ensure("nick", None, None);
        users.delete(&user);
        assert!(users.find("nick").is_none());
        assert_eq!(users.len(), 1);
    }

    #[test]
    fn test_casemapping_change_rekeys() {
        let link = link();
        let users = UserList::new(Arc::clone(&link), "bot");
        let channels = ChannelList::new(Arc::clone(&link));
        users.find_ensure("Nick[away]", None, None);
        channels.find_ensure("#Chan[1]");
        assert!(users.find("nick{away}").is_some());

        let params: Vec<String> = ["bot", "CASEMAPPING=ascii", "are supported"]
            .map(String::from)
            .to_vec();
        assert!(link.apply_isupport(&params));
        users.rekey_all();
        channels.rekey_all();

        assert!(users.find("nick{away}").is_none());
        assert!(users.find("NICK[AWAY]").is_some());
        assert!(channels.find("#chan[1]").is_some());
    }

    #[test]
    fn test_channels_with_user() {
        let link = link();
        let users = UserList::new(Arc::clone(&link), "bot");
        let channels = ChannelList::new(Arc::clone(&link));
        let alice = users.find_ensure("alice", None, None);
        channels.find_ensure("#a").add_user(Arc::clone(&alice), Vec::new());
        channels.find_ensure("#b");
        channels.find_ensure("#c").add_user(Arc::clone(users.me()), Vec::new());

        let with_alice: Vec<String> = channels.with_user(&alice).iter().map(|c| c.name()).collect();
        assert_eq!(with_alice, ["#a"]);
        let joined: Vec<String> = channels.joined().iter().map(|c| c.name()).collect();
        assert_eq!(joined, ["#c"]);
        assert!(Arc::ptr_eq(&channels.find("#A").unwrap(), &channels.find_ensure("#a")));
    }
}
