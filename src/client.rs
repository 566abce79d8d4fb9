//! The client handle.
//!
//! [`Client`] is a cheap clone over shared state: configuration, the link,
//! the user and channel registries and the handler registry. Handlers
//! receive one in their [`EventContext`](crate::handlers::EventContext) and
//! use it to send commands.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use regex::Regex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ClientError;
use crate::handlers::{Event, EventArg, HandlerRegistry, PatternPart};
use crate::link::Link;
use crate::network::connection::run_session;
use crate::network::{ConnectionState, OutgoingQueue};
use crate::state::{Channel, ChannelList, User, UserList};

struct Inner {
    config: Config,
    link: Arc<Link>,
    users: UserList,
    channels: ChannelList,
    handlers: HandlerRegistry,
    state: watch::Sender<ConnectionState>,
    quitting: AtomicBool,
    /// Own user modes.
    modes: RwLock<BTreeSet<char>>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Build a client from a validated configuration. Nothing connects
    /// until [`run`](Self::run).
    pub fn new(config: Config) -> Result<Self, ClientError> {
        config.validate()?;

        let affix = |pattern: &Option<String>| {
            pattern
                .as_deref()
                .and_then(|p| Regex::new(p).ok())
                .map(PatternPart::Regex)
        };
        let handlers = HandlerRegistry::new(
            affix(&config.plugins.prefix),
            affix(&config.plugins.suffix),
            config.handlers.stop_grace(),
        );

        let link = Arc::new(Link::new(&config, Arc::new(OutgoingQueue::new())));
        let users = UserList::new(Arc::clone(&link), &config.identity.nick);
        let channels = ChannelList::new(Arc::clone(&link));
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                link,
                users,
                channels,
                handlers,
                state,
                quitting: AtomicBool::new(false),
                modes: RwLock::new(BTreeSet::new()),
                locks: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn link(&self) -> &Arc<Link> {
        &self.inner.link
    }

    pub fn users(&self) -> &UserList {
        &self.inner.users
    }

    pub fn channels(&self) -> &ChannelList {
        &self.inner.channels
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.inner.handlers
    }

    /// The client's own user.
    pub fn me(&self) -> &Arc<User> {
        self.inner.users.me()
    }

    /// The current own nick.
    pub fn nick(&self) -> String {
        self.me().nick()
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Watch connection state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.inner.state.send_replace(state);
    }

    pub fn is_quitting(&self) -> bool {
        self.inner.quitting.load(Ordering::Acquire)
    }

    /// Request a nick change. The own user is renamed once the server
    /// confirms with `NICK`.
    pub fn set_nick(&self, nick: &str) {
        self.inner.link.send(format!("NICK {nick}"));
    }

    /// Disconnect without reconnecting.
    pub fn quit(&self, reason: Option<&str>) {
        self.inner.quitting.store(true, Ordering::Release);
        match reason {
            Some(reason) => self.inner.link.send(format!("QUIT :{reason}")),
            None => self.inner.link.send("QUIT"),
        }
    }

    pub fn oper(&self, password: &str, user: Option<&str>) {
        let nick = self.nick();
        let user = user.unwrap_or(&nick);
        self.inner.link.send(format!("OPER {user} {password}"));
    }

    pub fn set_mode(&self, mode: char) {
        self.inner.link.send(format!("MODE {} +{mode}", self.nick()));
    }

    pub fn unset_mode(&self, mode: char) {
        self.inner.link.send(format!("MODE {} -{mode}", self.nick()));
    }

    /// Own user modes, as last reported by the server.
    pub fn modes(&self) -> Vec<char> {
        self.inner.modes.read().iter().copied().collect()
    }

    pub(crate) fn set_own_mode(&self, mode: char, on: bool) {
        let mut modes = self.inner.modes.write();
        if on {
            modes.insert(mode);
        } else {
            modes.remove(&mode);
        }
    }

    pub fn join(&self, name: &str, key: Option<&str>) -> Arc<Channel> {
        let channel = self.inner.channels.find_ensure(name);
        channel.join(key);
        channel
    }

    pub fn part(&self, name: &str, reason: Option<&str>) {
        self.inner.channels.find_ensure(name).part(reason);
    }

    /// Run `f` while holding the mutex named `name`.
    pub async fn synchronize<F, Fut, T>(&self, name: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lock = Arc::clone(self.inner.locks.lock().entry(name.to_owned()).or_default());
        let _guard = lock.lock().await;
        f().await
    }

    /// The nick to try after `base` was rejected.
    ///
    /// Walks the configured nick followed by the fallback list, then appends
    /// `_`. Without a base the first candidate is returned.
    pub fn generate_next_nick(&self, base: Option<&str>) -> String {
        let identity = &self.inner.config.identity;
        let candidates: Vec<&str> = std::iter::once(identity.nick.as_str())
            .chain(identity.nicks.iter().map(String::as_str))
            .collect();

        let Some(base) = base else {
            return candidates[0].to_owned();
        };
        let link = &self.inner.link;
        let folded = link.fold(base);
        match candidates.iter().position(|c| link.fold(c) == folded) {
            Some(i) if i + 1 < candidates.len() => candidates[i + 1].to_owned(),
            _ => format!("{base}_"),
        }
    }

    /// Dispatch an application event.
    pub fn dispatch_custom(&self, name: &str, args: Vec<EventArg>) -> Vec<JoinHandle<()>> {
        self.inner
            .handlers
            .dispatch(self, Event::Custom(name.to_owned()), None, args)
    }

    /// Join every channel from the configuration, after `delay_joins`.
    pub async fn join_configured_channels(&self) {
        let delay = self.inner.config.delay_joins;
        if delay > 0 {
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }
        for entry in &self.inner.config.channels {
            let mut parts = entry.split_whitespace();
            if let Some(name) = parts.next() {
                self.join(name, parts.next());
            }
        }
    }

    /// Connect and keep reconnecting until [`quit`](Self::quit) or, with
    /// reconnection disabled, until the first session ends.
    pub async fn run(&self) -> Result<(), ClientError> {
        let config = &self.inner.config;
        self.inner.quitting.store(false, Ordering::Release);
        let mut attempt = 0u32;

        let result = loop {
            match run_session(self).await {
                Ok(end) if end.registered => attempt = 0,
                Ok(_) => attempt += 1,
                Err(e) if !config.reconnect => break Err(e.into()),
                Err(_) => attempt += 1,
            }
            if self.is_quitting() || !config.reconnect {
                break Ok(());
            }

            let delay = reconnect_delay(attempt, config.max_reconnect_delay);
            info!(attempt, delay_secs = delay.as_secs(), "Reconnecting");
            tokio::time::sleep(delay).await;
            if self.is_quitting() {
                break Ok(());
            }
        };

        self.inner.handlers.stop_all().await;
        if let Err(e) = &result {
            warn!(error = %e, "Client stopped");
        }
        result
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("nick", &self.nick())
            .field("state", &self.state())
            .field("handlers", &self.inner.handlers)
            .finish_non_exhaustive()
    }
}

/// Exponential backoff, in whole seconds, capped at `max`.
fn reconnect_delay(attempt: u32, max: u64) -> Duration {
    let secs = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_secs(secs.min(max))
}
