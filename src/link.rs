//! Connection-wide context shared by every entity.
//!
//! Users, channels and messages hold an `Arc<Link>` to send lines and to
//! read what the server announced (ISUPPORT, network profile, own hostmask).

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use slirc_proto::{IrcCodec, ISupport};

use crate::config::{Config, FloodConfig};
use crate::network::{NetworkProfile, OutgoingQueue};

/// Longest hostname a server reports; reserved while the own host is unknown.
const MAX_HOST_LEN: usize = 63;

pub struct Link {
    queue: Arc<OutgoingQueue>,
    isupport: RwLock<ISupport>,
    profile: RwLock<NetworkProfile>,
    own_mask: RwLock<String>,
    flood: FloodConfig,
    split_start: String,
    split_end: String,
    strict: bool,
}

impl Link {
    pub fn new(config: &Config, queue: Arc<OutgoingQueue>) -> Self {
        let placeholder = format!(
            "{}!{}@{}",
            config.identity.nick,
            config.identity.user,
            "x".repeat(MAX_HOST_LEN)
        );
        Self {
            queue,
            isupport: RwLock::new(ISupport::default()),
            profile: RwLock::new(NetworkProfile::default()),
            own_mask: RwLock::new(placeholder),
            flood: config.flood.clone(),
            split_start: config.messages.split_start.clone(),
            split_end: config.messages.split_end.clone(),
            strict: config.strict,
        }
    }

    /// Queue a raw line. Anything after an embedded CR or LF is dropped.
    pub fn send(&self, line: impl Into<String>) {
        self.queue.push(IrcCodec::sanitize(line.into()));
    }

    pub fn queue(&self) -> &Arc<OutgoingQueue> {
        &self.queue
    }

    pub fn isupport(&self) -> RwLockReadGuard<'_, ISupport> {
        self.isupport.read()
    }

    /// Apply the parameters of a `005` reply. Returns whether the
    /// casemapping changed.
    pub(crate) fn apply_isupport(&self, params: &[String]) -> bool {
        let mut isupport = self.isupport.write();
        let before = isupport.casemapping();
        isupport.parse_params(params);
        isupport.casemapping() != before
    }

    pub(crate) fn reset_isupport(&self) {
        *self.isupport.write() = ISupport::default();
    }

    /// Casefold a nick or channel name with the server's casemapping.
    pub fn fold(&self, name: &str) -> String {
        self.isupport.read().fold(name)
    }

    pub fn is_channel(&self, name: &str) -> bool {
        self.isupport.read().is_channel(name)
    }

    pub fn profile(&self) -> NetworkProfile {
        self.profile.read().clone()
    }

    pub(crate) fn update_profile(&self, f: impl FnOnce(&mut NetworkProfile)) {
        f(&mut self.profile.write());
    }

    /// Own `nick!user@host`, as last seen from the server.
    pub fn own_mask(&self) -> String {
        self.own_mask.read().clone()
    }

    pub(crate) fn set_own_mask(&self, mask: String) {
        *self.own_mask.write() = mask;
    }

    /// Messages per second and burst size for the writer.
    pub fn flood_limits(&self) -> (f64, usize) {
        let profile = self.profile.read();
        (
            self.flood
                .messages_per_second
                .unwrap_or_else(|| profile.default_messages_per_second()),
            self.flood
                .server_queue_size
                .unwrap_or_else(|| profile.default_server_queue_size()),
        )
    }

    /// Continuation markers for split messages.
    pub fn split_markers(&self) -> (&str, &str) {
        (&self.split_start, &self.split_end)
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("own_mask", &*self.own_mask.read())
            .field("profile", &*self.profile.read())
            .finish_non_exhaustive()
    }
}
