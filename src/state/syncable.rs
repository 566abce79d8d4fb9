//! Lazily synchronized attributes.
//!
//! Most of what the client knows about users and channels arrives
//! asynchronously: a WHOIS reply, a NAMES burst, a ban list. A [`Synced`]
//! cell holds one such attribute. Readers that need the server's answer call
//! [`Synced::get`], which sends the request (once) and waits until the reader
//! loop marks the value as synced.
//!
//! `get` must never be awaited from the reader loop itself: the reader is
//! the task that delivers the value.

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, timeout_at};
use tracing::warn;

use crate::error::SyncError;

/// How long a reader waits before giving up.
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a reader waits before logging that it is still waiting.
pub const SYNC_WARN_AFTER: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default)]
struct Slot<T> {
    value: T,
    synced: bool,
    requested: bool,
}

/// One attribute of a [`User`](super::User) or [`Channel`](super::Channel).
///
/// The value can be updated at any time, but readers going through
/// [`get`](Self::get) only see it after [`mark_as_synced`](Self::mark_as_synced)
/// or [`sync`](Self::sync).
pub struct Synced<T> {
    name: &'static str,
    tx: watch::Sender<Slot<T>>,
}

impl<T> Synced<T>
where
    T: Clone + Default + Send + Sync,
{
    pub fn new(name: &'static str) -> Self {
        let (tx, _) = watch::channel(Slot::default());
        Self { name, tx }
    }

    /// The attribute name used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Store a value and mark it synced, waking every waiting reader.
    pub fn sync(&self, value: T) {
        self.tx.send_modify(|slot| {
            slot.value = value;
            slot.synced = true;
        });
    }

    /// Replace the value without changing whether it is synced.
    pub fn store(&self, value: T) {
        self.tx.send_modify(|slot| slot.value = value);
    }

    /// Mutate the value in place without changing whether it is synced.
    pub fn modify<R: Default>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut out = R::default();
        self.tx.send_modify(|slot| out = f(&mut slot.value));
        out
    }

    /// Make the current value visible to readers.
    pub fn mark_as_synced(&self) {
        self.tx.send_modify(|slot| slot.synced = true);
    }

    /// Hide the value until the server sends it again.
    pub fn unsync(&self) {
        self.tx.send_if_modified(|slot| {
            slot.synced = false;
            slot.requested = false;
            false
        });
    }

    pub fn is_synced(&self) -> bool {
        self.tx.borrow().synced
    }

    /// The current value, synced or not.
    pub fn peek(&self) -> T {
        self.tx.borrow().value.clone()
    }

    /// Borrow the current value, synced or not.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow().value)
    }

    /// Wait for the synced value.
    ///
    /// If the value is not synced, `request` runs first, unless an earlier
    /// reader already ran it since the last [`unsync`](Self::unsync). After
    /// [`SYNC_WARN_AFTER`] a warning is logged once; after [`SYNC_TIMEOUT`]
    /// the read fails with [`SyncError::SyncedAttributeNotAvailable`].
    pub async fn get(&self, owner: &str, request: impl FnOnce()) -> Result<T, SyncError> {
        let mut rx = self.tx.subscribe();
        {
            let slot = rx.borrow_and_update();
            if slot.synced {
                return Ok(slot.value.clone());
            }
        }

        let mut first = false;
        self.tx.send_if_modified(|slot| {
            if !slot.synced && !slot.requested {
                slot.requested = true;
                first = true;
            }
            false
        });
        if first {
            request();
        }

        let started = Instant::now();
        let deadline = started + SYNC_TIMEOUT;
        let mut warned = false;

        loop {
            let wake = if warned {
                deadline
            } else {
                started + SYNC_WARN_AFTER
            };

            match timeout_at(wake, rx.changed()).await {
                Ok(Ok(())) => {
                    let slot = rx.borrow_and_update();
                    if slot.synced {
                        return Ok(slot.value.clone());
                    }
                }
                Ok(Err(_)) => break,
                Err(_) if !warned => {
                    warned = true;
                    warn!(
                        attribute = self.name,
                        owner = %owner,
                        "still waiting for synced attribute"
                    );
                }
                Err(_) => break,
            }
        }

        // Allow a later reader to ask the server again.
        self.tx.send_if_modified(|slot| {
            slot.requested = false;
            false
        });
        Err(SyncError::SyncedAttributeNotAvailable {
            attribute: self.name,
            owner: owner.to_string(),
        })
    }

    /// Wait for the synced value without sending any request.
    pub async fn wait(&self, owner: &str) -> Result<T, SyncError> {
        self.get(owner, || {}).await
    }
}

impl<T: fmt::Debug> fmt::Debug for Synced<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.tx.borrow();
        f.debug_struct("Synced")
            .field("name", &self.name)
            .field("value", &slot.value)
            .field("synced", &slot.synced)
            .finish()
    }
}
