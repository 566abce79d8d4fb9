//! Event handlers and the registry that dispatches to them.
//!
//! Dispatch is fire-and-forget: [`HandlerRegistry::dispatch`] spawns one
//! task per selected handler and returns their handles immediately. The
//! reader never waits on a handler.

mod event;
mod handler;
mod pattern;

pub use event::{Event, EventArg, EventContext};
pub use handler::{Callback, Handler, HandlerBuilder, PostHook, PreHook};
pub use pattern::{Pattern, PatternPart};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::client::Client;
use crate::message::IncomingMessage;

/// All registered handlers, in registration order.
pub struct HandlerRegistry {
    handlers: RwLock<Vec<Arc<Handler>>>,
    prefix: Option<PatternPart>,
    suffix: Option<PatternPart>,
    stop_grace: Duration,
}

impl HandlerRegistry {
    /// `prefix` and `suffix` wrap the bodies of handlers built with
    /// [`HandlerBuilder::matching`].
    pub fn new(prefix: Option<PatternPart>, suffix: Option<PatternPart>, stop_grace: Duration) -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            prefix,
            suffix,
            stop_grace,
        }
    }

    pub fn register(&self, mut handler: Handler) -> Arc<Handler> {
        handler.apply_affixes(self.prefix.as_ref(), self.suffix.as_ref());
        let handler = Arc::new(handler);
        debug!(handler = handler.id(), event = %handler.event(), "Registering handler");
        self.handlers.write().push(Arc::clone(&handler));
        handler
    }

    /// Remove a handler and stop its running executions.
    pub async fn unregister(&self, handler: &Arc<Handler>) -> bool {
        let removed = {
            let mut handlers = self.handlers.write();
            let before = handlers.len();
            handlers.retain(|h| h.id() != handler.id());
            handlers.len() != before
        };
        if removed {
            debug!(handler = handler.id(), "Unregistered handler");
            handler.stop(self.stop_grace).await;
        }
        removed
    }

    /// Remove every handler and stop all executions.
    pub async fn unregister_all(&self) {
        let handlers = std::mem::take(&mut *self.handlers.write());
        for handler in handlers {
            handler.stop(self.stop_grace).await;
        }
    }

    /// Stop running executions of every handler without unregistering.
    pub async fn stop_all(&self) {
        let handlers = self.handlers.read().clone();
        for handler in handlers {
            handler.stop(self.stop_grace).await;
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Handlers for `event` that match `message`, with their captures.
    ///
    /// Without a message every handler for the event is selected. Of the
    /// matching handlers sharing a group only the first registered one is
    /// kept.
    pub fn find(
        &self,
        event: &Event,
        message: Option<&IncomingMessage>,
    ) -> Vec<(Arc<Handler>, Vec<Option<String>>)> {
        let handlers: Vec<Arc<Handler>> = self
            .handlers
            .read()
            .iter()
            .filter(|h| h.event() == event)
            .cloned()
            .collect();

        let mut seen_groups = HashSet::new();
        handlers
            .into_iter()
            .filter_map(|handler| {
                let captures = match message {
                    Some(message) => handler.matches(message)?,
                    None => Vec::new(),
                };
                if let Some(group) = handler.group()
                    && !seen_groups.insert(group.to_string())
                {
                    return None;
                }
                Some((handler, captures))
            })
            .collect()
    }

    /// Start every selected handler for `event`.
    pub fn dispatch(
        &self,
        client: &Client,
        event: Event,
        message: Option<Arc<IncomingMessage>>,
        args: Vec<EventArg>,
    ) -> Vec<JoinHandle<()>> {
        let selected = self.find(&event, message.as_deref());
        if !selected.is_empty() {
            debug!(%event, handlers = selected.len(), "Dispatching");
        }
        selected
            .into_iter()
            .map(|(handler, captures)| {
                handler.call(client.clone(), message.clone(), captures, args.clone())
            })
            .collect()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers.read().len())
            .field("stop_grace", &self.stop_grace)
            .finish_non_exhaustive()
    }
}
