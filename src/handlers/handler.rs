//! Handlers and their concurrent executions.
//!
//! Every dispatch spawns one task per matching handler. An execution runs
//! the pre hooks, the body and the post hooks; errors and panics at any
//! stage are logged and stay inside that execution.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, warn};

use super::event::{Event, EventArg, EventContext};
use super::pattern::{Pattern, PatternPart};
use crate::client::Client;
use crate::message::IncomingMessage;
use crate::telemetry::spans;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_EXECUTION_ID: AtomicU64 = AtomicU64::new(1);

/// A handler body.
#[async_trait]
pub trait Callback: Send + Sync + 'static {
    async fn call(&self, ctx: EventContext) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> Callback for F
where
    F: Fn(EventContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn call(&self, ctx: EventContext) -> anyhow::Result<()> {
        (self)(ctx).await
    }
}

/// Runs before the body; returning `false` skips the body and post hooks.
pub type PreHook = Arc<dyn Fn(&EventContext) -> anyhow::Result<bool> + Send + Sync>;
/// Runs after the body.
pub type PostHook = Arc<dyn Fn(&EventContext) -> anyhow::Result<()> + Send + Sync>;

pub struct Handler {
    id: u64,
    event: Event,
    pattern: Option<Pattern>,
    /// Whether the registry's default prefix and suffix apply.
    affixed: bool,
    group: Option<String>,
    strip_formatting: bool,
    pre: Vec<PreHook>,
    post: Vec<PostHook>,
    callback: Arc<dyn Callback>,
    cancel: Mutex<CancellationToken>,
    tracker: TaskTracker,
    in_flight: Mutex<HashMap<u64, AbortHandle>>,
}

impl Handler {
    pub fn builder(event: Event) -> HandlerBuilder {
        HandlerBuilder {
            event,
            pattern: None,
            affixed: false,
            group: None,
            strip_formatting: false,
            pre: Vec::new(),
            post: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn strips_formatting(&self) -> bool {
        self.strip_formatting
    }

    /// Number of executions still running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub(crate) fn apply_affixes(&mut self, prefix: Option<&PatternPart>, suffix: Option<&PatternPart>) {
        if self.affixed
            && let Some(pattern) = self.pattern.take()
        {
            self.pattern = Some(pattern.with_defaults(prefix, suffix));
        }
    }

    /// Match against `message`. Returns the capture groups on success; a
    /// handler without a pattern matches everything.
    pub(crate) fn matches(&self, message: &IncomingMessage) -> Option<Vec<Option<String>>> {
        let Some(pattern) = &self.pattern else {
            return Some(Vec::new());
        };
        let regex = match pattern.to_regex(Some(message)) {
            Ok(regex) => regex,
            Err(e) => {
                warn!(handler = self.id, error = %e, "Invalid handler pattern");
                return None;
            }
        };
        let text = message.match_text(&self.event, self.strip_formatting);
        let captures = regex.captures(&text)?;
        Some(
            captures
                .iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()))
                .collect(),
        )
    }

    /// Start one execution and return its task handle.
    pub fn call(
        self: &Arc<Self>,
        client: Client,
        message: Option<Arc<IncomingMessage>>,
        captures: Vec<Option<String>>,
        args: Vec<EventArg>,
    ) -> JoinHandle<()> {
        let execution = NEXT_EXECUTION_ID.fetch_add(1, Ordering::Relaxed);
        let ctx = EventContext {
            client,
            event: self.event.clone(),
            message,
            captures,
            args,
            cancel: self.cancel.lock().child_token(),
        };
        let span = spans::handler(&self.event.to_string(), execution);
        let handler = Arc::clone(self);

        let handle = self.tracker.spawn(
            async move {
                let _done = InFlight {
                    handler: Arc::clone(&handler),
                    execution,
                };
                match AssertUnwindSafe(handler.execute(ctx)).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(error = %e, "Handler failed"),
                    Err(panic) => error!(panic = %panic_message(&*panic), "Handler panicked"),
                }
            }
            .instrument(span),
        );

        self.in_flight.lock().insert(execution, handle.abort_handle());
        if handle.is_finished() {
            self.in_flight.lock().remove(&execution);
        }
        handle
    }

    async fn execute(&self, ctx: EventContext) -> anyhow::Result<()> {
        for hook in &self.pre {
            if !hook(&ctx)? {
                debug!("Pre hook declined execution");
                return Ok(());
            }
        }
        self.callback.call(ctx.clone()).await?;
        for hook in &self.post {
            hook(&ctx)?;
        }
        Ok(())
    }

    /// Stop every running execution.
    ///
    /// Executions are cancelled through their token first. Whatever is still
    /// running after `grace` is aborted at its next await point. An aborted
    /// execution skips its post hooks and any cleanup of its own, so shared
    /// state it was changing may be left half-updated.
    pub async fn stop(&self, grace: Duration) {
        let token = std::mem::take(&mut *self.cancel.lock());
        token.cancel();

        self.tracker.close();
        let finished = tokio::time::timeout(grace, self.tracker.wait()).await.is_ok();
        self.tracker.reopen();
        if finished {
            return;
        }

        let stragglers: Vec<AbortHandle> = self.in_flight.lock().drain().map(|(_, h)| h).collect();
        warn!(
            handler = self.id,
            count = stragglers.len(),
            "Aborting handler executions after grace period"
        );
        for handle in stragglers {
            handle.abort();
        }
    }
}

struct InFlight {
    handler: Arc<Handler>,
    execution: u64,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.handler.in_flight.lock().remove(&self.execution);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("event", &self.event)
            .field("pattern", &self.pattern)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`Handler`].
pub struct HandlerBuilder {
    event: Event,
    pattern: Option<Pattern>,
    affixed: bool,
    group: Option<String>,
    strip_formatting: bool,
    pre: Vec<PreHook>,
    post: Vec<PostHook>,
}

impl HandlerBuilder {
    /// Match the message text against `body`, wrapped in the configured
    /// plugin prefix and suffix.
    pub fn matching(mut self, body: impl Into<PatternPart>) -> Self {
        self.pattern = Some(Pattern::body(body));
        self.affixed = true;
        self
    }

    /// Match against a complete pattern, used exactly as given.
    pub fn pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = Some(pattern);
        self.affixed = false;
        self
    }

    /// Only the first matching handler of a group runs per event.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Strip formatting codes from the text before matching.
    pub fn strip_formatting(mut self, strip: bool) -> Self {
        self.strip_formatting = strip;
        self
    }

    pub fn pre_hook(
        mut self,
        hook: impl Fn(&EventContext) -> anyhow::Result<bool> + Send + Sync + 'static,
    ) -> Self {
        self.pre.push(Arc::new(hook));
        self
    }

    pub fn post_hook(
        mut self,
        hook: impl Fn(&EventContext) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.post.push(Arc::new(hook));
        self
    }

    pub fn build(self, callback: impl Callback) -> Handler {
        Handler {
            id: NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed),
            event: self.event,
            pattern: self.pattern,
            affixed: self.affixed,
            group: self.group,
            strip_formatting: self.strip_formatting,
            pre: self.pre,
            post: self.post,
            callback: Arc::new(callback),
            cancel: Mutex::new(CancellationToken::new()),
            tracker: TaskTracker::new(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }
}
