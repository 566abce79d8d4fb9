//! Fair outgoing queue and the writer task.
//!
//! Conversational lines (`PRIVMSG`, `NOTICE`) are queued per target and
//! everything else shares one generic queue. The writer serves the
//! non-empty queues round-robin, so one chatty target cannot starve the
//! others, and paces writes through the [`RateLimiter`].

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use futures_util::{Sink, SinkExt};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::limit::RateLimiter;
use crate::link::Link;
use crate::telemetry;

/// Which FIFO a line belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueueKey {
    Target(String),
    Generic,
}

impl QueueKey {
    /// Classify a raw outgoing line.
    pub fn classify(line: &str) -> Self {
        let mut words = line.split(' ');
        match (words.next(), words.next()) {
            (Some(cmd), Some(target))
                if !target.is_empty()
                    && (cmd.eq_ignore_ascii_case("PRIVMSG") || cmd.eq_ignore_ascii_case("NOTICE")) =>
            {
                QueueKey::Target(target.to_owned())
            }
            _ => QueueKey::Generic,
        }
    }
}

#[derive(Default)]
struct Queues {
    by_key: HashMap<QueueKey, VecDeque<String>>,
    /// Keys with pending lines, in service order.
    ring: VecDeque<QueueKey>,
}

/// Per-target FIFOs drained by a single writer.
#[derive(Default)]
pub struct OutgoingQueue {
    inner: Mutex<Queues>,
    ready: Notify,
}

impl OutgoingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw line (without terminator).
    pub fn push(&self, line: String) {
        let key = QueueKey::classify(&line);
        {
            let mut queues = self.inner.lock();
            let fifo = queues.by_key.entry(key.clone()).or_default();
            fifo.push_back(line);
            if fifo.len() == 1 {
                queues.ring.push_back(key);
            }
        }
        self.ready.notify_one();
    }

    /// Take the next line in round-robin order, if any.
    pub fn pop(&self) -> Option<String> {
        let mut queues = self.inner.lock();
        let key = queues.ring.pop_front()?;
        let fifo = queues.by_key.get_mut(&key)?;
        let line = fifo.pop_front();
        if fifo.is_empty() {
            queues.by_key.remove(&key);
        } else {
            queues.ring.push_back(key);
        }
        line
    }

    /// Wait for the next line.
    pub async fn next(&self) -> String {
        loop {
            if let Some(line) = self.pop() {
                return line;
            }
            self.ready.notified().await;
        }
    }

    /// Drop everything still queued.
    pub fn clear(&self) {
        let mut queues = self.inner.lock();
        queues.by_key.clear();
        queues.ring.clear();
    }

    /// Number of queued lines across every FIFO.
    pub fn len(&self) -> usize {
        self.inner.lock().by_key.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().ring.is_empty()
    }
}

impl fmt::Debug for OutgoingQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutgoingQueue")
            .field("len", &self.len())
            .finish()
    }
}

/// Drain `queue` into `sink` until `cancel` fires.
///
/// A failed write is logged and the line dropped; detecting a dead
/// connection is left to the reader.
pub async fn run_writer<S>(
    queue: Arc<OutgoingQueue>,
    link: Arc<Link>,
    mut sink: S,
    cancel: CancellationToken,
) where
    S: Sink<String> + Unpin,
    S::Error: fmt::Display,
{
    let mut limiter = RateLimiter::new();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = queue.next() => line,
        };

        let (per_second, capacity) = link.flood_limits();
        if let Some(wait) = limiter.delay(Instant::now(), per_second, capacity) {
            debug!(wait_ms = wait.as_millis() as u64, "flood control delaying write");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(wait) => {}
            }
        }
        limiter.record(Instant::now(), capacity);

        telemetry::outgoing(&line);
        if let Err(e) = sink.send(line).await {
            warn!(error = %e, "write failed, line dropped");
        }
    }

    debug!("writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use futures_util::sink;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[test]
    fn test_classify() {
        assert_eq!(
            QueueKey::classify("PRIVMSG #rust :hi"),
            QueueKey::Target("#rust".into())
        );
        assert_eq!(
            QueueKey::classify("notice nick :hi"),
            QueueKey::Target("nick".into())
        );
        assert_eq!(QueueKey::classify("JOIN #rust"), QueueKey::Generic);
        assert_eq!(QueueKey::classify("PRIVMSG"), QueueKey::Generic);
    }

    #[test]
    fn test_fifo_within_target() {
        let queue = OutgoingQueue::new();
        queue.push("PRIVMSG #a :1".into());
        queue.push("PRIVMSG #a :2".into());
        assert_eq!(queue.pop().as_deref(), Some("PRIVMSG #a :1"));
        assert_eq!(queue.pop().as_deref(), Some("PRIVMSG #a :2"));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_round_robin_across_targets() {
        let queue = OutgoingQueue::new();
        for i in 0..3 {
            queue.push(format!("PRIVMSG #a :{i}"));
        }
        queue.push("PRIVMSG #b :0".into());
        queue.push("MODE #a".into());

        let order: Vec<String> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(
            order,
            [
                "PRIVMSG #a :0",
                "PRIVMSG #b :0",
                "MODE #a",
                "PRIVMSG #a :1",
                "PRIVMSG #a :2",
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clear() {
        let queue = OutgoingQueue::new();
        queue.push("PRIVMSG #a :1".into());
        queue.push("WHO #a".into());
        assert_eq!(queue.len(), 2);
        queue.clear();
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.pop(), None);
    }

    #[tokio::test]
    async fn test_next_waits_for_push() {
        let queue = Arc::new(OutgoingQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.next().await })
        };
        tokio::task::yield_now().await;
        queue.push("PING :x".into());
        assert_eq!(waiter.await.unwrap(), "PING :x");
    }

    fn channel_sink(
        tx: mpsc::UnboundedSender<(Instant, String)>,
    ) -> impl Sink<String, Error = mpsc::error::SendError<(Instant, String)>> + Unpin {
        Box::pin(sink::unfold(tx, |tx, line: String| async move {
            tx.send((Instant::now(), line))?;
            Ok::<_, mpsc::error::SendError<(Instant, String)>>(tx)
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_writer_paces_after_burst() {
        let mut config = Config::new("irc.example.org");
        config.flood.messages_per_second = Some(1.0);
        config.flood.server_queue_size = Some(10);
        let queue = Arc::new(OutgoingQueue::new());
        let link = Arc::new(Link::new(&config, Arc::clone(&queue)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        for i in 0..11 {
            queue.push(format!("PRIVMSG #a :{i}"));
        }
        let start = Instant::now();
        let writer = tokio::spawn(run_writer(
            Arc::clone(&queue),
            link,
            channel_sink(tx),
            cancel.clone(),
        ));

        let mut sent = Vec::new();
        for _ in 0..11 {
            sent.push(rx.recv().await.unwrap());
        }
        for (at, _) in &sent[..10] {
            assert_eq!(*at, start);
        }
        assert_eq!(sent[10].0 - start, Duration::from_secs(1));
        assert_eq!(sent[10].1, "PRIVMSG #a :10");

        cancel.cancel();
        writer.await.unwrap();
    }

    /// Rejects lines starting with `FAIL`, forwards the rest.
    struct FlakySink(mpsc::UnboundedSender<String>);

    impl Sink<String> for FlakySink {
        type Error = String;

        fn poll_ready(
            self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Result<(), String>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn start_send(self: std::pin::Pin<&mut Self>, line: String) -> Result<(), String> {
            if line.starts_with("FAIL") {
                return Err("broken pipe".into());
            }
            self.0.send(line).map_err(|e| e.to_string())
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Result<(), String>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_close(
            self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Result<(), String>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_writer_survives_failed_write() {
        let config = Config::new("irc.example.org");
        let queue = Arc::new(OutgoingQueue::new());
        let link = Arc::new(Link::new(&config, Arc::clone(&queue)));
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        queue.push("FAIL".into());
        queue.push("PING :ok".into());
        let writer = tokio::spawn(run_writer(
            Arc::clone(&queue),
            link,
            FlakySink(tx),
            cancel.clone(),
        ));

        assert_eq!(rx.recv().await.as_deref(), Some("PING :ok"));
        cancel.cancel();
        writer.await.unwrap();
    }
}
