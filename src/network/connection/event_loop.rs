//! The reader loop.
//!
//! Lines are handled strictly one at a time in arrival order. Handlers run
//! on their own tasks, so a slow handler never holds the reader up.

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use slirc_proto::ProtocolError;
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::dispatch::Router;
use crate::telemetry;

/// Why the reader stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ReadEnd {
    /// The server closed the connection.
    Eof,
    /// Nothing arrived within the read timeout.
    Timeout,
    /// The socket failed.
    Error,
}

/// Feed every line from `lines` to `router` until the stream ends.
pub(super) async fn run<R>(router: &mut Router, mut lines: R, read_timeout: Duration) -> ReadEnd
where
    R: Stream<Item = Result<String, ProtocolError>> + Unpin,
{
    router.start();

    loop {
        let line = match timeout(read_timeout, lines.next()).await {
            Err(_) => {
                warn!(timeout_secs = read_timeout.as_secs(), "Read timed out");
                return ReadEnd::Timeout;
            }
            Ok(None) => {
                info!("Server closed the connection");
                return ReadEnd::Eof;
            }
            Ok(Some(Err(e))) => {
                error!(error = %e, "Read failed");
                return ReadEnd::Error;
            }
            Ok(Some(Ok(line))) => line,
        };

        telemetry::incoming(&line);
        if line.trim().is_empty() {
            continue;
        }
        router.handle_line(line).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::config::Config;
    use crate::network::ConnectionState;
    use futures_util::stream;

    fn lines(lines: &[&str]) -> impl Stream<Item = Result<String, ProtocolError>> + Unpin {
        stream::iter(
            lines
                .iter()
                .map(|l| Ok(l.to_string()))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_runs_until_eof() {
        let client = Client::new(Config::new("irc.example.org")).unwrap();
        let mut router = Router::new(client.clone());
        let input = lines(&[
            "",
            ":irc.example.org 001 slirc :Welcome",
            ":irc.example.org 004 slirc irc.example.org ergo-2.12 iow ov",
        ]);

        let end = run(&mut router, input, Duration::from_secs(5)).await;
        assert_eq!(end, ReadEnd::Eof);
        assert!(router.is_registered());
        assert_eq!(client.state(), ConnectionState::Registered);
    }

    #[tokio::test]
    async fn test_read_error_stops() {
        let client = Client::new(Config::new("irc.example.org")).unwrap();
        let mut router = Router::new(client);
        let input = stream::iter(vec![Err(ProtocolError::Io(std::io::Error::other("reset")))]);

        let end = run(&mut router, input, Duration::from_secs(5)).await;
        assert_eq!(end, ReadEnd::Error);
        assert!(!router.is_registered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_times_out() {
        let client = Client::new(Config::new("irc.example.org")).unwrap();
        let mut router = Router::new(client);
        let input = stream::pending::<Result<String, ProtocolError>>();

        let end = run(&mut router, input, Duration::from_secs(240)).await;
        assert_eq!(end, ReadEnd::Timeout);
    }
}
