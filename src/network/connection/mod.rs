//! One connection session, from connect to disconnect.
//!
//! ```text
//!                 connect (TCP/TLS)
//!                        │
//!           ┌────────────┴────────────┐
//!           ▼                         ▼
//!   ┌───────────────┐         ┌───────────────┐
//!   │  reader loop  │         │  writer task  │
//!   │ (event_loop)  │         │ (run_writer)  │
//!   └───────┬───────┘         └───────▲───────┘
//!           │ line                    │ paced lines
//!           ▼                         │
//!   ┌───────────────┐  sends  ┌───────┴───────┐
//!   │    Router     ├────────▶│ OutgoingQueue │
//!   │  (dispatch)   │         └───────▲───────┘
//!   └───────┬───────┘                 │
//!           │ events                  │ replies
//!           ▼                         │
//!   [handler tasks] ──────────────────┘
//! ```
//!
//! The session ends when the reader stops. The writer is cancelled, every
//! synced attribute is invalidated and `Disconnect` is dispatched.

mod dispatch;
mod event_loop;
mod handshake;

use std::io;

use slirc_proto::LineCodec;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use super::profile::NetworkProfile;
use super::queue::run_writer;
use super::transport::connect;
use crate::client::Client;
use crate::error::ConnectError;
use crate::handlers::Event;
use crate::telemetry::spans;

/// Where the client is in the connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    /// Connected, login sent, waiting for `004`.
    AwaitingRegistration,
    Registered,
}

/// Outcome of a session that got as far as connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEnd {
    /// Whether the server accepted the registration.
    pub registered: bool,
}

/// Run one session to completion.
///
/// Fails only when no connection could be established; everything that
/// happens after connecting ends the session normally.
pub(crate) async fn run_session(client: &Client) -> Result<SessionEnd, ConnectError> {
    let config = client.config();
    let span = spans::connection(&config.server.host, config.port());
    session(client).instrument(span).await
}

async fn session(client: &Client) -> Result<SessionEnd, ConnectError> {
    let config = client.config();
    let codec = || {
        LineCodec::new(&config.messages.encoding)
            .map_err(|e| ConnectError::Io(io::Error::new(io::ErrorKind::InvalidInput, e)))
    };
    let (read_codec, write_codec) = (codec()?, codec()?);

    client.set_state(ConnectionState::Connecting);
    let stream = match connect(config).await {
        Ok(stream) => stream,
        Err(e) => {
            client.set_state(ConnectionState::Disconnected);
            warn!(error = %e, code = e.error_code(), "Connection failed");
            return Err(e);
        }
    };
    info!(tls = stream.is_tls(), "Connected");

    prepare(client);

    let (reader, writer) = tokio::io::split(stream);
    let lines = FramedRead::new(reader, read_codec);
    let sink = FramedWrite::new(writer, write_codec);

    let cancel = CancellationToken::new();
    let link = client.link();
    let writer = tokio::spawn(run_writer(
        link.queue().clone(),
        link.clone(),
        sink,
        cancel.clone(),
    ));

    let mut router = dispatch::Router::new(client.clone());
    let end = event_loop::run(&mut router, lines, config.timeouts.read_timeout()).await;
    let registered = router.is_registered();
    debug!(?end, registered, "Reader stopped");

    cancel.cancel();
    if let Err(e) = writer.await {
        warn!(error = %e, "Writer task failed");
    }

    client.set_state(ConnectionState::Disconnected);
    client.users().unsync_all();
    client.channels().unsync_all();
    info!("Disconnected");
    client
        .handlers()
        .dispatch(client, Event::Disconnect, None, Vec::new());

    Ok(SessionEnd { registered })
}

/// Reset per-connection state left over from an earlier session.
fn prepare(client: &Client) {
    let link = client.link();
    link.queue().clear();
    link.reset_isupport();
    link.update_profile(|p| *p = NetworkProfile::default());
    client.users().rekey_all();
    client.channels().rekey_all();

    let preferred = client.generate_next_nick(None);
    if client.nick() != preferred {
        client.users().update_nick(client.me(), &preferred);
    }
}
