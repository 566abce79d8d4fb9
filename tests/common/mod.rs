//! Integration test common infrastructure.
//!
//! Provides a scripted server the engine connects to and helpers for
//! building clients and waiting on events.

pub mod server;

use std::time::Duration;

use slirc_client::{Client, Config, Event, EventContext, Handler};
use tokio::sync::mpsc;

#[allow(unused_imports)]
pub use server::{Peer, ScriptedServer};

/// A client configured for `port` on localhost, without reconnection.
#[allow(dead_code)]
pub fn config(port: u16) -> Config {
    let mut config = Config::new("127.0.0.1");
    config.server.port = Some(port);
    config.identity.nick = "bot".into();
    config.identity.nicks = vec!["bot2".into()];
    config.identity.user = "ident".into();
    config.identity.realname = "Test Bot".into();
    config.flood.messages_per_second = Some(100.0);
    config.reconnect = false;
    config
}

/// Report every `event` through a channel.
#[allow(dead_code)]
pub fn watch(client: &Client, event: Event) -> mpsc::UnboundedReceiver<EventContext> {
    let (tx, rx) = mpsc::unbounded_channel();
    client
        .handlers()
        .register(Handler::builder(event).build(move |ctx: EventContext| {
            let tx = tx.clone();
            async move {
                tx.send(ctx)?;
                Ok::<_, anyhow::Error>(())
            }
        }));
    rx
}

/// Wait for the next report from [`watch`].
#[allow(dead_code)]
pub async fn next(rx: &mut mpsc::UnboundedReceiver<EventContext>) -> EventContext {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}
