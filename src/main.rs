//! slirc-bot - a minimal bot on the slirc client engine.
//!
//! Answers `!ping`, joins the configured channels once registered and quits
//! cleanly on Ctrl-C.

use slirc_client::{Client, Config, Event, EventContext, Handler};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        server = %config.server.host,
        port = config.port(),
        nick = %config.identity.nick,
        "Starting slirc-bot"
    );

    let client = Client::new(config)?;
    let handlers = client.handlers();

    handlers.register(
        Handler::builder(Event::Message)
            .matching("ping")
            .build(|ctx: EventContext| async move {
                ctx.reply("pong");
                Ok::<_, anyhow::Error>(())
            }),
    );
    handlers.register(
        Handler::builder(Event::Connect).build(|ctx: EventContext| async move {
            ctx.client.join_configured_channels().await;
            Ok::<_, anyhow::Error>(())
        }),
    );

    {
        let client = client.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
                return;
            }
            info!("Ctrl-C received, quitting");
            client.quit(Some("Shutting down"));
        });
    }

    client.run().await?;
    info!("Shutdown complete");
    Ok(())
}
