//! slirc-client - Straylight IRC client engine.
//!
//! Keeps one connection to an IRC server, tracks the channels and users it
//! sees, paces outgoing traffic to the server's flood limits and dispatches
//! every incoming line to concurrently running handlers.
//!
//! ```no_run
//! use slirc_client::{Client, Config, Event, EventContext, Handler};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = Client::new(Config::load("config.toml")?)?;
//! client.handlers().register(
//!     Handler::builder(Event::Message)
//!         .matching("ping")
//!         .build(|ctx: EventContext| async move {
//!             ctx.reply("pong");
//!             Ok::<_, anyhow::Error>(())
//!         }),
//! );
//! client.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod dcc;
pub mod error;
pub mod handlers;
pub mod link;
pub mod message;
pub mod network;
pub mod sasl;
pub mod state;
pub mod target;
pub mod telemetry;

pub use client::Client;
pub use config::Config;
pub use dcc::DccSend;
pub use error::{ClientError, ConnectError, StrictModeViolation, SyncError};
pub use handlers::{Event, EventArg, EventContext, Handler, HandlerRegistry, Pattern};
pub use message::IncomingMessage;
pub use network::ConnectionState;
pub use state::{Ban, Channel, Mask, User};
pub use target::Target;
