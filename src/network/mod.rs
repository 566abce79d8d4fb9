//! Network module.
//!
//! Contains the transport, the per-session connection engine, the outgoing
//! queue with its flood limiter, and network detection.

pub(crate) mod connection;
pub mod limit;
mod profile;
mod queue;
mod transport;

pub use connection::{ConnectionState, SessionEnd};
pub use limit::RateLimiter;
pub use profile::{Ircd, NetworkProfile};
pub use queue::{OutgoingQueue, QueueKey, run_writer};
pub use transport::{Stream, connect};
