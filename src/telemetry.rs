//! Tracing helpers for wire traces and standard spans.
//!
//! Raw traffic is logged at `trace` level under the `incoming` and
//! `outgoing` targets so it can be switched on separately, e.g.
//! `RUST_LOG=info,incoming=trace,outgoing=trace`.

use tracing::trace;

/// Record a line read from the server.
#[inline]
pub fn incoming(line: &str) {
    trace!(target: "incoming", "<< {}", line);
}

/// Record a line written to the server.
#[inline]
pub fn outgoing(line: &str) {
    trace!(target: "outgoing", ">> {}", line);
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span for one connection attempt.
    pub fn connection(host: &str, port: u16) -> Span {
        info_span!("connection", host = %host, port = port)
    }

    /// Span for one handler execution.
    pub fn handler(event: &str, execution: u64) -> Span {
        info_span!("handler", event = %event, execution = execution)
    }
}
