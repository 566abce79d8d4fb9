//! Unified error handling for slirc-client.
//!
//! Each failure kind the engine can report has its own enum; [`ClientError`]
//! aggregates them for callers that do not care which layer failed.

use thiserror::Error;

use crate::config::ConfigError;

// ============================================================================
// Transport Errors
// ============================================================================

/// Why a connection attempt failed.
///
/// A connection attempt never panics or aborts the process; it reports one of
/// these and leaves the engine disconnected.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("connection to {addr} timed out")]
    Timeout { addr: String },

    #[error("connection to {addr} refused")]
    Refused { addr: String },

    #[error("could not resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Refused { .. } => "refused",
            Self::Resolve { .. } => "resolve",
            Self::Tls(_) => "tls",
            Self::Io(_) => "io",
        }
    }
}

// ============================================================================
// Entity Errors
// ============================================================================

/// Reading a synced attribute failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The server never delivered the attribute within the sync timeout.
    #[error("synced attribute '{attribute}' of {owner} is not available")]
    SyncedAttributeNotAvailable {
        attribute: &'static str,
        owner: String,
    },
}

/// An outgoing command would exceed a server-advertised limit while the
/// client runs in strict mode. Raised before anything is queued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrictModeViolation {
    #[error("topic is {len} characters, server allows {max}")]
    TopicTooLong { len: usize, max: usize },

    #[error("kick reason is {len} characters, server allows {max}")]
    KickReasonTooLong { len: usize, max: usize },
}

// ============================================================================
// Aggregate
// ============================================================================

/// Any error the client library can return.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Strict(#[from] StrictModeViolation),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Protocol(#[from] slirc_proto::ProtocolError),

    #[error(transparent)]
    Mode(#[from] slirc_proto::ModeParseError),
}
