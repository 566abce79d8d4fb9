//! Error types for the IRC protocol library.
//!
//! This module defines error types for protocol-level errors,
//! message parsing failures, and mode parsing issues.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured character encoding label is not known.
    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),

    /// Failed to parse an IRC message.
    #[error("invalid message: {string}")]
    InvalidMessage {
        /// The invalid message string.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },
}

/// Errors encountered when parsing IRC messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Message was empty.
    #[error("empty message")]
    EmptyMessage,

    /// Command was invalid or missing.
    #[error("invalid command")]
    InvalidCommand,

    /// Tags section was not properly terminated.
    #[error("unterminated tags section")]
    UnterminatedTags,

    /// Parsing error with position information.
    #[error("parsing failed at position {position}: {context}")]
    ParseContext {
        /// Character position where parsing failed.
        position: usize,
        /// Description of what was being parsed.
        context: String,
    },
}

/// Errors produced while interpreting a MODE string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ModeParseError {
    /// The mode string has zero length.
    #[error("empty mode string")]
    EmptyString,

    /// The mode string does not start with `+` or `-`.
    #[error("malformed mode string: {modes}")]
    Malformed {
        /// The offending mode string.
        modes: String,
    },

    /// A direction marker is followed by another marker or by the end.
    #[error("empty mode sequence in {modes}")]
    EmptySequence {
        /// The offending mode string.
        modes: String,
    },

    /// A mode that requires a parameter has none left to consume.
    #[error("not enough parameters for mode {mode}")]
    NotEnoughParameters {
        /// The mode character lacking a parameter.
        mode: char,
    },

    /// Parameters remain after every mode character was processed.
    #[error("too many parameters for {modes}: {params:?} left over")]
    TooManyParameters {
        /// The full mode string.
        modes: String,
        /// The parameters that were not consumed.
        params: Vec<String>,
    },
}
