//! IRC message codec for tokio.
//!
//! This module provides a codec that encodes and decodes IRC [`Message`] types
//! using the tokio codec framework.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error;
use crate::line::LineCodec;
use crate::message::Message;

/// Tokio codec for encoding/decoding IRC messages.
///
/// Wraps [`LineCodec`] and parses lines into [`Message`] types. Lines that
/// do not parse are skipped so that one bad line never ends the stream.
pub struct IrcCodec {
    inner: LineCodec,
}

impl IrcCodec {
    /// Create a new codec with the specified encoding.
    pub fn new(label: &str) -> error::Result<Self> {
        LineCodec::new(label).map(|codec| Self { inner: codec })
    }

    /// Create a new codec with custom max line length.
    pub fn with_max_len(label: &str, max_len: usize) -> error::Result<Self> {
        LineCodec::with_max_len(label, max_len).map(|codec| Self { inner: codec })
    }

    /// Truncate outgoing data at the first line ending, so a caller can
    /// never smuggle a second command onto the wire.
    pub fn sanitize(mut data: String) -> String {
        if let Some(pos) = data.find(['\r', '\n']) {
            data.truncate(pos);
        }
        data
    }
}

impl Decoder for IrcCodec {
    type Item = Message;
    type Error = error::ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<Message>> {
        while let Some(line) = self.inner.decode(src)? {
            if let Ok(msg) = line.parse::<Message>() {
                return Ok(Some(msg));
            }
        }
        Ok(None)
    }
}

impl Encoder<Message> for IrcCodec {
    type Error = error::ProtocolError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> error::Result<()> {
        self.inner.encode(Self::sanitize(msg.to_string()), dst)
    }
}
