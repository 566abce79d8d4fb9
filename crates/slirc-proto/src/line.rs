//! Line-based codec for tokio.
//!
//! Reads and writes `\r\n`-terminated lines in a configurable character
//! encoding. Decoding never fails on bad input: undecodable bytes are
//! replaced and lines longer than the limit are dropped.

#[cfg(feature = "encoding")]
use encoding::Encoding;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error;

/// Default limit: 8191 bytes of tags plus a 512-byte body.
pub const DEFAULT_MAX_LINE_LEN: usize = 8191 + 512;

/// Line-based codec that handles newline-terminated messages.
pub struct LineCodec {
    #[cfg(feature = "encoding")]
    encoding: &'static Encoding,
    /// Index of next byte to check for newline
    next_index: usize,
    /// Maximum line length
    max_len: usize,
    /// Set while skipping the rest of an overlong line.
    discarding: bool,
}

impl LineCodec {
    /// Create a new codec with the specified encoding label (e.g. `utf-8`,
    /// `iso-8859-1`, `windows-1252`).
    pub fn new(label: &str) -> error::Result<Self> {
        Self::with_max_len(label, DEFAULT_MAX_LINE_LEN)
    }

    /// Create a new codec with custom max line length.
    pub fn with_max_len(label: &str, max_len: usize) -> error::Result<Self> {
        #[cfg(feature = "encoding")]
        let encoding = Encoding::for_label(label.as_bytes())
            .ok_or_else(|| error::ProtocolError::UnknownEncoding(label.to_owned()))?;
        #[cfg(not(feature = "encoding"))]
        if !label.eq_ignore_ascii_case("utf-8") && !label.eq_ignore_ascii_case("utf8") {
            return Err(error::ProtocolError::UnknownEncoding(label.to_owned()));
        }

        Ok(Self {
            #[cfg(feature = "encoding")]
            encoding,
            next_index: 0,
            max_len,
            discarding: false,
        })
    }

    /// Decode one raw line, without its terminator, into a string.
    ///
    /// Invalid UTF-8 falls back to Windows-1252, which is what most legacy
    /// clients send.
    fn decode_line(&self, raw: &[u8]) -> String {
        #[cfg(feature = "encoding")]
        {
            let (text, had_errors) = self.encoding.decode_without_bom_handling(raw);
            if had_errors && self.encoding == encoding::UTF_8 {
                let (text, _) = encoding::WINDOWS_1252.decode_without_bom_handling(raw);
                return text.into_owned();
            }
            text.into_owned()
        }

        #[cfg(not(feature = "encoding"))]
        {
            String::from_utf8_lossy(raw).into_owned()
        }
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = error::ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if src.len() > self.max_len {
                    src.clear();
                    self.discarding = true;
                    self.next_index = 0;
                } else {
                    self.next_index = src.len();
                }
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if std::mem::take(&mut self.discarding) || line.len() > self.max_len {
                continue;
            }

            let end = line
                .iter()
                .rposition(|b| *b != b'\r' && *b != b'\n')
                .map_or(0, |i| i + 1);
            return Ok(Some(self.decode_line(&line[..end])));
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = error::ProtocolError;

    /// Encode a line, appending `\r\n` unless it is already terminated.
    fn encode(&mut self, msg: String, dst: &mut BytesMut) -> error::Result<()> {
        #[cfg(feature = "encoding")]
        {
            let (bytes, _enc, _had_errors) = self.encoding.encode(&msg);
            dst.extend_from_slice(&bytes);
        }

        #[cfg(not(feature = "encoding"))]
        {
            dst.extend_from_slice(msg.as_bytes());
        }

        if !msg.ends_with("\r\n") {
            dst.extend_from_slice(b"\r\n");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_complete_line() {
        let mut codec = LineCodec::new("utf-8").unwrap();
        let mut buf = BytesMut::from("PING :test\r\nPONG");

        let result = codec.decode(&mut buf).unwrap();
        assert_eq!(result, Some("PING :test".to_string()));
        assert_eq!(&buf[..], b"PONG");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_decode_bare_lf() {
        let mut codec = LineCodec::new("utf-8").unwrap();
        let mut buf = BytesMut::from("PING :a\nPING :b\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING :a"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING :b"));
    }

    #[test]
    fn test_overlong_line_is_dropped() {
        let mut codec = LineCodec::with_max_len("utf-8", 10).unwrap();
        let mut buf = BytesMut::from("this is way too long");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b" still\r\nPING\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING"));
    }

    #[test]
    fn test_invalid_utf8_falls_back() {
        let mut codec = LineCodec::new("utf-8").unwrap();
        let mut buf = BytesMut::from(&b"PRIVMSG #c :caf\xe9\r\n"[..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("PRIVMSG #c :café")
        );
    }

    #[test]
    fn test_latin1_roundtrip() {
        let mut codec = LineCodec::new("iso-8859-1").unwrap();
        let mut buf = BytesMut::new();
        codec.encode("PRIVMSG #c :café".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"PRIVMSG #c :caf\xe9\r\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("PRIVMSG #c :café")
        );
    }

    #[test]
    fn test_encode_appends_terminator_once() {
        let mut codec = LineCodec::new("utf-8").unwrap();
        let mut buf = BytesMut::new();
        codec.encode("PONG :test".to_string(), &mut buf).unwrap();
        codec.encode("PONG :again\r\n".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"PONG :test\r\nPONG :again\r\n");
    }

    #[test]
    fn test_unknown_encoding() {
        assert!(matches!(
            LineCodec::new("klingon"),
            Err(error::ProtocolError::UnknownEncoding(_))
        ));
    }
}
