//! SASL payload helpers.
//!
//! The mechanism state machines live with the client; this module only
//! covers the wire encoding every mechanism shares: base64 framing and the
//! 400-byte `AUTHENTICATE` chunking rule.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Maximum size of one `AUTHENTICATE` payload.
pub const SASL_CHUNK_SIZE: usize = 400;

/// Encode a PLAIN response with the username as both authzid and authcid.
///
/// ```
/// use slirc_proto::sasl::encode_plain;
///
/// assert_eq!(encode_plain("user", "pass"), "dXNlcgB1c2VyAHBhc3M=");
/// ```
pub fn encode_plain(username: &str, password: &str) -> String {
    encode_plain_with_authzid(username, username, password)
}

/// Encode a PLAIN response with an explicit authorization identity.
pub fn encode_plain_with_authzid(authzid: &str, authcid: &str, password: &str) -> String {
    BASE64.encode(format!("{authzid}\0{authcid}\0{password}"))
}

/// Base64-encode an arbitrary mechanism response.
pub fn encode_response(payload: &[u8]) -> String {
    BASE64.encode(payload)
}

/// Decode a server challenge. `+` is the empty challenge.
pub fn decode_challenge(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    if encoded == "+" {
        return Ok(Vec::new());
    }
    BASE64.decode(encoded)
}

/// Split an encoded response into `AUTHENTICATE` arguments.
///
/// An empty response is sent as `+`, and a response whose length is an
/// exact multiple of the chunk size is terminated by a trailing `+`.
///
/// ```
/// use slirc_proto::sasl::chunk_response;
///
/// assert_eq!(chunk_response(""), vec!["+"]);
/// assert_eq!(chunk_response("abc"), vec!["abc"]);
/// let exact = "a".repeat(400);
/// assert_eq!(chunk_response(&exact), vec![exact.as_str(), "+"]);
/// ```
pub fn chunk_response(encoded: &str) -> Vec<&str> {
    if encoded.is_empty() {
        return vec!["+"];
    }
    let mut chunks: Vec<&str> = Vec::with_capacity(encoded.len() / SASL_CHUNK_SIZE + 1);
    let mut rest = encoded;
    while !rest.is_empty() {
        let (head, tail) = rest.split_at(SASL_CHUNK_SIZE.min(rest.len()));
        chunks.push(head);
        rest = tail;
    }
    if encoded.len() % SASL_CHUNK_SIZE == 0 {
        chunks.push("+");
    }
    chunks
}

/// Parse the mechanism list of a `908` reply or a `sasl=` capability value.
pub fn parse_mechanisms(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_ascii_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_roundtrip() {
        let encoded = encode_plain("bot", "secret");
        let decoded = decode_challenge(&encoded).unwrap();
        assert_eq!(decoded, b"bot\0bot\0secret");
    }

    #[test]
    fn test_empty_challenge() {
        assert_eq!(decode_challenge("+").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_chunking_long_response() {
        let long = "x".repeat(900);
        let chunks = chunk_response(&long);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 400);
        assert_eq!(chunks[2].len(), 100);
    }

    #[test]
    fn test_parse_mechanisms() {
        assert_eq!(parse_mechanisms("plain, EXTERNAL,,"), vec!["PLAIN", "EXTERNAL"]);
    }
}
