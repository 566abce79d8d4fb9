//! SASL authentication strategies.
//!
//! The engine drives the `AUTHENTICATE` exchange; a [`SaslMechanism`] only
//! turns a server challenge into a response payload. Base64 encoding and
//! 400-byte chunking happen in the engine.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

/// A pluggable SASL mechanism.
#[async_trait]
pub trait SaslMechanism: Send + Sync + fmt::Debug {
    /// The IANA mechanism name sent in `AUTHENTICATE <NAME>`.
    fn name(&self) -> &'static str;

    /// Produce the response to a decoded server challenge.
    async fn respond(&self, challenge: &[u8]) -> anyhow::Result<Vec<u8>>;
}

/// `PLAIN` (RFC 4616) with the authorization identity set to the username.
pub struct Plain {
    username: String,
    password: String,
}

impl Plain {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Plain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plain")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SaslMechanism for Plain {
    fn name(&self) -> &'static str {
        "PLAIN"
    }

    async fn respond(&self, _challenge: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(format!("{0}\0{0}\0{1}", self.username, self.password).into_bytes())
    }
}

/// Look up a built-in mechanism by its (case-insensitive) name.
pub fn mechanism_by_name(
    name: &str,
    username: &str,
    password: &str,
) -> Option<Arc<dyn SaslMechanism>> {
    match name.to_ascii_uppercase().as_str() {
        "PLAIN" => Some(Arc::new(Plain::new(username, password))),
        _ => None,
    }
}
