//! Core configuration types and loading.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;
use super::validation::{ValidationError, validate};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server to connect to.
    pub server: ServerConfig,
    /// Nick, ident and realname.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// TLS settings.
    #[serde(default)]
    pub tls: TlsConfig,
    /// Connect and read timeouts.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    /// Flood control overrides.
    #[serde(default)]
    pub flood: FloodConfig,
    /// SASL credentials.
    #[serde(default)]
    pub sasl: SaslConfig,
    /// Outgoing message framing and encoding.
    #[serde(default)]
    pub messages: MessagesConfig,
    /// Command prefix/suffix for handler patterns.
    #[serde(default)]
    pub plugins: PluginsConfig,
    /// Handler execution settings.
    #[serde(default)]
    pub handlers: HandlersConfig,
    /// Refuse to send commands that exceed server-advertised limits.
    #[serde(default)]
    pub strict: bool,
    /// Channels joined after registration.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Reconnect after the connection drops.
    #[serde(default = "default_true")]
    pub reconnect: bool,
    /// Upper bound of the reconnect back-off, in seconds.
    #[serde(default = "default_max_reconnect_delay")]
    pub max_reconnect_delay: u64,
    /// Seconds to wait after registration before joining `channels`.
    #[serde(default)]
    pub delay_joins: u64,
}

impl Config {
    /// A configuration with every default and the given server host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            server: ServerConfig {
                host: host.into(),
                port: None,
                password: None,
                local_host: None,
            },
            identity: IdentityConfig::default(),
            tls: TlsConfig::default(),
            timeouts: TimeoutsConfig::default(),
            flood: FloodConfig::default(),
            sasl: SaslConfig::default(),
            messages: MessagesConfig::default(),
            plugins: PluginsConfig::default(),
            handlers: HandlersConfig::default(),
            strict: false,
            channels: Vec::new(),
            reconnect: true,
            max_reconnect_delay: default_max_reconnect_delay(),
            delay_joins: 0,
        }
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// Run every validation check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate(self).map_err(ConfigError::Invalid)
    }

    /// The port to connect to, taking TLS into account.
    pub fn port(&self) -> u16 {
        self.server
            .port
            .unwrap_or(if self.tls.enabled { 6697 } else { 6667 })
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(s)?;
        Ok(config)
    }
}

/// Server endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Hostname or address.
    pub host: String,
    /// Port; defaults to 6667, or 6697 with TLS.
    pub port: Option<u16>,
    /// Connection password sent as `PASS`.
    pub password: Option<String>,
    /// Local address to bind before connecting.
    pub local_host: Option<String>,
}

/// Identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Preferred nickname.
    #[serde(default = "default_nick")]
    pub nick: String,
    /// Alternatives tried in order when the nick is taken.
    #[serde(default)]
    pub nicks: Vec<String>,
    /// Ident/username.
    #[serde(default = "default_user")]
    pub user: String,
    /// Real name (gecos).
    #[serde(default = "default_realname")]
    pub realname: String,
    /// User modes set after registration, e.g. `"iB"`.
    #[serde(default)]
    pub modes: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            nick: default_nick(),
            nicks: Vec::new(),
            user: default_user(),
            realname: default_realname(),
            modes: None,
        }
    }
}

/// TLS configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    /// Connect over TLS.
    #[serde(default)]
    pub enabled: bool,
    /// Verify the server certificate against the system roots.
    #[serde(default)]
    pub verify: bool,
    /// PEM file holding a client certificate and its private key.
    pub client_cert: Option<PathBuf>,
    /// Extra PEM bundle of trusted roots.
    pub ca_path: Option<PathBuf>,
}

/// Timeout configuration, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    /// Connect timeout (default: 10).
    #[serde(default = "default_connect_timeout")]
    pub connect: u64,
    /// Close the connection after this long without any incoming line
    /// (default: 240).
    #[serde(default = "default_read_timeout")]
    pub read: u64,
}

impl TimeoutsConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            connect: default_connect_timeout(),
            read: default_read_timeout(),
        }
    }
}

/// Flood control. Unset values fall back to the detected network profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FloodConfig {
    pub messages_per_second: Option<f64>,
    pub server_queue_size: Option<usize>,
}

/// SASL configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SaslConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Mechanisms tried in order.
    #[serde(default = "default_sasl_mechanisms")]
    pub mechanisms: Vec<String>,
}

impl SaslConfig {
    /// Whether credentials are configured.
    pub fn is_enabled(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

impl Default for SaslConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            mechanisms: default_sasl_mechanisms(),
        }
    }
}

/// Outgoing message configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesConfig {
    /// Prepended to every continuation chunk.
    #[serde(default = "default_split_start")]
    pub split_start: String,
    /// Appended to every chunk that continues.
    #[serde(default = "default_split_end")]
    pub split_end: String,
    /// WHATWG encoding label used on the wire.
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            split_start: default_split_start(),
            split_end: default_split_end(),
            encoding: default_encoding(),
        }
    }
}

/// Pattern wrapping applied to handlers registered as commands.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginsConfig {
    /// Regex prepended to command patterns (default: `^!`).
    #[serde(default = "default_plugin_prefix")]
    pub prefix: Option<String>,
    /// Regex appended to command patterns.
    #[serde(default)]
    pub suffix: Option<String>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            prefix: default_plugin_prefix(),
            suffix: None,
        }
    }
}

/// Handler execution configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HandlersConfig {
    /// Grace period, in seconds, before in-flight executions are aborted
    /// when a handler is stopped.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: u64,
}

impl HandlersConfig {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_timeout)
    }
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            stop_timeout: default_stop_timeout(),
        }
    }
}
