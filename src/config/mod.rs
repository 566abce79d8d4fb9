//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: the config tree, one struct per TOML section
//! - [`defaults`]: serde default functions
//! - [`validation`]: checks run after parsing

mod defaults;
mod types;
mod validation;

pub use types::{
    Config, ConfigError, FloodConfig, HandlersConfig, IdentityConfig, MessagesConfig,
    PluginsConfig, SaslConfig, ServerConfig, TimeoutsConfig, TlsConfig,
};
pub use validation::{ValidationError, validate};
