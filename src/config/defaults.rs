//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Identity Defaults
// =============================================================================

pub fn default_nick() -> String {
    "slirc".to_string()
}

pub fn default_user() -> String {
    "slirc".to_string()
}

pub fn default_realname() -> String {
    "slirc".to_string()
}

// =============================================================================
// Timeout Defaults
// =============================================================================

pub fn default_connect_timeout() -> u64 {
    10
}

pub fn default_read_timeout() -> u64 {
    240
}

pub fn default_stop_timeout() -> u64 {
    5
}

pub fn default_max_reconnect_delay() -> u64 {
    300
}

// =============================================================================
// Message Defaults
// =============================================================================

pub fn default_split_start() -> String {
    "... ".to_string()
}

pub fn default_split_end() -> String {
    " ...".to_string()
}

pub fn default_encoding() -> String {
    "utf-8".to_string()
}

pub fn default_plugin_prefix() -> Option<String> {
    Some("^!".to_string())
}

pub fn default_sasl_mechanisms() -> Vec<String> {
    vec!["PLAIN".to_string()]
}
