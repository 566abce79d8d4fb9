//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("server.host is required")]
    MissingHost,
    #[error("server.port must not be 0")]
    InvalidPort,
    #[error("identity.nick is required")]
    EmptyNick,
    #[error("flood.messages_per_second must be positive, got {0}")]
    InvalidMessagesPerSecond(f64),
    #[error("flood.server_queue_size must be at least 1")]
    InvalidServerQueueSize,
    #[error("messages.encoding is not a known label: {0}")]
    UnknownEncoding(String),
    #[error("plugins.{field} is not a valid regex: {message}")]
    InvalidPattern { field: &'static str, message: String },
    #[error("sasl.mechanisms contains an unsupported mechanism: {0}")]
    UnsupportedMechanism(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(ValidationError::MissingHost);
    }
    if config.server.port == Some(0) {
        errors.push(ValidationError::InvalidPort);
    }
    if config.identity.nick.trim().is_empty() {
        errors.push(ValidationError::EmptyNick);
    }

    if let Some(mps) = config.flood.messages_per_second
        && !(mps > 0.0 && mps.is_finite())
    {
        errors.push(ValidationError::InvalidMessagesPerSecond(mps));
    }
    if config.flood.server_queue_size == Some(0) {
        errors.push(ValidationError::InvalidServerQueueSize);
    }

    if slirc_proto::LineCodec::new(&config.messages.encoding).is_err() {
        errors.push(ValidationError::UnknownEncoding(
            config.messages.encoding.clone(),
        ));
    }

    for (field, pattern) in [
        ("prefix", &config.plugins.prefix),
        ("suffix", &config.plugins.suffix),
    ] {
        if let Some(pattern) = pattern
            && let Err(e) = regex::Regex::new(pattern)
        {
            errors.push(ValidationError::InvalidPattern {
                field,
                message: e.to_string(),
            });
        }
    }

    for mechanism in &config.sasl.mechanisms {
        if crate::sasl::mechanism_by_name(mechanism, "", "").is_none() {
            errors.push(ValidationError::UnsupportedMechanism(mechanism.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::new("irc.example.org")).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = Config::new("irc.example.org");
        config.identity.nick = String::new();
        config.server.port = Some(0);
        config.flood.messages_per_second = Some(0.0);
        config.messages.encoding = "klingon".into();
        config.plugins.suffix = Some("(".into());

        let errors = validate(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::EmptyNick));
        assert!(errors.contains(&ValidationError::InvalidPort));
        assert!(errors.contains(&ValidationError::InvalidMessagesPerSecond(0.0)));
        assert!(errors.contains(&ValidationError::UnknownEncoding("klingon".into())));
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::InvalidPattern { field: "suffix", .. }))
        );
    }

    #[test]
    fn test_negative_rate_rejected_through_config() {
        let mut config = Config::new("irc.example.org");
        config.flood.messages_per_second = Some(-1.5);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("messages_per_second"));
    }

    #[test]
    fn test_unknown_sasl_mechanism() {
        let mut config = Config::new("irc.example.org");
        config.sasl.mechanisms = vec!["PLAIN".into(), "DH-BLOWFISH".into()];
        assert_eq!(
            validate(&config).unwrap_err(),
            vec![ValidationError::UnsupportedMechanism("DH-BLOWFISH".into())]
        );
    }
}
