//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, pool sizes ordered)
//! - Validate addresses and the database client name
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::AppConfig;

/// Database clients the pool can be built for.
pub const SUPPORTED_CLIENTS: &[&str] = &["pg", "postgres", "postgresql"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check the configuration, collecting every problem.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.http.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "http.bind_address",
            format!("'{}' is not a socket address", config.http.bind_address),
        ));
    }
    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::new("http.request_timeout_secs", "must be greater than 0"));
    }
    if config.http.max_payload_bytes == 0 {
        errors.push(ValidationError::new("http.max_payload_bytes", "must be greater than 0"));
    }

    if config.log.level.trim().is_empty() {
        errors.push(ValidationError::new("log.level", "must not be empty"));
    }

    let client = config.database.client.to_ascii_lowercase();
    if !SUPPORTED_CLIENTS.contains(&client.as_str()) {
        errors.push(ValidationError::new(
            "database.client",
            format!("unsupported client '{}'", config.database.client),
        ));
    }
    if config.database.connection.trim().is_empty() {
        errors.push(ValidationError::new("database.connection", "must not be empty"));
    }
    if config.database.pool.max == 0 {
        errors.push(ValidationError::new("database.pool.max", "must be greater than 0"));
    }
    if config.database.pool.min > config.database.pool.max {
        errors.push(ValidationError::new(
            "database.pool.min",
            format!(
                "{} exceeds database.pool.max ({})",
                config.database.pool.min, config.database.pool.max
            ),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
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

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.http.bind_address = "not-an-address".into();
        config.database.pool.min = 8;
        config.database.pool.max = 2;
        config.database.client = "mysql".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["http.bind_address", "database.client", "database.pool.min"]);
    }

    #[test]
    fn test_metrics_address_only_checked_when_enabled() {
        let mut config = AppConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
