//! Structured logging.
//!
//! # Responsibilities
//! - Resolve output format and level from config and environment
//! - Install the global `tracing` subscriber exactly once
//!
//! # Design Decisions
//! - JSON output unless pretty mode is requested
//! - `LOG_JSON` (presence only) beats every pretty switch
//! - `LOG_LEVEL` beats the configured level
//! - Bunyan level names are accepted; `fatal` maps to `error`

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::env::{EnvVars, LOG_JSON, LOG_LEVEL, LOG_PRETTY};
use crate::config::LogConfig;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Invalid log level '{level}': {message}")]
    InvalidLevel { level: String, message: String },

    #[error("Global logger already installed")]
    AlreadyInitialized,
}

/// Output format of the log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Effective logger settings after applying environment overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub name: String,
    pub level: String,
    pub format: LogFormat,
}

impl LogSettings {
    pub fn resolve(config: &LogConfig, env: &EnvVars) -> Self {
        let json_forced = env.contains(LOG_JSON);
        let pretty = !json_forced && (config.pretty || env.flag(LOG_PRETTY));

        let level = env
            .get(LOG_LEVEL)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(config.level.as_str());

        Self {
            name: config.name.clone(),
            level: normalize_level(level),
            format: if pretty { LogFormat::Pretty } else { LogFormat::Json },
        }
    }

    /// Build the filter for this level.
    pub fn filter(&self) -> Result<EnvFilter, LogError> {
        EnvFilter::try_new(&self.level).map_err(|e| LogError::InvalidLevel {
            level: self.level.clone(),
            message: e.to_string(),
        })
    }
}

fn normalize_level(level: &str) -> String {
    let trimmed = level.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "fatal" => "error".to_string(),
        "trace" | "debug" | "info" | "warn" | "error" | "off" => trimmed.to_ascii_lowercase(),
        _ => trimmed.to_string(),
    }
}

/// Handle on the installed logger.
#[derive(Debug, Clone)]
pub struct LogService {
    settings: LogSettings,
}

impl LogService {
    /// Install the global subscriber. Call once per process.
    pub fn initialize(config: &LogConfig, env: &EnvVars) -> Result<Self, LogError> {
        let settings = LogSettings::resolve(config, env);
        let filter = settings.filter()?;

        let (json, pretty) = match settings.format {
            LogFormat::Json => (Some(fmt::layer().json().with_current_span(true)), None),
            LogFormat::Pretty => (None, Some(fmt::layer().pretty())),
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(json)
            .with(pretty)
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized)?;

        tracing::debug!(
            name = %settings.name,
            level = %settings.level,
            format = ?settings.format,
            "Logger initialized"
        );

        Ok(Self { settings })
    }

    pub fn settings(&self) -> &LogSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pretty: bool, level: &str) -> LogConfig {
        LogConfig {
            name: "test".into(),
            level: level.into(),
            pretty,
        }
    }

    #[test]
    fn test_defaults_to_json() {
        let settings = LogSettings::resolve(&config(false, "info"), &EnvVars::default());
        assert_eq!(settings.format, LogFormat::Json);
        assert_eq!(settings.level, "info");
    }

    #[test]
    fn test_pretty_from_config_or_env() {
        let from_config = LogSettings::resolve(&config(true, "info"), &EnvVars::default());
        assert_eq!(from_config.format, LogFormat::Pretty);

        let env = EnvVars::from_pairs([(LOG_PRETTY, "true")]);
        let from_env = LogSettings::resolve(&config(false, "info"), &env);
        assert_eq!(from_env.format, LogFormat::Pretty);
    }

    #[test]
    fn test_log_json_presence_forces_json() {
        let env = EnvVars::from_pairs([(LOG_JSON, ""), (LOG_PRETTY, "1")]);
        let settings = LogSettings::resolve(&config(true, "info"), &env);
        assert_eq!(settings.format, LogFormat::Json);
    }

    #[test]
    fn test_level_override_and_mapping() {
        let env = EnvVars::from_pairs([(LOG_LEVEL, "FATAL")]);
        let settings = LogSettings::resolve(&config(false, "debug"), &env);
        assert_eq!(settings.level, "error");

        let directive = LogSettings::resolve(&config(false, "apito=debug,tower_http=warn"), &EnvVars::default());
        assert_eq!(directive.level, "apito=debug,tower_http=warn");
        assert!(directive.filter().is_ok());
    }

    #[test]
    fn test_invalid_level_rejected() {
        let settings = LogSettings::resolve(&config(false, "apito=loud"), &EnvVars::default());
        assert!(matches!(settings.filter(), Err(LogError::InvalidLevel { .. })));
    }
}
