//! Environment variable snapshot and `__`-delimited overrides.
//!
//! # Responsibilities
//! - Capture the process environment once at startup
//! - Provide the well-known variables with their fallback defaults
//! - Translate `SECTION__KEY=value` variables into config key paths
//!
//! # Design Decisions
//! - Services read an `EnvVars` value, never `std::env` directly
//! - Only variables containing the separator are treated as overrides
//! - Override values stay raw text until applied; they become numbers or
//!   booleans only where the key they replace holds one

use std::collections::BTreeMap;

use serde_json::Value;

/// Environment name (`development`, `production`, ...).
pub const NODE_ENV: &str = "NODE_ENV";
/// Build version reported by `/version`.
pub const API_VERSION: &str = "API_VERSION";
/// Build commit reported by `/version`.
pub const API_COMMIT: &str = "API_COMMIT";
/// Truthy value enables pretty log output.
pub const LOG_PRETTY: &str = "LOG_PRETTY";
/// Presence forces JSON log output.
pub const LOG_JSON: &str = "LOG_JSON";
/// Overrides the configured log level.
pub const LOG_LEVEL: &str = "LOG_LEVEL";
/// Directory holding the configuration documents.
pub const CONFIG_DIR: &str = "CONFIG_DIR";

pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_VERSION: &str = "default";
pub const DEFAULT_COMMIT: &str = "default";
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Key path separator for configuration overrides.
pub const OVERRIDE_SEPARATOR: &str = "__";

/// Immutable snapshot of environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    vars: BTreeMap<String, String>,
}

/// A single configuration override taken from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    pub path: Vec<String>,
    pub raw: String,
}

impl Override {
    /// Typed value for this override, shaped after the value it replaces.
    /// Strings (and unset optional keys) keep the raw text; numbers and
    /// booleans are parsed when the text allows it. Keys nothing knows about
    /// are parsed as JSON scalars.
    pub fn value_for(&self, current: Option<&Value>) -> Value {
        match current {
            Some(Value::String(_) | Value::Null | Value::Object(_) | Value::Array(_)) => {
                Value::String(self.raw.clone())
            }
            Some(Value::Number(_) | Value::Bool(_)) | None => parse_scalar(&self.raw),
        }
    }
}

impl EnvVars {
    /// Snapshot the current process environment.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Value of `key`, or `default` when unset or empty.
    pub fn get_or(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => default.to_string(),
        }
    }

    /// Interpret a variable as a boolean flag.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false)
    }

    pub fn environment(&self) -> String {
        self.get_or(NODE_ENV, DEFAULT_ENVIRONMENT)
    }

    pub fn version(&self) -> String {
        self.get_or(API_VERSION, DEFAULT_VERSION)
    }

    pub fn commit(&self) -> String {
        self.get_or(API_COMMIT, DEFAULT_COMMIT)
    }

    pub fn config_dir(&self) -> String {
        self.get_or(CONFIG_DIR, DEFAULT_CONFIG_DIR)
    }

    /// Collect every `A__B__C=value` variable as an override of `a.b.c`.
    pub fn overrides(&self) -> Vec<Override> {
        self.vars
            .iter()
            .filter(|(key, _)| key.contains(OVERRIDE_SEPARATOR))
            .filter_map(|(key, value)| {
                let path: Vec<String> = key
                    .split(OVERRIDE_SEPARATOR)
                    .map(str::to_ascii_lowercase)
                    .collect();
                if path.iter().any(String::is_empty) {
                    return None;
                }
                Some(Override {
                    path,
                    raw: value.clone(),
                })
            })
            .collect()
    }
}

fn parse_scalar(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::Null)) => value,
        _ => Value::String(raw.to_string()),
    }
}
