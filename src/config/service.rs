//! Configuration service: the merged, validated, read-only options snapshot.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::config::env::EnvVars;
use crate::config::loader::{apply_override, deep_merge, find_document, load_document, lookup, ConfigError};
use crate::config::schema::AppConfig;
use crate::config::validation::validate_config;

/// Base document stem, loaded first.
pub const DEFAULT_DOCUMENT: &str = "default";

/// Build and runtime identity, taken from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    pub version: String,
    pub commit: String,
    pub environment: String,
}

impl RuntimeInfo {
    pub fn from_env(env: &EnvVars) -> Self {
        Self {
            version: env.version(),
            commit: env.commit(),
            environment: env.environment(),
        }
    }
}

/// Immutable configuration snapshot.
#[derive(Debug, Clone)]
pub struct ConfigService {
    options: AppConfig,
    document: Value,
    runtime: RuntimeInfo,
    location: PathBuf,
}

impl ConfigService {
    /// Load `default.<ext>`, overlay `<environment>.<ext>`, then apply
    /// environment overrides.
    ///
    /// The environment document is required; the base document is optional.
    pub fn initialize(location: impl AsRef<Path>, env: &EnvVars) -> Result<Self, ConfigError> {
        let location = location.as_ref().to_path_buf();
        let runtime = RuntimeInfo::from_env(env);

        let mut document = match find_document(&location, DEFAULT_DOCUMENT) {
            Some((path, format)) => load_document(&path, format)?,
            None => {
                tracing::debug!(location = %location.display(), "No base configuration document");
                Value::Object(Map::new())
            }
        };

        let (overlay_path, overlay_format) = find_document(&location, &runtime.environment)
            .ok_or_else(|| ConfigError::MissingEnvironment {
                environment: runtime.environment.clone(),
                location: location.clone(),
            })?;
        deep_merge(&mut document, load_document(&overlay_path, overlay_format)?);

        let shape = serde_json::to_value(AppConfig::default())?;
        for over in env.overrides() {
            apply_override(&mut document, &over, &shape);
        }

        let options: AppConfig = serde_json::from_value(document.clone())?;
        validate_config(&options).map_err(ConfigError::Validation)?;

        Ok(Self {
            options,
            document,
            runtime,
            location,
        })
    }

    /// Build a service from already-typed options (no files involved).
    pub fn from_options(options: AppConfig, runtime: RuntimeInfo) -> Self {
        let document = serde_json::to_value(&options).unwrap_or(Value::Null);
        Self {
            options,
            document,
            runtime,
            location: PathBuf::new(),
        }
    }

    pub fn options(&self) -> &AppConfig {
        &self.options
    }

    /// The merged document, including keys the typed schema does not know.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Dotted-path lookup into the merged document.
    pub fn lookup(&self, dotted: &str) -> Option<&Value> {
        lookup(&self.document, dotted)
    }

    pub fn version(&self) -> &str {
        &self.runtime.version
    }

    pub fn commit(&self) -> &str {
        &self.runtime.commit
    }

    pub fn environment(&self) -> &str {
        &self.runtime.environment
    }

    pub fn location(&self) -> &Path {
        &self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::{API_COMMIT, API_VERSION, NODE_ENV};
    use serde_json::json;
    use std::fs;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_environment_overlay_merges_over_base() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "default.toml", "a = 1\nb = 2\n");
        write(dir.path(), "staging.toml", "b = 3\n");

        let env = EnvVars::from_pairs([(NODE_ENV, "staging")]);
        let config = ConfigService::initialize(dir.path(), &env).unwrap();

        assert_eq!(config.lookup("a"), Some(&json!(1)));
        assert_eq!(config.lookup("b"), Some(&json!(3)));
        assert_eq!(config.environment(), "staging");
    }

    #[test]
    fn test_missing_environment_document_fails() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "default.toml", "a = 1\n");

        let env = EnvVars::from_pairs([(NODE_ENV, "production")]);
        let err = ConfigService::initialize(dir.path(), &env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingEnvironment { ref environment, .. } if environment == "production"
        ));
    }

    #[test]
    fn test_base_document_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "development.toml", "");

        let config = ConfigService::initialize(dir.path(), &EnvVars::default()).unwrap();
        assert_eq!(config.options().http.bind_address, "0.0.0.0:8080");
        assert_eq!(config.environment(), "development");
    }

    #[test]
    fn test_env_overrides_win_over_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "default.toml", "[database.pool]\nmin = 1\nmax = 4\n");
        write(dir.path(), "development.yml", "database:\n  pool:\n    max: 6\n");

        let env = EnvVars::from_pairs([
            ("DATABASE__POOL__MAX", "9"),
            ("HTTP__BIND_ADDRESS", "127.0.0.1:9999"),
        ]);
        let config = ConfigService::initialize(dir.path(), &env).unwrap();

        assert_eq!(config.options().database.pool.max, 9);
        assert_eq!(config.options().database.pool.min, 1);
        assert_eq!(config.options().http.bind_address, "127.0.0.1:9999");
    }

    #[test]
    fn test_numeric_env_values_keep_string_keys() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "development.toml", "");

        let env = EnvVars::from_pairs([
            ("AUTH__INTERNAL_TOKEN", "123456"),
            ("LOG__NAME", "2024"),
            ("HTTP__MAX_PAYLOAD_BYTES", "1024"),
            ("DATABASE__DEBUG", "true"),
        ]);
        let config = ConfigService::initialize(dir.path(), &env).unwrap();

        assert_eq!(config.options().auth.internal_token.as_deref(), Some("123456"));
        assert_eq!(config.options().log.name, "2024");
        assert_eq!(config.options().http.max_payload_bytes, 1024);
        assert!(config.options().database.debug);
    }

    #[test]
    fn test_runtime_info_from_env() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "development.toml", "");

        let env = EnvVars::from_pairs([(API_VERSION, "2.1.0"), (API_COMMIT, "abc123")]);
        let config = ConfigService::initialize(dir.path(), &env).unwrap();
        assert_eq!(config.version(), "2.1.0");
        assert_eq!(config.commit(), "abc123");
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "development.toml", "[database.pool]\nmin = 5\nmax = 1\n");

        let err = ConfigService::initialize(dir.path(), &EnvVars::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
    }

    #[test]
    fn test_unknown_keys_kept_in_document() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "development.toml", "[this.is]\nsomething = \"custom\"\n");

        let config = ConfigService::initialize(dir.path(), &EnvVars::default()).unwrap();
        assert_eq!(config.lookup("this.is.something"), Some(&json!("custom")));
    }
}
