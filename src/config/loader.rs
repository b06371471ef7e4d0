//! Configuration loading from disk.
//!
//! Documents are parsed into a single JSON representation regardless of the
//! file format, so merging and overrides work the same for every format.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::config::env::Override;
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration for environment \"{environment}\" not found in {}", location.display())]
    MissingEnvironment {
        environment: String,
        location: PathBuf,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Configuration document {} must be a table at the top level", path.display())]
    NotATable { path: PathBuf },

    #[error("Invalid configuration: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Supported configuration file formats, in lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Toml,
    Yaml,
    Json,
}

const EXTENSIONS: &[(&str, FileFormat)] = &[
    ("toml", FileFormat::Toml),
    ("yaml", FileFormat::Yaml),
    ("yml", FileFormat::Yaml),
    ("json", FileFormat::Json),
];

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        EXTENSIONS
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(ext))
            .map(|(_, format)| *format)
    }

    /// Parse document text into a JSON value.
    pub fn parse(self, content: &str) -> Result<Value, String> {
        match self {
            FileFormat::Toml => toml::from_str::<Value>(content).map_err(|e| e.to_string()),
            FileFormat::Yaml => serde_yaml::from_str::<Value>(content).map_err(|e| e.to_string()),
            FileFormat::Json => serde_json::from_str::<Value>(content).map_err(|e| e.to_string()),
        }
    }
}

/// Find `<stem>.<ext>` in `location`, trying each supported extension.
pub fn find_document(location: &Path, stem: &str) -> Option<(PathBuf, FileFormat)> {
    EXTENSIONS.iter().find_map(|(ext, format)| {
        let path = location.join(format!("{}.{}", stem, ext));
        path.is_file().then_some((path, *format))
    })
}

/// Load and parse a single document. The top level must be a table.
pub fn load_document(path: &Path, format: FileFormat) -> Result<Value, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if content.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let value = format.parse(&content).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })?;

    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(ConfigError::NotATable {
            path: path.to_path_buf(),
        }),
    }
}

/// Merge `overlay` into `base`. Tables merge recursively; any other overlay
/// value replaces the base value.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Set the value at `over.path`, creating intermediate tables and replacing
/// scalars that stand in the way.
///
/// The override is typed after the value it replaces in `document`, or in
/// `shape` (the serialized defaults) when the document does not set the key.
pub fn apply_override(document: &mut Value, over: &Override, shape: &Value) {
    let Some((last, parents)) = over.path.split_last() else {
        return;
    };
    let value = over.value_for(value_at(document, &over.path).or_else(|| value_at(shape, &over.path)));

    let mut cursor = document;
    for key in parents {
        if !cursor.is_object() {
            *cursor = Value::Object(Map::new());
        }
        let Value::Object(table) = cursor else {
            return;
        };
        cursor = table
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !cursor.is_object() {
        *cursor = Value::Object(Map::new());
    }
    if let Value::Object(table) = cursor {
        table.insert(last.clone(), value);
    }
}

fn value_at<'a>(document: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(document, |value, key| value.get(key))
}

/// Look up a dotted key path (`"database.pool.max"`).
pub fn lookup<'a>(document: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted
        .split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(document, |value, segment| value.get(segment))
}
