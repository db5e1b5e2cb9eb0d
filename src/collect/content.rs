//! Loading a single source file into a tagged content variant.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// A structured-data mapping, the unit every source file contributes.
pub type Mapping = serde_json::Map<String, Value>;

/// Source file formats recognized by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
    Toml,
}

impl FileFormat {
    /// Extensions probed, in order, when looking for a fallback file.
    pub const EXTENSIONS: [&'static str; 4] = ["json", "yaml", "yml", "toml"];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to parse YAML in '{path}': {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to parse TOML in '{path}': {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// What a source file turned out to hold, decided once at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum FileContent {
    Mapping(Mapping),
    /// Array content with every non-mapping element removed.
    /// `rejected` holds the original indices of the dropped elements.
    ArrayOfMapping {
        entries: Vec<Mapping>,
        rejected: Vec<usize>,
    },
    Invalid(Value),
}

impl FileContent {
    /// Classifies a decoded value, warning about anything that gets dropped.
    pub fn classify(value: Value, path: &Path) -> Self {
        match value {
            Value::Object(map) => Self::Mapping(map),
            Value::Array(items) => {
                let mut entries = Vec::with_capacity(items.len());
                let mut rejected = Vec::new();
                for (index, item) in items.into_iter().enumerate() {
                    match item {
                        Value::Object(map) => entries.push(map),
                        other => {
                            warn!(
                                event = "collect.element_rejected",
                                path = %path.display(),
                                index,
                                value = %other,
                                message = "array element is not an object"
                            );
                            rejected.push(index);
                        }
                    }
                }
                Self::ArrayOfMapping { entries, rejected }
            }
            other => {
                warn!(
                    event = "collect.content_rejected",
                    path = %path.display(),
                    value = %other,
                    message = "file content is not an object or an array of objects"
                );
                Self::Invalid(other)
            }
        }
    }

    /// Drops the invalid variant, keeping usable content.
    pub fn into_entry(self) -> Option<ConfigEntry> {
        match self {
            Self::Mapping(map) => Some(ConfigEntry::Mapping(map)),
            Self::ArrayOfMapping { entries, .. } => Some(ConfigEntry::Array(entries)),
            Self::Invalid(_) => None,
        }
    }
}

/// Usable content of one source file.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigEntry {
    Mapping(Mapping),
    Array(Vec<Mapping>),
}

impl ConfigEntry {
    pub fn into_value(self) -> Value {
        match self {
            Self::Mapping(map) => Value::Object(map),
            Self::Array(entries) => Value::Array(entries.into_iter().map(Value::Object).collect()),
        }
    }
}

/// Reads and decodes a source file, then classifies its content.
pub fn load_file(path: &Path, format: FileFormat) -> Result<FileContent, LoadError> {
    let contents = std::fs::read_to_string(path).map_err(|e| LoadError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    let value: Value = match format {
        FileFormat::Json => serde_json::from_str(&contents).map_err(|e| LoadError::Json {
            path: path.to_path_buf(),
            source: e,
        })?,
        FileFormat::Yaml => serde_yaml::from_str(&contents).map_err(|e| LoadError::Yaml {
            path: path.to_path_buf(),
            source: e,
        })?,
        FileFormat::Toml => toml::from_str(&contents).map_err(|e| LoadError::Toml {
            path: path.to_path_buf(),
            source: e,
        })?,
    };

    Ok(FileContent::classify(value, path))
}
