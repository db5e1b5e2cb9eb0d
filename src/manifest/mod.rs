//! The composed application manifest (`app.json`).

pub mod hook;

use std::fs;
use std::path::Path;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::collect::Mapping;
use crate::Error;

/// Top-level manifest object. Always a mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    values: Mapping,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a manifest file, which must hold a JSON object.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path).map_err(|source| Error::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&contents).map_err(|source| Error::ManifestParse {
            path: path.to_path_buf(),
            source,
        })?;
        match value {
            Value::Object(values) => Ok(Self { values }),
            _ => Err(Error::ManifestNotObject(path.to_path_buf())),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        write_json(path, self)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.values.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Every key of `overlay` replaces the same key in the manifest.
    pub fn merge_shallow(&mut self, overlay: Mapping) {
        for (key, value) in overlay {
            self.values.insert(key, value);
        }
    }

    /// Makes `key` an object, replacing any non-object value.
    pub fn ensure_object(&mut self, key: &str) {
        if !matches!(self.values.get(key), Some(Value::Object(_))) {
            self.values.insert(key.to_string(), Value::Object(Mapping::new()));
        }
    }

    /// Sets the value at `path` only when `value` is present.
    ///
    /// Intermediate keys are created as objects (non-objects are replaced).
    /// An absent value leaves whatever the manifest already holds untouched.
    pub fn attach(&mut self, path: &[&str], value: Option<Value>) {
        if let Some(value) = value {
            attach_at(&mut self.values, path, value);
        }
    }
}

fn attach_at(table: &mut Mapping, path: &[&str], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };

    if rest.is_empty() {
        table.insert(first.to_string(), value);
        return;
    }

    if !matches!(table.get(*first), Some(Value::Object(_))) {
        table.insert(first.to_string(), Value::Object(Mapping::new()));
    }

    if let Some(Value::Object(nested)) = table.get_mut(*first) {
        attach_at(nested, rest, value);
    }
}

impl From<Mapping> for Manifest {
    fn from(values: Mapping) -> Self {
        Self { values }
    }
}

impl Serialize for Manifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}

/// Writes pretty-printed JSON followed by a newline.
pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, contents: &T) -> Result<(), Error> {
    let mut out = serde_json::to_string_pretty(contents).map_err(Error::Serialize)?;
    out.push('\n');
    fs::write(path, out).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}
