//! Per-locale files under `<root>/locales/<id>.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::tree::{LocaleNode, LocaleTree};
use crate::collect::Mapping;
use crate::manifest::write_json;
use crate::Error;

#[derive(Debug, Clone)]
pub struct LocaleStore {
    dir: PathBuf,
}

impl LocaleStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Reads every persisted locale into one tree keyed by locale id.
    ///
    /// A missing directory yields an empty tree. A file that cannot be parsed
    /// or does not hold an object is an error: its hand edits are unknown, so
    /// it must not be overwritten.
    pub fn read(&self) -> Result<LocaleTree, Error> {
        let mut tree = LocaleTree::new();
        if !self.dir.is_dir() {
            return Ok(tree);
        }

        let io_err = |source| Error::Io {
            path: self.dir.clone(),
            source,
        };
        let mut paths = fs::read_dir(&self.dir)
            .map_err(io_err)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_err)?;
        paths.sort();

        for path in paths {
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_owned) else {
                continue;
            };
            let map = read_locale_file(&path)?;
            tree.insert(id, LocaleNode::Branch(LocaleTree::from_persisted(map)));
        }
        Ok(tree)
    }

    /// Writes one locale's tree, creating the directory if needed.
    pub fn write<T: Serialize + ?Sized>(&self, id: &str, contents: &T) -> Result<PathBuf, Error> {
        fs::create_dir_all(&self.dir).map_err(|source| Error::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(id);
        write_json(&path, contents)?;
        info!(event = "locale.file_written", locale = id, path = %path.display());
        Ok(path)
    }

    pub fn remove(&self, id: &str) -> Result<PathBuf, Error> {
        let path = self.path_for(id);
        fs::remove_file(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        info!(event = "locale.file_removed", locale = id, path = %path.display());
        Ok(path)
    }
}

fn read_locale_file(path: &Path) -> Result<Mapping, Error> {
    let contents = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&contents).map_err(|source| Error::LocaleParse {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(Error::LocaleNotObject(path.to_path_buf())),
    }
}
