//! Directory-to-tree collection of config source files.
//!
//! A subdirectory of the config root is walked recursively and every
//! recognized file is loaded. In [`Mode::List`] the mappings are flattened
//! into one ordered list; in [`Mode::Object`] each file or subdirectory
//! becomes a key named after it (extension stripped).
//!
//! Children are visited in file-name order so results are deterministic.

pub mod content;

use std::fs::{self, FileType};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

pub use content::{ConfigEntry, FileContent, FileFormat, LoadError, Mapping};

use crate::Error;

/// Aggregation mode for a directory walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    List,
    Object,
}

/// Result of collecting one config subdirectory.
#[derive(Debug, Clone, PartialEq)]
pub enum Collected {
    List(Vec<Mapping>),
    Object(Mapping),
    /// The directory was missing but a same-named file sat in the config root.
    Fallback(ConfigEntry),
}

impl Collected {
    pub fn into_value(self) -> Value {
        match self {
            Self::List(entries) => Value::Array(entries.into_iter().map(Value::Object).collect()),
            Self::Object(map) => Value::Object(map),
            Self::Fallback(entry) => entry.into_value(),
        }
    }

    /// Returns the mapping form, if this result has one.
    pub fn into_mapping(self) -> Option<Mapping> {
        match self {
            Self::Object(map) | Self::Fallback(ConfigEntry::Mapping(map)) => Some(map),
            Self::List(_) | Self::Fallback(ConfigEntry::Array(_)) => None,
        }
    }
}

/// Walks subdirectories of a config root.
#[derive(Debug, Clone)]
pub struct Collector {
    config_dir: PathBuf,
}

impl Collector {
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Collects `relative` (e.g. `flow/triggers`) below the config root.
    ///
    /// Returns `Ok(None)` when neither the directory nor a same-named file
    /// exists; callers treat that as "no contribution". Only failing to list
    /// an existing directory is an error.
    pub fn collect(&self, relative: &str, mode: Mode) -> Result<Option<Collected>, Error> {
        let dir = self.config_dir.join(relative);
        if !dir.is_dir() {
            return Ok(self.fallback_file(relative));
        }

        info!(event = "collect.directory_started", folder = relative, ?mode);

        let collected = match mode {
            Mode::List => {
                let mut entries = Vec::new();
                walk_list(&dir, &mut entries)?;
                Collected::List(entries)
            }
            Mode::Object => Collected::Object(walk_object(&dir)?),
        };
        Ok(Some(collected))
    }

    fn fallback_file(&self, relative: &str) -> Option<Collected> {
        let base = self.config_dir.join(relative);
        let path = FileFormat::EXTENSIONS
            .iter()
            .map(|ext| base.with_extension(ext))
            .find(|candidate| candidate.is_file())?;
        let format = FileFormat::from_path(&path)?;

        info!(event = "collect.fallback_file", folder = relative, path = %path.display());
        load_entry(&path, format).map(Collected::Fallback)
    }
}

fn walk_list(dir: &Path, out: &mut Vec<Mapping>) -> Result<(), Error> {
    for (path, file_type) in sorted_children(dir)? {
        if file_type.is_dir() {
            walk_list(&path, out)?;
            continue;
        }
        let Some(format) = recognized_format(&path, file_type) else {
            continue;
        };
        match load_entry(&path, format) {
            Some(ConfigEntry::Mapping(map)) => out.push(map),
            Some(ConfigEntry::Array(entries)) => out.extend(entries),
            None => {}
        }
    }
    Ok(())
}

fn walk_object(dir: &Path) -> Result<Mapping, Error> {
    let mut out = Mapping::new();
    for (path, file_type) in sorted_children(dir)? {
        if file_type.is_dir() {
            let key = file_name(&path);
            out.insert(key, Value::Object(walk_object(&path)?));
            continue;
        }
        let Some(format) = recognized_format(&path, file_type) else {
            continue;
        };
        if let Some(entry) = load_entry(&path, format) {
            out.insert(file_stem(&path), entry.into_value());
        }
    }
    Ok(out)
}

/// Lists a directory in file-name order. Symlinks are skipped so a link
/// back up the tree cannot make the walk revisit it.
fn sorted_children(dir: &Path) -> Result<Vec<(PathBuf, FileType)>, Error> {
    let io_err = |source| Error::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut children = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let file_type = entry.file_type().map_err(io_err)?;
        if file_type.is_symlink() {
            info!(event = "collect.symlink_skipped", path = %entry.path().display());
            continue;
        }
        children.push((entry.path(), file_type));
    }
    children.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(children)
}

fn recognized_format(path: &Path, file_type: FileType) -> Option<FileFormat> {
    let format = FileFormat::from_path(path).filter(|_| file_type.is_file());
    if format.is_none() {
        info!(
            event = "collect.file_skipped",
            path = %path.display(),
            message = "not a recognized source file"
        );
    }
    format
}

/// Loads one file; parse failures and invalid content are warned about and dropped.
fn load_entry(path: &Path, format: FileFormat) -> Option<ConfigEntry> {
    match content::load_file(path, format) {
        Ok(content) => content.into_entry(),
        Err(e) => {
            warn!(event = "collect.file_unreadable", path = %path.display(), error = %e);
            None
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
