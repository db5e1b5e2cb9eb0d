use std::path::PathBuf;

use thiserror::Error;

use crate::manifest::hook::HookError;

/// Top-level error type for the app-composer library.
///
/// Everything here aborts a compose run. Bad source content never ends up
/// here; it is logged and dropped instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("{0} does not exist")]
    RootNotFound(PathBuf),

    #[error("{0} is not a directory")]
    RootNotDirectory(PathBuf),

    #[error("{0} does not exist")]
    ConfigDirNotFound(PathBuf),

    #[error("{0} is not a directory")]
    ConfigDirNotDirectory(PathBuf),

    #[error("failed to read manifest '{path}': {source}")]
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse manifest '{path}': {source}")]
    ManifestParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("manifest '{0}' does not hold a JSON object")]
    ManifestNotObject(PathBuf),

    #[error("failed to parse locale file '{path}': {source}")]
    LocaleParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("locale file '{0}' does not hold a JSON object")]
    LocaleNotObject(PathBuf),

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize output: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error(transparent)]
    Hook(#[from] HookError),
}
