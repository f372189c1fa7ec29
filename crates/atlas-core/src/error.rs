//! Error types for atlas-core
//!
//! Every failure is returned to the immediate caller; nothing is retried
//! or logged-and-swallowed.

use std::path::PathBuf;

use atlas_io::IoError;
use thiserror::Error;

use crate::config::DataKind;

/// Main error type for catalog operations
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Filesystem errors while walking the tree or reading configuration
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A path could not be expressed relative to the catalog root
    #[error("{path} is not under root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// No namespace with this key was ever scanned
    #[error("Namespace not found: {0:?}")]
    NamespaceNotFound(String),

    /// No data handle with this short name in the namespace
    #[error("No data named {name:?} in namespace {namespace:?}")]
    HandleNotFound { namespace: String, name: String },

    /// Save attempted before the payload was loaded or assigned
    #[error("Payload of {path} has not been loaded")]
    NotLoaded { path: PathBuf },

    /// Payload variant does not match the handle's data kind
    #[error("Cannot write a {payload} payload as {kind} data")]
    PayloadMismatch {
        kind: DataKind,
        payload: &'static str,
    },

    /// Errors from the payload codecs
    #[error("Codec error: {0}")]
    Codec(#[from] IoError),
}

impl CatalogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CatalogError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
