use std::path::PathBuf;

use thiserror::Error;

/// Failure of a diagram mutation that the caller asked for explicitly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OpError {
    #[error("node '{0}' not found")]
    NodeNotFound(String),

    #[error("edge '{0}' not found")]
    EdgeNotFound(String),

    #[error("node id '{0}' already exists")]
    DuplicateNode(String),

    #[error("edge id '{0}' already exists")]
    DuplicateEdge(String),
}

/// Failure of the persistence collaborator. Surfaced to the user as one message, never retried.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("diagram '{0}' not found")]
    NotFound(String),

    #[error("invalid diagram id '{0}'")]
    InvalidId(String),

    #[error("failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed diagram JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
