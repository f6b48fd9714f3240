//! Errors for configuration and map loading.
//!
//! Routing itself never fails: malformed paths and unresolved actions are
//! plain `None` values.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CopeError {
    #[error("command map not found: {}", .0.display())]
    MapNotFound(PathBuf),
    #[error("command map {path}: {source}")]
    MapParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid command defaults: {0}")]
    InvalidDefaults(#[source] serde_json::Error),
    #[error("invalid url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("scope list is empty")]
    EmptyScopeList,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type CopeResult<T> = Result<T, CopeError>;
