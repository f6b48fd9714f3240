//! Command map sources
//!
//! A source hands the context the [`CommandMap`] for a scope. The context
//! treats any load error as an empty map.

use crate::core::{CommandMap, ScopeList};
use crate::error::{CopeError, CopeResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Extension of command map files.
pub const MAP_EXTENSION: &str = "json";

pub trait CommandMapSource: Send + Sync {
    fn load(&self, scope: &str) -> CopeResult<CommandMap>;
}

/// Loads `<dir>/<scope>.json`.
#[derive(Debug, Clone)]
pub struct JsonMapSource {
    dir: PathBuf,
}

impl JsonMapSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn file_for(&self, scope: &str) -> PathBuf {
        self.dir.join(format!("{scope}.{MAP_EXTENSION}"))
    }
}

impl CommandMapSource for JsonMapSource {
    fn load(&self, scope: &str) -> CopeResult<CommandMap> {
        let path = self.file_for(scope);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(CopeError::MapNotFound(path)),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|source| CopeError::MapParse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// In-memory maps keyed by scope.
#[derive(Debug, Clone, Default)]
pub struct StaticMapSource {
    maps: HashMap<String, CommandMap>,
}

impl StaticMapSource {
    pub fn new() -> Self { Self::default() }

    pub fn with_scope(mut self, scope: impl Into<String>, map: CommandMap) -> Self {
        self.maps.insert(scope.into(), map);
        self
    }
}

impl CommandMapSource for StaticMapSource {
    fn load(&self, scope: &str) -> CopeResult<CommandMap> {
        self.maps.get(scope).cloned().ok_or_else(|| CopeError::MapNotFound(PathBuf::from(scope)))
    }
}

/// Scope names from the map files in `dir`, sorted by name.
pub fn discover_scopes(dir: &Path) -> CopeResult<ScopeList> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(MAP_EXTENSION) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.push(stem.to_string());
        }
    }
    names.sort();
    if names.is_empty() {
        return Err(CopeError::EmptyScopeList);
    }
    Ok(ScopeList::from_names(names))
}
