//! Fallback directories for references the tokens and rpaths cannot place.

use crate::fs::Filesystem;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variables dyld itself consults, in the order they are read.
pub const DYLD_ENV_VARS: [&str; 3] = [
    "DYLD_LIBRARY_PATH",
    "DYLD_FALLBACK_FRAMEWORK_PATH",
    "DYLD_FALLBACK_LIBRARY_PATH",
];

/// Ordered, append-only list of search directories.
///
/// Seeded from the dyld environment, then `--search-path` flags, then every
/// directory a user supplies at the prompt. Also remembers which name each
/// prompted directory answered so nobody is asked twice about the same file.
#[derive(Debug, Clone, Default)]
pub struct SearchPathRegistry {
    dirs: Vec<PathBuf>,
    prompted: HashMap<String, PathBuf>,
}

impl SearchPathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the registry from `lookup`, which maps a variable name to its value.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut registry = Self::new();
        for var in DYLD_ENV_VARS {
            let Some(value) = lookup(var) else {
                continue;
            };
            for entry in value.split(':').filter(|e| !e.is_empty()) {
                registry.push(entry);
            }
        }
        registry
    }

    /// Appends `dir` unless it is already registered. Returns whether it was added.
    pub fn push(&mut self, dir: impl Into<PathBuf>) -> bool {
        let dir = dir.into();
        if self.dirs.contains(&dir) {
            return false;
        }
        tracing::trace!("Search path added: {}", dir.display());
        self.dirs.push(dir);
        true
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Returns `dir/name` for the first registered `dir` where it exists.
    pub fn find(&self, fs: &dyn Filesystem, name: &str) -> Option<PathBuf> {
        self.dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| fs.exists(candidate))
    }

    /// Records the directory a prompt supplied for `name` and registers it.
    pub fn remember_prompt(&mut self, name: &str, dir: &Path) {
        self.prompted.insert(name.to_string(), dir.to_path_buf());
        self.push(dir);
    }

    /// The directory previously supplied for `name`, if any.
    pub fn prompted(&self, name: &str) -> Option<&Path> {
        self.prompted.get(name).map(PathBuf::as_path)
    }
}
