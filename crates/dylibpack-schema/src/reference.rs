//! Library references as they appear inside Mach-O load commands.
//!
//! A reference is the raw string recorded by the linker: an absolute path,
//! a path starting with a relocatable token (`@rpath/`, `@loader_path/`,
//! `@executable_path/`), or occasionally a bare file name. References are
//! never rewritten in memory; rewriting happens on disk through the plan.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Marker that identifies a component as a framework bundle root.
pub const FRAMEWORK_EXTENSION: &str = ".framework";

/// Relocatable tokens understood by the dynamic loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathToken {
    /// `@executable_path/`: the directory of the main executable.
    ExecutablePath,
    /// `@loader_path/`: the directory of the binary holding the reference.
    LoaderPath,
    /// `@rpath/`: each runtime search path of the binary, in order.
    Rpath,
}

impl PathToken {
    /// Every token, in the order they are tested.
    pub const ALL: [PathToken; 3] = [
        PathToken::ExecutablePath,
        PathToken::LoaderPath,
        PathToken::Rpath,
    ];

    /// The literal prefix, including the trailing slash.
    pub fn prefix(self) -> &'static str {
        match self {
            PathToken::ExecutablePath => "@executable_path/",
            PathToken::LoaderPath => "@loader_path/",
            PathToken::Rpath => "@rpath/",
        }
    }

    /// Returns the token `s` starts with, if any.
    pub fn detect(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| s.starts_with(t.prefix()))
    }

    /// Strips this token from the front of `s`.
    pub fn strip(self, s: &str) -> Option<&str> {
        s.strip_prefix(self.prefix())
    }
}

impl fmt::Display for PathToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches('/'))
    }
}

/// A dependency reference exactly as it was read from a binary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LibraryReference(String);

impl LibraryReference {
    /// Wraps a raw reference. Trailing whitespace left over from tool output
    /// is trimmed.
    pub fn new(raw: impl Into<String>) -> Self {
        let mut raw = raw.into();
        raw.truncate(raw.trim_end().len());
        Self(raw)
    }

    /// The reference text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The relocatable token this reference starts with.
    pub fn token(&self) -> Option<PathToken> {
        PathToken::detect(&self.0)
    }

    /// Whether this is a token-free absolute path.
    pub fn is_absolute(&self) -> bool {
        self.token().is_none() && self.0.starts_with('/')
    }

    /// The text following the token, or the whole reference if it has none.
    pub fn tail(&self) -> &str {
        self.token()
            .and_then(|t| t.strip(&self.0))
            .unwrap_or(&self.0)
    }

    /// Last path component.
    pub fn base_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The name to look for inside a search directory.
    ///
    /// Token references keep everything after the token, framework
    /// references keep everything from the bundle root on
    /// (`QtCore.framework/Versions/5/QtCore`), and everything else is
    /// reduced to its base name.
    pub fn search_name(&self) -> &str {
        let tail = self.tail();
        if let Some(idx) = tail.find(".framework/") {
            let start = tail[..idx].rfind('/').map_or(0, |i| i + 1);
            return &tail[start..];
        }
        if self.token().is_some() {
            return tail;
        }
        self.base_name()
    }
}

impl fmt::Display for LibraryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LibraryReference {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for LibraryReference {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for LibraryReference {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for LibraryReference {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for LibraryReference {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for LibraryReference {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
