//! Resolved libraries and the edges that point at them.

use crate::reference::{FRAMEWORK_EXTENSION, LibraryReference};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Why a discovered library will or will not be copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Copied into the destination and rewritten everywhere.
    Bundled,
    /// Lives in a system location (`/usr/lib`, `/System/Library`).
    System,
    /// Lives under a user-supplied ignore prefix.
    Ignored,
    /// Already referenced relative to the executable, or already inside the
    /// destination directory.
    AlreadyBundled,
    /// A framework, while framework bundling is disabled.
    Framework,
}

impl Disposition {
    /// Whether the library produces copy and rewrite operations.
    pub fn is_bundled(self) -> bool {
        self == Disposition::Bundled
    }

    /// Whether the library's own load commands should be read.
    ///
    /// System libraries usually only exist inside the dyld shared cache, so
    /// there is nothing on disk to inspect. Frameworks left in place keep
    /// their own dependencies where they are.
    pub fn is_inspectable(self) -> bool {
        !matches!(self, Disposition::System | Disposition::Framework)
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Disposition::Bundled => "bundled",
            Disposition::System => "system",
            Disposition::Ignored => "ignored",
            Disposition::AlreadyBundled => "already bundled",
            Disposition::Framework => "framework (not bundled)",
        };
        f.write_str(s)
    }
}

/// Splits a path that traverses a framework bundle into the bundle root and
/// the remainder inside it.
///
/// `/opt/qt/lib/QtCore.framework/Versions/5/QtCore` becomes
/// (`/opt/qt/lib/QtCore.framework`, `Versions/5/QtCore`).
pub fn split_framework(path: &Path) -> Option<(PathBuf, PathBuf)> {
    let mut root = PathBuf::new();
    let mut components = path.components();
    for component in components.by_ref() {
        root.push(component);
        if component
            .as_os_str()
            .to_str()
            .is_some_and(|s| s.ends_with(FRAMEWORK_EXTENSION))
        {
            return Some((root, components.as_path().to_path_buf()));
        }
    }
    None
}

/// A distinct on-disk library, identified by its canonical real path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLibrary {
    /// Canonical path. For frameworks this is the bundle root directory.
    pub real_path: PathBuf,
    /// Parent of `real_path`.
    pub directory: PathBuf,
    /// Last component of `real_path`.
    pub file_name: String,
    /// Whether `real_path` is a `.framework` bundle root.
    pub is_framework: bool,
    /// The Mach-O file to inspect. Equal to `real_path` for plain dylibs,
    /// the nested binary for frameworks.
    pub binary_path: PathBuf,
    /// Path of the relocated binary relative to the destination directory.
    pub install_name: String,
    /// Every reference text known to resolve here.
    pub aliases: BTreeSet<LibraryReference>,
    /// Whether the library is copied, and if not, why.
    pub disposition: Disposition,
}

impl ResolvedLibrary {
    /// Builds a record from the canonical path of a library binary.
    pub fn from_binary(binary_path: PathBuf, disposition: Disposition) -> Self {
        let (real_path, inner) = match split_framework(&binary_path) {
            Some((root, inner)) => (root, Some(inner)),
            None => (binary_path.clone(), None),
        };

        let directory = real_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let file_name = real_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let install_name = match &inner {
            Some(inner) if !inner.as_os_str().is_empty() => {
                format!("{file_name}/{}", inner.to_string_lossy())
            }
            _ => file_name.clone(),
        };

        Self {
            is_framework: inner.is_some(),
            real_path,
            directory,
            file_name,
            binary_path,
            install_name,
            aliases: BTreeSet::new(),
            disposition,
        }
    }

    /// Records another reference text for this library. Returns `true` if it
    /// was not already known.
    pub fn add_alias(&mut self, reference: LibraryReference) -> bool {
        self.aliases.insert(reference)
    }
}

/// One consumer's reference to a library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependentEdge {
    /// The binary holding the reference.
    pub consumer: PathBuf,
    /// `real_path` of the referenced library.
    pub library: PathBuf,
    /// The reference text as the consumer spelled it.
    pub reference: LibraryReference,
}
