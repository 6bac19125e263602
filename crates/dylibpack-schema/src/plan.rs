//! The relocation plan: every filesystem and patch operation a run performs.
//!
//! Operations are grouped by kind and executed group by group, so every
//! copy lands before any rewrite touches it.

use crate::reference::LibraryReference;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// What a copy operation copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyKind {
    /// A single file.
    File,
    /// A whole directory bundle (frameworks).
    Bundle,
}

/// Copy `from` to `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyOperation {
    /// Source path.
    pub from: PathBuf,
    /// Destination path (the copy itself, not its parent).
    pub to: PathBuf,
    /// File or bundle.
    pub kind: CopyKind,
    /// Entries to delete from the copy afterwards, relative to `to`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strip: Vec<PathBuf>,
}

/// Set the install name (`LC_ID_DYLIB`) of a copied library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRewrite {
    /// The copied library.
    pub file: PathBuf,
    /// Its new identity.
    pub install_name: String,
}

/// Replace one load command value inside a binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRewrite {
    /// The binary to patch.
    pub file: PathBuf,
    /// The reference text currently stored in `file`.
    pub old: LibraryReference,
    /// The replacement.
    pub new: String,
}

/// Replace or delete one runtime search path inside a binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpathRewrite {
    /// The binary to patch.
    pub file: PathBuf,
    /// The current `LC_RPATH` value.
    pub old: String,
    /// The replacement, or `None` to delete the entry.
    pub new: Option<String>,
}

/// A small text file the run writes (e.g. `qt.conf`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    /// Where to write.
    pub path: PathBuf,
    /// File contents.
    pub contents: String,
}

/// Everything needed to make a set of binaries self-contained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationPlan {
    /// Directory the bundled libraries are copied into, when copying.
    pub destination: Option<PathBuf>,
    /// Extra directories to create before copying.
    pub directories: Vec<PathBuf>,
    /// Copies, executed first.
    pub copies: Vec<CopyOperation>,
    /// Identity rewrites on the copies.
    pub id_rewrites: Vec<IdRewrite>,
    /// Load command rewrites.
    pub reference_rewrites: Vec<ReferenceRewrite>,
    /// Runtime search path rewrites.
    pub rpath_rewrites: Vec<RpathRewrite>,
    /// Generated text files.
    pub generated_files: Vec<GeneratedFile>,
    /// Binaries to re-sign once all their rewrites are done.
    pub sign: Vec<PathBuf>,
}

impl RelocationPlan {
    /// Whether the plan does nothing.
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
            && self.copies.is_empty()
            && self.id_rewrites.is_empty()
            && self.reference_rewrites.is_empty()
            && self.rpath_rewrites.is_empty()
            && self.generated_files.is_empty()
    }

    /// Every binary touched by at least one patch operation.
    pub fn patched_files(&self) -> BTreeSet<&Path> {
        self.id_rewrites
            .iter()
            .map(|r| r.file.as_path())
            .chain(self.reference_rewrites.iter().map(|r| r.file.as_path()))
            .chain(self.rpath_rewrites.iter().map(|r| r.file.as_path()))
            .collect()
    }
}
