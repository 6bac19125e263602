//! Filesystem capability.
//!
//! The resolver only needs `exists` and `canonicalize`; the executor needs
//! the mutating calls. Both go through [`Filesystem`] so tests and dry runs
//! can swap the implementation.

use crate::error::{BundleError, Result};
use std::path::{Path, PathBuf};

pub trait Filesystem {
    fn exists(&self, path: &Path) -> bool;

    /// Fully symlink-resolved absolute path. Fails if `path` does not exist.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;

    /// Copies a file, or a directory tree when `from` is a directory. Symlinks
    /// inside a tree are recreated as symlinks. The copy is made writable.
    fn copy(&self, from: &Path, to: &Path) -> Result<()>;

    fn mkdir_all(&self, path: &Path) -> Result<()>;

    fn remove_tree(&self, path: &Path) -> Result<()>;

    /// Regular files below `path`, recursively, in sorted order.
    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    fn write(&self, path: &Path, contents: &str) -> Result<()>;
}

/// [`Filesystem`] backed by `std::fs`, `fs_extra` and `walkdir`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl Filesystem for StdFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        std::fs::canonicalize(path).map_err(|e| BundleError::io(path, e))
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        if from == to {
            return Ok(());
        }
        if let Some(parent) = to.parent() {
            self.mkdir_all(parent)?;
        }

        if from.is_dir() {
            copy_tree(from, to)?;
        } else {
            // Remove first so a read-only copy from an earlier run does not block us.
            if to.symlink_metadata().is_ok() {
                std::fs::remove_file(to).map_err(|e| BundleError::io(to, e))?;
            }
            std::fs::copy(from, to).map_err(|e| BundleError::io(from, e))?;
        }

        make_writable(to)
    }

    fn mkdir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).map_err(|e| BundleError::io(path, e))
    }

    fn remove_tree(&self, path: &Path) -> Result<()> {
        // A symlink to a directory is removed as a link.
        let is_dir = path.symlink_metadata().is_ok_and(|m| m.is_dir());
        let result = if is_dir {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BundleError::io(path, e)),
        }
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(path).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let err = std::io::Error::other(e.to_string());
                BundleError::io(path, err)
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.mkdir_all(parent)?;
        }
        std::fs::write(path, contents).map_err(|e| BundleError::io(path, e))
    }
}

/// Copies the tree under `from` to `to` without following symlinks.
///
/// Framework bundles are mostly links (`Versions/Current`, the top-level
/// binary, `Headers`, `Resources`); resolving them would duplicate every
/// version directory.
fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    let walk_err = |e: walkdir::Error| BundleError::io(from, std::io::Error::other(e.to_string()));
    let file_options = fs_extra::file::CopyOptions::new().overwrite(true);

    for entry in walkdir::WalkDir::new(from).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(walk_err)?;
        let Ok(relative) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(relative);
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            let link = std::fs::read_link(entry.path()).map_err(|e| BundleError::io(entry.path(), e))?;
            if target.symlink_metadata().is_ok() {
                StdFs.remove_tree(&target)?;
            }
            std::os::unix::fs::symlink(&link, &target).map_err(|e| BundleError::io(&target, e))?;
        } else if file_type.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| BundleError::io(&target, e))?;
        } else {
            if target.symlink_metadata().is_ok() {
                std::fs::remove_file(&target).map_err(|e| BundleError::io(&target, e))?;
            }
            fs_extra::file::copy(entry.path(), &target, &file_options)
                .map_err(|e| BundleError::tool("copy", entry.path(), e))?;
        }
    }
    Ok(())
}

/// Adds the owner write bit to `path` and, for directories, everything below it.
fn make_writable(path: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        if entry.path_is_symlink() {
            continue;
        }
        let meta = entry
            .metadata()
            .map_err(|e| BundleError::io(entry.path(), std::io::Error::other(e.to_string())))?;
        let mut perms = meta.permissions();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            perms.set_mode(perms.mode() | 0o200);
        }
        #[cfg(not(unix))]
        perms.set_readonly(false);
        std::fs::set_permissions(entry.path(), perms).map_err(|e| BundleError::io(entry.path(), e))?;
    }
    Ok(())
}

/// Checks if a file is a Mach-O binary (magic bytes).
pub fn is_macho(path: &Path) -> bool {
    use std::io::Read;
    let Ok(mut f) = std::fs::File::open(path) else {
        return false;
    };
    let mut magic = [0u8; 4];
    if f.read_exact(&mut magic).is_err() {
        return false;
    }
    // feedface, feedfacf, cafebabe (universal) - and their LE/BE variants
    matches!(
        magic,
        [0xfe, 0xed, 0xfa, 0xce]
            | [0xfe, 0xed, 0xfa, 0xcf]
            | [0xcf, 0xfa, 0xed, 0xfe]
            | [0xce, 0xfa, 0xed, 0xfe]
            | [0xca, 0xfe, 0xba, 0xbe]
    )
}
