//! Mach-O path patching and re-signing.
//!
//! Rewrites install names, load commands and rpaths with `install_name_tool`
//! and re-applies a signature with `codesign` once a binary is done.
//!
//! # Implementation Note: why re-sign
//! Any edit to a Mach-O header invalidates its code signature. On Apple
//! silicon the kernel refuses to map an unsigned or badly signed binary, so
//! every patched file gets a fresh (by default ad-hoc) signature.

use crate::error::{BundleError, Result};
use std::path::Path;
use std::process::{Command, Output};

/// Applies reference rewrites to a compiled binary. Every call is
/// all-or-nothing.
pub trait Patcher {
    /// Sets `LC_ID_DYLIB` of `path` to `name`.
    fn set_id(&self, path: &Path, name: &str) -> Result<()>;

    /// Replaces the load command value `old` with `new` in `path`.
    fn change_dependency(&self, path: &Path, old: &str, new: &str) -> Result<()>;

    /// Replaces the rpath `old` with `new` in `path`.
    fn change_rpath(&self, path: &Path, old: &str, new: &str) -> Result<()>;

    /// Deletes the rpath `old` from `path`.
    fn delete_rpath(&self, path: &Path, old: &str) -> Result<()>;
}

/// Re-signs a binary after its rewrites.
pub trait Signer {
    fn resign(&self, path: &Path) -> Result<()>;
}

/// [`Patcher`] backed by `install_name_tool`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallNameTool;

impl Patcher for InstallNameTool {
    fn set_id(&self, path: &Path, name: &str) -> Result<()> {
        run_tool("install_name_tool", &["-id", name], path).map(drop)
    }

    fn change_dependency(&self, path: &Path, old: &str, new: &str) -> Result<()> {
        run_tool("install_name_tool", &["-change", old, new], path).map(drop)
    }

    fn change_rpath(&self, path: &Path, old: &str, new: &str) -> Result<()> {
        run_tool("install_name_tool", &["-rpath", old, new], path).map(drop)
    }

    fn delete_rpath(&self, path: &Path, old: &str) -> Result<()> {
        run_tool("install_name_tool", &["-delete_rpath", old], path).map(drop)
    }
}

/// [`Signer`] backed by `codesign`.
///
/// Failure is fatal when `strict` is set (the default on Apple silicon,
/// where unsigned code does not run) and a warning otherwise.
#[derive(Debug, Clone)]
pub struct Codesign {
    pub identity: String,
    pub strict: bool,
}

impl Default for Codesign {
    fn default() -> Self {
        Self {
            identity: "-".to_string(),
            strict: cfg!(target_arch = "aarch64"),
        }
    }
}

impl Codesign {
    pub fn with_identity(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Self::default()
        }
    }
}

impl Signer for Codesign {
    /// Uses `codesign --force --sign <identity>` while preserving existing
    /// entitlements, requirements, flags, and runtime metadata.
    fn resign(&self, path: &Path) -> Result<()> {
        let result = run_tool(
            "codesign",
            &[
                "--force",
                "--deep",
                "--preserve-metadata=entitlements,requirements,flags,runtime",
                "--sign",
                &self.identity,
            ],
            path,
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if self.strict => Err(e),
            Err(e) => {
                tracing::warn!("Ignoring signing failure: {e}");
                Ok(())
            }
        }
    }
}

/// Runs `tool args... path` and fails on spawn errors or a non-zero exit.
pub(crate) fn run_tool(tool: &'static str, args: &[&str], path: &Path) -> Result<Output> {
    tracing::debug!("    {tool} {} {}", args.join(" "), path.display());

    let output = match Command::new(tool).args(args).arg(path).output() {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(BundleError::ToolMissing(tool));
        }
        Err(e) => return Err(BundleError::tool(tool, path, format!("failed to spawn: {e}"))),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BundleError::tool(tool, path, stderr.trim()));
    }

    Ok(output)
}
