//! Binary inspection: which libraries and runtime search paths a binary declares.

use crate::error::{BundleError, Result};
use crate::relinker::run_tool;
use dylibpack_schema::LibraryReference;
use std::path::Path;

/// Load commands that name a dependency through their `name` field.
const DYLIB_COMMANDS: [&str; 4] = [
    "LC_LOAD_DYLIB",
    "LC_LOAD_WEAK_DYLIB",
    "LC_REEXPORT_DYLIB",
    "LC_LOAD_UPWARD_DYLIB",
];

/// The dependency-related load commands of one binary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadCommands {
    pub dependencies: Vec<LibraryReference>,
    pub rpaths: Vec<String>,
}

/// Reads load commands out of a compiled binary.
///
/// Implementations must fail if the file is missing or not a binary; the
/// traversal never swallows these errors.
pub trait Inspector {
    fn load_commands(&self, path: &Path) -> Result<LoadCommands>;
}

impl<T: Inspector + ?Sized> Inspector for &T {
    fn load_commands(&self, path: &Path) -> Result<LoadCommands> {
        (**self).load_commands(path)
    }
}

/// [`Inspector`] backed by `otool -l`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Otool;

impl Inspector for Otool {
    fn load_commands(&self, path: &Path) -> Result<LoadCommands> {
        if !path.exists() {
            return Err(BundleError::tool(
                "otool",
                path,
                "cannot find file to read its dependencies",
            ));
        }
        let output = run_tool("otool", &["-l"], path)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_load_commands(path, &stdout)
    }
}

#[derive(Clone, Copy)]
enum Pending {
    Dylib,
    Rpath,
}

impl Pending {
    fn field(self) -> &'static str {
        match self {
            Pending::Dylib => "name",
            Pending::Rpath => "path",
        }
    }
}

/// Parses `otool -l` output.
///
/// Each interesting command must be followed by its value line before the
/// next command starts; anything else means the output is not what we
/// expect and is reported as [`BundleError::MalformedMetadata`]. Universal
/// binaries list every slice, so values are deduplicated in first-seen order.
///
/// # Errors
///
/// Returns [`BundleError::MalformedMetadata`] when a command lacks its value.
pub fn parse_load_commands(path: &Path, output: &str) -> Result<LoadCommands> {
    let mut commands = LoadCommands::default();
    let mut pending: Option<(Pending, &str)> = None;

    for line in output.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("Load command") || trimmed.starts_with("cmd ") {
            if let Some((_, cmd)) = pending {
                return Err(malformed(path, cmd, trimmed));
            }
            if let Some(cmd) = trimmed.strip_prefix("cmd ") {
                let cmd = cmd.trim();
                if DYLIB_COMMANDS.contains(&cmd) {
                    pending = Some((Pending::Dylib, cmd));
                } else if cmd == "LC_RPATH" {
                    pending = Some((Pending::Rpath, cmd));
                }
            }
            continue;
        }

        let Some((kind, _)) = pending else {
            continue;
        };
        let Some(rest) = trimmed.strip_prefix(kind.field()) else {
            continue;
        };
        let Some(rest) = rest.strip_prefix(' ') else {
            continue;
        };

        let value = match rest.rfind(" (offset") {
            Some(end) => &rest[..end],
            None => rest,
        }
        .trim();

        match kind {
            Pending::Dylib => {
                let reference = LibraryReference::new(value);
                if !commands.dependencies.contains(&reference) {
                    commands.dependencies.push(reference);
                }
            }
            Pending::Rpath => {
                if !commands.rpaths.iter().any(|r| r == value) {
                    commands.rpaths.push(value.to_string());
                }
            }
        }
        pending = None;
    }

    if let Some((_, cmd)) = pending {
        return Err(malformed(path, cmd, "end of output"));
    }

    Ok(commands)
}

fn malformed(path: &Path, cmd: &str, found: &str) -> BundleError {
    let field = if cmd == "LC_RPATH" { "path" } else { "name" };
    BundleError::MalformedMetadata {
        path: path.to_path_buf(),
        detail: format!("expected {field} for {cmd}, found '{found}'"),
    }
}
