//! macOS `.app` bundle layout.

use crate::error::{BundleError, Result};
use crate::relinker::run_tool;
use regex::Regex;
use std::path::{Path, PathBuf};

const PLIST_BUDDY: &str = "/usr/libexec/PlistBuddy";

/// An application bundle and the executable named in its `Info.plist`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppBundle {
    root: PathBuf,
    executable: String,
}

impl AppBundle {
    /// Opens the bundle at `root`, reading `CFBundleExecutable`.
    ///
    /// # Errors
    ///
    /// Fails if `Contents/Info.plist` is missing, has no executable entry, or
    /// names a file that does not exist in `Contents/MacOS`.
    pub fn open(root: &Path) -> Result<Self> {
        let root = std::fs::canonicalize(root).map_err(|e| BundleError::io(root, e))?;
        let plist = root.join("Contents/Info.plist");
        let executable = read_bundle_executable(&plist)?;

        let bundle = Self { root, executable };
        let exe = bundle.executable_path();
        if !exe.is_file() {
            return Err(BundleError::InvalidBundle {
                path: bundle.root,
                detail: format!("CFBundleExecutable {} does not exist", exe.display()),
            });
        }
        Ok(bundle)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contents(&self) -> PathBuf {
        self.root.join("Contents")
    }

    /// `Contents/MacOS`, which `@executable_path` stands for.
    pub fn executable_dir(&self) -> PathBuf {
        self.contents().join("MacOS")
    }

    pub fn executable_path(&self) -> PathBuf {
        self.executable_dir().join(&self.executable)
    }

    pub fn frameworks_dir(&self) -> PathBuf {
        self.contents().join("Frameworks")
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.contents().join("PlugIns")
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.contents().join("Resources")
    }
}

/// Reads `CFBundleExecutable` from an `Info.plist`. XML plists are read
/// directly; binary ones go through `PlistBuddy`.
fn read_bundle_executable(plist: &Path) -> Result<String> {
    let bytes = std::fs::read(plist).map_err(|e| BundleError::io(plist, e))?;

    let value = if bytes.starts_with(b"bplist") {
        let output = run_tool(PLIST_BUDDY, &["-c", "Print :CFBundleExecutable"], plist)?;
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        parse_bundle_executable(&String::from_utf8_lossy(&bytes))?
    };

    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BundleError::InvalidBundle {
            path: plist.to_path_buf(),
            detail: "no CFBundleExecutable entry".to_string(),
        })
}

fn parse_bundle_executable(xml: &str) -> Result<Option<String>> {
    let re = Regex::new(r"<key>\s*CFBundleExecutable\s*</key>\s*<string>\s*([^<]*?)\s*</string>")
        .map_err(|e| BundleError::InvalidBundle {
            path: PathBuf::from("Info.plist"),
            detail: e.to_string(),
        })?;
    Ok(re.captures(xml).map(|c| c[1].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleName</key>
    <string>Demo</string>
    <key>CFBundleExecutable</key>
    <string>demo-bin</string>
</dict>
</plist>
"#;

    fn make_bundle(root: &Path, plist: &str, exe: Option<&str>) {
        std::fs::create_dir_all(root.join("Contents/MacOS")).unwrap();
        std::fs::write(root.join("Contents/Info.plist"), plist).unwrap();
        if let Some(exe) = exe {
            std::fs::write(root.join("Contents/MacOS").join(exe), b"").unwrap();
        }
    }

    #[test]
    fn test_parse_executable() {
        assert_eq!(
            parse_bundle_executable(PLIST).unwrap(),
            Some("demo-bin".to_string())
        );
        assert_eq!(parse_bundle_executable("<plist/>").unwrap(), None);
    }

    #[test]
    fn test_open_bundle_layout() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("Demo.app");
        make_bundle(&root, PLIST, Some("demo-bin"));

        let bundle = AppBundle::open(&root).unwrap();
        let root = root.canonicalize().unwrap();
        assert_eq!(bundle.executable_path(), root.join("Contents/MacOS/demo-bin"));
        assert_eq!(bundle.frameworks_dir(), root.join("Contents/Frameworks"));
        assert_eq!(bundle.plugins_dir(), root.join("Contents/PlugIns"));
        assert_eq!(bundle.resources_dir(), root.join("Contents/Resources"));
    }

    #[test]
    fn test_missing_executable_is_invalid() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("Demo.app");
        make_bundle(&root, PLIST, None);
        let err = AppBundle::open(&root).unwrap_err();
        assert!(matches!(err, BundleError::InvalidBundle { .. }));
    }

    #[test]
    fn test_missing_plist_is_io_error() {
        let tmp = tempdir().unwrap();
        let err = AppBundle::open(tmp.path()).unwrap_err();
        assert!(matches!(err, BundleError::Io { .. }));
    }
}
