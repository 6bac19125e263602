//! Run options.
//!
//! Built-in defaults, overridden by an optional TOML config file, overridden
//! by command-line flags. The CLI owns the last step; this module owns the
//! first two and the app-bundle presets.

use crate::bundle::AppBundle;
use crate::plugins::PluginLayout;
use crate::search_paths::SearchPathRegistry;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_DEST_DIR: &str = "./libs/";
pub const DEFAULT_INSTALL_PATH: &str = "@executable_path/../libs/";
pub const APP_INSTALL_PATH: &str = "@executable_path/../Frameworks/";

#[derive(Debug, Clone)]
pub struct Settings {
    /// Binaries (or folders of binaries) whose references are rewritten.
    pub files_to_fix: Vec<PathBuf>,
    /// Copy dependencies into `dest_dir`.
    pub bundle_libs: bool,
    pub dest_dir: PathBuf,
    /// Prefix of every rewritten reference; always ends with `/`.
    pub install_path: String,
    /// Where plugin copies go; defaults to `plugins` inside `dest_dir`.
    pub plugin_dir: Option<PathBuf>,
    pub search_paths: Vec<PathBuf>,
    pub ignore_prefixes: Vec<PathBuf>,
    pub overwrite_files: bool,
    pub overwrite_dir: bool,
    pub create_dir: bool,
    pub bundle_frameworks: bool,
    pub codesign: bool,
    pub codesign_identity: String,
    /// Ask on stdin for references nothing else resolves.
    pub interactive: bool,
    pub quiet: bool,
    pub app: Option<AppBundle>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            files_to_fix: Vec::new(),
            bundle_libs: false,
            dest_dir: PathBuf::from(DEFAULT_DEST_DIR),
            install_path: DEFAULT_INSTALL_PATH.to_string(),
            plugin_dir: None,
            search_paths: Vec::new(),
            ignore_prefixes: Vec::new(),
            overwrite_files: false,
            overwrite_dir: false,
            create_dir: false,
            bundle_frameworks: false,
            codesign: true,
            codesign_identity: "-".to_string(),
            interactive: true,
            quiet: false,
            app: None,
        }
    }
}

impl Settings {
    /// Sets the install path, appending the trailing `/` if missing.
    pub fn set_install_path(&mut self, path: &str) {
        self.install_path = normalize_dir(path);
    }

    /// `--overwrite-dir` implies permission to recreate the directory.
    pub fn can_create_dir(&self) -> bool {
        self.create_dir || self.overwrite_dir
    }

    /// The copy destination, when copying.
    pub fn destination(&self) -> Option<&Path> {
        self.bundle_libs.then_some(self.dest_dir.as_path())
    }

    /// Layers a config file over the current values. List options append.
    pub fn apply_config(&mut self, config: ConfigFile) {
        self.files_to_fix.extend(config.fix_files);
        self.search_paths.extend(config.search_paths);
        self.ignore_prefixes.extend(config.ignore);

        if let Some(v) = config.bundle_deps {
            self.bundle_libs = v;
        }
        if let Some(v) = config.dest_dir {
            self.dest_dir = v;
        }
        if let Some(v) = config.install_path {
            self.set_install_path(&v);
        }
        if let Some(v) = config.plugins_dir {
            self.plugin_dir = Some(v);
        }
        if let Some(v) = config.overwrite_files {
            self.overwrite_files = v;
        }
        if let Some(v) = config.overwrite_dir {
            self.overwrite_dir = v;
        }
        if let Some(v) = config.create_dir {
            self.create_dir = v;
        }
        if let Some(v) = config.bundle_frameworks {
            self.bundle_frameworks = v;
        }
        if let Some(v) = config.codesign {
            self.codesign = v;
        }
        if let Some(v) = config.codesign_identity {
            self.codesign_identity = v;
        }
        if let Some(v) = config.interactive {
            self.interactive = v;
        }
        if let Some(v) = config.quiet {
            self.quiet = v;
        }
    }

    /// Switches to app-bundle mode: copy into `Contents/Frameworks`, plugins
    /// into `Contents/PlugIns`, and fix the bundle's main executable.
    pub fn apply_app_bundle(&mut self, app: AppBundle) {
        self.bundle_libs = true;
        self.create_dir = true;
        self.dest_dir = app.frameworks_dir();
        self.install_path = APP_INSTALL_PATH.to_string();
        self.plugin_dir = Some(app.plugins_dir());

        let exe = app.executable_path();
        if !self.files_to_fix.contains(&exe) {
            self.files_to_fix.insert(0, exe);
        }
        self.app = Some(app);
    }

    /// `DYLD_*` environment directories, then configured search paths.
    pub fn search_registry(&self) -> SearchPathRegistry {
        self.search_registry_with(|key| std::env::var(key).ok())
    }

    pub fn search_registry_with(&self, lookup: impl Fn(&str) -> Option<String>) -> SearchPathRegistry {
        let mut registry = SearchPathRegistry::from_env_with(lookup);
        for dir in &self.search_paths {
            registry.push(dir.clone());
        }
        registry
    }

    /// Where plugins go, when copying.
    pub fn plugin_layout(&self, dest: &Path) -> Option<PluginLayout> {
        if !self.bundle_libs {
            return None;
        }
        Some(PluginLayout {
            plugin_dir: self
                .plugin_dir
                .clone()
                .unwrap_or_else(|| dest.join("plugins")),
            resources_dir: self.app.as_ref().map(AppBundle::resources_dir),
        })
    }
}

/// Contents of a `--config` TOML file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ConfigFile {
    pub fix_files: Vec<PathBuf>,
    pub search_paths: Vec<PathBuf>,
    pub ignore: Vec<PathBuf>,
    pub bundle_deps: Option<bool>,
    pub dest_dir: Option<PathBuf>,
    pub install_path: Option<String>,
    pub plugins_dir: Option<PathBuf>,
    pub overwrite_files: Option<bool>,
    pub overwrite_dir: Option<bool>,
    pub create_dir: Option<bool>,
    pub bundle_frameworks: Option<bool>,
    pub codesign: Option<bool>,
    pub codesign_identity: Option<String>,
    pub interactive: Option<bool>,
    pub quiet: Option<bool>,
}

impl ConfigFile {
    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for
    /// this schema (unknown keys included).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

fn normalize_dir(path: &str) -> String {
    if path.is_empty() || path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}
