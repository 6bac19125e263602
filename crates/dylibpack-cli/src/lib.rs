//! dylibpack - bundle the dynamic libraries of macOS binaries
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Collects every non-system dynamic library a set of executables and
//! plug-ins depend on, copies them next to the binaries, and rewrites all
//! references so the result runs on a machine without the build-time
//! library locations.
//!
//! # Layout
//!
//! ```text
//! MyApp.app/Contents/
//! ├── MacOS/        # executable (@executable_path)
//! ├── Frameworks/   # bundled libraries and frameworks
//! ├── PlugIns/      # bundled Qt plugins
//! └── Resources/    # generated qt.conf
//! ```

pub mod prompt;
pub mod run;
pub mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use dylibpack_core::{AppBundle, ConfigFile, Settings};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "dylibpack")]
#[command(
    author,
    version,
    about = "dylibpack - bundle dynamic libraries inside macOS app bundles"
)]
pub struct Cli {
    /// File to fix (executable or app plug-in); a folder adds every binary inside it
    #[arg(short = 'x', long = "fix-file", value_name = "FILE")]
    pub fix_files: Vec<PathBuf>,

    /// Copy dependencies into the destination directory
    #[arg(short = 'b', long)]
    pub bundle_deps: bool,

    /// Directory to send bundled libraries to (relative to cwd) [default: ./libs/]
    #[arg(short = 'd', long, value_name = "DIR")]
    pub dest_dir: Option<PathBuf>,

    /// 'Inner' path of bundled libraries [default: @executable_path/../libs/]
    #[arg(short = 'p', long, value_name = "PATH")]
    pub install_path: Option<String>,

    /// Directory to add to the list of locations searched
    #[arg(short = 's', long = "search-path", value_name = "DIR")]
    pub search_paths: Vec<PathBuf>,

    /// Leave libraries in this directory alone
    #[arg(short = 'i', long = "ignore", value_name = "DIR")]
    pub ignore: Vec<PathBuf>,

    /// Allow overwriting files in the output directory
    #[arg(long)]
    pub overwrite_files: bool,

    /// Replace the output directory if it already exists (implies --create-dir)
    #[arg(long)]
    pub overwrite_dir: bool,

    /// Create the output directory if necessary
    #[arg(long)]
    pub create_dir: bool,

    /// Bundle frameworks as well as plain libraries
    #[arg(short = 'f', long)]
    pub bundle_frameworks: bool,

    /// Bundle into an .app: Contents/Frameworks, Contents/PlugIns, and its main executable
    #[arg(short = 'a', long, value_name = "APP")]
    pub app: Option<PathBuf>,

    /// Directory to copy plugins to [default: <dest-dir>/plugins]
    #[arg(long, value_name = "DIR")]
    pub plugins_dir: Option<PathBuf>,

    /// Do not re-sign patched binaries
    #[arg(long)]
    pub no_codesign: bool,

    /// Signing identity used after patching [default: - (ad-hoc)]
    #[arg(long, value_name = "IDENTITY", env = "DYLIBPACK_CODESIGN_IDENTITY")]
    pub codesign_identity: Option<String>,

    /// Fail instead of asking where a missing library lives
    #[arg(long)]
    pub non_interactive: bool,

    /// Print the plan without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the plan as JSON without changing anything
    #[arg(long)]
    pub json: bool,

    /// TOML file with default options
    #[arg(long, value_name = "FILE", env = "DYLIBPACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Do not echo every command
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Nothing to do: no files, no copying, no bundle, no config.
    pub fn is_noop(&self) -> bool {
        self.fix_files.is_empty() && !self.bundle_deps && self.app.is_none() && self.config.is_none()
    }

    /// Builds run settings: defaults, then the config file, then the app
    /// bundle presets, then flags.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::default();

        if let Some(path) = &self.config {
            settings.apply_config(ConfigFile::load(path)?);
        }
        if let Some(app) = &self.app {
            let bundle = AppBundle::open(app)
                .with_context(|| format!("Failed to open app bundle {}", app.display()))?;
            settings.apply_app_bundle(bundle);
        }
        self.apply_flags(&mut settings);
        Ok(settings)
    }

    fn apply_flags(&self, settings: &mut Settings) {
        settings.files_to_fix.extend(self.fix_files.iter().cloned());
        settings.search_paths.extend(self.search_paths.iter().cloned());
        settings.ignore_prefixes.extend(self.ignore.iter().cloned());

        if let Some(dir) = &self.dest_dir {
            settings.dest_dir.clone_from(dir);
        }
        if let Some(path) = &self.install_path {
            settings.set_install_path(path);
        }
        if let Some(dir) = &self.plugins_dir {
            settings.plugin_dir = Some(dir.clone());
        }
        if let Some(identity) = &self.codesign_identity {
            settings.codesign_identity.clone_from(identity);
        }

        settings.bundle_libs |= self.bundle_deps;
        settings.overwrite_files |= self.overwrite_files;
        settings.overwrite_dir |= self.overwrite_dir;
        settings.create_dir |= self.create_dir || self.overwrite_dir;
        settings.bundle_frameworks |= self.bundle_frameworks;
        settings.quiet |= self.quiet;
        if self.no_codesign {
            settings.codesign = false;
        }
        if self.non_interactive {
            settings.interactive = false;
        }
    }

    /// The plan is printed instead of executed.
    pub fn plan_only(&self) -> bool {
        self.dry_run || self.json
    }
}
