//! One bundling run: collect targets, discover, plan.
//!
//! Wires [`Settings`] into the resolver, traversal and planner. Executing the
//! plan is left to [`Executor`](crate::executor::Executor) so callers can stop
//! after planning (dry runs, JSON output).

use crate::error::{BundleError, Result};
use crate::fs::{Filesystem, is_macho};
use crate::inspector::Inspector;
use crate::planner::Planner;
use crate::reporter::Reporter;
use crate::resolver::{PathResolver, UnresolvedHandler};
use crate::settings::Settings;
use crate::store::BundlePolicy;
use crate::traversal::{Discovery, Traversal};
use dylibpack_schema::RelocationPlan;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct Bundler<'a> {
    settings: &'a Settings,
    fs: &'a dyn Filesystem,
    inspector: &'a dyn Inspector,
    reporter: &'a dyn Reporter,
}

impl<'a> Bundler<'a> {
    pub fn new(
        settings: &'a Settings,
        fs: &'a dyn Filesystem,
        inspector: &'a dyn Inspector,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            settings,
            fs,
            inspector,
            reporter,
        }
    }

    /// Canonical files to fix. Directories are walked and contribute every
    /// Mach-O file below them.
    ///
    /// # Errors
    ///
    /// Fails if a listed file does not exist.
    pub fn targets(&self) -> Result<Vec<PathBuf>> {
        let mut targets = Vec::new();
        for file in &self.settings.files_to_fix {
            let file = self.fs.canonicalize(file)?;
            if file.is_dir() {
                for entry in WalkDir::new(&file).sort_by_file_name() {
                    let entry = entry.map_err(|e| {
                        BundleError::io(&file, std::io::Error::other(e.to_string()))
                    })?;
                    if entry.file_type().is_file() && is_macho(entry.path()) {
                        push_unique(&mut targets, entry.into_path());
                    }
                }
            } else {
                push_unique(&mut targets, file);
            }
        }
        Ok(targets)
    }

    /// Absolute copy destination, symlinks resolved when it already exists.
    ///
    /// # Errors
    ///
    /// Fails if the current directory cannot be determined.
    pub fn destination(&self) -> Result<Option<PathBuf>> {
        let Some(dest) = self.settings.destination() else {
            return Ok(None);
        };
        let absolute = std::path::absolute(dest).map_err(|e| BundleError::io(dest, e))?;
        Ok(Some(
            self.fs.canonicalize(&absolute).unwrap_or(absolute),
        ))
    }

    fn policy(&self, dest: Option<&Path>) -> BundlePolicy {
        let mut bundled_roots: Vec<PathBuf> = dest.into_iter().map(Path::to_path_buf).collect();
        if let Some(app) = &self.settings.app {
            bundled_roots.push(app.root().to_path_buf());
        }
        BundlePolicy {
            ignore_prefixes: self
                .settings
                .ignore_prefixes
                .iter()
                .map(|p| self.fs.canonicalize(p).unwrap_or_else(|_| p.clone()))
                .collect(),
            bundle_frameworks: self.settings.bundle_frameworks,
            bundled_roots,
        }
    }

    /// Discovers the dependency closure of `targets`.
    ///
    /// # Errors
    ///
    /// Any inspection failure, or a reference neither the resolver nor
    /// `handler` could place.
    pub fn discover(
        &self,
        targets: &[PathBuf],
        handler: impl UnresolvedHandler + 'a,
    ) -> Result<Discovery> {
        let dest = self.destination()?;
        let resolver = PathResolver::new(self.fs)
            .with_registry(self.settings.search_registry())
            .with_handler(handler)
            .with_executable_dir(self.settings.app.as_ref().map(|a| a.executable_dir()));

        let mut traversal = Traversal::new(
            self.inspector,
            resolver,
            self.policy(dest.as_deref()),
            self.reporter,
        );
        if let Some(layout) = dest.as_deref().and_then(|d| self.settings.plugin_layout(d)) {
            traversal = traversal.with_plugins(layout);
        }

        self.reporter.section("Collecting dependencies");
        traversal.discover(targets)?;
        let discovery = traversal.finish();

        if discovery.store.is_empty() {
            self.reporter.info("No dependencies found");
        }

        for library in discovery.store.libraries() {
            let dependents: Vec<_> = discovery.store.dependents_of(&library.real_path).collect();
            self.reporter.library(library, &dependents);
        }
        Ok(discovery)
    }

    /// Plans the relocation of everything `discovery` found.
    ///
    /// # Errors
    ///
    /// Fails if the destination cannot be made absolute, or if two
    /// libraries would be copied to the same path.
    pub fn plan(&self, discovery: &Discovery, targets: &[PathBuf]) -> Result<RelocationPlan> {
        let dest = self.destination()?;
        let planner = Planner {
            install_path: &self.settings.install_path,
            destination: dest.as_deref(),
            sign: self.settings.codesign,
        };
        planner.plan(discovery, targets)
    }
}

fn push_unique(targets: &mut Vec<PathBuf>, path: PathBuf) {
    if !targets.contains(&path) {
        targets.push(path);
    }
}
