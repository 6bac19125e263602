//! Executes a [`RelocationPlan`] against the filesystem and the patch tools.
//!
//! Destination checks run first and fail before anything is touched. After
//! that every collaborator error aborts the run immediately: a half-patched
//! binary is not something to keep working on.

use crate::error::{BundleError, Result};
use crate::fs::Filesystem;
use crate::relinker::{Patcher, Signer};
use crate::reporter::Reporter;
use crate::planner::check_unique_destinations;
use dylibpack_schema::RelocationPlan;

/// What the run may do to an existing or missing destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestinationPolicy {
    pub overwrite_files: bool,
    pub overwrite_dir: bool,
    pub create_dir: bool,
}

impl DestinationPolicy {
    fn can_create(self) -> bool {
        self.create_dir || self.overwrite_dir
    }
}

pub struct Executor<'a> {
    pub fs: &'a dyn Filesystem,
    pub patcher: &'a dyn Patcher,
    pub signer: &'a dyn Signer,
    pub reporter: &'a dyn Reporter,
}

impl Executor<'_> {
    /// Checks the destination without changing anything.
    ///
    /// # Errors
    ///
    /// [`BundleError::DestinationMissing`] when the destination is absent and
    /// may not be created, [`BundleError::DestinationConflict`] when a copy
    /// would land on an existing file without overwrite permission,
    /// [`BundleError::DuplicateDestination`] when two copies share a target.
    pub fn preflight(&self, plan: &RelocationPlan, policy: DestinationPolicy) -> Result<()> {
        check_unique_destinations(&plan.copies)?;
        if let Some(dest) = &plan.destination {
            if !self.fs.exists(dest) && !policy.can_create() {
                return Err(BundleError::DestinationMissing(dest.clone()));
            }
        }
        if policy.overwrite_files || policy.overwrite_dir {
            return Ok(());
        }
        let conflict = plan
            .copies
            .iter()
            .map(|c| &c.to)
            .chain(plan.generated_files.iter().map(|g| &g.path))
            .find(|path| self.fs.exists(path));
        match conflict {
            Some(path) => Err(BundleError::DestinationConflict(path.clone())),
            None => Ok(()),
        }
    }

    /// Runs the plan: directories, copies, generated files, identity
    /// rewrites, reference rewrites, rpath rewrites, signatures.
    ///
    /// # Errors
    ///
    /// The first failing operation aborts the run.
    pub fn apply(&self, plan: &RelocationPlan, policy: DestinationPolicy) -> Result<()> {
        self.preflight(plan, policy)?;

        if let Some(dest) = &plan.destination {
            self.reporter
                .section(&format!("Checking output directory {}", dest.display()));
            if policy.overwrite_dir && self.fs.exists(dest) {
                self.reporter
                    .action(&format!("Erasing old output directory {}", dest.display()));
                self.fs.remove_tree(dest)?;
            }
            if !self.fs.exists(dest) {
                self.reporter
                    .action(&format!("Creating output directory {}", dest.display()));
                self.fs.mkdir_all(dest)?;
            }
        }
        for dir in &plan.directories {
            self.fs.mkdir_all(dir)?;
        }

        for copy in &plan.copies {
            self.reporter.action(&format!(
                "Copying {} to {}",
                copy.from.display(),
                copy.to.display()
            ));
            self.fs.copy(&copy.from, &copy.to)?;
            for entry in &copy.strip {
                self.fs.remove_tree(&copy.to.join(entry))?;
            }
        }
        for file in &plan.generated_files {
            self.reporter
                .action(&format!("Writing {}", file.path.display()));
            self.fs.write(&file.path, &file.contents)?;
        }

        for id in &plan.id_rewrites {
            self.reporter
                .action(&format!("Setting id of {} to {}", id.file.display(), id.install_name));
            self.patcher.set_id(&id.file, &id.install_name)?;
        }

        if !plan.reference_rewrites.is_empty() {
            self.reporter.section("Fixing dependencies");
        }
        for rewrite in &plan.reference_rewrites {
            self.reporter.action(&format!(
                "{}: {} -> {}",
                rewrite.file.display(),
                rewrite.old,
                rewrite.new
            ));
            self.patcher
                .change_dependency(&rewrite.file, rewrite.old.as_str(), &rewrite.new)?;
        }

        for rewrite in &plan.rpath_rewrites {
            match &rewrite.new {
                Some(new) => {
                    self.reporter.action(&format!(
                        "{}: rpath {} -> {new}",
                        rewrite.file.display(),
                        rewrite.old
                    ));
                    self.patcher.change_rpath(&rewrite.file, &rewrite.old, new)?;
                }
                None => {
                    self.reporter.action(&format!(
                        "{}: deleting rpath {}",
                        rewrite.file.display(),
                        rewrite.old
                    ));
                    self.patcher.delete_rpath(&rewrite.file, &rewrite.old)?;
                }
            }
        }

        for file in &plan.sign {
            self.reporter.action(&format!("Signing {}", file.display()));
            self.signer.resign(file)?;
        }

        self.reporter.summary(
            plan.copies.len(),
            plan.id_rewrites.len() + plan.reference_rewrites.len() + plan.rpath_rewrites.len(),
        );
        Ok(())
    }
}
