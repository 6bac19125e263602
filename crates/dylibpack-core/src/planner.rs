//! Turns a finished [`Discovery`] into a [`RelocationPlan`].
//!
//! The plan is pure data: nothing here touches the filesystem. Operations
//! come out grouped so that every copy precedes the first rewrite, and the
//! rewrites of a copied library target the copy.

use crate::error::{BundleError, Result};
use crate::traversal::{Discovery, FixTarget};
use dylibpack_schema::{
    CopyKind, CopyOperation, Disposition, IdRewrite, ReferenceRewrite, RelocationPlan,
    ResolvedLibrary, RpathRewrite,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Header directory removed from framework copies, both the top-level link
/// and the one inside the version directory.
pub const FRAMEWORK_HEADERS: &str = "Headers";

#[derive(Debug, Clone)]
pub struct Planner<'a> {
    /// Prefix of every new reference, e.g. `@executable_path/../libs/`.
    pub install_path: &'a str,
    /// Where libraries are copied. `None` rewrites references in place
    /// without copying anything.
    pub destination: Option<&'a Path>,
    /// Whether patched binaries are re-signed.
    pub sign: bool,
}

impl Planner<'_> {
    /// The new reference for `library`.
    pub fn new_reference(&self, library: &ResolvedLibrary) -> String {
        format!("{}{}", self.install_path, library.install_name)
    }

    /// Where the copy of `library` ends up.
    fn copy_path(dest: &Path, library: &ResolvedLibrary) -> PathBuf {
        dest.join(&library.install_name)
    }

    /// Every binary whose references get rewritten: the user's files, then
    /// (when copying) each bundled library's copy and each plugin copy.
    pub fn fix_targets(&self, discovery: &Discovery, files: &[PathBuf]) -> Vec<FixTarget> {
        let mut targets: Vec<FixTarget> = files.iter().cloned().map(FixTarget::in_place).collect();
        if let Some(dest) = self.destination {
            targets.extend(discovery.store.bundled().map(|lib| FixTarget {
                inspected: lib.binary_path.clone(),
                patched: Self::copy_path(dest, lib),
            }));
            targets.extend(discovery.plugin_targets());
        }
        targets
    }

    /// Libraries already inside the bundle, patched where they are. Only
    /// their references to copied libraries change.
    pub fn resident_targets(&self, discovery: &Discovery, fixed: &[FixTarget]) -> Vec<FixTarget> {
        let mut targets: Vec<FixTarget> = Vec::new();
        for lib in discovery.store.libraries() {
            // Executable-relative records have no file behind them.
            if lib.disposition != Disposition::AlreadyBundled || !lib.real_path.is_absolute() {
                continue;
            }
            let target = FixTarget::in_place(lib.binary_path.clone());
            let known = fixed.iter().chain(&targets).any(|t| t.patched == target.patched);
            if !known {
                targets.push(target);
            }
        }
        targets
    }

    /// Plans the relocation of everything `discovery` found.
    ///
    /// # Errors
    ///
    /// [`BundleError::DuplicateDestination`] when two distinct files would
    /// be copied to the same path.
    pub fn plan(&self, discovery: &Discovery, files: &[PathBuf]) -> Result<RelocationPlan> {
        let store = &discovery.store;
        let mut plan = RelocationPlan {
            destination: self.destination.map(Path::to_path_buf),
            ..RelocationPlan::default()
        };

        if let Some(dest) = self.destination {
            plan.directories.extend(discovery.plugins.directories.iter().cloned());

            for lib in store.bundled() {
                let (kind, strip) = if lib.is_framework {
                    (CopyKind::Bundle, framework_strip(lib))
                } else {
                    (CopyKind::File, Vec::new())
                };
                plan.copies.push(CopyOperation {
                    from: lib.real_path.clone(),
                    to: dest.join(&lib.file_name),
                    kind,
                    strip,
                });
                plan.id_rewrites.push(IdRewrite {
                    file: Self::copy_path(dest, lib),
                    install_name: self.new_reference(lib),
                });
            }
            plan.copies.extend(discovery.plugins.copies.iter().cloned());
            plan.generated_files
                .extend(discovery.plugins.generated_files.iter().cloned());
            check_unique_destinations(&plan.copies)?;
        }

        let targets = self.fix_targets(discovery, files);
        for target in &targets {
            self.plan_references(&mut plan, discovery, target);
            self.plan_rpaths(&mut plan, target, discovery.rpaths_of(&target.inspected));
        }
        for target in self.resident_targets(discovery, &targets) {
            self.plan_references(&mut plan, discovery, &target);
        }

        if self.sign {
            plan.sign = plan.patched_files().into_iter().map(Path::to_path_buf).collect();
        }
        Ok(plan)
    }

    /// One rewrite per reference from `target` to a copied library.
    fn plan_references(&self, plan: &mut RelocationPlan, discovery: &Discovery, target: &FixTarget) {
        let store = &discovery.store;
        for edge in store.edges_from(&target.inspected) {
            let Some(lib) = store.get(&edge.library) else {
                continue;
            };
            if !lib.disposition.is_bundled() {
                continue;
            }
            plan.reference_rewrites.push(ReferenceRewrite {
                file: target.patched.clone(),
                old: edge.reference.clone(),
                new: self.new_reference(lib),
            });
        }
    }

    /// The first rpath is pointed at the install location, the rest are
    /// deleted so no stale build directory stays searchable.
    fn plan_rpaths(&self, plan: &mut RelocationPlan, target: &FixTarget, rpaths: &[String]) {
        if self.install_path.starts_with("@rpath") {
            return;
        }
        let new = self.install_path.trim_end_matches('/');
        let keep_existing = rpaths.iter().any(|r| r.trim_end_matches('/') == new);

        let mut replaced = keep_existing;
        for rpath in rpaths {
            if rpath.trim_end_matches('/') == new {
                continue;
            }
            let replacement = if replaced {
                None
            } else {
                replaced = true;
                Some(self.install_path.to_string())
            };
            plan.rpath_rewrites.push(RpathRewrite {
                file: target.patched.clone(),
                old: rpath.clone(),
                new: replacement,
            });
        }
    }
}

/// `Headers`, then `Versions/<v>/Headers` for the version holding the binary.
fn framework_strip(library: &ResolvedLibrary) -> Vec<PathBuf> {
    let mut strip = vec![PathBuf::from(FRAMEWORK_HEADERS)];
    let version_dir = library
        .binary_path
        .strip_prefix(&library.real_path)
        .ok()
        .and_then(Path::parent)
        .filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = version_dir {
        strip.push(dir.join(FRAMEWORK_HEADERS));
    }
    strip
}

/// Fails when two copies from different sources share a target.
pub(crate) fn check_unique_destinations(copies: &[CopyOperation]) -> Result<()> {
    let mut sources: HashMap<&Path, &Path> = HashMap::new();
    for copy in copies {
        match sources.insert(copy.to.as_path(), copy.from.as_path()) {
            Some(first) if first != copy.from.as_path() => {
                return Err(BundleError::DuplicateDestination {
                    to: copy.to.clone(),
                    first: first.to_path_buf(),
                    second: copy.from.clone(),
                });
            }
            _ => {}
        }
    }
    Ok(())
}
