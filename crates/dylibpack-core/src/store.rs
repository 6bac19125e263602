//! The dependency record store.
//!
//! One [`ResolvedLibrary`] per canonical real path. A reference that lands
//! on a known path only grows that record's alias set. Every
//! (consumer, reference) pair is kept as a [`DependentEdge`] so the planner
//! can rewrite each consumer's own spelling of the reference.

use crate::error::Result;
use crate::resolver::{PathResolver, is_system_location};
use dylibpack_schema::{DependentEdge, Disposition, LibraryReference, ResolvedLibrary, split_framework};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Decides, once per new library, whether it gets bundled.
#[derive(Debug, Clone, Default)]
pub struct BundlePolicy {
    /// Libraries under any of these prefixes are left in place.
    pub ignore_prefixes: Vec<PathBuf>,
    /// Whether framework bundles are copied.
    pub bundle_frameworks: bool,
    /// Directories whose contents count as already bundled: the destination
    /// and, in app-bundle mode, the bundle itself.
    pub bundled_roots: Vec<PathBuf>,
}

impl BundlePolicy {
    /// Classifies a canonical library path.
    pub fn classify(&self, real_path: &Path, is_framework: bool) -> Disposition {
        if is_system_location(real_path) {
            Disposition::System
        } else if self.bundled_roots.iter().any(|root| real_path.starts_with(root)) {
            Disposition::AlreadyBundled
        } else if self.ignore_prefixes.iter().any(|p| real_path.starts_with(p)) {
            Disposition::Ignored
        } else if is_framework && !self.bundle_frameworks {
            Disposition::Framework
        } else {
            Disposition::Bundled
        }
    }
}

/// What a merge did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    /// A new record was created.
    Inserted,
    /// An existing record learned a new alias.
    Aliased,
    /// Nothing new.
    Known,
}

/// Outcome of [`DependencyStore::resolve_or_merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub real_path: PathBuf,
    /// The binary to inspect for this library's own dependencies.
    pub binary_path: PathBuf,
    pub disposition: Disposition,
    pub merge: Merge,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyStore {
    libraries: Vec<ResolvedLibrary>,
    index: HashMap<PathBuf, usize>,
    edges: Vec<DependentEdge>,
    by_consumer: HashMap<PathBuf, Vec<usize>>,
}

impl DependencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    /// All records, in discovery order.
    pub fn libraries(&self) -> &[ResolvedLibrary] {
        &self.libraries
    }

    /// Records that will be copied and rewritten.
    pub fn bundled(&self) -> impl Iterator<Item = &ResolvedLibrary> {
        self.libraries.iter().filter(|l| l.disposition.is_bundled())
    }

    pub fn get(&self, real_path: &Path) -> Option<&ResolvedLibrary> {
        self.index.get(real_path).map(|&i| &self.libraries[i])
    }

    pub fn edges(&self) -> &[DependentEdge] {
        &self.edges
    }

    /// Edges recorded against `consumer`, in discovery order.
    pub fn edges_from<'a>(&'a self, consumer: &Path) -> impl Iterator<Item = &'a DependentEdge> {
        self.by_consumer
            .get(consumer)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
    }

    /// Edges pointing at the library whose real path is `library`.
    pub fn dependents_of<'a>(&'a self, library: &'a Path) -> impl Iterator<Item = &'a DependentEdge> {
        self.edges.iter().filter(move |e| e.library == library)
    }

    /// Resolves `reference` as seen inside `consumer` and merges the result.
    ///
    /// # Errors
    ///
    /// Whatever the resolver returns; the store is left untouched.
    pub fn resolve_or_merge(
        &mut self,
        resolver: &mut PathResolver<'_>,
        reference: &LibraryReference,
        consumer: &Path,
        rpaths: &[String],
        policy: &BundlePolicy,
    ) -> Result<Merged> {
        let resolution = resolver.resolve(reference, consumer, rpaths)?;
        Ok(self.merge(resolution.path, reference, consumer, policy))
    }

    /// Merges an already resolved binary path into the store and records
    /// the edge from `consumer`.
    pub fn merge(
        &mut self,
        binary_path: PathBuf,
        reference: &LibraryReference,
        consumer: &Path,
        policy: &BundlePolicy,
    ) -> Merged {
        let (idx, merge) = self.upsert(binary_path, reference, consumer, |key, is_framework| {
            policy.classify(key, is_framework)
        });
        let library = &self.libraries[idx];
        Merged {
            real_path: library.real_path.clone(),
            binary_path: library.binary_path.clone(),
            disposition: library.disposition,
            merge,
        }
    }

    /// Records an `@executable_path/` reference that cannot be resolved
    /// because there is no executable directory. The reference text itself
    /// becomes the record's path and it counts as already bundled.
    pub fn record_relative(&mut self, reference: &LibraryReference, consumer: &Path) -> Merge {
        let binary_path = PathBuf::from(reference.as_str());
        let (_, merge) = self.upsert(binary_path, reference, consumer, |_, _| {
            Disposition::AlreadyBundled
        });
        merge
    }

    fn upsert(
        &mut self,
        binary_path: PathBuf,
        reference: &LibraryReference,
        consumer: &Path,
        classify: impl FnOnce(&Path, bool) -> Disposition,
    ) -> (usize, Merge) {
        let key = split_framework(&binary_path).map_or_else(|| binary_path.clone(), |(root, _)| root);

        let (idx, merge) = match self.index.get(&key) {
            Some(&idx) => {
                let merge = if self.libraries[idx].add_alias(reference.clone()) {
                    tracing::trace!("{reference} is another name for {}", key.display());
                    Merge::Aliased
                } else {
                    Merge::Known
                };
                (idx, merge)
            }
            None => {
                let is_framework = key != binary_path;
                let disposition = classify(&key, is_framework);
                let mut library = ResolvedLibrary::from_binary(binary_path, disposition);
                library.add_alias(reference.clone());
                tracing::debug!("New library {} ({disposition})", key.display());

                let idx = self.libraries.len();
                self.libraries.push(library);
                self.index.insert(key.clone(), idx);
                (idx, Merge::Inserted)
            }
        };

        self.add_edge(consumer, &key, reference);
        (idx, merge)
    }

    fn add_edge(&mut self, consumer: &Path, library: &Path, reference: &LibraryReference) {
        let known = self
            .edges_from(consumer)
            .any(|e| e.reference == *reference && e.library == library);
        if known {
            return;
        }
        let idx = self.edges.len();
        self.edges.push(DependentEdge {
            consumer: consumer.to_path_buf(),
            library: library.to_path_buf(),
            reference: reference.clone(),
        });
        self.by_consumer
            .entry(consumer.to_path_buf())
            .or_default()
            .push(idx);
    }
}
