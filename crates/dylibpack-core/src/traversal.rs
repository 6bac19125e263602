//! Fixed-point dependency discovery.
//!
//! A worklist of binaries to inspect, plus an "already enqueued" set keyed by
//! canonical path. Every inspected binary's references are resolved and
//! merged into the [`DependencyStore`]; newly seen libraries are enqueued.
//! The loop ends when the queue drains, which it must: the enqueued set only
//! grows and there are finitely many files on disk.
//!
//! After each drain the plugin families get a chance to add binaries; if they
//! do, the loop drains again.

use crate::error::Result;
use crate::inspector::Inspector;
use crate::plugins::{FAMILIES, PluginExpansion, PluginFamily, PluginLayout};
use crate::reporter::Reporter;
use crate::resolver::PathResolver;
use crate::store::{BundlePolicy, DependencyStore, Merge};
use dylibpack_schema::PathToken;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// A binary the planner rewrites.
///
/// `inspected` is where its load commands were read, `patched` is where the
/// rewrites land. They differ for copies: the original is read, the copy is
/// patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixTarget {
    pub inspected: PathBuf,
    pub patched: PathBuf,
}

impl FixTarget {
    /// A file rewritten in place.
    pub fn in_place(path: PathBuf) -> Self {
        Self {
            inspected: path.clone(),
            patched: path,
        }
    }
}

/// Everything discovery learned, handed to the planner.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub store: DependencyStore,
    /// Cached `LC_RPATH` entries per inspected binary.
    pub rpaths: HashMap<PathBuf, Vec<String>>,
    /// Plugin copies and config files, across all families.
    pub plugins: PluginExpansion,
}

impl Discovery {
    pub fn rpaths_of(&self, file: &Path) -> &[String] {
        self.rpaths.get(file).map_or(&[], Vec::as_slice)
    }

    /// Plugin copies as fix targets.
    pub fn plugin_targets(&self) -> impl Iterator<Item = FixTarget> + '_ {
        self.plugins.copies.iter().map(|c| FixTarget {
            inspected: c.from.clone(),
            patched: c.to.clone(),
        })
    }
}

pub struct Traversal<'a> {
    inspector: &'a dyn Inspector,
    resolver: PathResolver<'a>,
    policy: BundlePolicy,
    reporter: &'a dyn Reporter,
    families: &'a [PluginFamily],
    plugin_layout: Option<PluginLayout>,

    discovery: Discovery,
    enqueued: HashSet<PathBuf>,
    queue: VecDeque<PathBuf>,
    expanded: BTreeSet<String>,
}

impl<'a> Traversal<'a> {
    pub fn new(
        inspector: &'a dyn Inspector,
        resolver: PathResolver<'a>,
        policy: BundlePolicy,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            inspector,
            resolver,
            policy,
            reporter,
            families: FAMILIES,
            plugin_layout: None,
            discovery: Discovery::default(),
            enqueued: HashSet::new(),
            queue: VecDeque::new(),
            expanded: BTreeSet::new(),
        }
    }

    /// Enables plugin expansion, copying plugins under `layout`.
    pub fn with_plugins(mut self, layout: PluginLayout) -> Self {
        self.plugin_layout = Some(layout);
        self
    }

    /// Replaces the plugin family table.
    pub fn with_families(mut self, families: &'a [PluginFamily]) -> Self {
        self.families = families;
        self
    }

    pub fn store(&self) -> &DependencyStore {
        &self.discovery.store
    }

    /// Discovers the full dependency closure of `initial`.
    ///
    /// May be called more than once; files already inspected are not
    /// inspected again.
    ///
    /// # Errors
    ///
    /// Any inspector or resolver failure aborts discovery.
    pub fn discover<P: AsRef<Path>>(&mut self, initial: &[P]) -> Result<()> {
        for file in initial {
            self.enqueue(file.as_ref());
        }
        self.drain()?;

        while self.expand_plugins()? {
            self.drain()?;
        }
        Ok(())
    }

    /// Consumes the traversal, returning what it discovered.
    pub fn finish(self) -> Discovery {
        self.discovery
    }

    fn enqueue(&mut self, file: &Path) {
        if self.enqueued.insert(file.to_path_buf()) {
            self.queue.push_back(file.to_path_buf());
        } else {
            tracing::trace!("Already visited {}", file.display());
        }
    }

    fn drain(&mut self) -> Result<()> {
        while let Some(file) = self.queue.pop_front() {
            tracing::debug!("Inspecting {}", file.display());
            let commands = self.inspector.load_commands(&file)?;

            for reference in &commands.dependencies {
                if reference.token() == Some(PathToken::ExecutablePath)
                    && self.resolver.executable_dir().is_none()
                {
                    // Nothing to resolve it against; keep it as written.
                    if self.discovery.store.record_relative(reference, &file) == Merge::Inserted {
                        self.reporter.warning(&format!(
                            "{reference} in {} is relative to the executable, assuming it is already bundled",
                            file.display()
                        ));
                    }
                    continue;
                }

                let merged = self.discovery.store.resolve_or_merge(
                    &mut self.resolver,
                    reference,
                    &file,
                    &commands.rpaths,
                    &self.policy,
                )?;

                if merged.merge != Merge::Known {
                    self.reporter.dependency(reference.as_str(), &file);
                }
                if merged.disposition.is_inspectable() {
                    self.enqueue(&merged.binary_path);
                }
            }

            self.discovery.rpaths.insert(file, commands.rpaths);
        }
        Ok(())
    }

    /// Runs every family against the current store. Returns whether any
    /// plugin binaries were added to the queue.
    fn expand_plugins(&mut self) -> Result<bool> {
        let Some(layout) = &self.plugin_layout else {
            return Ok(false);
        };

        let mut grown = false;
        for family in self.families {
            let expansion = family.expand(
                &self.discovery.store,
                self.resolver.filesystem(),
                layout,
                &mut self.expanded,
            )?;
            if expansion.is_empty() {
                continue;
            }

            for copy in &expansion.copies {
                self.reporter
                    .info(&format!("Bundling {} plugin {}", family.name, copy.from.display()));
                if self.enqueued.insert(copy.from.clone()) {
                    self.queue.push_back(copy.from.clone());
                    grown = true;
                }
            }
            self.discovery.plugins.extend(expansion);
        }
        Ok(grown)
    }
}
