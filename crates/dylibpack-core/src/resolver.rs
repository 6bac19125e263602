//! Mapping a library reference to a real file on disk.
//!
//! Resolution order, first success wins:
//!
//! 1. token-free absolute path, canonicalized as is
//! 2. `@executable_path/`, when the app bundle's executable directory is known
//! 3. `@loader_path/`, against the consumer's own directory
//! 4. `@rpath/`, against the bundle executable directory first, then each of
//!    the consumer's rpaths in declaration order
//! 5. absolute paths in system locations, taken literally (they usually only
//!    exist inside the dyld shared cache)
//! 6. the [`SearchPathRegistry`], in insertion order
//! 7. the [`UnresolvedHandler`], whose answer is validated, registered and
//!    remembered

use crate::error::{BundleError, Result};
use crate::fs::Filesystem;
use crate::search_paths::SearchPathRegistry;
use dylibpack_schema::{LibraryReference, PathToken};
use std::path::{Path, PathBuf};

/// Directories whose libraries ship with the OS and are never bundled.
pub const SYSTEM_PREFIXES: [&str; 2] = ["/usr/lib/", "/System/Library/"];

const MAX_PROMPT_ATTEMPTS: usize = 10;

/// Whether `path` lives in a system library location.
pub fn is_system_location(path: &Path) -> bool {
    SYSTEM_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix.trim_end_matches('/')))
}

/// Last resort for a reference nothing else could place.
///
/// The CLI wires in an interactive prompt; the library default fails.
pub trait UnresolvedHandler {
    /// Returns a directory that should contain `name`.
    ///
    /// # Errors
    ///
    /// Returns an error to abort resolution (and with it the run).
    fn locate(&mut self, name: &str, consumer: &Path) -> Result<PathBuf>;

    /// Called when the directory returned by [`locate`](Self::locate) does
    /// not contain the file; `locate` is then called again.
    fn rejected(&mut self, _candidate: &Path) {}
}

/// Non-interactive [`UnresolvedHandler`]: every miss is fatal.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailOnUnresolved;

impl UnresolvedHandler for FailOnUnresolved {
    fn locate(&mut self, name: &str, consumer: &Path) -> Result<PathBuf> {
        Err(BundleError::UnresolvedDependency {
            reference: name.to_string(),
            consumer: consumer.to_path_buf(),
        })
    }
}

/// Which rule produced a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionSource {
    Direct,
    ExecutablePath,
    LoaderPath,
    BundleExecutable,
    Rpath(String),
    SystemCache,
    SearchPath,
    Prompt(PathBuf),
}

/// A reference mapped to the canonical path of the file it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub path: PathBuf,
    pub source: ResolutionSource,
}

pub struct PathResolver<'a> {
    fs: &'a dyn Filesystem,
    registry: SearchPathRegistry,
    handler: Box<dyn UnresolvedHandler + 'a>,
    executable_dir: Option<PathBuf>,
}

impl std::fmt::Debug for PathResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathResolver")
            .field("registry", &self.registry)
            .field("executable_dir", &self.executable_dir)
            .finish_non_exhaustive()
    }
}

impl<'a> PathResolver<'a> {
    /// A resolver with an empty registry that fails on anything unresolved.
    pub fn new(fs: &'a dyn Filesystem) -> Self {
        Self {
            fs,
            registry: SearchPathRegistry::new(),
            handler: Box::new(FailOnUnresolved),
            executable_dir: None,
        }
    }

    pub fn with_registry(mut self, registry: SearchPathRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_handler(mut self, handler: impl UnresolvedHandler + 'a) -> Self {
        self.handler = Box::new(handler);
        self
    }

    /// Sets the directory `@executable_path` stands for (an app bundle's
    /// `Contents/MacOS`).
    pub fn with_executable_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.executable_dir = dir;
        self
    }

    /// Search directories, including any learned from the handler.
    pub fn registry(&self) -> &SearchPathRegistry {
        &self.registry
    }

    pub fn executable_dir(&self) -> Option<&Path> {
        self.executable_dir.as_deref()
    }

    pub fn filesystem(&self) -> &'a dyn Filesystem {
        self.fs
    }

    /// Resolves `reference`, found inside `consumer` whose rpaths are `rpaths`.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::UnresolvedDependency`] (or whatever the handler
    /// returns) when every rule fails.
    pub fn resolve(
        &mut self,
        reference: &LibraryReference,
        consumer: &Path,
        rpaths: &[String],
    ) -> Result<Resolution> {
        if let Some(resolution) = self.resolve_token(reference, consumer, rpaths) {
            tracing::debug!(
                "Resolved {reference} -> {} ({:?})",
                resolution.path.display(),
                resolution.source
            );
            return Ok(resolution);
        }

        let literal = Path::new(reference.as_str());
        if reference.is_absolute() && is_system_location(literal) {
            tracing::trace!("{reference} is a system library, taking it literally");
            return Ok(Resolution {
                path: literal.to_path_buf(),
                source: ResolutionSource::SystemCache,
            });
        }

        let name = reference.search_name();
        if let Some(found) = self.registry.find(self.fs, name) {
            if let Some(path) = self.canonical(&found) {
                tracing::debug!("Found {name} in search path: {}", found.display());
                return Ok(Resolution {
                    path,
                    source: ResolutionSource::SearchPath,
                });
            }
        }

        self.ask(name, consumer)
    }

    fn resolve_token(
        &self,
        reference: &LibraryReference,
        consumer: &Path,
        rpaths: &[String],
    ) -> Option<Resolution> {
        let tail = reference.tail();
        let resolved = |path: PathBuf, source: ResolutionSource| Resolution { path, source };

        match reference.token() {
            None if reference.is_absolute() => {
                let path = self.canonical(Path::new(reference.as_str()))?;
                if path.as_os_str() != reference.as_str() {
                    tracing::debug!("{reference} is a symlink to {}", path.display());
                }
                Some(resolved(path, ResolutionSource::Direct))
            }
            None => None,
            Some(PathToken::ExecutablePath) => {
                let dir = self.executable_dir.as_ref()?;
                let path = self.canonical(&dir.join(tail))?;
                Some(resolved(path, ResolutionSource::ExecutablePath))
            }
            Some(PathToken::LoaderPath) => {
                let dir = consumer.parent()?;
                let path = self.canonical(&dir.join(tail))?;
                Some(resolved(path, ResolutionSource::LoaderPath))
            }
            Some(PathToken::Rpath) => {
                if let Some(dir) = &self.executable_dir {
                    if let Some(path) = self.canonical(&dir.join(tail)) {
                        return Some(resolved(path, ResolutionSource::BundleExecutable));
                    }
                }
                rpaths.iter().find_map(|rpath| {
                    let dir = self.expand_rpath(rpath, consumer)?;
                    let path = self.canonical(&dir.join(tail))?;
                    Some(resolved(path, ResolutionSource::Rpath(rpath.clone())))
                })
            }
        }
    }

    /// Turns one rpath entry of `consumer` into a concrete directory.
    fn expand_rpath(&self, rpath: &str, consumer: &Path) -> Option<PathBuf> {
        let Some(token) = PathToken::ALL
            .into_iter()
            .find(|t| rpath == t.prefix().trim_end_matches('/') || rpath.starts_with(t.prefix()))
        else {
            return Some(PathBuf::from(rpath));
        };

        let rest = token.strip(rpath).unwrap_or("");
        let base = match token {
            PathToken::LoaderPath => consumer.parent()?.to_path_buf(),
            PathToken::ExecutablePath => self.executable_dir.clone()?,
            // An rpath made of @rpath refers to itself and can never resolve.
            PathToken::Rpath => return None,
        };
        Some(if rest.is_empty() { base } else { base.join(rest) })
    }

    fn ask(&mut self, name: &str, consumer: &Path) -> Result<Resolution> {
        if let Some(dir) = self.registry.prompted(name) {
            if let Some(path) = self.canonical(&dir.join(name)) {
                return Ok(Resolution {
                    path,
                    source: ResolutionSource::Prompt(dir.to_path_buf()),
                });
            }
        }

        tracing::warn!(
            "Dependency {name} of {} not found in any search path",
            consumer.display()
        );

        for _ in 0..MAX_PROMPT_ATTEMPTS {
            let dir = self.handler.locate(name, consumer)?;
            let candidate = dir.join(name);
            match self.canonical(&candidate) {
                Some(path) => {
                    tracing::warn!(
                        "{} was found. Check the result manually with 'otool -L': this dependency is non-standard",
                        candidate.display()
                    );
                    self.registry.remember_prompt(name, &dir);
                    return Ok(Resolution {
                        path,
                        source: ResolutionSource::Prompt(dir),
                    });
                }
                None => self.handler.rejected(&candidate),
            }
        }

        Err(BundleError::UnresolvedDependency {
            reference: name.to_string(),
            consumer: consumer.to_path_buf(),
        })
    }

    fn canonical(&self, path: &Path) -> Option<PathBuf> {
        self.fs.canonicalize(path).ok()
    }
}
