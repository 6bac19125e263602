//! Progress output seam.
//!
//! Discovery and execution report what they do through [`Reporter`]; the
//! CLI prints it, tests pass [`NullReporter`].

use dylibpack_schema::{DependentEdge, ResolvedLibrary};
use std::path::Path;

pub trait Reporter {
    /// Indicates a new phase has started (e.g. "Collecting dependencies").
    fn section(&self, title: &str);

    /// A dependency reference was recorded against `consumer`.
    fn dependency(&self, reference: &str, consumer: &Path);

    /// Print one entry of the final resolved-library list, with the edges
    /// that point at it.
    fn library(&self, library: &ResolvedLibrary, dependents: &[&DependentEdge]);

    /// Echo an action taken against the filesystem or a binary.
    fn action(&self, msg: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Display a final summary.
    fn summary(&self, libraries: usize, rewrites: usize);
}

impl<T: Reporter + ?Sized> Reporter for &T {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn dependency(&self, reference: &str, consumer: &Path) {
        (**self).dependency(reference, consumer);
    }
    fn library(&self, library: &ResolvedLibrary, dependents: &[&DependentEdge]) {
        (**self).library(library, dependents);
    }
    fn action(&self, msg: &str) {
        (**self).action(msg);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn summary(&self, libraries: usize, rewrites: usize) {
        (**self).summary(libraries, rewrites);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn dependency(&self, _: &str, _: &Path) {}
    fn library(&self, _: &ResolvedLibrary, _: &[&DependentEdge]) {}
    fn action(&self, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn summary(&self, _: usize, _: usize) {}
}
