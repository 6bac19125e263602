//! Shared types for dylibpack.
//!
//! The engine in `dylibpack-core` produces these values and the CLI prints
//! or executes them. Keeping them here lets a plan be serialized, inspected
//! and replayed without pulling in the engine.

pub mod library;
pub mod plan;
pub mod reference;

// Re-exports
pub use library::{DependentEdge, Disposition, ResolvedLibrary, split_framework};
pub use plan::{
    CopyKind, CopyOperation, GeneratedFile, IdRewrite, ReferenceRewrite, RelocationPlan,
    RpathRewrite,
};
pub use reference::{FRAMEWORK_EXTENSION, LibraryReference, PathToken};
