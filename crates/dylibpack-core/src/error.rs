//! Error taxonomy for a bundling run.
//!
//! Every variant is fatal to the run except `UnresolvedDependency`, which the
//! resolver may recover from through an [`UnresolvedHandler`] before it ever
//! reaches the caller.
//!
//! [`UnresolvedHandler`]: crate::resolver::UnresolvedHandler

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error(
        "Dependency '{reference}' of {consumer} could not be found (searched tokens, rpaths and search paths)"
    )]
    UnresolvedDependency {
        reference: String,
        consumer: PathBuf,
    },

    #[error("{tool} failed on {path}: {message}")]
    ExternalTool {
        tool: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("'{0}' not found. Please install Xcode Command Line Tools: xcode-select --install")]
    ToolMissing(&'static str),

    #[error("{0} already exists. Remove it or enable overwriting")]
    DestinationConflict(PathBuf),

    #[error("{first} and {second} would both be copied to {to}")]
    DuplicateDestination {
        to: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    #[error(
        "Destination folder {0} does not exist. Create it or pass --create-dir for automatic creation"
    )]
    DestinationMissing(PathBuf),

    #[error("Malformed load commands in {path}: {detail}")]
    MalformedMetadata { path: PathBuf, detail: String },

    #[error("Invalid app bundle {path}: {detail}")]
    InvalidBundle { path: PathBuf, detail: String },

    #[error("Aborted by user")]
    Aborted,

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BundleError {
    /// Wrap an IO error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn tool(tool: &'static str, path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::ExternalTool {
            tool,
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T, E = BundleError> = std::result::Result<T, E>;
