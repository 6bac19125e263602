pub mod bundle;
pub mod bundler;
pub mod error;
pub mod executor;
pub mod fs;
pub mod inspector;
pub mod planner;
pub mod plugins;
pub mod relinker;
pub mod resolver;
pub mod search_paths;
pub mod settings;
pub mod store;
pub mod traversal;

pub mod reporter;

pub use bundle::AppBundle;
pub use bundler::Bundler;
pub use error::{BundleError, Result};
pub use executor::{DestinationPolicy, Executor};
pub use fs::{Filesystem, StdFs};
pub use inspector::{Inspector, LoadCommands, Otool};
pub use relinker::{Codesign, InstallNameTool, Patcher, Signer};
pub use reporter::{NullReporter, Reporter};
pub use resolver::{FailOnUnresolved, PathResolver, UnresolvedHandler};
pub use settings::{ConfigFile, Settings};
pub use traversal::{Discovery, FixTarget, Traversal};
