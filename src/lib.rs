pub mod directory;
pub mod error;
pub mod loader;
pub mod packages;

pub use directory::TargetDirectory;
pub use error::{CodegraphError, ErrorKind, Result};
pub use loader::{
    deduplicate_packages, load, sort_packages, LoadOutcome, ModuleStatus, PackageLoadPipeline,
    ALL_PACKAGES_PATTERN, LOAD_MODE,
};
pub use packages::{
    print_errors, write_errors, GoLoader, LoadConfig, LoadMode, Module, Package, PackageError,
    PackageErrorKind, PackageKind, PackageLoader, Position, SyntaxFile,
};
