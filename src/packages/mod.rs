//! Go package loading engine.
//!
//! Discovers the Go packages under a directory, parses their files with
//! tree-sitter and reports them as [`Package`] records. Per-file problems are
//! attached to the package as [`PackageError`]s; only engine-level failures
//! (bad pattern, unusable directory, grammar initialisation) are returned as
//! hard errors.
//!
//! Like `go list`, the engine may return several records for one import path
//! when test files are included, and the order of the returned records is not
//! specified.

pub mod driver;
pub mod gomod;
pub mod grammar;
pub mod parser;
pub mod pattern;
pub mod walker;

use std::fmt;
use std::io::Write;
use std::ops::BitOr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;

pub use driver::GoLoader;
pub use gomod::find_module;
pub use grammar::GoGrammar;
pub use parser::{Declaration, ParsedGoFile, SourceParser, SyntaxFile};
pub use pattern::Pattern;
pub use walker::GoFileWalker;

/// Suffix the engine appends to the import path of a synthetic test binary.
pub const TEST_BINARY_SUFFIX: &str = ".test";

/// Set of capabilities requested from the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LoadMode(u32);

impl LoadMode {
    pub const NEED_NAME: LoadMode = LoadMode(1 << 0);
    pub const NEED_FILES: LoadMode = LoadMode(1 << 1);
    pub const NEED_IMPORTS: LoadMode = LoadMode(1 << 2);
    /// Keep parsed syntax trees. Only honoured together with [`Self::NEED_TYPES`]:
    /// the trees are produced by the type phase and dropped when it is skipped.
    pub const NEED_SYNTAX: LoadMode = LoadMode(1 << 3);
    pub const NEED_TYPES: LoadMode = LoadMode(1 << 4);
    pub const NEED_MODULE: LoadMode = LoadMode(1 << 5);

    pub const fn empty() -> Self {
        LoadMode(0)
    }

    pub const fn union(self, other: LoadMode) -> Self {
        LoadMode(self.0 | other.0)
    }

    pub const fn contains(self, other: LoadMode) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for LoadMode {
    type Output = LoadMode;

    fn bitor(self, rhs: LoadMode) -> LoadMode {
        self.union(rhs)
    }
}

/// Loader configuration.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub mode: LoadMode,
    /// Directory patterns are resolved against
    pub dir: PathBuf,
    /// Include `_test.go` files and emit the test variants
    pub tests: bool,
}

impl LoadConfig {
    pub fn new(dir: impl Into<PathBuf>, mode: LoadMode) -> Self {
        Self {
            mode,
            dir: dir.into(),
            tests: false,
        }
    }

    pub fn with_tests(mut self, tests: bool) -> Self {
        self.tests = tests;
        self
    }
}

/// A Go module as declared by its `go.mod` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub path: String,
    pub dir: PathBuf,
    pub go_version: Option<String>,
}

/// 1-based source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageErrorKind {
    /// Problems listing the package: unreadable files, mixed package names
    List,
    Parse,
    Type,
}

/// An error attached to a package. Never fatal to the load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageError {
    pub position: Option<Position>,
    pub message: String,
    pub kind: PackageErrorKind,
}

impl PackageError {
    pub fn new(kind: PackageErrorKind, message: impl Into<String>) -> Self {
        Self {
            position: None,
            message: message.into(),
            kind,
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }
}

impl fmt::Display for PackageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.position {
            Some(position) => write!(f, "{}: {}", position, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    /// Production files only
    Library,
    /// Production files plus in-package `_test.go` files
    TestVariant,
    /// The `<pkg>_test` package built from external test files
    ExternalTest,
    /// Synthetic `main` package of the compiled test executable
    TestBinary,
}

/// One package record produced by the loader.
#[derive(Debug, Clone)]
pub struct Package {
    /// Unique per record; test variants carry a ` [<path>.test]` qualifier
    pub id: String,
    /// Import path, shared by the variants of one package
    pub pkg_path: String,
    pub name: String,
    pub kind: PackageKind,
    pub dir: PathBuf,
    pub go_files: Vec<PathBuf>,
    pub imports: Vec<String>,
    /// Top-level names declared by the package
    pub declarations: Vec<String>,
    pub errors: Vec<PackageError>,
    pub module: Option<Module>,
    pub syntax: Vec<Arc<SyntaxFile>>,
}

impl Package {
    pub fn new(id: impl Into<String>, pkg_path: impl Into<String>, kind: PackageKind, dir: &Path) -> Self {
        Self {
            id: id.into(),
            pkg_path: pkg_path.into(),
            name: String::new(),
            kind,
            dir: dir.to_path_buf(),
            go_files: Vec::new(),
            imports: Vec::new(),
            declarations: Vec::new(),
            errors: Vec::new(),
            module: None,
            syntax: Vec::new(),
        }
    }

    pub fn is_test_binary(&self) -> bool {
        self.pkg_path.ends_with(TEST_BINARY_SUFFIX)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// The seam between the load pipeline and the engine.
pub trait PackageLoader {
    /// Load every package matched by `patterns`.
    ///
    /// Returns an error only for failures of the load itself; problems with
    /// individual files are reported through [`Package::errors`].
    fn load(&self, config: &LoadConfig, patterns: &[&str]) -> Result<Vec<Package>>;
}

/// Write one `<file>:<line>:<column>: <message>` line per package error.
///
/// Returns the number of packages that had at least one error.
pub fn write_errors<W: Write>(out: &mut W, packages: &[Package]) -> usize {
    let mut affected = 0;
    for package in packages.iter().filter(|p| p.has_errors()) {
        for error in &package.errors {
            if let Err(e) = writeln!(out, "{}", error) {
                tracing::debug!("Failed to write diagnostic: {}", e);
            }
        }
        affected += 1;
    }
    affected
}

/// [`write_errors`] to stderr.
pub fn print_errors(packages: &[Package]) -> usize {
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    write_errors(&mut handle, packages)
}
