//! Package load pipeline.
//!
//! Runs the loader once over a resolved directory, then turns its raw,
//! unordered records into a stable view: one record per import path, no
//! synthetic test binaries, sorted by import path. Parse and type errors are
//! printed and counted but never abort the load.
//!
//! Syntax trees stay reachable through [`Package::syntax`]: package
//! comments via [`SyntaxFile::package_doc`](crate::packages::SyntaxFile::package_doc),
//! every comment via `comments()`, and any other node through `root_node()`.

use std::collections::{BTreeSet, HashMap};
use std::io::Write;

use crate::directory::TargetDirectory;
use crate::error::Result;
use crate::packages::{self, GoLoader, LoadConfig, LoadMode, Module, Package, PackageLoader};

/// Capabilities requested from the loader.
///
/// `NEED_TYPES` is not consumed by anything downstream. It is requested
/// because the loader only keeps syntax trees when its type phase runs;
/// dropping it silently empties [`Package::syntax`].
pub const LOAD_MODE: LoadMode = LoadMode::NEED_NAME
    .union(LoadMode::NEED_FILES)
    .union(LoadMode::NEED_SYNTAX)
    .union(LoadMode::NEED_IMPORTS)
    .union(LoadMode::NEED_MODULE)
    .union(LoadMode::NEED_TYPES);

/// Every package below the load directory.
pub const ALL_PACKAGES_PATTERN: &str = "./...";

/// Result of a load.
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    /// Sorted by import path, one entry per import path
    pub packages: Vec<Package>,
    /// Loaded records that carried errors, discarded variants included
    pub error_count: usize,
}

/// Which module the loaded packages belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStatus {
    Resolved(Module),
    /// Packages disagree about their module
    Ambiguous(Vec<String>),
    /// No package carries a module
    Undetermined,
}

impl LoadOutcome {
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn total_files(&self) -> usize {
        self.packages.iter().map(|p| p.go_files.len()).sum()
    }

    /// Errors carried by the kept packages.
    pub fn package_error_count(&self) -> usize {
        self.packages.iter().map(|p| p.errors.len()).sum()
    }

    pub fn module(&self) -> ModuleStatus {
        let modules: Vec<&Module> = self.packages.iter().filter_map(|p| p.module.as_ref()).collect();
        let paths: BTreeSet<&str> = modules.iter().map(|m| m.path.as_str()).collect();

        match paths.len() {
            0 => ModuleStatus::Undetermined,
            1 => ModuleStatus::Resolved(modules[0].clone()),
            _ => ModuleStatus::Ambiguous(paths.into_iter().map(str::to_string).collect()),
        }
    }
}

pub struct PackageLoadPipeline<L: PackageLoader = GoLoader> {
    loader: L,
}

impl PackageLoadPipeline<GoLoader> {
    pub fn new() -> Self {
        Self {
            loader: GoLoader::new(),
        }
    }
}

impl Default for PackageLoadPipeline<GoLoader> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: PackageLoader> PackageLoadPipeline<L> {
    pub fn with_loader(loader: L) -> Self {
        Self { loader }
    }

    /// Load every package under `dir`, writing diagnostics to stderr.
    pub fn load(&self, dir: &TargetDirectory, include_tests: bool) -> Result<LoadOutcome> {
        let stderr = std::io::stderr();
        let mut handle = stderr.lock();
        self.load_reporting(dir, include_tests, &mut handle)
    }

    /// Load every package under `dir`, writing one diagnostic line per
    /// package error to `diagnostics`.
    ///
    /// [`LoadOutcome::error_count`] is the number of loaded records with
    /// errors. Only a failure of the loader itself is returned as an error.
    pub fn load_reporting<W: Write>(
        &self,
        dir: &TargetDirectory,
        include_tests: bool,
        diagnostics: &mut W,
    ) -> Result<LoadOutcome> {
        let config = LoadConfig::new(dir.path(), LOAD_MODE).with_tests(include_tests);

        tracing::debug!("Loading packages from {} (tests: {})", dir, include_tests);
        let loaded = self.loader.load(&config, &[ALL_PACKAGES_PATTERN])?;
        let loaded_count = loaded.len();

        let error_count = packages::write_errors(diagnostics, &loaded);

        let mut packages = deduplicate_packages(loaded);
        sort_packages(&mut packages);

        tracing::info!(
            "Loaded {} packages ({} records, {} errors) from {}",
            packages.len(),
            loaded_count,
            error_count,
            dir
        );

        let outcome = LoadOutcome { packages, error_count };
        if let ModuleStatus::Ambiguous(paths) = outcome.module() {
            tracing::warn!("Packages belong to several modules: {}", paths.join(", "));
        }

        Ok(outcome)
    }
}

/// Load with the default loader, writing diagnostics to stderr.
pub fn load(dir: &TargetDirectory, include_tests: bool) -> Result<LoadOutcome> {
    PackageLoadPipeline::new().load(dir, include_tests)
}

/// Keep one record per import path and drop synthetic test binaries.
///
/// When a package is loaded together with its tests the loader returns a
/// production variant and a variant with the in-package test files as well.
/// The record with more files wins; on a tie the first one seen is kept.
/// The order of the result is unspecified.
pub fn deduplicate_packages(packages: Vec<Package>) -> Vec<Package> {
    let mut seen: HashMap<String, Package> = HashMap::new();

    for package in packages {
        if package.is_test_binary() {
            tracing::debug!("Skipping synthetic test binary {}", package.id);
            continue;
        }

        match seen.get(&package.pkg_path) {
            Some(existing) if package.go_files.len() <= existing.go_files.len() => {
                tracing::debug!("Discarding variant {} of {}", package.id, package.pkg_path);
            }
            _ => {
                seen.insert(package.pkg_path.clone(), package);
            }
        }
    }

    seen.into_values().collect()
}

/// Sort by import path, byte-wise ascending.
pub fn sort_packages(packages: &mut [Package]) {
    packages.sort_by(|a, b| a.pkg_path.as_bytes().cmp(b.pkg_path.as_bytes()));
}
