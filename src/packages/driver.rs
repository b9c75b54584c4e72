//! Tree-sitter backed [`PackageLoader`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use rayon::prelude::*;

use crate::error::{CodegraphError, Result};
use crate::packages::gomod::find_module;
use crate::packages::grammar::GoGrammar;
use crate::packages::parser::{DeclarationKind, ParsedGoFile, SourceParser};
use crate::packages::pattern::Pattern;
use crate::packages::walker::GoFileWalker;
use crate::packages::{
    LoadConfig, LoadMode, Module, Package, PackageError, PackageErrorKind, PackageKind, PackageLoader,
    TEST_BINARY_SUFFIX,
};

const EXTERNAL_TEST_SUFFIX: &str = "_test";

/// Loads Go packages straight from source.
pub struct GoLoader {
    walker: GoFileWalker,
    parser: SourceParser,
}

impl GoLoader {
    pub fn new() -> Self {
        Self {
            walker: GoFileWalker::new(),
            parser: SourceParser::new(),
        }
    }

    fn check_dir(dir: &Path) -> Result<()> {
        let metadata = std::fs::metadata(dir)
            .map_err(|e| CodegraphError::Driver(format!("cannot use directory {}: {}", dir.display(), e)))?;
        if !metadata.is_dir() {
            return Err(CodegraphError::Driver(format!("{} is not a directory", dir.display())));
        }
        Ok(())
    }

    fn check_grammar() -> Result<()> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&GoGrammar.language())
            .map_err(|e| CodegraphError::Driver(format!("failed to initialise Go grammar: {}", e)))
    }
}

impl Default for GoLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageLoader for GoLoader {
    fn load(&self, config: &LoadConfig, patterns: &[&str]) -> Result<Vec<Package>> {
        let patterns = if patterns.is_empty() {
            vec![Pattern::parse(".")?]
        } else {
            patterns.iter().map(|p| Pattern::parse(p)).collect::<Result<Vec<_>>>()?
        };

        Self::check_dir(&config.dir)?;
        Self::check_grammar()?;

        let module = find_module(&config.dir);
        let mut files = self
            .walker
            .walk_patterns(&config.dir, &patterns)
            .map_err(|e| CodegraphError::Driver(e.to_string()))?;
        if !config.tests {
            files.retain(|f| !is_test_path(f));
        }

        let parsed = files
            .par_iter()
            .map(|file| self.parser.parse_file(file))
            .collect::<Result<Vec<_>>>()?;

        let mut by_dir: HashMap<PathBuf, Vec<ParsedGoFile>> = HashMap::new();
        for file in parsed {
            let dir = file.path.parent().map(Path::to_path_buf).unwrap_or_default();
            by_dir.entry(dir).or_default().push(file);
        }

        let mut packages = Vec::new();
        for (dir, mut dir_files) in by_dir {
            dir_files.sort_by(|a, b| a.path.cmp(&b.path));
            let import_path = import_path(&dir, &config.dir, module.as_ref());
            let builder = PackageBuilder {
                dir: &dir,
                import_path: &import_path,
                module: module.as_ref(),
                mode: config.mode,
            };
            packages.extend(builder.build(&dir_files, config.tests));
        }

        tracing::debug!(
            "Loaded {} package records from {} files under {}",
            packages.len(),
            files.len(),
            config.dir.display()
        );

        Ok(packages)
    }
}

fn is_test_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with("_test.go"))
        .unwrap_or(false)
}

/// Import path of the package in `dir`: module-relative when a module is
/// known, otherwise relative to the load directory (`.` for the directory itself).
fn import_path(dir: &Path, root: &Path, module: Option<&Module>) -> String {
    let (base, prefix) = match module {
        Some(module) => (module.dir.as_path(), Some(module.path.as_str())),
        None => (root, None),
    };

    let relative: Vec<String> = match dir.strip_prefix(base) {
        Ok(rel) => rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect(),
        Err(_) => return dir.to_string_lossy().replace('\\', "/"),
    };

    match (prefix, relative.is_empty()) {
        (Some(prefix), true) => prefix.to_string(),
        (Some(prefix), false) => format!("{}/{}", prefix, relative.join("/")),
        (None, true) => ".".to_string(),
        (None, false) => relative.join("/"),
    }
}

struct PackageBuilder<'a> {
    dir: &'a Path,
    import_path: &'a str,
    module: Option<&'a Module>,
    mode: LoadMode,
}

impl<'a> PackageBuilder<'a> {
    /// Emit the records for one directory, following the variant layout of `go list -test`.
    fn build(&self, files: &[ParsedGoFile], tests: bool) -> Vec<Package> {
        let production: Vec<&ParsedGoFile> = files.iter().filter(|f| !f.is_test_file()).collect();
        let production_name = production.iter().find_map(|f| f.package_name.clone());

        let (external, internal): (Vec<&ParsedGoFile>, Vec<&ParsedGoFile>) = files
            .iter()
            .filter(|f| f.is_test_file())
            .partition(|f| match &f.package_name {
                Some(name) => name.ends_with(EXTERNAL_TEST_SUFFIX) && Some(name) != production_name.as_ref(),
                None => false,
            });

        let mut packages = Vec::new();
        if production.is_empty() && internal.is_empty() && external.is_empty() {
            return packages;
        }

        if !production.is_empty() || !internal.is_empty() {
            packages.push(self.package(
                self.import_path.to_string(),
                self.import_path.to_string(),
                PackageKind::Library,
                &production,
            ));
        }

        if !tests {
            return packages;
        }

        let binary_path = format!("{}{}", self.import_path, TEST_BINARY_SUFFIX);
        let mut binary_imports = Vec::new();

        if !internal.is_empty() {
            let combined: Vec<&ParsedGoFile> = production.iter().chain(internal.iter()).copied().collect();
            packages.push(self.package(
                format!("{} [{}]", self.import_path, binary_path),
                self.import_path.to_string(),
                PackageKind::TestVariant,
                &combined,
            ));
            binary_imports.push(self.import_path.to_string());
        }

        if !external.is_empty() {
            let external_path = format!("{}{}", self.import_path, EXTERNAL_TEST_SUFFIX);
            packages.push(self.package(
                format!("{} [{}]", external_path, binary_path),
                external_path.clone(),
                PackageKind::ExternalTest,
                &external,
            ));
            binary_imports.push(external_path);
        }

        if !internal.is_empty() || !external.is_empty() {
            let mut binary = Package::new(binary_path.clone(), binary_path, PackageKind::TestBinary, self.dir);
            if self.mode.contains(LoadMode::NEED_NAME) {
                binary.name = "main".to_string();
            }
            if self.mode.contains(LoadMode::NEED_IMPORTS) {
                binary_imports.sort();
                binary.imports = binary_imports;
            }
            if self.mode.contains(LoadMode::NEED_MODULE) {
                binary.module = self.module.cloned();
            }
            packages.push(binary);
        }

        packages
    }

    fn package(&self, id: String, pkg_path: String, kind: PackageKind, files: &[&ParsedGoFile]) -> Package {
        let mut package = Package::new(id, pkg_path, kind, self.dir);

        if self.mode.contains(LoadMode::NEED_NAME) {
            package.name = files
                .iter()
                .find_map(|f| f.package_name.clone())
                .unwrap_or_default();
        }

        if self.mode.contains(LoadMode::NEED_FILES) {
            package.go_files = files.iter().map(|f| f.path.clone()).collect();
        }

        if self.mode.contains(LoadMode::NEED_IMPORTS) {
            let imports: BTreeSet<&str> = files
                .iter()
                .flat_map(|f| f.imports.iter().map(String::as_str))
                .collect();
            package.imports = imports.into_iter().map(str::to_string).collect();
        }

        if self.mode.contains(LoadMode::NEED_MODULE) {
            package.module = self.module.cloned();
        }

        if let Some(error) = mixed_package_error(files, self.dir) {
            package.errors.push(error);
        }
        for file in files {
            package.errors.extend(file.errors.iter().cloned());
        }

        if self.mode.contains(LoadMode::NEED_TYPES) {
            let names: BTreeSet<&str> = files
                .iter()
                .flat_map(|f| f.declarations.iter().map(|d| d.name.as_str()))
                .filter(|name| *name != "_")
                .collect();
            package.declarations = names.into_iter().map(str::to_string).collect();
            package.errors.extend(redeclarations(files));

            // Trees are only kept by the type phase
            if self.mode.contains(LoadMode::NEED_SYNTAX) {
                package.syntax = files.iter().filter_map(|f| f.syntax.clone()).collect();
            }
        }

        package
    }
}

fn mixed_package_error(files: &[&ParsedGoFile], dir: &Path) -> Option<PackageError> {
    let mut named = files
        .iter()
        .filter_map(|f| f.package_name.as_deref().map(|name| (name, &f.path)));
    let (first_name, first_file) = named.next()?;
    let (other_name, other_file) = named.find(|(name, _)| *name != first_name)?;

    Some(PackageError::new(
        PackageErrorKind::List,
        format!(
            "found packages {} ({}) and {} ({}) in {}",
            first_name,
            file_name(first_file),
            other_name,
            file_name(other_file),
            dir.display()
        ),
    ))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn redeclarations(files: &[&ParsedGoFile]) -> Vec<PackageError> {
    let mut seen = HashSet::new();
    let mut errors = Vec::new();

    for declaration in files.iter().flat_map(|f| f.declarations.iter()) {
        let exempt = declaration.name == "_"
            || (declaration.name == "init" && declaration.kind == DeclarationKind::Func);
        if exempt {
            continue;
        }
        if !seen.insert(declaration.name.as_str()) {
            errors.push(
                PackageError::new(
                    PackageErrorKind::Type,
                    format!("{} redeclared in this block", declaration.name),
                )
                .at(declaration.position.clone()),
            );
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const ALL: LoadMode = LoadMode::NEED_NAME
        .union(LoadMode::NEED_FILES)
        .union(LoadMode::NEED_IMPORTS)
        .union(LoadMode::NEED_SYNTAX)
        .union(LoadMode::NEED_TYPES)
        .union(LoadMode::NEED_MODULE);

    fn create_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn module_dir() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "go.mod", "module testmod\n\ngo 1.24\n");
        temp_dir
    }

    fn load(dir: &Path, mode: LoadMode, tests: bool) -> Vec<Package> {
        let config = LoadConfig::new(dir.canonicalize().unwrap(), mode).with_tests(tests);
        GoLoader::new().load(&config, &["./..."]).unwrap()
    }

    fn find<'a>(packages: &'a [Package], id: &str) -> &'a Package {
        packages
            .iter()
            .find(|p| p.id == id)
            .unwrap_or_else(|| panic!("no package {}", id))
    }

    #[test]
    fn test_load_single_package() {
        let temp_dir = module_dir();
        create_file(temp_dir.path(), "main.go", "package main\n\nimport \"fmt\"\n\nfunc main() { fmt.Println() }\n");

        let packages = load(temp_dir.path(), ALL, false);

        assert_eq!(packages.len(), 1);
        let package = &packages[0];
        assert_eq!(package.pkg_path, "testmod");
        assert_eq!(package.name, "main");
        assert_eq!(package.kind, PackageKind::Library);
        assert_eq!(package.imports, vec!["fmt"]);
        assert_eq!(package.declarations, vec!["main"]);
        assert_eq!(package.go_files.len(), 1);
        assert_eq!(package.syntax.len(), 1);
        assert_eq!(package.module.as_ref().unwrap().path, "testmod");
        assert!(package.errors.is_empty());
    }

    #[test]
    fn test_load_nested_import_paths() {
        let temp_dir = module_dir();
        create_file(temp_dir.path(), "internal/store/store.go", "package store\n");

        let packages = load(temp_dir.path(), ALL, false);

        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].pkg_path, "testmod/internal/store");
    }

    #[test]
    fn test_load_without_module_uses_relative_paths() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "root.go", "package root\n");
        create_file(temp_dir.path(), "a/b/b.go", "package b\n");

        let mut paths: Vec<_> = load(temp_dir.path(), ALL, false)
            .into_iter()
            .map(|p| {
                assert!(p.module.is_none());
                p.pkg_path
            })
            .collect();
        paths.sort();

        assert_eq!(paths, vec![".", "a/b"]);
    }

    #[test]
    fn test_load_test_variants() {
        let temp_dir = module_dir();
        create_file(temp_dir.path(), "calc/calc.go", "package calc\n\nfunc Add(a, b int) int { return a + b }\n");
        create_file(temp_dir.path(), "calc/calc_test.go", "package calc\n\nimport \"testing\"\n\nfunc TestAdd(t *testing.T) {}\n");
        create_file(temp_dir.path(), "calc/example_test.go", "package calc_test\n\nimport \"testmod/calc\"\n\nvar _ = calc.Add\n");

        let packages = load(temp_dir.path(), ALL, true);

        assert_eq!(packages.len(), 4);

        let library = find(&packages, "testmod/calc");
        assert_eq!(library.kind, PackageKind::Library);
        assert_eq!(library.go_files.len(), 1);

        let variant = find(&packages, "testmod/calc [testmod/calc.test]");
        assert_eq!(variant.kind, PackageKind::TestVariant);
        assert_eq!(variant.pkg_path, "testmod/calc");
        assert_eq!(variant.go_files.len(), 2);
        assert_eq!(variant.imports, vec!["testing"]);

        let external = find(&packages, "testmod/calc_test [testmod/calc.test]");
        assert_eq!(external.kind, PackageKind::ExternalTest);
        assert_eq!(external.pkg_path, "testmod/calc_test");
        assert_eq!(external.name, "calc_test");
        assert_eq!(external.imports, vec!["testmod/calc"]);

        let binary = find(&packages, "testmod/calc.test");
        assert_eq!(binary.kind, PackageKind::TestBinary);
        assert_eq!(binary.name, "main");
        assert!(binary.go_files.is_empty());
        assert!(binary.is_test_binary());
    }

    #[test]
    fn test_load_excludes_test_files_when_disabled() {
        let temp_dir = module_dir();
        create_file(temp_dir.path(), "calc/calc.go", "package calc\n");
        create_file(temp_dir.path(), "calc/calc_test.go", "package calc\n");
        create_file(temp_dir.path(), "onlytests/x_test.go", "package onlytests\n");

        let packages = load(temp_dir.path(), ALL, false);

        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].pkg_path, "testmod/calc");
        assert_eq!(packages[0].go_files.len(), 1);
    }

    #[test]
    fn test_load_reports_mixed_package_names() {
        let temp_dir = module_dir();
        create_file(temp_dir.path(), "a.go", "package a\n");
        create_file(temp_dir.path(), "b.go", "package b\n");

        let packages = load(temp_dir.path(), ALL, false);

        assert_eq!(packages.len(), 1);
        let error = &packages[0].errors[0];
        assert_eq!(error.kind, PackageErrorKind::List);
        assert!(error.message.starts_with("found packages a (a.go) and b (b.go)"));
    }

    #[test]
    fn test_load_reports_redeclaration_only_with_types() {
        let temp_dir = module_dir();
        create_file(temp_dir.path(), "a.go", "package dup\n\nfunc init() {}\n\nfunc Run() {}\n");
        create_file(temp_dir.path(), "b.go", "package dup\n\nfunc init() {}\n\nfunc Run() {}\n");

        let typed = load(temp_dir.path(), ALL, false);
        let type_errors: Vec<_> = typed[0]
            .errors
            .iter()
            .filter(|e| e.kind == PackageErrorKind::Type)
            .collect();
        assert_eq!(type_errors.len(), 1);
        assert_eq!(type_errors[0].message, "Run redeclared in this block");
        assert!(type_errors[0].position.as_ref().unwrap().file.ends_with("b.go"));

        let untyped = load(temp_dir.path(), LoadMode::NEED_NAME | LoadMode::NEED_FILES, false);
        assert!(untyped[0].errors.is_empty());
    }

    #[test]
    fn test_syntax_requires_types() {
        let temp_dir = module_dir();
        create_file(temp_dir.path(), "main.go", "package main\n");

        let without_types = load(temp_dir.path(), LoadMode::NEED_NAME | LoadMode::NEED_SYNTAX, false);
        assert!(without_types[0].syntax.is_empty());

        let with_types = load(
            temp_dir.path(),
            LoadMode::NEED_NAME | LoadMode::NEED_SYNTAX | LoadMode::NEED_TYPES,
            false,
        );
        assert_eq!(with_types[0].syntax.len(), 1);
    }

    #[test]
    fn test_mode_limits_populated_fields() {
        let temp_dir = module_dir();
        create_file(temp_dir.path(), "main.go", "package main\n\nimport \"os\"\n");

        let packages = load(temp_dir.path(), LoadMode::empty(), false);

        let package = &packages[0];
        assert_eq!(package.pkg_path, "testmod");
        assert!(package.name.is_empty());
        assert!(package.go_files.is_empty());
        assert!(package.imports.is_empty());
        assert!(package.module.is_none());
    }

    #[test]
    fn test_invalid_pattern_is_hard_error() {
        let temp_dir = module_dir();
        let config = LoadConfig::new(temp_dir.path(), ALL);

        let err = GoLoader::new().load(&config, &["fmt"]).unwrap_err();
        assert!(matches!(err, CodegraphError::InvalidPattern(_)));
    }

    #[test]
    fn test_missing_directory_is_hard_error() {
        let config = LoadConfig::new("/nonexistent/codegraph/dir", ALL);

        let err = GoLoader::new().load(&config, &["./..."]).unwrap_err();
        assert!(matches!(err, CodegraphError::Driver(_)));
    }

    #[test]
    fn test_import_path_rules() {
        let module = Module {
            path: "example.com/app".to_string(),
            dir: PathBuf::from("/src/app"),
            go_version: None,
        };

        assert_eq!(import_path(Path::new("/src/app"), Path::new("/src/app"), Some(&module)), "example.com/app");
        assert_eq!(
            import_path(Path::new("/src/app/pkg/util"), Path::new("/src/app/pkg"), Some(&module)),
            "example.com/app/pkg/util"
        );
        assert_eq!(import_path(Path::new("/src/x"), Path::new("/src/x"), None), ".");
        assert_eq!(import_path(Path::new("/src/x/y"), Path::new("/src/x"), None), "y");
    }
}
