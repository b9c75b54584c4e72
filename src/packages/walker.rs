use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::Result;
use crate::packages::gomod::GO_MOD;
use crate::packages::grammar::GoGrammar;
use crate::packages::pattern::Pattern;

/// Finds the Go source files matched by a set of patterns, applying the
/// directory rules of the go tool.
pub struct GoFileWalker {
    grammar: GoGrammar,
}

impl GoFileWalker {
    pub fn new() -> Self {
        Self { grammar: GoGrammar }
    }

    /// Collect every matched file under `dir`, without duplicates.
    pub fn walk_patterns(&self, dir: &Path, patterns: &[Pattern]) -> Result<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for pattern in patterns {
            let base = pattern.base(dir);
            if !base.is_dir() {
                tracing::debug!("Pattern base {} is not a directory", base.display());
                continue;
            }

            let found = if pattern.recursive {
                self.walk(&base)?
            } else {
                self.list(&base)?
            };

            for file in found {
                if seen.insert(file.clone()) {
                    files.push(file);
                }
            }
        }

        Ok(files)
    }

    /// Every source file in `root` and its package directories below.
    pub fn walk(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        // The go tool does not consult ignore files
        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .ignore(false)
            .parents(false)
            .filter_entry(|entry| {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                if !is_dir || entry.depth() == 0 {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                !is_skipped_dir(&name) && !entry.path().join(GO_MOD).is_file()
            })
            .build();

        for entry in walker {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && self.is_supported(path) {
                        files.push(path.to_path_buf());
                    }
                }
                Err(e) => tracing::warn!("Skipping unreadable entry under {}: {}", root.display(), e),
            }
        }

        Ok(files)
    }

    /// Source files directly inside `dir`.
    pub fn list(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && self.is_supported(&path) {
                files.push(path);
            }
        }
        Ok(files)
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        let ignored_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('_') || n.starts_with('.'))
            .unwrap_or(true);
        !ignored_name && self.grammar.is_source_file(path)
    }
}

impl Default for GoFileWalker {
    fn default() -> Self {
        Self::new()
    }
}

fn is_skipped_dir(name: &str) -> bool {
    name == "testdata" || name == "vendor" || name.starts_with('_') || name.starts_with('.')
}
