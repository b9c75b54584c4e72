//! Package patterns accepted by the loader.

use std::path::{Component, Path, PathBuf};

use crate::error::{CodegraphError, Result};

/// Wildcard suffix matching a directory and everything below it.
pub const RECURSIVE_SUFFIX: &str = "...";

/// A parsed package pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// Directory relative to the load directory
    pub relative: PathBuf,
    pub recursive: bool,
}

impl Pattern {
    /// Parse `.`, `./...`, `./<dir>` or `./<dir>/...`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || CodegraphError::InvalidPattern(raw.to_string());

        let rest = if raw == "." {
            ""
        } else {
            raw.strip_prefix("./").ok_or_else(invalid)?
        };

        let (dir, recursive) = if rest == RECURSIVE_SUFFIX {
            ("", true)
        } else if let Some(dir) = rest.strip_suffix("/...") {
            (dir, true)
        } else {
            (rest, false)
        };

        let relative = PathBuf::from(dir);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || dir.contains("...") {
            return Err(invalid());
        }

        Ok(Self { relative, recursive })
    }

    /// Directory the pattern starts at.
    pub fn base(&self, dir: &Path) -> PathBuf {
        if self.relative.as_os_str().is_empty() {
            dir.to_path_buf()
        } else {
            dir.join(&self.relative)
        }
    }
}
