//! Resolution of the user-supplied target directory.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{CodegraphError, Result};

/// A canonical, absolute path that was verified to be an accessible directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetDirectory {
    path: PathBuf,
}

impl TargetDirectory {
    /// Resolve raw input into a target directory.
    ///
    /// An empty input means the current working directory. Relative input is
    /// made absolute against the current working directory, then every symlink
    /// along the path is resolved before the result is validated. Any failure
    /// to resolve symlinks is a resolution error carrying the absolute path.
    pub fn resolve(input: &str) -> Result<Self> {
        let absolute = if input.is_empty() {
            std::env::current_dir().map_err(CodegraphError::CurrentDir)?
        } else {
            std::path::absolute(input).map_err(|source| CodegraphError::Resolution {
                path: PathBuf::from(input),
                source,
            })?
        };

        let canonical = absolute
            .canonicalize()
            .map_err(|source| CodegraphError::Resolution {
                path: absolute.clone(),
                source,
            })?;

        let target = Self { path: canonical };
        target.validate()?;

        tracing::debug!("Resolved target directory {}", target.path.display());
        Ok(target)
    }

    /// Check that the path still exists and is a directory.
    pub fn validate(&self) -> Result<()> {
        let metadata =
            std::fs::metadata(&self.path).map_err(|e| classify_io_error(&self.path, e))?;

        if !metadata.is_dir() {
            return Err(CodegraphError::NotADirectory(self.path.clone()));
        }

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.path
    }
}

impl AsRef<Path> for TargetDirectory {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for TargetDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

fn classify_io_error(path: &Path, error: io::Error) -> CodegraphError {
    match error.kind() {
        io::ErrorKind::NotFound => CodegraphError::DirectoryNotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => CodegraphError::PermissionDenied(path.to_path_buf()),
        // A file used as an intermediate path component
        io::ErrorKind::NotADirectory => CodegraphError::NotADirectory(path.to_path_buf()),
        _ => CodegraphError::Resolution {
            path: path.to_path_buf(),
            source: error,
        },
    }
}
