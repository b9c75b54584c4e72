use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodegraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to get current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    #[error("directory does not exist: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("'{}' is a file, not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("permission denied accessing '{}'", .0.display())]
    PermissionDenied(PathBuf),

    #[error("failed to resolve '{}': {source}", path.display())]
    Resolution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pattern '{0}'")]
    InvalidPattern(String),

    #[error("failed to load packages: {0}")]
    Driver(String),

    #[error("{0}")]
    InvalidArguments(String),
}

/// Coarse classification of [`CodegraphError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    IsAFile,
    PermissionDenied,
    Resolution,
    Load,
    Usage,
}

impl CodegraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodegraphError::DirectoryNotFound(_) => ErrorKind::NotFound,
            CodegraphError::NotADirectory(_) => ErrorKind::IsAFile,
            CodegraphError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            CodegraphError::Resolution { .. }
            | CodegraphError::CurrentDir(_)
            | CodegraphError::Io(_) => ErrorKind::Resolution,
            CodegraphError::InvalidPattern(_) | CodegraphError::Driver(_) => ErrorKind::Load,
            CodegraphError::InvalidArguments(_) => ErrorKind::Usage,
        }
    }
}

pub type Result<T> = std::result::Result<T, CodegraphError>;
