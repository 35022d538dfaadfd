use std::path::PathBuf;

use crate::fsutil;

/// Errors raised while accessing a cgroup through the unified hierarchy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid cgroup path `{0}`: must be absolute relative to the cgroup mount")]
    InvalidGroupPath(String),
    #[error("cgroup `{name}` does not exist at `{path}`")]
    NotFound { name: String, path: PathBuf },
    #[error(transparent)]
    FileOpen(#[from] fsutil::FileOpenError),
    #[error("failed to read directory `{path}`: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
