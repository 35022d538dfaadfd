use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

/// Error that occurs when opening a file fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to open file `{path}`: {source}")]
pub struct FileOpenError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Opens a file at the given path and wraps it in a [`BufReader`].
///
/// # Errors
///
/// Returns a [`FileOpenError`] if the file cannot be opened.
///
/// # Example
/// ```no_run
/// # use slurm_cgroup_exporter::fsutil;
/// let reader = fsutil::open_file_reader("/sys/fs/cgroup/cgroup.procs")?;
/// # Ok::<(), fsutil::FileOpenError>(())
/// ```
pub fn open_file_reader(path: impl AsRef<Path>) -> Result<BufReader<File>, FileOpenError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| FileOpenError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

/// Returns `true` if `path` exists and is not a directory.
///
/// Any error while checking (including permission problems) is treated as "does not exist".
pub fn file_exists(path: impl AsRef<Path>) -> bool {
    std::fs::metadata(path)
        .map(|metadata| !metadata.is_dir())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_open_file_reader_success() {
        let tmp = tempfile::NamedTempFile::new().expect("failed to create temp file");
        let reader = open_file_reader(tmp.path()).expect("should open test file");
        let metadata = reader.get_ref().metadata().unwrap();
        assert!(metadata.is_file());
    }

    #[test]
    fn test_open_file_reader_error() {
        let err = open_file_reader("/definitely/does/not/exist").unwrap_err();
        assert_eq!(err.path, PathBuf::from("/definitely/does/not/exist"));
        assert_eq!(err.source.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cpuset.cpus");
        assert!(!file_exists(&file));
        std::fs::write(&file, "0-3\n").unwrap();
        assert!(file_exists(&file));
        assert!(!file_exists(dir.path()));
    }
}
