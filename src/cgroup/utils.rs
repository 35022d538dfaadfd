use std::path::Path;

use crate::fsutil;

/// Opens `path` and applies `reader` to it.
///
/// Returns `Ok(None)` if the file does not exist, which is how the kernel signals that the
/// owning controller is not enabled for the group.
pub fn read_stat_file<T, F>(path: &Path, reader: F) -> std::io::Result<Option<T>>
where
    F: FnOnce(&mut std::io::BufReader<std::fs::File>) -> std::io::Result<T>,
{
    match fsutil::open_file_reader(path) {
        Ok(mut file) => reader(&mut file).map(Some),
        Err(err) if err.source.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.source),
    }
}
