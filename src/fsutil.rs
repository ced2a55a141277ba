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

impl From<FileOpenError> for io::Error {
    fn from(err: FileOpenError) -> Self {
        err.source
    }
}

/// Opens `path` wrapped in a [`BufReader`].
///
/// # Errors
///
/// Returns a [`FileOpenError`] if the file cannot be opened.
///
/// # Example
/// ```no_run
/// # use host_pulse::fsutil;
/// let reader = fsutil::open_file_reader("/proc/meminfo")?;
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

/// Opens `path` once and hands the reader to `parse`.
///
/// Used for files that come and go between cycles, such as `/proc/<pid>/*`,
/// where keeping a handle open is pointless.
///
/// # Errors
///
/// Returns the open error's source or whatever `parse` returns.
pub fn read_file_with<T>(
    path: impl AsRef<Path>,
    parse: impl FnOnce(&mut BufReader<File>) -> io::Result<T>,
) -> io::Result<T> {
    let mut reader = open_file_reader(path)?;
    parse(&mut reader)
}
