use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

/// Rewinds a kept-open file to its start and applies the given reader function.
///
/// Rewinding first leaves a file usable on the next cycle even if a previous
/// read failed halfway. Returns `Ok(None)` if the file is `None`.
pub fn rewind_and_read<T, R>(
    file: Option<&mut R>,
    reader: impl FnOnce(&mut R) -> std::io::Result<T>,
) -> std::io::Result<Option<T>>
where
    R: BufRead + Seek,
{
    let Some(f) = file else {
        return Ok(None);
    };
    f.seek(SeekFrom::Start(0))?;
    reader(f).map(Some)
}

/// Opens a file for repeated reads, logging at debug when it is unavailable.
pub fn open_file(path: impl AsRef<Path>) -> Option<BufReader<std::fs::File>> {
    match crate::fsutil::open_file_reader(path) {
        Ok(reader) => Some(reader),
        Err(err) => {
            log::debug!("{err}");
            None
        }
    }
}
