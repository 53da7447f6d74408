//! Input containers
//!
//! | Suffix        | Opened as                                               |
//! |---------------|---------------------------------------------------------|
//! | `.data.dump`  | the file itself                                         |
//! | `.data.txt`   | the file itself                                         |
//! | `.trace.zip`  | first entry ending in `.data.dump`/`.data.txt`, in memory |
//!
//! Zip entries are not seekable, and the cursor needs `Seek` for long
//! rewinds, so the chosen entry is buffered into a `Vec` first.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;

use crate::domain::IngestError;

/// Suffixes of plain perf-script text dumps
pub const TEXT_SUFFIXES: [&str; 2] = [".data.dump", ".data.txt"];

/// Suffix of zip containers holding a text dump
pub const ZIP_SUFFIX: &str = ".trace.zip";

/// A readable, seekable trace stream
#[derive(Debug)]
pub enum InputStream {
    File(File),
    Memory(Cursor<Vec<u8>>),
}

impl InputStream {
    /// In-memory stream over `bytes`
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        InputStream::Memory(Cursor::new(bytes))
    }
}

impl Read for InputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            InputStream::File(file) => file.read(buf),
            InputStream::Memory(cursor) => cursor.read(buf),
        }
    }
}

impl Seek for InputStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            InputStream::File(file) => file.seek(pos),
            InputStream::Memory(cursor) => cursor.seek(pos),
        }
    }
}

/// True if `name` ends in one of [`TEXT_SUFFIXES`]
#[must_use]
pub fn is_text_trace(name: &str) -> bool {
    TEXT_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Open `path` according to its suffix.
///
/// # Errors
///
/// - [`IngestError::UnsupportedInput`] for any other suffix
/// - [`IngestError::MissingArchiveEntry`] for a zip without a text dump
/// - [`IngestError::Io`] / [`IngestError::Archive`] if the file cannot be read
pub fn open_input(path: &Path) -> Result<InputStream, IngestError> {
    let name = path.to_string_lossy();

    if is_text_trace(&name) {
        debug!("Opening text dump {}", path.display());
        return Ok(InputStream::File(File::open(path)?));
    }

    if name.ends_with(ZIP_SUFFIX) {
        return open_archive_entry(path);
    }

    Err(IngestError::UnsupportedInput(path.to_path_buf()))
}

fn open_archive_entry(path: &Path) -> Result<InputStream, IngestError> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if !entry.is_file() || !is_text_trace(entry.name()) {
            continue;
        }

        debug!("Reading archive entry {} from {}", entry.name(), path.display());
        let mut buf = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        io::copy(&mut entry, &mut buf)?;
        return Ok(InputStream::from_bytes(buf));
    }

    Err(IngestError::MissingArchiveEntry(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_suffixes() {
        assert!(is_text_trace("perf.data.txt"));
        assert!(is_text_trace("dir/perf.data.dump"));
        assert!(!is_text_trace("perf.data"));
        assert!(!is_text_trace("perf.trace.zip"));
    }

    #[test]
    fn test_unsupported_suffix_is_rejected_before_opening() {
        let err = open_input(Path::new("/nonexistent/trace.json")).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedInput(_)));
    }

    #[test]
    fn test_missing_text_file_is_io_error() {
        let err = open_input(Path::new("/nonexistent/perf.data.txt")).unwrap_err();
        assert!(matches!(err, IngestError::Io(_)));
    }

    #[test]
    fn test_memory_stream_reads_and_seeks() {
        let mut stream = InputStream::from_bytes(b"abcdef".to_vec());
        let mut buf = [0u8; 3];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");
        stream.seek(SeekFrom::Start(1)).unwrap();
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"bcd");
    }
}
