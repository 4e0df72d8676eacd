//! Error taxonomy shared by the stream and SFX codecs.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::wav::WavError;

#[derive(Error, Debug)]
pub enum ArchiveError {
    /// An archive, index file or directory the loader needs does not exist.
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),
    /// The stream file exists but could not be read for decryption.
    #[error("Cannot read {} for decryption: {source}", path.display())]
    Decrypt {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
    /// Structural violation in an archive (missing length field, truncated
    /// header, bank entry pointing outside its buffer).
    #[error("Parse error: {0}")]
    Parse(String),
    /// Replacement audio does not satisfy the container's constraints.
    #[error("Format error: {0}")]
    Format(#[from] WavError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Entry index {index} out of range ({len} entries)")]
    Index { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Read a whole file, mapping a missing path to [`ArchiveError::NotFound`].
pub(crate) fn read_existing(path: &std::path::Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ArchiveError::NotFound(path.to_owned()),
        _                       => ArchiveError::Io(e),
    })
}
