//! Shared capability surface of the two audio containers.
//!
//! ```no_run
//! use sa_audio::archive::AudioArchive;
//! use sa_audio::stream::{StreamArchive, StreamOptions};
//!
//! let mut ar = StreamArchive::load("AA", StreamOptions::default(), None)?;
//! for info in ar.entries() {
//!     println!("{:>4} {}", info.index, info.name);
//! }
//! ar.export(0, "out".as_ref())?;
//! ar.replace(0, std::fs::read("new.ogg")?)?;
//! ar.rebuild(None)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{ArchiveError, Result};

// ── Progress callback ─────────────────────────────────────────────────────────

/// Progress sink, called with `(completed, total)` at coarse granularity.
pub type ProgressFn<'a> = dyn FnMut(u64 /*completed*/, u64 /*total*/) + 'a;

// ── EntryInfo ─────────────────────────────────────────────────────────────────

/// Listing metadata for one track or sound.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryInfo {
    pub index:       usize,
    pub name:        String,
    /// Payload (OGG) or PCM byte length.
    pub size:        u64,
    /// Sample rate in Hz, when the container records one.
    pub sample_rate: Option<u32>,
    /// Playback length in seconds, when it can be worked out.
    pub duration:    Option<f64>,
    /// Replaced since load or the last rebuild.
    pub modified:    bool,
}

// ── AudioArchive ──────────────────────────────────────────────────────────────

/// Load → list → export/replace → rebuild contract implemented by both codecs.
///
/// Loading is a constructor on each concrete type because their inputs
/// differ.  Mutating operations take `&mut self`, so a single instance can
/// never have two of them in flight.
pub trait AudioArchive {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> Vec<EntryInfo>;

    /// Write entry `index` into `dest_dir` and return the file written.
    fn export(&self, index: usize, dest_dir: &Path) -> Result<PathBuf>;

    /// Export every entry in index order.  Stops at the first failure and
    /// returns it; files written before the failure are left in place.
    fn export_all(&self, dest_dir: &Path, mut progress: Option<&mut ProgressFn<'_>>) -> Result<Vec<PathBuf>> {
        let total = self.len();
        let mut written = Vec::with_capacity(total);
        for i in 0..total {
            written.push(self.export(i, dest_dir)?);
            if let Some(ref mut cb) = progress {
                cb(i as u64 + 1, total as u64);
            }
        }
        Ok(written)
    }

    fn replace(&mut self, index: usize, data: Vec<u8>) -> Result<()>;

    /// Write every pending change back to disk.
    fn rebuild(&mut self, progress: Option<&mut ProgressFn<'_>>) -> Result<()>;
}

// ── helpers ──────────────────────────────────────────────────────────────────

pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(ArchiveError::Index { index, len })
    }
}

/// Write `data` to `dest_dir/file_name`, creating the directory if necessary.
pub(crate) fn write_export(dest_dir: &Path, file_name: &str, data: &[u8]) -> Result<PathBuf> {
    if !dest_dir.exists() {
        fs::create_dir_all(dest_dir)?;
    }
    let path = dest_dir.join(file_name);
    fs::write(&path, data)?;
    Ok(path)
}
