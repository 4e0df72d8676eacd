//! Music stream container codec.
//!
//! # Layout
//! A stream file is a sequence of `[header (8068 B) | payload]` blocks, the
//! whole file XOR-obfuscated with a repeating 16-byte key (see
//! [`crate::crypto`]).  Each payload is an Ogg Vorbis file.  Its length is
//! not stored at a fixed place: the header carries eight candidate length
//! fields at 8000, 8008, …, 8056 and the first one that is not the
//! `0xCDCDCDCD` sentinel is the real one.
//!
//! # Loading
//! The whole file is read into memory and decrypted in one pass, then
//! scanned block by block.  Any malformed track is fatal to the load; there
//! is no smaller unit of recovery than "the rest of the file".  Bytes after
//! the last complete block (fewer than a header's worth) are kept as a
//! trailer so that a rebuild reproduces the input exactly.
//!
//! # Rebuilding
//! Headers and (possibly replaced) payloads are concatenated in order,
//! re-encrypted, and written over the target file.  Headers are never
//! rewritten, so a replacement whose length differs from the declared one
//! produces a file that readers trusting the header cannot walk.

mod track;

pub use track::{
    Track, TrackHeader, LENGTH_SENTINEL, LENGTH_TABLE_OFFSET, LENGTH_TABLE_SLOTS,
    LENGTH_TABLE_STRIDE, TRACK_HEADER_SIZE,
};

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::archive::{check_index, write_export, AudioArchive, EntryInfo, ProgressFn};
use crate::crypto::XorKey;
use crate::error::{ArchiveError, Result};

// ── StreamOptions ─────────────────────────────────────────────────────────────

/// Configuration for [`StreamArchive::load`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamOptions {
    /// Key used to decrypt on load and encrypt on rebuild.
    pub key: XorKey,
}

// ── StreamArchive ─────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct StreamArchive {
    path:    PathBuf,
    key:     XorKey,
    tracks:  Vec<Track>,
    trailer: Vec<u8>,
}

impl StreamArchive {
    // ── Constructors ─────────────────────────────────────────────────────────

    /// Read, decrypt and parse the stream file at `path`.
    ///
    /// `progress` receives byte counts during decryption and again while
    /// tracks are parsed.
    pub fn load<P: AsRef<Path>>(
        path:         P,
        opts:         StreamOptions,
        mut progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let mut data = fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ArchiveError::NotFound(path.clone()),
            _ => ArchiveError::Decrypt { path: path.clone(), source: e },
        })?;

        opts.key.apply_with_progress(&mut data, progress.as_deref_mut());

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "track".to_owned());
        let (tracks, trailer) = parse_tracks(&data, &stem, progress)?;

        info!(
            path = %path.display(),
            tracks = tracks.len(),
            trailer = trailer.len(),
            "loaded stream archive"
        );
        Ok(Self { path, key: opts.key, tracks, trailer })
    }

    /// Build an archive from already-decrypted bytes.  Nothing is read from
    /// `path`; it is only the default rebuild target and the name stem.
    pub fn from_decrypted<P: AsRef<Path>>(path: P, opts: StreamOptions, data: &[u8]) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "track".to_owned());
        let (tracks, trailer) = parse_tracks(data, &stem, None)?;
        Ok(Self { path, key: opts.key, tracks, trailer })
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn path(&self) -> &Path { &self.path }

    pub fn tracks(&self) -> &[Track] { &self.tracks }

    pub fn track(&self, index: usize) -> Result<&Track> {
        check_index(index, self.tracks.len())?;
        Ok(&self.tracks[index])
    }

    /// Bytes that followed the last complete track.
    pub fn trailer(&self) -> &[u8] { &self.trailer }

    pub fn is_modified(&self) -> bool {
        self.tracks.iter().any(|t| t.modified)
    }

    // ── Rebuild ──────────────────────────────────────────────────────────────

    /// Serialise every track (header then payload) followed by the trailer,
    /// unencrypted.
    pub fn to_decrypted(&self, mut progress: Option<&mut ProgressFn<'_>>) -> Vec<u8> {
        let total: usize = self.tracks.iter()
            .map(|t| TRACK_HEADER_SIZE + t.payload.len())
            .sum::<usize>()
            + self.trailer.len();

        let mut buf = Vec::with_capacity(total);
        for t in &self.tracks {
            buf.extend_from_slice(t.header.as_bytes());
            if let Some(ref mut cb) = progress {
                cb(buf.len() as u64, total as u64);
            }
            buf.extend_from_slice(&t.payload);
            if let Some(ref mut cb) = progress {
                cb(buf.len() as u64, total as u64);
            }
        }
        buf.extend_from_slice(&self.trailer);
        buf
    }

    /// Re-encrypt the archive and write it to `path`.
    pub fn rebuild_to<P: AsRef<Path>>(&mut self, path: P, mut progress: Option<&mut ProgressFn<'_>>) -> Result<()> {
        let path = path.as_ref();
        let mut buf = self.to_decrypted(progress.as_deref_mut());
        self.key.apply_with_progress(&mut buf, progress);
        fs::write(path, &buf)?;

        for t in &mut self.tracks {
            t.modified = false;
        }
        info!(path = %path.display(), bytes = buf.len(), tracks = self.tracks.len(), "rebuilt stream archive");
        Ok(())
    }
}

impl AudioArchive for StreamArchive {
    fn len(&self) -> usize {
        self.tracks.len()
    }

    fn entries(&self) -> Vec<EntryInfo> {
        self.tracks
            .iter()
            .map(|t| EntryInfo {
                index:       t.index,
                name:        t.name.clone(),
                size:        t.payload.len() as u64,
                sample_rate: None,
                duration:    t.duration_secs(),
                modified:    t.modified,
            })
            .collect()
    }

    fn export(&self, index: usize, dest_dir: &Path) -> Result<PathBuf> {
        let t = self.track(index)?;
        write_export(dest_dir, &t.file_name(), &t.payload)
    }

    fn replace(&mut self, index: usize, data: Vec<u8>) -> Result<()> {
        check_index(index, self.tracks.len())?;
        let t = &mut self.tracks[index];
        if t.declared_len() != Some(data.len()) {
            warn!(
                track = %t.name,
                declared = ?t.declared_len(),
                new_len = data.len(),
                "replacement length differs from the header's length field; \
                 the header is kept as-is"
            );
        }
        debug!(track = %t.name, old_len = t.payload.len(), new_len = data.len(), "replacing payload");
        t.payload  = data;
        t.modified = true;
        Ok(())
    }

    fn rebuild(&mut self, progress: Option<&mut ProgressFn<'_>>) -> Result<()> {
        let path = self.path.clone();
        self.rebuild_to(path, progress)
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Walk decrypted stream bytes into tracks plus the leftover trailer.
fn parse_tracks(
    data:         &[u8],
    stem:         &str,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> Result<(Vec<Track>, Vec<u8>)> {
    let total = data.len() as u64;
    let mut tracks = Vec::new();
    let mut offset = 0usize;

    while data.len() - offset >= TRACK_HEADER_SIZE {
        let header = TrackHeader::from_slice(&data[offset..offset + TRACK_HEADER_SIZE])?;
        let len = header.payload_len().map_err(|_| ArchiveError::Parse(format!(
            "track {} at offset {offset}: no valid length field", tracks.len() + 1
        )))?;

        let start = offset + TRACK_HEADER_SIZE;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| ArchiveError::Parse(format!(
                "track {} at offset {offset}: payload of {len} bytes runs past end of file ({} bytes)",
                tracks.len() + 1, data.len()
            )))?;

        let index = tracks.len();
        tracks.push(Track {
            index,
            name:     format!("{stem}_{}", index + 1),
            header,
            payload:  data[start..end].to_vec(),
            modified: false,
        });
        offset = end;

        if let Some(ref mut cb) = progress {
            cb(offset as u64, total);
        }
    }

    if tracks.is_empty() {
        return Err(ArchiveError::Parse(format!(
            "no track header found in {} bytes", data.len()
        )));
    }
    Ok((tracks, data[offset..].to_vec()))
}
