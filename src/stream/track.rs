use byteorder::{ByteOrder, LittleEndian};

use crate::error::{ArchiveError, Result};
use crate::ogg;

/// Every track starts with a header of exactly this many bytes.
pub const TRACK_HEADER_SIZE: usize = 8068;
/// Header-local offset of the first candidate payload-length field.
pub const LENGTH_TABLE_OFFSET: usize = 8000;
/// Distance between candidate length fields.
pub const LENGTH_TABLE_STRIDE: usize = 8;
/// Number of candidate length fields.
pub const LENGTH_TABLE_SLOTS: usize = 8;
/// Placeholder stored in unused length fields.
pub const LENGTH_SENTINEL: u32 = 0xCDCD_CDCD;

/// Opaque fixed-size track header.  Never modified after parsing.
#[derive(Clone, PartialEq, Eq)]
pub struct TrackHeader(Box<[u8; TRACK_HEADER_SIZE]>);

impl TrackHeader {
    /// Copy a header out of `bytes`, which must be exactly
    /// [`TRACK_HEADER_SIZE`] long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let boxed: Box<[u8; TRACK_HEADER_SIZE]> = bytes
            .to_vec()
            .into_boxed_slice()
            .try_into()
            .map_err(|b: Box<[u8]>| ArchiveError::Parse(format!(
                "track header must be {TRACK_HEADER_SIZE} bytes, got {}", b.len()
            )))?;
        Ok(Self(boxed))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }

    /// Slot index and value of the first length field that is not
    /// [`LENGTH_SENTINEL`].
    pub fn length_field(&self) -> Option<(usize, u32)> {
        (0..LENGTH_TABLE_SLOTS).find_map(|slot| {
            let at = LENGTH_TABLE_OFFSET + slot * LENGTH_TABLE_STRIDE;
            let value = LittleEndian::read_u32(&self.0[at..at + 4]);
            (value != LENGTH_SENTINEL).then_some((slot, value))
        })
    }

    /// Payload length declared by the header.
    pub fn payload_len(&self) -> Result<usize> {
        self.length_field()
            .map(|(_, len)| len as usize)
            .ok_or_else(|| ArchiveError::Parse("track header has no valid length field".into()))
    }
}

impl std::fmt::Debug for TrackHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackHeader")
            .field("length_field", &self.length_field())
            .finish_non_exhaustive()
    }
}

/// One header + OGG payload block of a stream file.
#[derive(Debug, Clone)]
pub struct Track {
    pub index:    usize,
    pub name:     String,
    pub header:   TrackHeader,
    pub payload:  Vec<u8>,
    pub modified: bool,
}

impl Track {
    /// Length the header declares, which may disagree with `payload.len()`
    /// after a replacement.
    pub fn declared_len(&self) -> Option<usize> {
        self.header.length_field().map(|(_, len)| len as usize)
    }

    pub fn duration_secs(&self) -> Option<f64> {
        ogg::duration_secs(&self.payload)
    }

    pub fn file_name(&self) -> String {
        format!("{}.ogg", self.name)
    }
}
