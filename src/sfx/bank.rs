//! Bank header decoding and per-sound length inference.
//!
//! A bank is a 4804-byte header followed by the PCM of its sounds:
//!
//! ```text
//! 0x0000: count        u16
//! 0x0002: (unused)     u16
//! 0x0004: sound table  count × { pcm_offset u32, _ u32, sample_rate u16, _ u16 }
//! 0x12C4: PCM data     (offsets in the table are relative to here)
//! ```
//!
//! A sound's length is the gap to the next sound's offset; the last sound
//! runs to the bank size from the lookup index.

use byteorder::{ByteOrder, LittleEndian};

use crate::wav::DEFAULT_SAMPLE_RATE;

pub const BANK_HEADER_SIZE: usize = 4804;
pub const SOUND_TABLE_OFFSET: usize = 4;
pub const SOUND_RECORD_SIZE: usize = 12;
/// Largest sound count whose table still fits in the header.
pub const MAX_SOUNDS: usize = (BANK_HEADER_SIZE - SOUND_TABLE_OFFSET) / SOUND_RECORD_SIZE;

/// One row of a bank's sound table with its inferred length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundSlot {
    /// Position in the bank's table.
    pub index:       usize,
    /// Offset of the PCM relative to the end of the bank header.
    pub pcm_offset:  u32,
    pub length:      usize,
    /// Declared rate, with 0 already replaced by the default.
    pub sample_rate: u32,
}

/// Decode the sound table of `header` (exactly [`BANK_HEADER_SIZE`] bytes)
/// and infer each sound's length from the next offset or `bank_size`.
///
/// Returns a description of the problem when the table is inconsistent.
pub fn parse_sound_table(header: &[u8], bank_size: u32) -> Result<Vec<SoundSlot>, String> {
    if header.len() < BANK_HEADER_SIZE {
        return Err(format!("bank header is {} bytes, expected {BANK_HEADER_SIZE}", header.len()));
    }
    let count = usize::from(LittleEndian::read_u16(&header[0..2]));
    if count > MAX_SOUNDS {
        return Err(format!("bank declares {count} sounds, header holds at most {MAX_SOUNDS}"));
    }

    let record = |i: usize| {
        let at = SOUND_TABLE_OFFSET + i * SOUND_RECORD_SIZE;
        let pcm_offset = LittleEndian::read_u32(&header[at..at + 4]);
        let rate       = LittleEndian::read_u16(&header[at + 8..at + 10]);
        (pcm_offset, rate)
    };

    let mut slots = Vec::with_capacity(count);
    for i in 0..count {
        let (pcm_offset, rate) = record(i);
        let end = if i + 1 < count { record(i + 1).0 } else { bank_size };
        let length = end.checked_sub(pcm_offset).ok_or_else(|| format!(
            "sound {i} starts at {pcm_offset} but its region ends at {end}"
        ))?;
        slots.push(SoundSlot {
            index: i,
            pcm_offset,
            length: length as usize,
            sample_rate: if rate == 0 { DEFAULT_SAMPLE_RATE } else { u32::from(rate) },
        });
    }
    Ok(slots)
}
