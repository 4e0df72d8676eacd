//! Best-effort duration probe for the Ogg Vorbis payloads of stream tracks.
//!
//! Only page headers are inspected: the sample rate comes from the Vorbis
//! identification packet on the first page and the sample count from the
//! granule position of the last page.  Nothing is decoded.

pub const PAGE_MAGIC: &[u8; 4] = b"OggS";
const PAGE_HEADER_LEN: usize = 27;

/// Playback length in seconds, or `None` when the payload is not a
/// recognisable Vorbis stream.
pub fn duration_secs(data: &[u8]) -> Option<f64> {
    let rate    = vorbis_sample_rate(data)?;
    let granule = last_granule(data)?;
    if rate == 0 {
        return None;
    }
    Some(granule as f64 / f64::from(rate))
}

/// Sample rate from the identification header in the first page.
pub fn vorbis_sample_rate(data: &[u8]) -> Option<u32> {
    if !data.starts_with(PAGE_MAGIC) || data.len() < PAGE_HEADER_LEN {
        return None;
    }
    let segments = data[26] as usize;
    let packet   = data.get(PAGE_HEADER_LEN + segments..)?;
    // 0x01 "vorbis" version(4) channels(1) rate(4)
    if packet.len() < 16 || packet[0] != 1 || &packet[1..7] != b"vorbis" {
        return None;
    }
    Some(u32::from_le_bytes([packet[12], packet[13], packet[14], packet[15]]))
}

/// Granule position of the last complete page header in the stream.
fn last_granule(data: &[u8]) -> Option<u64> {
    let mut pos = data.len().checked_sub(PAGE_HEADER_LEN)?;
    loop {
        if &data[pos..pos + 4] == PAGE_MAGIC && data[pos + 4] == 0 {
            let mut g = [0u8; 8];
            g.copy_from_slice(&data[pos + 6..pos + 14]);
            let granule = u64::from_le_bytes(g);
            // -1 marks a page on which no packet finishes.
            if granule != u64::MAX {
                return Some(granule);
            }
        }
        pos = pos.checked_sub(1)?;
    }
}
