//! Minimal RIFF/WAVE wrapping for the SFX banks' raw PCM.
//!
//! Banks store bare mono 16-bit little-endian samples.  Exports wrap them in
//! the canonical 44-byte header; replacements are unwrapped back to bare
//! samples after checking the format is one the banks can hold.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read};
use thiserror::Error;

/// Rate substituted when a bank declares 0 Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

pub const CHANNELS:        u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 16;
const FORMAT_PCM:          u16 = 1;
const HEADER_LEN:          usize = 44;

#[derive(Error, Debug)]
pub enum WavError {
    #[error("Not a RIFF/WAVE file")]
    NotWave,
    #[error("Missing '{0}' chunk")]
    MissingChunk(&'static str),
    #[error("Truncated '{0}' chunk")]
    Truncated(String),
    #[error("Unsupported WAV encoding (format tag {0}); only PCM is accepted")]
    UnsupportedEncoding(u16),
    #[error("Expected mono 16-bit PCM, got {channels} channel(s) at {bits} bits")]
    UnsupportedLayout { channels: u16, bits: u16 },
    #[error("Replacement is {actual} bytes of PCM but the slot holds exactly {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Samples and rate pulled out of a WAV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavPcm {
    pub sample_rate: u32,
    pub pcm:         Vec<u8>,
}

/// Wrap raw mono 16-bit PCM in a WAV container.  A rate of 0 becomes
/// [`DEFAULT_SAMPLE_RATE`].
pub fn wrap(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    let rate        = if sample_rate == 0 { DEFAULT_SAMPLE_RATE } else { sample_rate };
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let byte_rate   = rate * u32::from(block_align);
    let data_len    = pcm.len() as u32;
    let pad         = pcm.len() % 2;
    let riff_len    = 36 + data_len + pad as u32;

    let mut wav = Vec::with_capacity(HEADER_LEN + pcm.len() + pad);
    // Writes into a Vec cannot fail.
    let _ = write_header(&mut wav, riff_len, rate, byte_rate, block_align, data_len);
    wav.extend_from_slice(pcm);
    if pad == 1 {
        wav.push(0);
    }
    wav
}

fn write_header(
    wav:         &mut Vec<u8>,
    riff_len:    u32,
    rate:        u32,
    byte_rate:   u32,
    block_align: u16,
    data_len:    u32,
) -> io::Result<()> {
    wav.extend_from_slice(b"RIFF");
    wav.write_u32::<LittleEndian>(riff_len)?;
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.write_u32::<LittleEndian>(16)?;
    wav.write_u16::<LittleEndian>(FORMAT_PCM)?;
    wav.write_u16::<LittleEndian>(CHANNELS)?;
    wav.write_u32::<LittleEndian>(rate)?;
    wav.write_u32::<LittleEndian>(byte_rate)?;
    wav.write_u16::<LittleEndian>(block_align)?;
    wav.write_u16::<LittleEndian>(BITS_PER_SAMPLE)?;

    wav.extend_from_slice(b"data");
    wav.write_u32::<LittleEndian>(data_len)?;
    Ok(())
}

/// Extract the sample bytes from a WAV file, rejecting anything that is not
/// mono 16-bit PCM.  Chunks other than `fmt ` and `data` are skipped.
pub fn unwrap(bytes: &[u8]) -> Result<WavPcm, WavError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(WavError::NotWave);
    }

    let mut fmt: Option<(u16, u16, u32, u16)> = None;
    let mut pos = 12usize;

    while pos + 8 <= bytes.len() {
        let id   = &bytes[pos..pos + 4];
        let size = u32::from_le_bytes([bytes[pos + 4], bytes[pos + 5], bytes[pos + 6], bytes[pos + 7]]) as usize;
        let body_start = pos + 8;
        let body_end   = body_start
            .checked_add(size)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| WavError::Truncated(String::from_utf8_lossy(id).into_owned()))?;
        let body = &bytes[body_start..body_end];

        match id {
            b"fmt " => fmt = Some(parse_fmt(body)?),
            b"data" => {
                let (tag, channels, sample_rate, bits) = fmt.ok_or(WavError::MissingChunk("fmt "))?;
                if tag != FORMAT_PCM {
                    return Err(WavError::UnsupportedEncoding(tag));
                }
                if channels != CHANNELS || bits != BITS_PER_SAMPLE {
                    return Err(WavError::UnsupportedLayout { channels, bits });
                }
                return Ok(WavPcm { sample_rate, pcm: body.to_vec() });
            }
            _ => {}
        }

        // Chunk bodies are word aligned.
        pos = body_end + size % 2;
    }

    Err(WavError::MissingChunk(if fmt.is_some() { "data" } else { "fmt " }))
}

fn parse_fmt(body: &[u8]) -> Result<(u16, u16, u32, u16), WavError> {
    let truncated = |_: io::Error| WavError::Truncated("fmt ".into());
    let mut r = Cursor::new(body);
    let tag         = r.read_u16::<LittleEndian>().map_err(truncated)?;
    let channels    = r.read_u16::<LittleEndian>().map_err(truncated)?;
    let sample_rate = r.read_u32::<LittleEndian>().map_err(truncated)?;
    let mut skip = [0u8; 6]; // byte rate + block align
    r.read_exact(&mut skip).map_err(truncated)?;
    let bits        = r.read_u16::<LittleEndian>().map_err(truncated)?;
    Ok((tag, channels, sample_rate, bits))
}
