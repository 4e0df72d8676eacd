//! Repeating-key XOR obfuscation used by the stream container.
//!
//! Byte `i` of the buffer is XORed with `key[i % KEY_LEN]`.  The operation
//! is its own inverse, so the same call both decrypts a loaded archive and
//! encrypts a rebuilt one.  It runs over the entire buffer with no regard
//! for track boundaries.

use thiserror::Error;

use crate::archive::ProgressFn;

/// Byte length of the XOR key.
pub const KEY_LEN: usize = 16;

/// The key the game uses for its stream files.
pub const STREAM_KEY: [u8; KEY_LEN] = [
    0xEA, 0x3A, 0xC4, 0xA1, 0x9A, 0xA8, 0x14, 0xF3,
    0x48, 0xB0, 0xD7, 0x23, 0x9D, 0xE8, 0xFF, 0xF1,
];

/// Progress is reported every `KEY_LEN * 256` bytes during a pass.
pub const PROGRESS_STRIDE: usize = KEY_LEN * 256;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Key is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("Key must be {KEY_LEN} bytes, got {0}")]
    Length(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XorKey([u8; KEY_LEN]);

impl Default for XorKey {
    fn default() -> Self {
        Self(STREAM_KEY)
    }
}

impl XorKey {
    pub const fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a 32-digit hex string such as `EA3AC4A19AA814F348B0D7239DE8FFF1`.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim())?;
        let arr: [u8; KEY_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::Length(bytes.len()))?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// XOR `buf` in place.
    pub fn apply(&self, buf: &mut [u8]) {
        self.apply_with_progress(buf, None);
    }

    /// XOR `buf` in place, calling `progress(done, total)` every
    /// [`PROGRESS_STRIDE`] bytes and once at the end.
    pub fn apply_with_progress(&self, buf: &mut [u8], mut progress: Option<&mut ProgressFn<'_>>) {
        let total = buf.len() as u64;
        for (block_idx, block) in buf.chunks_mut(PROGRESS_STRIDE).enumerate() {
            // PROGRESS_STRIDE is a multiple of KEY_LEN, so every block starts
            // at key offset 0.
            for (b, k) in block.iter_mut().zip(self.0.iter().cycle()) {
                *b ^= k;
            }
            if let Some(ref mut cb) = progress {
                cb((block_idx * PROGRESS_STRIDE) as u64, total);
            }
        }
        if let Some(cb) = progress {
            cb(total, total);
        }
    }
}
