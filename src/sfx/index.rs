//! `PakFiles.dat` and `BankLkup.dat`, the two tables that locate banks.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use tracing::warn;

/// Size of one name slot in the pak index.
pub const PAK_SLOT_SIZE: usize = 52;
/// Size of one record in the bank-lookup index.
pub const LOOKUP_RECORD_SIZE: usize = 12;

/// One package (bank file) name; its position in the table is the package
/// index referenced by [`BankLookupEntry::package_index`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PakEntry {
    pub index: usize,
    pub name:  String,
}

/// Location of one bank inside a package file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankLookupEntry {
    pub package_index: u8,
    pub bank_offset:   u32,
    pub bank_size:     u32,
}

/// Split the pak index into name slots.  Slot text stops at the first NUL;
/// empty slots keep their ordinal so later indices stay aligned.
pub fn parse_pak_index(data: &[u8]) -> Vec<PakEntry> {
    data.chunks(PAK_SLOT_SIZE)
        .enumerate()
        .map(|(index, slot)| {
            let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
            PakEntry {
                index,
                name: String::from_utf8_lossy(&slot[..end]).into_owned(),
            }
        })
        .collect()
}

/// Decode every complete 12-byte record: `u8 package, 3 pad, u32 offset,
/// u32 size`, little-endian.
pub fn parse_bank_lookup(data: &[u8]) -> Vec<BankLookupEntry> {
    let rem = data.len() % LOOKUP_RECORD_SIZE;
    if rem != 0 {
        warn!(trailing = rem, "bank lookup index has a partial record; ignoring it");
    }
    data.chunks_exact(LOOKUP_RECORD_SIZE)
        .filter_map(|rec| {
            let mut r = Cursor::new(rec);
            let package_index = r.read_u8().ok()?;
            r.set_position(4);
            let bank_offset = r.read_u32::<LittleEndian>().ok()?;
            let bank_size   = r.read_u32::<LittleEndian>().ok()?;
            Some(BankLookupEntry { package_index, bank_offset, bank_size })
        })
        .collect()
}

/// Bank entries belonging to `package`, in index-file order.
pub fn banks_for(lookup: &[BankLookupEntry], package: usize) -> Vec<BankLookupEntry> {
    lookup
        .iter()
        .filter(|e| usize::from(e.package_index) == package)
        .copied()
        .collect()
}
