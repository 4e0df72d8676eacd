pub mod archive;
pub mod crypto;
pub mod error;
pub mod ogg;
pub mod sfx;
pub mod stream;
pub mod wav;

pub use archive::{AudioArchive, EntryInfo, ProgressFn};
pub use crypto::XorKey;
pub use error::{ArchiveError, Result};
pub use sfx::{SfxArchive, SfxLayout, Sound};
pub use stream::{StreamArchive, StreamOptions, Track};
