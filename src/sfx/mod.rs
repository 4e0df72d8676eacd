//! Sound-effect bank codec.
//!
//! # Layout
//! Under the game root, `audio/CONFIG/PakFiles.dat` names the package files
//! and `audio/CONFIG/BankLkup.dat` says where each bank lives inside them
//! (see [`index`]).  The packages themselves sit in `audio/SFX/`.  Each bank
//! is a fixed header with a sound table followed by raw mono 16-bit PCM
//! (see [`bank`]).
//!
//! # Loading
//! Packages are read whole, one at a time.  A bank whose header or PCM
//! would fall outside its package is skipped and recorded in the
//! [`LoadReport`]; the rest of the load carries on.
//!
//! # Replacing and rebuilding
//! A replacement must carry exactly as many PCM bytes as the slot it goes
//! into.  That keeps every patch inside the sound's own region, so rebuild
//! can overwrite PCM in place without touching headers or neighbouring
//! sounds.  Only package files holding replaced sounds are rewritten.

pub mod bank;
pub mod index;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::archive::{check_index, write_export, AudioArchive, EntryInfo, ProgressFn};
use crate::error::{read_existing, ArchiveError, Result};
use crate::wav::{self, WavError};

use bank::{parse_sound_table, BANK_HEADER_SIZE};
use index::{banks_for, parse_bank_lookup, parse_pak_index, BankLookupEntry, PakEntry};

// ── SfxLayout ─────────────────────────────────────────────────────────────────

/// Where the index files and packages live, relative to the game root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfxLayout {
    pub config_dir:  PathBuf,
    pub sfx_dir:     PathBuf,
    pub pak_file:    PathBuf,
    pub lookup_file: PathBuf,
}

impl Default for SfxLayout {
    fn default() -> Self {
        Self {
            config_dir:  PathBuf::from("audio/CONFIG"),
            sfx_dir:     PathBuf::from("audio/SFX"),
            pak_file:    PathBuf::from("PakFiles.dat"),
            lookup_file: PathBuf::from("BankLkup.dat"),
        }
    }
}

// ── Sound ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Sound {
    /// Position in the flat catalogue.
    pub index:         usize,
    pub name:          String,
    pub package:       String,
    pub package_index: usize,
    /// Position of the bank among its package's lookup entries.
    pub bank_index:    usize,
    /// Position in the bank's sound table.
    pub sound_index:   usize,
    pub source_file:   PathBuf,
    pub header_offset: u32,
    /// Relative to the end of the bank header.
    pub pcm_offset:    u32,
    pub pcm:           Vec<u8>,
    /// PCM length inferred at load time; replacements must match it.
    pub capacity:      usize,
    pub sample_rate:   u32,
    pub modified:      bool,
}

impl Sound {
    /// Absolute offset of this sound's PCM inside its package file.
    pub fn file_offset(&self) -> usize {
        self.header_offset as usize + BANK_HEADER_SIZE + self.pcm_offset as usize
    }

    pub fn duration_secs(&self) -> f64 {
        (self.pcm.len() / 2) as f64 / f64::from(self.sample_rate)
    }

    pub fn file_name(&self) -> String {
        format!("{}.wav", self.name)
    }
}

// ── LoadReport ────────────────────────────────────────────────────────────────

/// A bank that could not be parsed and was left out of the catalogue.
#[derive(Debug, Clone)]
pub struct SkippedBank {
    pub package:     String,
    pub bank_offset: u32,
    pub reason:      String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Packages named in the pak index.
    pub packages:         usize,
    /// Packages with banks whose file was not on disk.
    pub missing_packages: Vec<String>,
    pub banks_loaded:     usize,
    pub skipped_banks:    Vec<SkippedBank>,
}

impl LoadReport {
    pub fn summary(&self) -> String {
        format!(
            "{} package(s), {} bank(s) loaded, {} skipped, {} package file(s) missing",
            self.packages,
            self.banks_loaded,
            self.skipped_banks.len(),
            self.missing_packages.len(),
        )
    }
}

// ── SfxArchive ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SfxArchive {
    root:   PathBuf,
    layout: SfxLayout,
    sounds: Vec<Sound>,
    report: LoadReport,
}

impl SfxArchive {
    /// Read both index files under `root` and catalogue every sound of every
    /// package present on disk.  `progress` is called once per package.
    pub fn load<P: AsRef<Path>>(
        root:         P,
        layout:       SfxLayout,
        mut progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<Self> {
        let root   = root.as_ref().to_owned();
        let config = root.join(&layout.config_dir);
        if !config.is_dir() {
            return Err(ArchiveError::NotFound(config));
        }

        let packages = parse_pak_index(&read_existing(&config.join(&layout.pak_file))?);
        let lookup   = parse_bank_lookup(&read_existing(&config.join(&layout.lookup_file))?);
        let sfx_dir  = root.join(&layout.sfx_dir);

        let total = packages.len() as u64;
        let mut report = LoadReport { packages: packages.len(), ..LoadReport::default() };
        let mut sounds = Vec::new();

        for pkg in &packages {
            if let Some(ref mut cb) = progress {
                cb(pkg.index as u64, total);
            }

            let banks = banks_for(&lookup, pkg.index);
            if banks.is_empty() || pkg.name.is_empty() {
                continue;
            }

            let file = sfx_dir.join(&pkg.name);
            let data = match fs::read(&file) {
                Ok(d) => d,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(package = %pkg.name, "package file not on disk; skipping");
                    report.missing_packages.push(pkg.name.clone());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            debug!(package = %pkg.name, bytes = data.len(), banks = banks.len(), "scanning package");

            for (bank_index, entry) in banks.iter().enumerate() {
                match parse_bank(&data, pkg, bank_index, entry, &file) {
                    Ok(mut bank_sounds) => {
                        report.banks_loaded += 1;
                        sounds.append(&mut bank_sounds);
                    }
                    Err(e) => {
                        warn!(package = %pkg.name, offset = entry.bank_offset, error = %e, "skipping bank");
                        report.skipped_banks.push(SkippedBank {
                            package:     pkg.name.clone(),
                            bank_offset: entry.bank_offset,
                            reason:      e.to_string(),
                        });
                    }
                }
            }
        }
        if let Some(cb) = progress {
            cb(total, total);
        }

        for (i, s) in sounds.iter_mut().enumerate() {
            s.index = i;
        }
        info!(root = %root.display(), sounds = sounds.len(), "{}", report.summary());
        Ok(Self { root, layout, sounds, report })
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn root(&self) -> &Path { &self.root }

    pub fn layout(&self) -> &SfxLayout { &self.layout }

    pub fn sounds(&self) -> &[Sound] { &self.sounds }

    pub fn sound(&self, index: usize) -> Result<&Sound> {
        check_index(index, self.sounds.len())?;
        Ok(&self.sounds[index])
    }

    pub fn report(&self) -> &LoadReport { &self.report }

    pub fn is_modified(&self) -> bool {
        self.sounds.iter().any(|s| s.modified)
    }

    /// The sound wrapped as a WAV file, without touching the disk.
    pub fn to_wav(&self, index: usize) -> Result<Vec<u8>> {
        let s = self.sound(index)?;
        Ok(wav::wrap(&s.pcm, s.sample_rate))
    }
}

impl AudioArchive for SfxArchive {
    fn len(&self) -> usize {
        self.sounds.len()
    }

    fn entries(&self) -> Vec<EntryInfo> {
        self.sounds
            .iter()
            .map(|s| EntryInfo {
                index:       s.index,
                name:        s.name.clone(),
                size:        s.pcm.len() as u64,
                sample_rate: Some(s.sample_rate),
                duration:    Some(s.duration_secs()),
                modified:    s.modified,
            })
            .collect()
    }

    fn export(&self, index: usize, dest_dir: &Path) -> Result<PathBuf> {
        let wav = self.to_wav(index)?;
        write_export(dest_dir, &self.sounds[index].file_name(), &wav)
    }

    /// `data` must be a mono 16-bit PCM WAV whose sample data is exactly as
    /// long as the sound it replaces.
    fn replace(&mut self, index: usize, data: Vec<u8>) -> Result<()> {
        check_index(index, self.sounds.len())?;
        let parsed = wav::unwrap(&data)?;
        let s = &mut self.sounds[index];

        if parsed.pcm.len() != s.capacity {
            return Err(WavError::LengthMismatch { expected: s.capacity, actual: parsed.pcm.len() }.into());
        }
        if parsed.sample_rate != s.sample_rate {
            warn!(
                sound = %s.name,
                bank_rate = s.sample_rate,
                wav_rate = parsed.sample_rate,
                "sample rate differs; the bank keeps its declared rate"
            );
        }
        debug!(sound = %s.name, bytes = parsed.pcm.len(), "replacing pcm");
        s.pcm      = parsed.pcm;
        s.modified = true;
        Ok(())
    }

    /// Patch replaced PCM back into each affected package file.  Files with
    /// no replaced sounds are left alone.
    fn rebuild(&mut self, mut progress: Option<&mut ProgressFn<'_>>) -> Result<()> {
        let mut groups: BTreeMap<PathBuf, Vec<usize>> = BTreeMap::new();
        for s in self.sounds.iter().filter(|s| s.modified) {
            groups.entry(s.source_file.clone()).or_default().push(s.index);
        }

        let total = groups.len() as u64;
        for (done, (file, members)) in groups.into_iter().enumerate() {
            let mut buf = read_existing(&file)?;
            for &i in &members {
                let s = &self.sounds[i];
                let start = s.file_offset();
                let end   = start + s.pcm.len();
                if end > buf.len() {
                    return Err(ArchiveError::Parse(format!(
                        "{}: sound {} spans {start}..{end} but the file is now {} bytes",
                        file.display(), s.name, buf.len()
                    )));
                }
                buf[start..end].copy_from_slice(&s.pcm);
            }
            fs::write(&file, &buf)?;
            info!(file = %file.display(), sounds = members.len(), "patched package");

            for &i in &members {
                self.sounds[i].modified = false;
            }
            if let Some(ref mut cb) = progress {
                cb(done as u64 + 1, total);
            }
        }
        Ok(())
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Catalogue one bank of `data` (a whole package file).
fn parse_bank(
    data:       &[u8],
    pkg:        &PakEntry,
    bank_index: usize,
    entry:      &BankLookupEntry,
    file:       &Path,
) -> Result<Vec<Sound>> {
    let header_offset = entry.bank_offset as usize;
    let header = data
        .get(header_offset..header_offset + BANK_HEADER_SIZE)
        .ok_or_else(|| ArchiveError::Parse(format!(
            "bank header at {header_offset} runs past end of package ({} bytes)", data.len()
        )))?;

    let slots = parse_sound_table(header, entry.bank_size).map_err(ArchiveError::Parse)?;
    let pcm_base = header_offset + BANK_HEADER_SIZE;

    let mut sounds = Vec::with_capacity(slots.len());
    for slot in slots {
        if slot.length == 0 {
            debug!(package = %pkg.name, bank = bank_index, sound = slot.index, "empty sound; skipping");
            continue;
        }
        let start = pcm_base + slot.pcm_offset as usize;
        let pcm = data.get(start..start + slot.length).ok_or_else(|| ArchiveError::Parse(format!(
            "sound {} pcm {start}..{} runs past end of package ({} bytes)",
            slot.index, start + slot.length, data.len()
        )))?;

        sounds.push(Sound {
            index:         0,
            name:          format!("{}_b{}_{}", pkg.name, bank_index, slot.index),
            package:       pkg.name.clone(),
            package_index: pkg.index,
            bank_index,
            sound_index:   slot.index,
            source_file:   file.to_owned(),
            header_offset: entry.bank_offset,
            pcm_offset:    slot.pcm_offset,
            pcm:           pcm.to_vec(),
            capacity:      slot.length,
            sample_rate:   slot.sample_rate,
            modified:      false,
        });
    }
    Ok(sounds)
}
