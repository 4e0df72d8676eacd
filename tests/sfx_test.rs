use sa_audio::archive::AudioArchive;
use sa_audio::sfx::bank::{BANK_HEADER_SIZE, SOUND_RECORD_SIZE, SOUND_TABLE_OFFSET};
use sa_audio::sfx::index::PAK_SLOT_SIZE;
use sa_audio::sfx::{SfxArchive, SfxLayout};
use sa_audio::wav::{self, WavError};
use sa_audio::ArchiveError;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

const GENRL_BANK_AT: usize = 32;

fn bank_header(sounds: &[(u32, u16)]) -> Vec<u8> {
    let mut h = vec![0u8; BANK_HEADER_SIZE];
    h[0..2].copy_from_slice(&(sounds.len() as u16).to_le_bytes());
    for (i, &(off, rate)) in sounds.iter().enumerate() {
        let at = SOUND_TABLE_OFFSET + i * SOUND_RECORD_SIZE;
        h[at..at + 4].copy_from_slice(&off.to_le_bytes());
        h[at + 8..at + 10].copy_from_slice(&rate.to_le_bytes());
    }
    h
}

fn lookup_record(package: u8, offset: u32, size: u32) -> Vec<u8> {
    let mut r = vec![package, 0, 0, 0];
    r.extend_from_slice(&offset.to_le_bytes());
    r.extend_from_slice(&size.to_le_bytes());
    r
}

/// Game root with three packages:
/// - `FEET`: one bank at 0 with sounds at 0/100/250, bank size 400
/// - `MISSING`: named in the index, absent on disk
/// - `GENRL`: a good bank at 32 and a bank pointing past the end of the file
fn fixture() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let config = root.join("audio/CONFIG");
    let sfx = root.join("audio/SFX");
    fs::create_dir_all(&config).unwrap();
    fs::create_dir_all(&sfx).unwrap();

    let mut pak = Vec::new();
    for name in ["FEET", "MISSING", "GENRL"] {
        let mut slot = name.as_bytes().to_vec();
        slot.resize(PAK_SLOT_SIZE, 0);
        pak.extend(slot);
    }
    fs::write(config.join("PakFiles.dat"), pak).unwrap();

    let mut lookup = lookup_record(0, 0, 400);
    lookup.extend(lookup_record(1, 0, 10));
    lookup.extend(lookup_record(2, GENRL_BANK_AT as u32, 10));
    lookup.extend(lookup_record(2, 1_000_000, 10));
    fs::write(config.join("BankLkup.dat"), lookup).unwrap();

    let mut feet = bank_header(&[(0, 22050), (100, 0), (250, 44100)]);
    feet.extend((0..400u32).map(|i| (i % 251) as u8));
    feet.extend_from_slice(b"tail bytes after the bank");
    fs::write(sfx.join("FEET"), feet).unwrap();

    let mut genrl = vec![0xEEu8; GENRL_BANK_AT];
    genrl.extend(bank_header(&[(0, 11025), (6, 11025)]));
    genrl.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    fs::write(sfx.join("GENRL"), genrl).unwrap();

    (dir, root)
}

fn load(root: &Path) -> SfxArchive {
    SfxArchive::load(root, SfxLayout::default(), None).unwrap()
}

#[test]
fn test_catalogue_and_report() {
    let (_dir, root) = fixture();
    let ar = load(&root);

    let lengths: Vec<usize> = ar.sounds().iter().map(|s| s.pcm.len()).collect();
    assert_eq!(lengths, vec![100, 150, 150, 6, 4]);

    let names: Vec<&str> = ar.sounds().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["FEET_b0_0", "FEET_b0_1", "FEET_b0_2", "GENRL_b0_0", "GENRL_b0_1"]);

    assert_eq!(ar.sounds()[1].sample_rate, 22050);
    assert_eq!(ar.sounds()[2].sample_rate, 44100);
    assert_eq!(ar.sounds()[3].package_index, 2);
    assert_eq!(ar.sounds()[4].pcm, vec![7, 8, 9, 10]);

    let report = ar.report();
    assert_eq!(report.packages, 3);
    assert_eq!(report.banks_loaded, 2);
    assert_eq!(report.missing_packages, vec!["MISSING".to_string()]);
    assert_eq!(report.skipped_banks.len(), 1);
    assert_eq!(report.skipped_banks[0].package, "GENRL");
    assert_eq!(report.skipped_banks[0].bank_offset, 1_000_000);
}

#[test]
fn test_entries_metadata() {
    let (_dir, root) = fixture();
    let ar = load(&root);
    let e = &ar.entries()[2];
    assert_eq!(e.index, 2);
    assert_eq!(e.size, 150);
    assert_eq!(e.sample_rate, Some(44100));
    assert_eq!(e.duration, Some(75.0 / 44100.0));
}

#[test]
fn test_missing_index_files() {
    let dir = tempdir().unwrap();
    let err = SfxArchive::load(dir.path(), SfxLayout::default(), None).unwrap_err();
    assert!(matches!(err, ArchiveError::NotFound(_)));

    fs::create_dir_all(dir.path().join("audio/CONFIG")).unwrap();
    fs::write(dir.path().join("audio/CONFIG/PakFiles.dat"), b"").unwrap();
    let err = SfxArchive::load(dir.path(), SfxLayout::default(), None).unwrap_err();
    match err {
        ArchiveError::NotFound(p) => assert!(p.ends_with("BankLkup.dat")),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_custom_layout() {
    let (_dir, root) = fixture();
    fs::rename(root.join("audio/SFX"), root.join("banks")).unwrap();
    let layout = SfxLayout { sfx_dir: "banks".into(), ..SfxLayout::default() };
    let ar = SfxArchive::load(&root, layout, None).unwrap();
    assert_eq!(ar.len(), 5);
}

#[test]
fn test_export_wraps_pcm() {
    let (dir, root) = fixture();
    let ar = load(&root);
    let out = dir.path().join("export");

    let path = ar.export(1, &out).unwrap();
    assert_eq!(path.file_name().unwrap(), "FEET_b0_1.wav");
    let pcm = wav::unwrap(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(pcm.pcm, ar.sounds()[1].pcm);
    assert_eq!(pcm.sample_rate, 22050);

    let mut seen = Vec::new();
    let mut cb = |done: u64, total: u64| seen.push((done, total));
    assert_eq!(ar.export_all(&out, Some(&mut cb)).unwrap().len(), 5);
    assert_eq!(seen.last(), Some(&(5, 5)));
}

#[test]
fn test_export_out_of_range() {
    let (dir, root) = fixture();
    let ar = load(&root);
    let out = dir.path().join("export");
    assert!(matches!(ar.export(5, &out), Err(ArchiveError::Index { index: 5, len: 5 })));
    assert!(!out.exists());
}

#[test]
fn test_replace_rebuild_patches_only_the_sound() {
    let (_dir, root) = fixture();
    let feet = root.join("audio/SFX/FEET");
    let genrl = root.join("audio/SFX/GENRL");
    let before = fs::read(&feet).unwrap();
    let genrl_before = fs::read(&genrl).unwrap();

    let mut ar = load(&root);
    let new_pcm = vec![0xABu8; 150];
    ar.replace(1, wav::wrap(&new_pcm, 22050)).unwrap();
    assert!(ar.is_modified());

    let mut files = 0;
    let mut cb = |_: u64, total: u64| files = total;
    ar.rebuild(Some(&mut cb)).unwrap();
    assert_eq!(files, 1);
    assert!(!ar.is_modified());

    let after = fs::read(&feet).unwrap();
    assert_eq!(after.len(), before.len());
    let start = BANK_HEADER_SIZE + 100;
    let end = start + 150;
    assert_eq!(&after[start..end], &new_pcm[..]);
    assert_eq!(&after[..start], &before[..start]);
    assert_eq!(&after[end..], &before[end..]);
    assert_eq!(fs::read(&genrl).unwrap(), genrl_before);

    let reloaded = load(&root);
    assert_eq!(reloaded.sounds()[1].pcm, new_pcm);
    assert_eq!(reloaded.sounds()[0].pcm, ar.sounds()[0].pcm);
}

#[test]
fn test_replace_rejects_length_change() {
    let (_dir, root) = fixture();
    let mut ar = load(&root);
    for len in [148, 152] {
        let err = ar.replace(0, wav::wrap(&vec![0u8; len], 22050)).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::Format(WavError::LengthMismatch { expected: 100, actual }) if actual == len
        ));
    }
    assert!(!ar.is_modified());
}

#[test]
fn test_replace_rejects_stereo() {
    let (_dir, root) = fixture();
    let mut ar = load(&root);
    let mut stereo = wav::wrap(&[0u8; 100], 22050);
    stereo[22..24].copy_from_slice(&2u16.to_le_bytes());
    let err = ar.replace(0, stereo).unwrap_err();
    assert!(matches!(err, ArchiveError::Format(WavError::UnsupportedLayout { channels: 2, .. })));
}

#[test]
fn test_rebuild_without_changes_touches_nothing() {
    let (_dir, root) = fixture();
    let feet = root.join("audio/SFX/FEET");
    fs::remove_file(&feet).unwrap();
    let mut ar = SfxArchive::load(&root, SfxLayout::default(), None).unwrap();
    // Nothing modified, so the missing file is never opened.
    ar.rebuild(None).unwrap();
    assert!(!feet.exists());
}

#[test]
fn test_rebuild_fails_when_package_shrank() {
    let (_dir, root) = fixture();
    let mut ar = load(&root);
    ar.replace(4, wav::wrap(&[0u8; 4], 11025)).unwrap();

    let genrl = root.join("audio/SFX/GENRL");
    let mut data = fs::read(&genrl).unwrap();
    data.truncate(data.len() - 3);
    fs::write(&genrl, &data).unwrap();

    assert!(matches!(ar.rebuild(None), Err(ArchiveError::Parse(_))));
    assert_eq!(fs::read(&genrl).unwrap(), data);
}
