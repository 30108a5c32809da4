use std::fs;
use std::path::{Path, PathBuf};

use strongbox_pak::{
    CapacityError, Error, FormatError, Header, PakEntry, PakReader, PakWriter, SecretKey,
    ValidationError, HEADER_SIZE, MAX_FILENAME_LENGTH, MAX_FILES_IN_PAK,
};
use tempfile::tempdir;

fn key() -> SecretKey {
    SecretKey::new("night-shift")
}

fn build_sample(dir: &Path) -> PathBuf {
    let pak = dir.join("sample.pak");
    PakWriter::new(key())
        .build(
            &pak,
            [
                ("a.txt", b"hello".to_vec()),
                ("dir/b.bin", vec![0x00, 0xFF, 0x10]),
            ],
        )
        .unwrap();
    pak
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[test]
fn test_list_and_load() {
    let dir = tempdir().unwrap();
    let pak = build_sample(dir.path());
    let reader = PakReader::new(key());

    assert_eq!(
        reader.list_entries(&pak).unwrap(),
        vec![PakEntry::new("a.txt", 5), PakEntry::new("dir/b.bin", 3)]
    );
    assert_eq!(reader.load(&pak, "a.txt").unwrap(), b"hello");
    assert_eq!(reader.load(&pak, "dir\\b.bin").unwrap(), vec![0x00, 0xFF, 0x10]);
    assert_eq!(reader.file_count(&pak).unwrap(), 2);
    assert!(reader.file_exists(&pak, "a.txt").unwrap());
    assert!(!reader.file_exists(&pak, "missing").unwrap());
}

#[test]
fn test_payloads_are_masked_on_disk() {
    let dir = tempdir().unwrap();
    let pak = build_sample(dir.path());

    let bytes = fs::read(&pak).unwrap();
    assert_eq!(&bytes[..4], b"PAK0");
    assert!(find(&bytes, b"hello").is_none());

    // A different key still reads, but yields different bytes.
    let wrong = PakReader::new(SecretKey::new("day-shift"));
    assert_ne!(wrong.load(&pak, "a.txt").unwrap(), b"hello");
}

#[test]
fn test_load_missing_entry() {
    let dir = tempdir().unwrap();
    let pak = build_sample(dir.path());

    let result = PakReader::new(key()).load(&pak, "missing");
    assert!(matches!(result, Err(Error::NotFound(ref name)) if name == "missing"));
}

#[test]
fn test_get_info() {
    let dir = tempdir().unwrap();
    let pak = build_sample(dir.path());
    let reader = PakReader::new(key());

    let info = reader.get_info(&pak, "/dir/b.bin").unwrap().unwrap();
    assert_eq!(info.name(), "dir/b.bin");
    assert_eq!(info.size(), 3);
    assert_eq!(info.extension(), Some("bin"));

    assert_eq!(reader.get_info(&pak, "nope").unwrap(), None);
}

#[test]
fn test_round_trip_empty_and_zero_byte() {
    let dir = tempdir().unwrap();
    let reader = PakReader::default();
    let writer = PakWriter::default();

    let empty = dir.path().join("empty.pak");
    writer.build(&empty, Vec::<(&str, &[u8])>::new()).unwrap();
    assert!(reader.list_entries(&empty).unwrap().is_empty());
    assert_eq!(reader.validate(&empty).unwrap(), 0);

    let zero = dir.path().join("zero.pak");
    writer.build(&zero, [("nothing.dat", b"".as_slice())]).unwrap();
    assert_eq!(reader.load(&zero, "nothing.dat").unwrap(), Vec::<u8>::new());
    assert_eq!(reader.validate(&zero).unwrap(), 1);
}

#[test]
fn test_append_entry() {
    let dir = tempdir().unwrap();
    let pak = build_sample(dir.path());
    let reader = PakReader::new(key());

    PakWriter::new(key())
        .append_entry(&pak, "c.txt", b"world")
        .unwrap();

    assert_eq!(reader.file_count(&pak).unwrap(), 3);
    assert_eq!(reader.load(&pak, "a.txt").unwrap(), b"hello");
    assert_eq!(reader.load(&pak, "dir/b.bin").unwrap(), vec![0x00, 0xFF, 0x10]);
    assert_eq!(reader.load(&pak, "c.txt").unwrap(), b"world");
    assert_eq!(reader.validate(&pak).unwrap(), 3);

    // Appended entries go after the existing ones.
    let names: Vec<String> = reader
        .list_entries(&pak)
        .unwrap()
        .iter()
        .map(|e| e.name().to_string())
        .collect();
    assert_eq!(names, ["a.txt", "dir/b.bin", "c.txt"]);
}

#[test]
fn test_append_preserves_reserved_words() {
    let dir = tempdir().unwrap();
    let pak = build_sample(dir.path());

    let mut bytes = fs::read(&pak).unwrap();
    bytes[20..24].copy_from_slice(&7u32.to_le_bytes());
    fs::write(&pak, &bytes).unwrap();

    PakWriter::new(key())
        .append_entry(&pak, "c.txt", b"world")
        .unwrap();

    let header = Header::decode(&fs::read(&pak).unwrap()).unwrap();
    assert_eq!(header.num_files, 3);
    assert_eq!(header.reserved, [7, 0, 0, 0]);
}

#[test]
fn test_append_duplicate_leaves_archive_untouched() {
    let dir = tempdir().unwrap();
    let pak = build_sample(dir.path());
    let before = fs::read(&pak).unwrap();

    let result = PakWriter::new(key()).append_entry(&pak, "a.txt", b"again");
    assert!(matches!(
        result,
        Err(Error::Validation(ValidationError::DuplicateName(ref name))) if name == "a.txt"
    ));
    assert_eq!(fs::read(&pak).unwrap(), before);

    // No staging file is left behind.
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_append_rejects_bad_name() {
    let dir = tempdir().unwrap();
    let pak = build_sample(dir.path());
    let before = fs::read(&pak).unwrap();

    let result = PakWriter::new(key()).append_entry(&pak, "../up.txt", b"x");
    assert!(matches!(
        result,
        Err(Error::Validation(ValidationError::PathEscape(_)))
    ));
    assert_eq!(fs::read(&pak).unwrap(), before);
}

#[test]
fn test_extract_all() {
    let dir = tempdir().unwrap();
    let pak = build_sample(dir.path());
    let out = dir.path().join("out");

    let count = PakReader::new(key()).extract_all(&pak, &out).unwrap();

    assert_eq!(count, 2);
    assert_eq!(fs::read(out.join("a.txt")).unwrap(), b"hello");
    assert_eq!(fs::read(out.join("dir").join("b.bin")).unwrap(), vec![0x00, 0xFF, 0x10]);
}

#[test]
fn test_extract_one() {
    let dir = tempdir().unwrap();
    let pak = build_sample(dir.path());
    let target = dir.path().join("single").join("copy.bin");

    PakReader::new(key())
        .extract_one(&pak, "dir/b.bin", &target)
        .unwrap();

    assert_eq!(fs::read(&target).unwrap(), vec![0x00, 0xFF, 0x10]);
}

#[test]
fn test_extract_rejects_traversal_in_index() {
    let dir = tempdir().unwrap();
    let pak = dir.path().join("hostile.pak");
    PakWriter::new(key())
        .build(&pak, [("aa/escape.txt", b"pwned".as_slice())])
        .unwrap();

    // Rewrite the stored name to one of the same length that climbs out.
    let mut bytes = fs::read(&pak).unwrap();
    let at = find(&bytes, b"aa/escape.txt").unwrap();
    bytes[at..at + 13].copy_from_slice(b"../escape.txt");
    fs::write(&pak, &bytes).unwrap();

    let out = dir.path().join("out");
    let result = PakReader::new(key()).extract_all(&pak, &out);

    match result {
        Err(Error::Extract { name, source }) => {
            assert_eq!(name, "../escape.txt");
            assert!(matches!(
                *source,
                Error::Validation(ValidationError::PathEscape(_))
            ));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!dir.path().join("escape.txt").exists());

    // Reading the index through the checked path refuses the name outright.
    assert!(matches!(
        PakReader::new(key()).list_entries(&pak),
        Err(Error::Format(FormatError::InvalidEntry { .. }))
    ));
    assert!(PakReader::new(key()).validate(&pak).is_err());
}

#[test]
fn test_bad_magic() {
    let dir = tempdir().unwrap();
    let pak = build_sample(dir.path());

    let mut bytes = fs::read(&pak).unwrap();
    bytes[0] = b'X';
    fs::write(&pak, &bytes).unwrap();

    assert!(matches!(
        PakReader::new(key()).list_entries(&pak),
        Err(Error::Format(FormatError::BadMagic { .. }))
    ));
}

#[test]
fn test_truncated_file() {
    let dir = tempdir().unwrap();
    let pak = dir.path().join("short.pak");
    fs::write(&pak, b"PAK0\x01\x00").unwrap();

    assert!(matches!(
        PakReader::default().file_count(&pak),
        Err(Error::Format(FormatError::Truncated(_)))
    ));
}

#[test]
fn test_validate_inflated_count() {
    let dir = tempdir().unwrap();
    let pak = build_sample(dir.path());

    let mut bytes = fs::read(&pak).unwrap();
    bytes[8..12].copy_from_slice(&1000u32.to_le_bytes());
    fs::write(&pak, &bytes).unwrap();

    assert!(matches!(
        PakReader::new(key()).validate(&pak),
        Err(Error::Validation(ValidationError::IndexOverrun { num_files: 1000, .. }))
    ));
    // Loading hits the end of the index instead of allocating for 1000 records.
    assert!(matches!(
        PakReader::new(key()).list_entries(&pak),
        Err(Error::Format(FormatError::Truncated(_)))
    ));
}

#[test]
fn test_validate_index_offset_past_end() {
    let dir = tempdir().unwrap();
    let pak = build_sample(dir.path());

    let mut bytes = fs::read(&pak).unwrap();
    let past = bytes.len() as u64 + 10;
    bytes[12..20].copy_from_slice(&past.to_le_bytes());
    fs::write(&pak, &bytes).unwrap();

    assert!(matches!(
        PakReader::new(key()).validate(&pak),
        Err(Error::Format(FormatError::IndexOutOfRange { .. }))
    ));
}

#[test]
fn test_validate_payload_out_of_bounds() {
    let dir = tempdir().unwrap();
    let pak = dir.path().join("bounds.pak");
    PakWriter::new(key())
        .build(&pak, [("a.txt", b"hello".as_slice())])
        .unwrap();

    // The size field is the last eight bytes of the only index record.
    let mut bytes = fs::read(&pak).unwrap();
    let end = bytes.len();
    bytes[end - 8..].copy_from_slice(&u64::MAX.to_le_bytes());
    fs::write(&pak, &bytes).unwrap();

    let reader = PakReader::new(key());
    assert!(matches!(
        reader.validate(&pak),
        Err(Error::Validation(ValidationError::OutOfBounds { .. }))
    ));
    assert!(matches!(
        reader.load(&pak, "a.txt"),
        Err(Error::Validation(ValidationError::OutOfBounds { .. }))
    ));
}

#[test]
fn test_capacity_limits() {
    let dir = tempdir().unwrap();
    let pak = dir.path().join("big.pak");
    let writer = PakWriter::default();

    let too_many = (0..=MAX_FILES_IN_PAK).map(|i| (format!("f{i}"), [0u8; 0]));
    assert!(matches!(
        writer.build(&pak, too_many),
        Err(Error::Capacity(CapacityError::TooManyEntries { .. }))
    ));

    let long_name = "n".repeat(MAX_FILENAME_LENGTH + 1);
    assert!(matches!(
        writer.build(&pak, [(long_name.as_str(), b"x".as_slice())]),
        Err(Error::Capacity(CapacityError::NameTooLong { .. }))
    ));

    assert!(!pak.exists());
}

#[test]
fn test_build_rejects_invalid_names() {
    let dir = tempdir().unwrap();
    let pak = dir.path().join("bad.pak");
    let writer = PakWriter::default();

    for name in ["../x", "a|b", "", "nul\0byte"] {
        assert!(
            writer.build(&pak, [(name, b"x".as_slice())]).is_err(),
            "{name:?} should be rejected"
        );
    }
    assert!(!pak.exists());
}

#[test]
fn test_build_from_directory() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("assets");
    fs::create_dir_all(src.join("textures")).unwrap();
    fs::write(src.join("readme.txt"), b"read me").unwrap();
    fs::write(src.join("textures").join("door.png"), b"PNG").unwrap();
    fs::write(src.join("bad|name.txt"), b"skipped").unwrap();

    let pak = src.join("assets.pak");
    let writer = PakWriter::new(key());
    assert_eq!(writer.build_from_directory(&pak, &src).unwrap(), 2);

    let reader = PakReader::new(key());
    assert_eq!(
        reader.list_entries(&pak).unwrap(),
        vec![PakEntry::new("readme.txt", 7), PakEntry::new("textures/door.png", 3)]
    );

    // Rebuilding in place does not swallow the previous archive.
    assert_eq!(writer.build_from_directory(&pak, &src).unwrap(), 2);
    assert!(!reader.file_exists(&pak, "assets.pak").unwrap());
}

#[test]
fn test_build_is_deterministic() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first.pak");
    let second = dir.path().join("second.pak");
    let writer = PakWriter::new(key());

    writer
        .build(&first, [("b", b"2".as_slice()), ("a", b"1".as_slice())])
        .unwrap();
    writer
        .build(&second, [("a", b"1".as_slice()), ("b", b"2".as_slice())])
        .unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    assert_eq!(fs::read(&first).unwrap().len(), HEADER_SIZE + 2 + 2 * 19);
}

#[test]
fn test_validate_count_one_past_long_record() {
    let dir = tempdir().unwrap();
    let pak = dir.path().join("long.pak");
    PakWriter::new(key())
        .build(&pak, [("textures/office/door_left_lit.png", b"x".as_slice())])
        .unwrap();

    // One record of 51 bytes leaves room for two minimum-size records.
    let mut bytes = fs::read(&pak).unwrap();
    bytes[8..12].copy_from_slice(&2u32.to_le_bytes());
    fs::write(&pak, &bytes).unwrap();

    assert!(matches!(
        PakReader::new(key()).validate(&pak),
        Err(Error::Validation(ValidationError::IndexOverrun { num_files: 2, .. }))
    ));
}

#[cfg(unix)]
#[test]
fn test_extract_refuses_symlinked_directory() {
    use std::os::unix::fs::symlink;

    let dir = tempdir().unwrap();
    let pak = dir.path().join("linked.pak");
    PakWriter::new(key())
        .build(&pak, [("link/sub/x.txt", b"payload".as_slice())])
        .unwrap();

    let out = dir.path().join("out");
    let outside = dir.path().join("outside");
    fs::create_dir_all(&out).unwrap();
    fs::create_dir_all(&outside).unwrap();
    symlink("../outside", out.join("link")).unwrap();

    match PakReader::new(key()).extract_all(&pak, &out) {
        Err(Error::Extract { name, source }) => {
            assert_eq!(name, "link/sub/x.txt");
            assert!(matches!(
                *source,
                Error::Validation(ValidationError::PathEscape(_))
            ));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!outside.join("sub").exists());
    assert_eq!(fs::read_dir(&outside).unwrap().count(), 0);
}

#[cfg(unix)]
#[test]
fn test_extract_refuses_symlinked_target() {
    use std::os::unix::fs::symlink;

    let dir = tempdir().unwrap();
    let pak = build_sample(dir.path());

    let out = dir.path().join("out");
    let victim = dir.path().join("victim.txt");
    fs::create_dir_all(&out).unwrap();
    fs::write(&victim, b"original").unwrap();
    symlink("../victim.txt", out.join("a.txt")).unwrap();

    match PakReader::new(key()).extract_all(&pak, &out) {
        Err(Error::Extract { name, source }) => {
            assert_eq!(name, "a.txt");
            assert!(matches!(
                *source,
                Error::Validation(ValidationError::PathEscape(_))
            ));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(fs::read(&victim).unwrap(), b"original");
}
