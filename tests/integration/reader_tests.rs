//! Parsing tests: version discrimination, field recovery, error paths.

use nitf_io::{FormatError, IoError, IoHandle, Reader, SubWindow, Version};

use super::test_utils::{minimal_image_bytes, minimal_image_with_tre};

// =============================================================================
// Version Discrimination
// =============================================================================

#[test]
fn test_parse_recovers_version_and_counts() {
    let handle = IoHandle::from_vec(minimal_image_bytes());
    let mut reader = Reader::new(handle);
    let record = reader.read().unwrap();

    assert_eq!(record.version(), Version::Nitf21);
    assert_eq!(record.images().len(), 1);
    assert!(record.graphics().is_empty());
    assert!(record.texts().is_empty());
    assert!(record.data_extensions().is_empty());
}

#[test]
fn test_bad_magic() {
    let handle = IoHandle::from_vec(b"GIF89a-not-a-nitf-file-at-all".to_vec());
    let mut reader = Reader::new(handle);
    assert!(matches!(reader.read(), Err(FormatError::BadMagic(_))));
}

#[test]
fn test_unknown_version() {
    let mut bytes = minimal_image_bytes();
    bytes[..9].copy_from_slice(b"NITF09.99");
    let mut reader = Reader::new(IoHandle::from_vec(bytes));
    assert!(matches!(
        reader.read(),
        Err(FormatError::UnsupportedVersion(_))
    ));
}

#[test]
fn test_truncated_header() {
    let mut bytes = minimal_image_bytes();
    bytes.truncate(100);
    let mut reader = Reader::new(IoHandle::from_vec(bytes));
    assert!(matches!(reader.read(), Err(FormatError::Truncated { .. })));
}

#[test]
fn test_truncated_subheader_names_segment() {
    let bytes = minimal_image_bytes();
    // Cut into the image subheader
    let mut cut = bytes.clone();
    cut.truncate(420);
    let mut reader = Reader::new(IoHandle::from_vec(cut));
    match reader.read() {
        Err(FormatError::LengthMismatch { kind, index, .. }) => {
            assert_eq!(kind.to_string(), "image");
            assert_eq!(index, 0);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_version_probe() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("probe.ntf");
    std::fs::write(&path, minimal_image_bytes()).unwrap();
    assert_eq!(Reader::version_of(&path).unwrap(), Version::Nitf21);

    std::fs::write(&path, b"short").unwrap();
    assert!(Reader::version_of(&path).is_err());
}

// =============================================================================
// Parsed Field Content
// =============================================================================

#[test]
fn test_image_subheader_fields() {
    let handle = IoHandle::from_vec(minimal_image_bytes());
    let mut reader = Reader::new(handle);
    reader.read().unwrap();
    let record = reader.record().unwrap();

    let subheader = &record.images()[0].subheader;
    assert_eq!(subheader.image_id.as_str(), "TEST");
    assert_eq!(subheader.num_rows.as_u64().unwrap(), 2);
    assert_eq!(subheader.num_cols.as_u64().unwrap(), 3);
    assert_eq!(subheader.pixel_value_type.as_str(), "INT");
    assert_eq!(subheader.compression.as_str(), "NC");
    assert_eq!(subheader.band_count(), 1);
}

#[test]
fn test_component_info_matches_file() {
    let bytes = minimal_image_bytes();
    let total = bytes.len() as u64;
    let mut reader = Reader::new(IoHandle::from_vec(bytes));
    reader.read().unwrap();
    let record = reader.record().unwrap();

    let info = record.images()[0].info;
    assert_eq!(info.data_length, 6);
    // Header + subheader + data account for the whole file
    assert_eq!(404 + info.subheader_length + info.data_length, total);
}

// =============================================================================
// Unknown TREs
// =============================================================================

#[test]
fn test_unknown_tre_carried_raw() {
    let bytes = minimal_image_with_tre("FOOBAR", b"\x01\x02\x03opaque");
    let mut reader = Reader::new(IoHandle::from_vec(bytes));
    reader.read().unwrap();
    let record = reader.record().unwrap();

    let extended = &record.images()[0].subheader.extended;
    assert_eq!(extended.len(), 1);
    let tre = extended.iter().next().unwrap();
    assert!(tre.is_raw());
    assert_eq!(tre.tag(), "FOOBAR");

    // The serialized form re-emits the original tag + length + payload
    let serialized = tre.serialize().unwrap();
    assert_eq!(&serialized[..6], b"FOOBAR");
    assert_eq!(&serialized[6..11], b"00009");
    assert_eq!(&serialized[11..], b"\x01\x02\x03opaque");
}

// =============================================================================
// Handle Lifecycle
// =============================================================================

#[test]
fn test_closed_handle_fails_derived_readers() {
    let handle = IoHandle::from_vec(minimal_image_bytes());
    let mut reader = Reader::new(handle.clone());
    reader.read().unwrap();
    let mut image = reader.image_reader(0).unwrap();

    handle.close();

    let window = SubWindow::new(0, 0, 2, 3, vec![0]);
    match image.read(&window, None) {
        Err(FormatError::Io(IoError::HandleClosed(_))) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_segment_reader_before_parse() {
    let reader = Reader::new(IoHandle::from_vec(minimal_image_bytes()));
    assert!(matches!(
        reader.image_reader(0),
        Err(FormatError::NotParsed)
    ));
}

#[test]
fn test_segment_index_out_of_range() {
    let mut reader = Reader::new(IoHandle::from_vec(minimal_image_bytes()));
    reader.read().unwrap();
    assert!(reader.image_reader(3).is_err());
    assert!(reader.text_reader(0).is_err());
}
