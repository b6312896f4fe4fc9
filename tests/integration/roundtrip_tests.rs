//! Byte-exact round-trip tests.
//!
//! A parsed record written back with windowed file sources over the
//! original handle must reproduce the input byte for byte, including
//! files whose TREs are only handled by the raw-bytes fallback.

use nitf_io::{FileSource, IoHandle, Reader, Record, Writer};

use super::test_utils::{
    build_mono_nitf, minimal_image_bytes, minimal_image_with_tre, striped_pattern,
};

/// Parse `bytes`, then rewrite the record with direct data copies from
/// the source handle and return the result.
fn rewrite(bytes: &[u8]) -> Vec<u8> {
    let source_handle = IoHandle::from_vec(bytes.to_vec());
    let mut reader = Reader::new(source_handle.clone());
    reader.read().unwrap();
    let record: Record = reader.record().unwrap().clone();

    let out_handle = IoHandle::memory();
    let mut writer = Writer::new(out_handle.clone());
    for (index, segment) in record.images().iter().enumerate() {
        // The record remembers where each segment's data lives; copy it
        // verbatim, mask tables included
        let source = FileSource::window(
            source_handle.clone(),
            data_offset(bytes, &record, index),
            segment.data_length().unwrap(),
        );
        writer.attach_image_stream(index, source).unwrap();
    }
    writer.prepare(&record).unwrap();
    writer.write().unwrap();
    out_handle.memory_contents().unwrap()
}

/// Offset of image segment `index`'s data area within `bytes`, from the
/// component info table.
fn data_offset(bytes: &[u8], record: &Record, index: usize) -> u64 {
    let header_len: u64 = bytes.len() as u64
        - record
            .images()
            .iter()
            .map(|segment| segment.info.subheader_length + segment.info.data_length)
            .sum::<u64>();
    let mut offset = header_len;
    for segment in record.images().iter().take(index) {
        offset += segment.info.subheader_length + segment.info.data_length;
    }
    offset + record.images()[index].info.subheader_length
}

#[test]
fn test_minimal_image_roundtrip() {
    let original = minimal_image_bytes();
    let rewritten = rewrite(&original);
    assert_eq!(rewritten, original);
}

#[test]
fn test_roundtrip_with_unknown_tre() {
    // Raw-bytes fallback preserves the payload, so equality still holds
    let original = minimal_image_with_tre("FOOBAR", b"\xDE\xAD\xBE\xEFpayload");
    let rewritten = rewrite(&original);
    assert_eq!(rewritten, original);
}

#[test]
fn test_roundtrip_larger_image() {
    let pattern = striped_pattern(64, 48, 16);
    let original = build_mono_nitf(64, 48, &pattern);
    let rewritten = rewrite(&original);
    assert_eq!(rewritten, original);
}

#[test]
fn test_double_roundtrip_is_stable() {
    let original = minimal_image_bytes();
    let once = rewrite(&original);
    let twice = rewrite(&once);
    assert_eq!(once, twice);
}
