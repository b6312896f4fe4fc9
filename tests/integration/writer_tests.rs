//! Write-then-read tests: length back-fill, pattern fidelity, segment
//! data, failure modes.

use nitf_io::{
    ImageSource, IoHandle, MemorySource, Reader, Record, SegmentKind, SubWindow, Version,
    WriteError, Writer,
};

use super::test_utils::{configure_mono_image, striped_pattern};

// =============================================================================
// Write → Reopen → Read
// =============================================================================

#[test]
fn test_striped_pattern_write_read() {
    // 256×256 single band of alternating 0x00/0xFF columns, period 16
    let pattern = striped_pattern(256, 256, 16);

    let mut record = Record::new(Version::Nitf21);
    record.new_image_segment();
    configure_mono_image(&mut record, 0, 256, 256);
    record.images_mut()[0].subheader.create_bands(1).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stripes.ntf");

    let handle = IoHandle::create(&path).unwrap();
    let mut writer = Writer::new(handle.clone());
    let mut image_source = ImageSource::new();
    image_source.add_band(MemorySource::contiguous(pattern.clone()));
    writer.attach_image_source(0, image_source).unwrap();
    writer.prepare(&record).unwrap();
    writer.write().unwrap();
    handle.close();

    // Reopen and read the full window back
    let handle = IoHandle::open_read(&path).unwrap();
    let mut reader = Reader::new(handle);
    reader.read().unwrap();
    let mut image = reader.image_reader(0).unwrap();
    let window = SubWindow::new(0, 0, 256, 256, vec![0]);
    let bands = image.read(&window, None).unwrap();
    assert_eq!(bands[0], pattern);
}

#[test]
fn test_backfilled_lengths_survive_reparse() {
    let pattern = striped_pattern(32, 32, 16);
    let mut record = Record::new(Version::Nitf21);
    record.new_image_segment();
    configure_mono_image(&mut record, 0, 32, 32);
    record.images_mut()[0].subheader.create_bands(1).unwrap();

    let handle = IoHandle::memory();
    let mut writer = Writer::new(handle.clone());
    let mut image_source = ImageSource::new();
    image_source.add_band(MemorySource::contiguous(pattern));
    writer.attach_image_source(0, image_source).unwrap();
    writer.prepare(&record).unwrap();
    writer.write().unwrap();

    let bytes = handle.memory_contents().unwrap();
    let mut reader = Reader::new(IoHandle::from_vec(bytes.clone()));
    reader.read().unwrap();
    let parsed = reader.record().unwrap();

    // NUMI equals the image list length
    assert_eq!(parsed.images().len(), 1);
    assert_eq!(parsed.segment_count(SegmentKind::Image), 1);
    // The component table accounts for the entire file
    let info = parsed.images()[0].info;
    assert_eq!(info.data_length, 32 * 32);
    let header_len = bytes.len() as u64 - info.subheader_length - info.data_length;
    assert_eq!(header_len, 404);
}

#[test]
fn test_multi_segment_file() {
    let mut record = Record::new(Version::Nitf21);
    record.new_image_segment();
    configure_mono_image(&mut record, 0, 2, 2);
    record.images_mut()[0].subheader.create_bands(1).unwrap();
    {
        let text = record.new_text_segment();
        text.subheader.text_id.set_string("NOTES").unwrap();
        text.subheader.format.set_string("STA").unwrap();
    }
    {
        let des = record.new_data_extension_segment();
        des.subheader.type_id.set_string("XML_DATA_CONTENT").unwrap();
        des.subheader.type_version.set_uint(1).unwrap();
    }

    let handle = IoHandle::memory();
    let mut writer = Writer::new(handle.clone());
    let mut image_source = ImageSource::new();
    image_source.add_band(MemorySource::contiguous(vec![1u8, 2, 3, 4]));
    writer.attach_image_source(0, image_source).unwrap();
    writer
        .attach_text_source(0, MemorySource::contiguous(b"first light 06:12Z".to_vec()))
        .unwrap();
    writer
        .attach_des_source(
            0,
            MemorySource::contiguous(b"<SICD><ImageData/></SICD>".to_vec()),
        )
        .unwrap();
    writer.prepare(&record).unwrap();
    writer.write().unwrap();

    let mut reader = Reader::new(IoHandle::from_vec(handle.memory_contents().unwrap()));
    reader.read().unwrap();
    let parsed = reader.record().unwrap();
    assert_eq!(parsed.texts().len(), 1);
    assert_eq!(parsed.data_extensions().len(), 1);
    assert_eq!(parsed.texts()[0].subheader.text_id.as_str(), "NOTES");

    // Segment readers stream the ancillary data back
    let mut text = reader.text_reader(0).unwrap();
    assert_eq!(&text.read_to_end().unwrap()[..], b"first light 06:12Z");
    let mut des = reader.des_reader(0).unwrap();
    assert_eq!(des.size(), 25);
    assert_eq!(&des.read(6).unwrap()[..], b"<SICD>");
}

// =============================================================================
// Failure Modes
// =============================================================================

#[test]
fn test_short_segment_source() {
    struct LyingSource;

    impl nitf_io::DataSource for LyingSource {
        fn total_size(&self) -> u64 {
            100
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, nitf_io::IoError> {
            // Produces nothing despite declaring 100 bytes
            let _ = buf;
            Ok(0)
        }
    }

    let mut record = Record::new(Version::Nitf21);
    record.new_text_segment();

    let mut writer = Writer::new(IoHandle::memory());
    writer.attach_text_source(0, LyingSource).unwrap();
    writer.prepare(&record).unwrap();
    match writer.write() {
        Err(WriteError::ShortSource {
            kind: SegmentKind::Text,
            index: 0,
            declared: 100,
            produced: 0,
        }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_overflow_reference_validated_at_prepare() {
    let mut record = Record::new(Version::Nitf21);
    record.new_image_segment();
    configure_mono_image(&mut record, 0, 1, 1);
    record.images_mut()[0].subheader.create_bands(1).unwrap();
    record.images_mut()[0]
        .subheader
        .extended_overflow
        .set_uint(2)
        .unwrap();

    let mut writer = Writer::new(IoHandle::memory());
    assert!(matches!(
        writer.prepare(&record),
        Err(WriteError::Record(_))
    ));
}

#[test]
fn test_writer_output_is_truncated_on_failure() {
    // A short image source aborts mid-file; the output keeps whatever
    // was streamed before the failure
    let mut record = Record::new(Version::Nitf21);
    record.new_image_segment();
    configure_mono_image(&mut record, 0, 4, 4);
    record.images_mut()[0].subheader.create_bands(1).unwrap();

    let handle = IoHandle::memory();
    let mut writer = Writer::new(handle.clone());
    let mut image_source = ImageSource::new();
    image_source.add_band(MemorySource::contiguous(vec![0u8; 3]));
    writer.attach_image_source(0, image_source).unwrap();
    writer.prepare(&record).unwrap();
    assert!(writer.write().is_err());

    let bytes = handle.memory_contents().unwrap();
    // Header went out; the FL placeholder was never back-filled
    assert_eq!(&bytes[..9], b"NITF02.10");
    assert_eq!(&bytes[342..354], b"000000000000");
}
