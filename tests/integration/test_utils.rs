//! Shared builders for integration tests.
//!
//! Test files are composed through the writer into memory handles, so
//! every integration test exercises the real serialization path rather
//! than hand-maintained byte fixtures.

use nitf_io::{
    ImageSource, IoHandle, MemorySource, Record, Tre, Version, Writer,
};

/// Configure an image subheader for an uncompressed single-block 8-bit
/// mono image.
pub fn configure_mono_image(
    record: &mut Record,
    index: usize,
    rows: u64,
    cols: u64,
) {
    let subheader = &mut record.images_mut()[index].subheader;
    subheader.image_id.set_string("TEST").unwrap();
    subheader.num_rows.set_uint(rows).unwrap();
    subheader.num_cols.set_uint(cols).unwrap();
    subheader.pixel_value_type.set_string("INT").unwrap();
    subheader.representation.set_string("MONO").unwrap();
    subheader.category.set_string("VIS").unwrap();
    subheader.actual_bits_per_pixel.set_uint(8).unwrap();
    subheader.bits_per_pixel.set_uint(8).unwrap();
    subheader.pixel_justification.set_string("R").unwrap();
    subheader.pixels_per_horiz_block.set_uint(cols).unwrap();
    subheader.pixels_per_vert_block.set_uint(rows).unwrap();
}

/// Build a 2.1 file with one single-band 8-bit image from the given
/// pixels, returning its bytes.
pub fn build_mono_nitf(rows: u64, cols: u64, pixels: &[u8]) -> Vec<u8> {
    assert_eq!(pixels.len() as u64, rows * cols);
    let mut record = Record::new(Version::Nitf21);
    record.new_image_segment();
    configure_mono_image(&mut record, 0, rows, cols);
    record.images_mut()[0].subheader.create_bands(1).unwrap();

    let handle = IoHandle::memory();
    let mut writer = Writer::new(handle.clone());
    let mut image_source = ImageSource::new();
    image_source.add_band(MemorySource::contiguous(pixels.to_vec()));
    writer.attach_image_source(0, image_source).unwrap();
    writer.prepare(&record).unwrap();
    writer.write().unwrap();
    handle.memory_contents().unwrap()
}

/// The spec's minimal example image: 2 rows × 3 cols, pixels 01..06.
pub fn minimal_image_bytes() -> Vec<u8> {
    build_mono_nitf(2, 3, &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06])
}

/// Build the minimal image with an unknown TRE attached to the image
/// subheader's extended section.
pub fn minimal_image_with_tre(tag: &str, payload: &[u8]) -> Vec<u8> {
    let mut record = Record::new(Version::Nitf21);
    record.new_image_segment();
    configure_mono_image(&mut record, 0, 2, 3);
    record.images_mut()[0].subheader.create_bands(1).unwrap();
    record.images_mut()[0]
        .subheader
        .extended
        .append(Tre::raw(tag, payload));

    let handle = IoHandle::memory();
    let mut writer = Writer::new(handle.clone());
    let mut image_source = ImageSource::new();
    image_source.add_band(MemorySource::contiguous(vec![1u8, 2, 3, 4, 5, 6]));
    writer.attach_image_source(0, image_source).unwrap();
    writer.prepare(&record).unwrap();
    writer.write().unwrap();
    handle.memory_contents().unwrap()
}

/// The 256×256 alternating-column pattern from the write-then-read
/// scenario: columns alternate 0x00/0xFF with period 16.
pub fn striped_pattern(rows: usize, cols: usize, period: usize) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(rows * cols);
    for _row in 0..rows {
        for col in 0..cols {
            pixels.push(if (col / period) % 2 == 0 { 0x00 } else { 0xFF });
        }
    }
    pixels
}
