//! Pixel access tests: sub-windows, down-sampling, interleaves, masks.

use nitf_io::{
    ImageSource, IoHandle, MaxDownSample, MemorySource, PixelSkip, Reader, Record, SubWindow,
    Version, Writer,
};

use super::test_utils::{configure_mono_image, minimal_image_bytes};

fn open_minimal() -> Reader {
    let mut reader = Reader::new(IoHandle::from_vec(minimal_image_bytes()));
    reader.read().unwrap();
    reader
}

// =============================================================================
// Sub-window Scenarios
// =============================================================================

#[test]
fn test_full_window_read() {
    let reader = open_minimal();
    let mut image = reader.image_reader(0).unwrap();

    let window = SubWindow::new(0, 0, 2, 3, vec![0]);
    let bands = image.read(&window, None).unwrap();
    assert_eq!(bands.len(), 1);
    assert_eq!(bands[0], vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
}

#[test]
fn test_offset_sub_window() {
    let reader = open_minimal();
    let mut image = reader.image_reader(0).unwrap();

    let window = SubWindow::new(0, 1, 2, 2, vec![0]);
    let bands = image.read(&window, None).unwrap();
    assert_eq!(bands[0], vec![0x02, 0x03, 0x05, 0x06]);
}

#[test]
fn test_pixel_skip_downsample() {
    let reader = open_minimal();
    let mut image = reader.image_reader(0).unwrap();

    let window = SubWindow::new(0, 0, 2, 3, vec![0]);
    let skip = PixelSkip::new(2, 1);
    assert_eq!(window.output_dims(Some(&skip)), (1, 3));
    let bands = image.read(&window, Some(&skip)).unwrap();
    assert_eq!(bands[0], vec![0x01, 0x02, 0x03]);
}

#[test]
fn test_max_downsample() {
    let reader = open_minimal();
    let mut image = reader.image_reader(0).unwrap();

    let window = SubWindow::new(0, 0, 2, 3, vec![0]);
    let max = MaxDownSample::new(2, 2);
    let bands = image.read(&window, Some(&max)).unwrap();
    // Windows: {1,2,4,5} and {3,6}
    assert_eq!(bands[0], vec![0x05, 0x06]);
}

#[test]
fn test_output_byte_count_invariant() {
    let reader = open_minimal();
    let mut image = reader.image_reader(0).unwrap();

    for (rows, cols) in [(1u32, 1u32), (2, 2), (1, 3), (2, 3)] {
        let window = SubWindow::new(0, 0, rows, cols, vec![0]);
        let bands = image.read(&window, None).unwrap();
        assert_eq!(bands[0].len(), rows as usize * cols as usize);
    }
}

// =============================================================================
// Interleave Round-trips
// =============================================================================

/// Write a three-band image in the given mode and read it back.
fn roundtrip_bands(mode: &str) -> Vec<Vec<u8>> {
    let band_a = vec![0x11u8, 0x12, 0x13, 0x14, 0x15, 0x16];
    let band_b = vec![0x21u8, 0x22, 0x23, 0x24, 0x25, 0x26];
    let band_c = vec![0x31u8, 0x32, 0x33, 0x34, 0x35, 0x36];

    let mut record = Record::new(Version::Nitf21);
    record.new_image_segment();
    configure_mono_image(&mut record, 0, 2, 3);
    {
        let subheader = &mut record.images_mut()[0].subheader;
        subheader.mode.set_string(mode).unwrap();
        subheader.representation.set_string("MULTI").unwrap();
        subheader.create_bands(3).unwrap();
    }

    let handle = IoHandle::memory();
    let mut writer = Writer::new(handle.clone());
    let mut image_source = ImageSource::new();
    image_source.add_band(MemorySource::contiguous(band_a.clone()));
    image_source.add_band(MemorySource::contiguous(band_b.clone()));
    image_source.add_band(MemorySource::contiguous(band_c.clone()));
    writer.attach_image_source(0, image_source).unwrap();
    writer.prepare(&record).unwrap();
    writer.write().unwrap();

    let mut reader = Reader::new(IoHandle::from_vec(handle.memory_contents().unwrap()));
    reader.read().unwrap();
    let mut image = reader.image_reader(0).unwrap();
    let window = SubWindow::new(0, 0, 2, 3, vec![0, 1, 2]);
    image.read(&window, None).unwrap()
}

#[test]
fn test_band_roundtrip_all_modes() {
    for mode in ["B", "P", "R", "S"] {
        let bands = roundtrip_bands(mode);
        assert_eq!(
            bands[0],
            vec![0x11, 0x12, 0x13, 0x14, 0x15, 0x16],
            "band 0, mode {mode}"
        );
        assert_eq!(
            bands[1],
            vec![0x21, 0x22, 0x23, 0x24, 0x25, 0x26],
            "band 1, mode {mode}"
        );
        assert_eq!(
            bands[2],
            vec![0x31, 0x32, 0x33, 0x34, 0x35, 0x36],
            "band 2, mode {mode}"
        );
    }
}

// =============================================================================
// Blocked and Masked Images
// =============================================================================

#[test]
fn test_blocked_image_roundtrip() {
    // 4x6 in 2x2 blocks of 2x3
    let pixels: Vec<u8> = (1..=24).collect();
    let mut record = Record::new(Version::Nitf21);
    record.new_image_segment();
    configure_mono_image(&mut record, 0, 4, 6);
    {
        let subheader = &mut record.images_mut()[0].subheader;
        subheader.blocks_per_row.set_uint(2).unwrap();
        subheader.blocks_per_col.set_uint(2).unwrap();
        subheader.pixels_per_horiz_block.set_uint(3).unwrap();
        subheader.pixels_per_vert_block.set_uint(2).unwrap();
        subheader.create_bands(1).unwrap();
    }

    let handle = IoHandle::memory();
    let mut writer = Writer::new(handle.clone());
    let mut image_source = ImageSource::new();
    image_source.add_band(MemorySource::contiguous(pixels.clone()));
    writer.attach_image_source(0, image_source).unwrap();
    writer.prepare(&record).unwrap();
    writer.write().unwrap();

    let mut reader = Reader::new(IoHandle::from_vec(handle.memory_contents().unwrap()));
    reader.read().unwrap();
    let mut image = reader.image_reader(0).unwrap();

    let window = SubWindow::new(0, 0, 4, 6, vec![0]);
    let bands = image.read(&window, None).unwrap();
    assert_eq!(bands[0], pixels);

    // A window that straddles all four blocks
    let window = SubWindow::new(1, 2, 2, 2, vec![0]);
    let bands = image.read(&window, None).unwrap();
    assert_eq!(bands[0], vec![9, 10, 15, 16]);
}

#[test]
fn test_masked_image_roundtrip() {
    let pixels: Vec<u8> = (1..=6).collect();
    let mut record = Record::new(Version::Nitf21);
    record.new_image_segment();
    configure_mono_image(&mut record, 0, 2, 3);
    {
        let subheader = &mut record.images_mut()[0].subheader;
        subheader.compression.set_string("NM").unwrap();
        subheader.create_bands(1).unwrap();
    }

    let handle = IoHandle::memory();
    let mut writer = Writer::new(handle.clone());
    let mut image_source = ImageSource::new();
    image_source.add_band(MemorySource::contiguous(pixels.clone()));
    writer.attach_image_source(0, image_source).unwrap();
    writer.set_pad_pixel(0, vec![0x00]);
    writer.prepare(&record).unwrap();
    writer.write().unwrap();

    let mut reader = Reader::new(IoHandle::from_vec(handle.memory_contents().unwrap()));
    reader.read().unwrap();
    let record = reader.record().unwrap();
    // The mask table precedes the pixels in the data area
    assert!(record.images()[0].info.data_length > 6);

    let mut image = reader.image_reader(0).unwrap();
    let window = SubWindow::new(0, 0, 2, 3, vec![0]);
    let bands = image.read(&window, None).unwrap();
    assert_eq!(bands[0], pixels);
}

// =============================================================================
// 16-bit Pixels
// =============================================================================

#[test]
fn test_sixteen_bit_roundtrip() {
    // Big-endian u16 samples
    let samples: [u16; 6] = [0x0102, 0x0304, 0x0506, 0x0708, 0x090A, 0x0B0C];
    let mut pixels = Vec::new();
    for sample in samples {
        pixels.extend_from_slice(&sample.to_be_bytes());
    }

    let mut record = Record::new(Version::Nitf21);
    record.new_image_segment();
    configure_mono_image(&mut record, 0, 2, 3);
    {
        let subheader = &mut record.images_mut()[0].subheader;
        subheader.actual_bits_per_pixel.set_uint(16).unwrap();
        subheader.bits_per_pixel.set_uint(16).unwrap();
        subheader.create_bands(1).unwrap();
    }

    let handle = IoHandle::memory();
    let mut writer = Writer::new(handle.clone());
    let mut image_source = ImageSource::new();
    image_source.add_band(MemorySource::contiguous(pixels.clone()));
    writer.attach_image_source(0, image_source).unwrap();
    writer.prepare(&record).unwrap();
    writer.write().unwrap();

    let mut reader = Reader::new(IoHandle::from_vec(handle.memory_contents().unwrap()));
    reader.read().unwrap();
    let mut image = reader.image_reader(0).unwrap();

    let window = SubWindow::new(0, 0, 2, 3, vec![0]);
    let bands = image.read(&window, None).unwrap();
    assert_eq!(bands[0], pixels);

    // Skip every other column: pixels stay whole
    let skip = PixelSkip::new(1, 2);
    let bands = image.read(&window, Some(&skip)).unwrap();
    let expected: Vec<u8> = [0x0102u16, 0x0506, 0x0708, 0x0B0C]
        .iter()
        .flat_map(|sample| sample.to_be_bytes())
        .collect();
    assert_eq!(bands[0], expected);
}
