//! TRE handler and field behavior tests.

use nitf_io::{
    Field, FieldError, FieldKind, IoHandle, Reader, TreRegistry,
};

use super::test_utils::minimal_image_with_tre;

// =============================================================================
// Handler Loading and Typed Parsing
// =============================================================================

/// A descriptor for a small looped TRE.
const BANDLET_DESCRIPTOR: &str = r#"{
  "tag": "BNDLET",
  "fields": [
    { "field": { "name": "SENSOR", "kind": "A", "len": 6 } },
    { "field": { "name": "NBANDS", "kind": "N", "len": 2 } },
    { "loop": { "count": "NBANDS", "fields": [
      { "field": { "name": "GAIN", "kind": "N", "len": 4 } }
    ] } }
  ]
}"#;

#[test]
fn test_load_dir_and_construct() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bndlet.json"), BANDLET_DESCRIPTOR).unwrap();

    let mut registry = TreRegistry::new();
    assert_eq!(registry.load_dir(dir.path()).unwrap(), 1);
    assert!(registry.can_handle("BNDLET"));

    let mut tre = registry.construct("BNDLET", None).unwrap();
    tre.set_string("SENSOR", "EO-SIM").unwrap();
    tre.set_uint("NBANDS", 2).unwrap();
    tre.set_uint("GAIN[0]", 120).unwrap();
    tre.set_uint("GAIN[1]", 340).unwrap();

    let bytes = tre.serialize().unwrap();
    assert_eq!(&bytes[..6], b"BNDLET");
    assert_eq!(&bytes[6..11], b"00016");
    assert_eq!(&bytes[11..], b"EO-SIM0201200340");
}

#[test]
fn test_typed_parse_from_file() {
    // The file carries BNDLET; parsing with a loaded registry decodes it
    let bytes = minimal_image_with_tre("BNDLET", b"EO-SIM0201200340");

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bndlet.json"), BANDLET_DESCRIPTOR).unwrap();
    let mut registry = TreRegistry::new();
    registry.load_dir(dir.path()).unwrap();

    let mut reader = Reader::new(IoHandle::from_vec(bytes));
    reader.read_with_registry(&registry).unwrap();
    let record = reader.record().unwrap();

    let tres = record.images()[0].subheader.extended.by_tag("BNDLET");
    assert_eq!(tres.len(), 1);
    let tre = tres[0];
    assert!(!tre.is_raw());
    assert_eq!(tre.get("SENSOR").unwrap().as_str(), "EO-SIM");
    assert_eq!(tre.get("NBANDS").unwrap().as_u64().unwrap(), 2);
    assert_eq!(tre.get("GAIN[1]").unwrap().as_u64().unwrap(), 340);

    // Iteration yields (name, field) pairs in serialization order
    let names: Vec<&str> = tre.iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["SENSOR", "NBANDS", "GAIN[0]", "GAIN[1]"]);
}

#[test]
fn test_same_file_without_handler_is_raw() {
    let bytes = minimal_image_with_tre("BNDLET", b"EO-SIM0201200340");
    let registry = TreRegistry::new();

    let mut reader = Reader::new(IoHandle::from_vec(bytes));
    reader.read_with_registry(&registry).unwrap();
    let record = reader.record().unwrap();

    let tres = record.images()[0].subheader.extended.by_tag("BNDLET");
    assert!(tres[0].is_raw());
    // The raw payload still re-serializes verbatim
    let serialized = tres[0].serialize().unwrap();
    assert_eq!(&serialized[11..], b"EO-SIM0201200340");
}

// =============================================================================
// Field Contract
// =============================================================================

#[test]
fn test_field_overflow_reports_declared_length() {
    let mut field = Field::new(FieldKind::BcsA, 5);
    field.set_string("OKAY").unwrap();

    let err = field.set_string("too-long-value").unwrap_err();
    match err {
        FieldError::Overflow { actual, declared } => {
            assert_eq!(actual, 14);
            assert_eq!(declared, 5);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains('5'));
    // Contents unchanged
    assert_eq!(field.as_str(), "OKAY");
}

#[test]
fn test_field_serialized_length_is_constant() {
    let mut field = Field::new(FieldKind::BcsN, 6);
    for value in [0u64, 9, 99_999, 999_999] {
        field.set_uint(value).unwrap();
        assert_eq!(field.bytes().len(), 6);
    }
}
