use thiserror::Error;

use crate::record::SegmentKind;

/// I/O errors raised by the byte-channel layer.
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from the underlying operating system call
    #[error("I/O error: {0}")]
    Os(String),

    /// Requested range exceeds the handle's bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// The handle was closed while a derived reader or writer was still live
    #[error("Handle closed: {0}")]
    HandleClosed(String),
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        IoError::Os(err.to_string())
    }
}

/// Errors raised when setting or interpreting a fixed-width field.
#[derive(Debug, Clone, Error)]
pub enum FieldError {
    /// Value is longer than the field's declared length
    #[error("Field overflow: value of {actual} bytes does not fit declared length {declared}")]
    Overflow { actual: usize, declared: usize },

    /// Field content cannot be interpreted as a number
    #[error("Field is not numeric: {content:?}")]
    NotNumeric { content: String },

    /// Operation requires a different field kind
    #[error("Type mismatch: expected {expected} field, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Errors raised by the TRE layer (descriptors, registry, serialization).
#[derive(Debug, Clone, Error)]
pub enum TreError {
    /// No handler is registered for the tag (recoverable: callers fall
    /// back to a raw-bytes TRE that preserves the payload verbatim)
    #[error("Unknown TRE tag: {0:?}")]
    UnknownTag(String),

    /// A handler descriptor file could not be parsed
    #[error("Bad TRE descriptor {path:?}: {message}")]
    BadDescriptor { path: String, message: String },

    /// Serialized TRE payload does not match the declared length
    #[error("TRE {tag:?} length mismatch: declared {declared}, payload has {actual}")]
    LengthMismatch {
        tag: String,
        declared: usize,
        actual: usize,
    },

    /// A looped sub-field references a count field that is missing or
    /// not numeric
    #[error("TRE {tag:?}: bad loop count field {field:?}")]
    BadLoopCount { tag: String, field: String },

    /// No such sub-field in this TRE
    #[error("TRE {tag:?} has no field {field:?}")]
    NoSuchField { tag: String, field: String },

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Io(#[from] IoError),
}

/// Errors raised while mutating a record or its subheaders.
#[derive(Debug, Clone, Error)]
pub enum RecordError {
    /// A structural invariant would be violated (count fields out of
    /// sync with their children, too many comments, bad band index...)
    #[error("Invariant violation: {0}")]
    Invariant(String),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Tre(#[from] TreError),
}

/// Errors raised while parsing a file or reading segment data.
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Tre(#[from] TreError),

    /// File does not start with a recognized signature
    #[error("Bad magic: expected \"NITF02.10\" or \"NITF02.00\", got {0:?}")]
    BadMagic(String),

    /// Recognized container but unsupported version string
    #[error("Unsupported version: {0:?}")]
    UnsupportedVersion(String),

    /// Compression code with no registered decompression handler
    #[error("Unsupported compression {code:?} in {kind} segment {index}")]
    UnsupportedCompression {
        code: String,
        kind: SegmentKind,
        index: usize,
    },

    /// A declared length disagrees with the component info table
    #[error("Length mismatch in {kind} segment {index}: {message}")]
    LengthMismatch {
        kind: SegmentKind,
        index: usize,
        message: String,
    },

    /// The file ended before a declared structure was complete
    #[error("Truncated file: {message}")]
    Truncated { message: String },

    /// A segment subheader does not start with its two-byte part type
    #[error("Bad part type: expected {expected:?}, got {actual:?}")]
    BadPartType {
        expected: &'static str,
        actual: String,
    },

    /// Sub-window or band list outside the image bounds
    #[error("Invalid sub-window for {kind} segment {index}: {message}")]
    InvalidWindow {
        kind: SegmentKind,
        index: usize,
        message: String,
    },

    /// A down-sampler was applied to a pixel type it is not defined for
    #[error("Down-sampler type mismatch: {message}")]
    DownSampleType { message: String },

    /// A block layout combination this implementation does not handle
    #[error("Unsupported layout in {kind} segment {index}: {message}")]
    UnsupportedLayout {
        kind: SegmentKind,
        index: usize,
        message: String,
    },

    /// A TRE overflow field references a data extension segment that
    /// does not exist
    #[error("Bad overflow reference in {kind} segment {index}: DES index {des_index} out of range")]
    BadOverflowRef {
        kind: SegmentKind,
        index: usize,
        des_index: usize,
    },

    /// A per-segment reader was requested before a successful parse
    #[error("No record has been parsed from this handle")]
    NotParsed,

    /// The operation was cancelled through the cooperative flag
    #[error("Cancelled")]
    Cancelled,
}

/// Errors raised while assembling and writing a file.
#[derive(Debug, Clone, Error)]
pub enum WriteError {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Tre(#[from] TreError),

    #[error(transparent)]
    Format(#[from] FormatError),

    /// A data source produced fewer bytes than it declared
    #[error("Short source for {kind} segment {index}: declared {declared} bytes, produced {produced}")]
    ShortSource {
        kind: SegmentKind,
        index: usize,
        declared: u64,
        produced: u64,
    },

    /// A source was already attached for this segment
    #[error("Source already attached for {kind} segment {index}")]
    AlreadyAttached { kind: SegmentKind, index: usize },

    /// No source was attached for a segment with a nonzero data length
    #[error("No source attached for {kind} segment {index}")]
    MissingSource { kind: SegmentKind, index: usize },

    /// `write` was called before `prepare`
    #[error("Writer is not prepared")]
    NotPrepared,

    /// The operation was cancelled through the cooperative flag
    #[error("Cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_overflow_message_carries_declared_length() {
        let err = FieldError::Overflow {
            actual: 14,
            declared: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("14"));
        assert!(msg.contains('5'));
    }

    #[test]
    fn test_io_error_from_std() {
        let err: IoError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, IoError::Os(_)));
    }

    #[test]
    fn test_format_error_carries_segment_context() {
        let err = FormatError::LengthMismatch {
            kind: SegmentKind::Image,
            index: 2,
            message: "subheader ran past declared length".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("image"));
        assert!(msg.contains('2'));
    }
}
