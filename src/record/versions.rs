//! File format versions.
//!
//! The first nine bytes of a file discriminate the version, and every
//! later parsing decision is made against that version's field tables.
//! The 2.0 and 2.1 tables are never mixed: the security group layout, the
//! label segment class, and a handful of header widths differ between
//! them.

use crate::error::FormatError;

/// A supported container version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    /// NITF 2.0 (signature "NITF02.00")
    Nitf20,
    /// NITF 2.1 (signature "NITF02.10")
    Nitf21,
}

impl Version {
    /// Length of the version signature at the start of a file.
    pub const SIGNATURE_LEN: usize = 9;

    /// Discriminate the version from the first bytes of a file.
    ///
    /// # Errors
    /// - [`FormatError::BadMagic`] when the bytes do not start with "NITF"
    /// - [`FormatError::UnsupportedVersion`] for an unrecognized version
    ///   suffix
    pub fn from_signature(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < Self::SIGNATURE_LEN || &bytes[..4] != b"NITF" {
            return Err(FormatError::BadMagic(
                String::from_utf8_lossy(&bytes[..bytes.len().min(Self::SIGNATURE_LEN)])
                    .to_string(),
            ));
        }
        match &bytes[..Self::SIGNATURE_LEN] {
            b"NITF02.10" => Ok(Version::Nitf21),
            b"NITF02.00" => Ok(Version::Nitf20),
            other => Err(FormatError::UnsupportedVersion(
                String::from_utf8_lossy(other).to_string(),
            )),
        }
    }

    /// The nine signature bytes for this version.
    pub const fn signature(self) -> &'static [u8; 9] {
        match self {
            Version::Nitf21 => b"NITF02.10",
            Version::Nitf20 => b"NITF02.00",
        }
    }

    /// Content of the FHDR field.
    pub const fn file_header_id(self) -> &'static str {
        "NITF"
    }

    /// Content of the FVER field.
    pub const fn file_version(self) -> &'static str {
        match self {
            Version::Nitf21 => "02.10",
            Version::Nitf20 => "02.00",
        }
    }

    /// Whether label segments exist in this version.
    ///
    /// 2.1 retired the label segment class; its count field must read
    /// zero in a 2.1 file.
    pub const fn supports_labels(self) -> bool {
        matches!(self, Version::Nitf20)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Version::Nitf21 => write!(f, "2.1"),
            Version::Nitf20 => write!(f, "2.0"),
        }
    }
}
