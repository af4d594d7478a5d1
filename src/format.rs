//! Encoding selection and format sniffing.

use std::fmt;

/// Binary property list magic, without the version digits.
pub const BPLIST_MAGIC: &[u8; 6] = b"bplist";

/// The only binary format version this crate reads and writes.
pub const BPLIST_VERSION: &[u8; 2] = b"00";

/// Length of the binary header (`bplist` + two version digits).
pub const HEADER_LEN: usize = 8;

/// An on-disk property list encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Binary,
    Xml,
}

impl Format {
    /// Picks the reader for a buffer by inspecting its first bytes.
    ///
    /// Anything starting with `bplist` is treated as binary so that an
    /// unsupported version is reported as a header error rather than as
    /// malformed XML. Everything else is handed to the XML reader.
    pub fn detect(bytes: &[u8]) -> Format {
        if bytes.starts_with(BPLIST_MAGIC) {
            Format::Binary
        } else {
            Format::Xml
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary => write!(f, "binary"),
            Self::Xml => write!(f, "xml"),
        }
    }
}
