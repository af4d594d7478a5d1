//! Binary property list format (`bplist00`).
//!
//! A document is the 8-byte header, a stream of marker-tagged objects, an
//! offset table mapping object index to byte offset, and a 32-byte trailer.
//! All multi-byte integers are big-endian.

pub mod decode;
pub mod encode;
pub mod marker;
pub mod table;
pub mod trailer;

pub use decode::{DecodeLimits, decode_document};
pub use encode::encode_document;
pub use trailer::Trailer;
