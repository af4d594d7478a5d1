//! XML property list format.
//!
//! Documents carry the Apple plist DOCTYPE and a `<plist version="1.0">` root
//! wrapping exactly one value element.

pub mod decode;
pub mod encode;
pub mod escape;

pub use decode::decode_document;
pub use encode::{encode_document, XmlStyle};
