//! plistr — a pure-Rust codec for Apple property lists.
//!
//! Converts between an in-memory [`Value`] tree and the two on-disk
//! encodings: the compact binary `bplist00` format and the XML text format.
//! The codec works on byte buffers only; reading and writing files is left to
//! the caller.
//!
//! # Architecture
//!
//! - **`types`** — The value model (`Value`, `Dictionary`, `Uid`)
//! - **`date`** — Conversion between the 2001 plist epoch and Unix time
//! - **`binary`** — Binary reader and writer (trailer, offset table, uniquing)
//! - **`xml`** — XML reader and writer
//! - **`format`** — Format detection and magic constants
//! - **`config`** — `PlistCodec`, the configurable entry point
//!
//! ```
//! use plistr::{Dictionary, Value};
//!
//! let value = Value::Dictionary(Dictionary::from([("answer", 42)]));
//! let bytes = plistr::encode_binary(&value).unwrap();
//! assert_eq!(plistr::decode(&bytes).unwrap(), value);
//! ```

pub mod binary;
pub mod config;
pub mod date;
pub mod error;
pub mod format;
pub mod types;
pub mod xml;

use bytes::Bytes;

pub use config::PlistCodec;
pub use date::Date;
pub use error::{ErrorKind, PlistError, PlistResult};
pub use format::Format;
pub use types::{Dictionary, Uid, Value};

/// Decodes a binary or XML property list, detecting the format from the
/// first bytes.
pub fn decode(bytes: &[u8]) -> PlistResult<Value> {
    PlistCodec::default().decode(bytes)
}

/// Decodes a property list with an explicitly chosen reader.
pub fn decode_as(bytes: &[u8], format: Format) -> PlistResult<Value> {
    PlistCodec::default().decode_as(bytes, format)
}

/// Encodes a value in the requested format.
pub fn encode(value: &Value, format: Format) -> PlistResult<Bytes> {
    PlistCodec::default().encode(value, format)
}

/// Encodes a value as a binary `bplist00` document.
pub fn encode_binary(value: &Value) -> PlistResult<Bytes> {
    PlistCodec::default().encode_binary(value)
}

/// Encodes a value as an XML property list document.
pub fn encode_xml(value: &Value) -> PlistResult<Bytes> {
    PlistCodec::default().encode_xml(value)
}
