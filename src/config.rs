//! Codec configuration.

use bytes::Bytes;

use crate::binary::{self, DecodeLimits};
use crate::error::PlistResult;
use crate::format::Format;
use crate::types::Value;
use crate::xml::{self, XmlStyle};

/// Default nesting limit for arrays and dictionaries.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Default cap on values produced by one binary decode. Shared objects are
/// counted once per place they appear in the tree.
pub const DEFAULT_MAX_NODES: usize = 1 << 22;

/// Default number of base64 characters per `<data>` line.
pub const DEFAULT_DATA_LINE_WIDTH: usize = 68;

/// A configured property list reader/writer.
///
/// The codec holds no state between calls; one instance can be shared
/// freely across threads.
#[derive(Debug, Clone)]
pub struct PlistCodec {
    max_depth: usize,
    max_nodes: usize,
    indent: String,
    data_line_width: usize,
}

impl Default for PlistCodec {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
            indent: "\t".into(),
            data_line_width: DEFAULT_DATA_LINE_WIDTH,
        }
    }
}

impl PlistCodec {
    /// Creates a codec with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum container nesting depth accepted when reading and
    /// writing. The root value is at depth 0.
    pub fn max_depth(mut self, limit: usize) -> Self {
        self.max_depth = limit;
        self
    }

    /// Sets how many values a binary document may expand to, dictionary keys
    /// included. Exceeding it fails with `TooLarge`.
    pub fn max_nodes(mut self, limit: usize) -> Self {
        self.max_nodes = limit;
        self
    }

    /// Sets the string used for one level of XML indentation.
    pub fn indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    /// Sets the `<data>` line width in base64 characters. Zero disables
    /// wrapping.
    pub fn data_line_width(mut self, width: usize) -> Self {
        self.data_line_width = width;
        self
    }

    pub fn depth_limit(&self) -> usize {
        self.max_depth
    }

    pub fn node_limit(&self) -> usize {
        self.max_nodes
    }

    /// Decodes a document, detecting the format from its first bytes.
    pub fn decode(&self, bytes: &[u8]) -> PlistResult<Value> {
        self.decode_as(bytes, Format::detect(bytes))
    }

    /// Decodes a document with an explicitly chosen reader.
    pub fn decode_as(&self, bytes: &[u8], format: Format) -> PlistResult<Value> {
        tracing::debug!(%format, len = bytes.len(), "decoding plist");
        match format {
            Format::Binary => binary::decode_document(
                bytes,
                DecodeLimits {
                    max_depth: self.max_depth,
                    max_nodes: self.max_nodes,
                },
            ),
            Format::Xml => xml::decode_document(bytes, self.max_depth),
        }
    }

    /// Encodes a value in the requested format.
    pub fn encode(&self, value: &Value, format: Format) -> PlistResult<Bytes> {
        match format {
            Format::Binary => self.encode_binary(value),
            Format::Xml => self.encode_xml(value),
        }
    }

    pub fn encode_binary(&self, value: &Value) -> PlistResult<Bytes> {
        binary::encode_document(value, self.max_depth)
    }

    pub fn encode_xml(&self, value: &Value) -> PlistResult<Bytes> {
        xml::encode_document(
            value,
            XmlStyle {
                indent: &self.indent,
                data_line_width: self.data_line_width,
                max_depth: self.max_depth,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn builder_overrides_defaults() {
        let codec = PlistCodec::new().max_depth(8).indent("  ").data_line_width(0);
        assert_eq!(codec.depth_limit(), 8);
        let xml = codec
            .encode_xml(&Value::Array(vec![Value::Data(vec![0u8; 60])]))
            .unwrap();
        let text = std::str::from_utf8(&xml).unwrap();
        assert!(text.contains("\n  <data>\n  AAAA"));
        // 80 base64 characters on a single line.
        assert!(text.lines().any(|l| l.trim().len() == 80));
    }

    #[test]
    fn decode_dispatches_on_magic() {
        let codec = PlistCodec::new();
        let value = Value::Array(vec![Value::from(1)]);
        let binary = codec.encode(&value, Format::Binary).unwrap();
        let xml = codec.encode(&value, Format::Xml).unwrap();
        assert_eq!(codec.decode(&binary).unwrap(), value);
        assert_eq!(codec.decode(&xml).unwrap(), value);
    }

    #[test]
    fn forced_format_mismatch_fails() {
        let codec = PlistCodec::new();
        let xml = codec.encode_xml(&Value::from(true)).unwrap();
        let err = codec.decode_as(&xml, Format::Binary).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedHeader);
    }

    #[test]
    fn depth_limit_is_shared_by_both_formats() {
        let codec = PlistCodec::new().max_depth(1);
        let value = Value::Array(vec![Value::Array(vec![Value::Array(vec![])])]);
        assert_eq!(codec.encode_binary(&value).unwrap_err().kind(), ErrorKind::NestingTooDeep);
        assert_eq!(codec.encode_xml(&value).unwrap_err().kind(), ErrorKind::NestingTooDeep);
    }

    #[test]
    fn node_limit_caps_binary_decode() {
        let inner = Value::Array(vec![Value::from(1), Value::from(2)]);
        let value = Value::Array(vec![inner.clone(), inner.clone(), inner]);
        let bytes = PlistCodec::new().encode_binary(&value).unwrap();

        // Root plus three copies of a three-value array.
        let codec = PlistCodec::new().max_nodes(10);
        assert_eq!(codec.node_limit(), 10);
        assert_eq!(codec.decode(&bytes).unwrap(), value);
        let err = PlistCodec::new().max_nodes(9).decode(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooLarge);
    }
}
