//! XML property list encoding: `Value` → text.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::{BufMut, Bytes, BytesMut};

use super::decode::UID_KEY;
use super::escape::escape;
use crate::error::{PlistError, PlistResult};
use crate::types::Value;

pub const XML_PROLOG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";
pub const PLIST_DOCTYPE: &str = "<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">";

/// Layout settings for the XML writer.
#[derive(Debug, Clone, Copy)]
pub struct XmlStyle<'a> {
    pub indent: &'a str,
    /// Base64 characters per `<data>` line; 0 disables wrapping.
    pub data_line_width: usize,
    pub max_depth: usize,
}

/// Encodes a value as a complete XML property list document.
pub fn encode_document(value: &Value, style: XmlStyle<'_>) -> PlistResult<Bytes> {
    value.check_depth(style.max_depth)?;
    let mut writer = XmlWriter {
        buf: BytesMut::with_capacity(256),
        style,
    };
    writer.line(0, XML_PROLOG);
    writer.line(0, PLIST_DOCTYPE);
    writer.line(0, "<plist version=\"1.0\">");
    writer.write_value(value, 0)?;
    writer.line(0, "</plist>");

    tracing::debug!(len = writer.buf.len(), "encoded XML plist");
    Ok(writer.buf.freeze())
}

struct XmlWriter<'a> {
    buf: BytesMut,
    style: XmlStyle<'a>,
}

impl XmlWriter<'_> {
    fn line(&mut self, level: usize, text: &str) {
        for _ in 0..level {
            self.buf.put_slice(self.style.indent.as_bytes());
        }
        self.buf.put_slice(text.as_bytes());
        self.buf.put_u8(b'\n');
    }

    fn element(&mut self, level: usize, tag: &str, content: &str) {
        self.line(level, &format!("<{tag}>{content}</{tag}>"));
    }

    fn write_value(&mut self, value: &Value, level: usize) -> PlistResult<()> {
        match value {
            Value::Null => {
                return Err(PlistError::TypeMismatch(
                    "null has no XML property list representation".into(),
                ));
            }
            Value::Boolean(true) => self.line(level, "<true/>"),
            Value::Boolean(false) => self.line(level, "<false/>"),
            Value::Integer(i) => self.element(level, "integer", &i.to_string()),
            Value::Real(r) => self.element(level, "real", &format_real(*r)),
            Value::Date(d) => self.element(level, "date", &d.to_iso8601()?),
            Value::Data(data) => self.write_data(data, level),
            Value::String(s) => self.element(level, "string", &escape(s)?),
            Value::Uid(u) => {
                self.line(level, "<dict>");
                self.element(level + 1, "key", UID_KEY);
                self.element(level + 1, "integer", &u.0.to_string());
                self.line(level, "</dict>");
            }
            Value::Array(items) if items.is_empty() => self.line(level, "<array/>"),
            Value::Array(items) => {
                self.line(level, "<array>");
                for item in items {
                    self.write_value(item, level + 1)?;
                }
                self.line(level, "</array>");
            }
            Value::Dictionary(dict) if dict.is_empty() => self.line(level, "<dict/>"),
            Value::Dictionary(dict) => {
                self.line(level, "<dict>");
                for (key, item) in dict {
                    self.element(level + 1, "key", &escape(key)?);
                    self.write_value(item, level + 1)?;
                }
                self.line(level, "</dict>");
            }
        }
        Ok(())
    }

    fn write_data(&mut self, data: &[u8], level: usize) {
        let encoded = BASE64.encode(data);
        self.line(level, "<data>");
        if !encoded.is_empty() {
            let width = match self.style.data_line_width {
                0 => encoded.len(),
                w => w,
            };
            for chunk in encoded.as_bytes().chunks(width) {
                // Base64 output is ASCII, so any byte boundary is a char boundary.
                let chunk = std::str::from_utf8(chunk).unwrap_or_default();
                self.line(level, chunk);
            }
        }
        self.line(level, "</data>");
    }
}

/// Shortest text that parses back to the same `f64`.
fn format_real(r: f64) -> String {
    if r.is_nan() {
        "nan".into()
    } else if r == f64::INFINITY {
        "+infinity".into()
    } else if r == f64::NEG_INFINITY {
        "-infinity".into()
    } else {
        format!("{r:?}")
    }
}
