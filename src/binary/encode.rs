//! Binary property list encoding: `Value` → bytes.

use bytes::{BufMut, Bytes, BytesMut};

use super::marker;
use super::table::{Object, ObjectTable};
use super::trailer::Trailer;
use crate::error::{PlistError, PlistResult};
use crate::format::{BPLIST_MAGIC, BPLIST_VERSION};
use crate::types::Value;

/// Encodes a value as a complete `bplist00` document.
pub fn encode_document(value: &Value, max_depth: usize) -> PlistResult<Bytes> {
    let table = ObjectTable::build(value, max_depth)?;
    let num_objects = table.len();
    let object_ref_size = ref_width(num_objects)?;

    let mut buf = BytesMut::with_capacity(64 + num_objects * 8);
    buf.put_slice(BPLIST_MAGIC);
    buf.put_slice(BPLIST_VERSION);

    let mut offsets = Vec::with_capacity(num_objects);
    for object in table.objects() {
        offsets.push(buf.len() as u64);
        encode_object(&mut buf, object, object_ref_size)?;
    }

    let offset_table_offset = buf.len() as u64;
    let largest = offsets.last().copied().unwrap_or(0);
    let offset_int_size = uint_width(largest);
    for &offset in &offsets {
        buf.put_uint(offset, offset_int_size);
    }

    let trailer = Trailer {
        sort_version: 0,
        offset_int_size: offset_int_size as u8,
        object_ref_size: object_ref_size as u8,
        num_objects: num_objects as u64,
        top_object: 0,
        offset_table_offset,
    };
    trailer.write(&mut buf);

    tracing::debug!(
        num_objects,
        object_ref_size,
        offset_int_size,
        len = buf.len(),
        "encoded binary plist"
    );
    Ok(buf.freeze())
}

/// Smallest reference width (1, 2 or 4 bytes) able to address every object.
fn ref_width(num_objects: usize) -> PlistResult<usize> {
    let max_index = num_objects.saturating_sub(1) as u64;
    match uint_width(max_index) {
        w @ (1 | 2 | 4) => Ok(w),
        _ => Err(PlistError::TooLarge(format!(
            "{num_objects} objects cannot be addressed with 4-byte references"
        ))),
    }
}

/// Smallest of 1, 2, 4 or 8 bytes that holds `value` unsigned.
fn uint_width(value: u64) -> usize {
    if value <= u64::from(u8::MAX) {
        1
    } else if value <= u64::from(u16::MAX) {
        2
    } else if value <= u64::from(u32::MAX) {
        4
    } else {
        8
    }
}

fn encode_object(buf: &mut BytesMut, object: &Object<'_>, ref_size: usize) -> PlistResult<()> {
    match object {
        Object::Null => buf.put_u8(marker::NULL),
        Object::Boolean(b) => buf.put_u8(if *b { marker::TRUE } else { marker::FALSE }),
        Object::Integer(i) => encode_int(buf, *i),
        Object::Real(r) => {
            buf.put_u8(marker::REAL_64);
            buf.put_f64(*r);
        }
        Object::Date(timestamp) => {
            buf.put_u8(marker::DATE);
            buf.put_f64(*timestamp);
        }
        Object::Data(data) => {
            encode_header(buf, marker::DATA_NIBBLE, data.len())?;
            buf.put_slice(data);
        }
        Object::String(s) => encode_string(buf, s)?,
        Object::Uid(u) => {
            let width = uint_width(*u);
            buf.put_u8(marker::UID_NIBBLE | (width as u8 - 1));
            buf.put_uint(*u, width);
        }
        Object::Array(refs) => {
            encode_header(buf, marker::ARRAY_NIBBLE, refs.len())?;
            encode_refs(buf, refs, ref_size);
        }
        Object::Dictionary { keys, values } => {
            encode_header(buf, marker::DICT_NIBBLE, keys.len())?;
            encode_refs(buf, keys, ref_size);
            encode_refs(buf, values, ref_size);
        }
    }
    Ok(())
}

/// Encodes an integer using the smallest width that holds it. Negative
/// values always take the 8-byte two's-complement form.
pub fn encode_int(buf: &mut BytesMut, value: i64) {
    if value < 0 {
        buf.put_u8(marker::INT_64);
        buf.put_i64(value);
        return;
    }
    let unsigned = value as u64;
    match uint_width(unsigned) {
        1 => {
            buf.put_u8(marker::INT_8);
            buf.put_u8(unsigned as u8);
        }
        2 => {
            buf.put_u8(marker::INT_16);
            buf.put_u16(unsigned as u16);
        }
        4 => {
            buf.put_u8(marker::INT_32);
            buf.put_u32(unsigned as u32);
        }
        _ => {
            buf.put_u8(marker::INT_64);
            buf.put_i64(value);
        }
    }
}

/// Writes a marker with an inline length, or the long form followed by an
/// integer object when the length does not fit in the low nibble.
fn encode_header(buf: &mut BytesMut, nibble: u8, len: usize) -> PlistResult<()> {
    if len <= marker::MAX_SHORT_LENGTH {
        buf.put_u8(nibble | len as u8);
    } else {
        let len = i64::try_from(len)
            .map_err(|_| PlistError::TooLarge(format!("object length {len}")))?;
        buf.put_u8(nibble | marker::LONG_LENGTH);
        encode_int(buf, len);
    }
    Ok(())
}

/// ASCII text is stored byte per character, anything else as UTF-16BE.
fn encode_string(buf: &mut BytesMut, s: &str) -> PlistResult<()> {
    if s.is_ascii() {
        encode_header(buf, marker::ASCII_STRING_NIBBLE, s.len())?;
        buf.put_slice(s.as_bytes());
    } else {
        let units: Vec<u16> = s.encode_utf16().collect();
        encode_header(buf, marker::UTF16_STRING_NIBBLE, units.len())?;
        for unit in units {
            buf.put_u16(unit);
        }
    }
    Ok(())
}

fn encode_refs(buf: &mut BytesMut, refs: &[usize], ref_size: usize) {
    for &r in refs {
        buf.put_uint(r as u64, ref_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::decode::{DecodeLimits, decode_document};
    use crate::types::Dictionary;

    fn encode(value: &Value) -> Bytes {
        encode_document(value, 512).unwrap()
    }

    #[test]
    fn golden_array_of_true() {
        let bytes = encode(&Value::Array(vec![Value::Boolean(true)]));
        let mut expected = b"bplist00".to_vec();
        expected.extend_from_slice(&[0xA1, 0x01, 0x09]);
        expected.extend_from_slice(&[0x08, 0x0A]);
        expected.extend_from_slice(&[0, 0, 0, 0, 0, 0, 1, 1]);
        expected.extend_from_slice(&2u64.to_be_bytes());
        expected.extend_from_slice(&0u64.to_be_bytes());
        expected.extend_from_slice(&11u64.to_be_bytes());
        assert_eq!(&bytes[..], &expected[..]);
    }

    #[test]
    fn minimal_integer_widths() {
        let mut buf = BytesMut::new();
        encode_int(&mut buf, 200);
        assert_eq!(&buf[..], &[0x10, 0xC8]);

        buf.clear();
        encode_int(&mut buf, 256);
        assert_eq!(&buf[..], &[0x11, 0x01, 0x00]);

        buf.clear();
        encode_int(&mut buf, 70_000);
        assert_eq!(&buf[..], &[0x12, 0x00, 0x01, 0x11, 0x70]);

        buf.clear();
        encode_int(&mut buf, 1 << 40);
        assert_eq!(buf[0], marker::INT_64);
        assert_eq!(&buf[1..], &(1i64 << 40).to_be_bytes());
    }

    #[test]
    fn negative_integers_use_eight_bytes() {
        let mut buf = BytesMut::new();
        encode_int(&mut buf, -1);
        assert_eq!(&buf[..], &[0x13, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn long_length_uses_integer_object() {
        let mut buf = BytesMut::new();
        encode_string(&mut buf, "abcdefghijklmnop").unwrap();
        assert_eq!(&buf[..3], &[0x5F, 0x10, 16]);
        assert_eq!(&buf[3..], b"abcdefghijklmnop");

        buf.clear();
        encode_string(&mut buf, "abcdefghijklmn").unwrap();
        assert_eq!(buf[0], 0x5E);
    }

    #[test]
    fn non_ascii_strings_are_utf16() {
        let mut buf = BytesMut::new();
        encode_string(&mut buf, "é😀").unwrap();
        assert_eq!(&buf[..], &[0x63, 0x00, 0xE9, 0xD8, 0x3D, 0xDE, 0x00]);
    }

    #[test]
    fn uid_width() {
        let mut buf = BytesMut::new();
        encode_object(&mut buf, &Object::Uid(7), 1).unwrap();
        assert_eq!(&buf[..], &[0x80, 0x07]);

        buf.clear();
        encode_object(&mut buf, &Object::Uid(70_000), 1).unwrap();
        assert_eq!(&buf[..], &[0x83, 0x00, 0x01, 0x11, 0x70]);
    }

    #[test]
    fn date_written_relative_to_2001() {
        let date = crate::date::Date::from_unix_seconds(1_316_917_864.0);
        let bytes = encode(&Value::Array(vec![Value::Date(date)]));
        // array at 8 (2 bytes), date at 10
        assert_eq!(bytes[10], marker::DATE);
        assert_eq!(&bytes[11..19], &338_610_664.0f64.to_be_bytes());
    }

    #[test]
    fn ref_width_upgrades_past_256_objects() {
        assert_eq!(ref_width(256).unwrap(), 1);
        assert_eq!(ref_width(257).unwrap(), 2);
        assert_eq!(ref_width(65_537).unwrap(), 4);

        // Root array plus 256 distinct integers is 257 objects.
        let items: Vec<Value> = (0..256).map(Value::from).collect();
        let bytes = encode(&Value::Array(items.clone()));
        let trailer = Trailer::parse(&bytes).unwrap();
        assert_eq!(trailer.num_objects, 257);
        assert_eq!(trailer.object_ref_size, 2);
        assert_eq!(decode_document(&bytes, DecodeLimits::default()).unwrap(), Value::Array(items));

        let items: Vec<Value> = (0..255).map(Value::from).collect();
        let bytes = encode(&Value::Array(items));
        assert_eq!(Trailer::parse(&bytes).unwrap().object_ref_size, 1);
    }

    #[test]
    fn offset_width_grows_with_document() {
        let big = Value::Array(vec![Value::Data(vec![0xAB; 300]), Value::Boolean(false)]);
        let bytes = encode(&big);
        let trailer = Trailer::parse(&bytes).unwrap();
        assert_eq!(trailer.offset_int_size, 2);
        assert_eq!(decode_document(&bytes, DecodeLimits::default()).unwrap(), big);
    }

    #[test]
    fn uniqued_dictionaries_share_one_reference() {
        let inner = Value::Dictionary(Dictionary::from([("test string", "inner dict item")]));
        let value = Value::Array(vec![inner.clone(), inner.clone()]);
        let bytes = encode(&value);
        // Root array: marker, then two 1-byte references.
        assert_eq!(&bytes[8..11], &[0xA2, 0x01, 0x01]);
        assert_eq!(decode_document(&bytes, DecodeLimits::default()).unwrap(), value);
    }

    #[test]
    fn encoding_is_deterministic() {
        let value = Value::Dictionary(Dictionary::from([
            ("b", Value::from(1)),
            ("a", Value::from("two")),
            ("c", Value::Array(vec![Value::from(1.5), Value::from(true)])),
        ]));
        assert_eq!(encode(&value), encode(&value));
    }

    #[test]
    fn depth_limit_applies_to_writer() {
        let mut value = Value::Boolean(true);
        for _ in 0..5 {
            value = Value::Array(vec![value]);
        }
        assert_eq!(
            encode_document(&value, 4).unwrap_err(),
            PlistError::NestingTooDeep { limit: 4 }
        );
    }
}
