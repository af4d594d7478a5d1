//! Hostile and damaged input must fail with a typed error, never panic.

use bytes::BytesMut;
use plistr::binary::Trailer;
use plistr::{ErrorKind, Format, PlistCodec, Value};

fn sample_binary() -> Vec<u8> {
    let value = Value::Array(vec![
        Value::from("hello"),
        Value::from(42),
        Value::Data(vec![1, 2, 3, 4]),
    ]);
    plistr::encode_binary(&value).unwrap().to_vec()
}

/// Header, the given objects, a one-byte offset table and a trailer.
fn assemble(objects: &[&[u8]], top: u64) -> Vec<u8> {
    let mut out = b"bplist00".to_vec();
    let mut offsets = Vec::new();
    for object in objects {
        offsets.push(out.len() as u8);
        out.extend_from_slice(object);
    }
    let offset_table_offset = out.len() as u64;
    out.extend_from_slice(&offsets);
    let mut trailer = BytesMut::new();
    Trailer {
        sort_version: 0,
        offset_int_size: 1,
        object_ref_size: 1,
        num_objects: objects.len() as u64,
        top_object: top,
        offset_table_offset,
    }
    .write(&mut trailer);
    out.extend_from_slice(&trailer);
    out
}

#[test]
fn truncated_by_one_byte() {
    let mut bytes = sample_binary();
    bytes.pop();
    let err = plistr::decode(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TruncatedInput, "{err}");
}

#[test]
fn every_prefix_fails_cleanly() {
    let bytes = sample_binary();
    for len in 0..bytes.len() {
        assert!(plistr::decode_as(&bytes[..len], Format::Binary).is_err(), "prefix {len}");
    }
}

#[test]
fn unknown_version_is_malformed_header() {
    let mut bytes = sample_binary();
    bytes[6..8].copy_from_slice(b"99");
    let err = plistr::decode(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedHeader);
}

#[test]
fn xml_forced_through_binary_reader() {
    let xml = plistr::encode_xml(&Value::from(1)).unwrap();
    let err = plistr::decode_as(&xml, Format::Binary).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedHeader);
}

#[test]
fn offset_outside_object_area() {
    let mut bytes = assemble(&[&[0xA1, 0x01], &[0x09]], 0);
    let offset_table = bytes.len() - 32 - 2;
    bytes[offset_table + 1] = 0xF0;
    let err = plistr::decode(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidReference);
}

#[test]
fn top_object_out_of_range() {
    let bytes = assemble(&[&[0x09]], 5);
    let err = plistr::decode(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidReference);
}

#[test]
fn self_containing_array() {
    let bytes = assemble(&[&[0xA1, 0x00]], 0);
    let err = plistr::decode(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidReference);
}

#[test]
fn set_marker_is_unsupported() {
    let bytes = assemble(&[&[0xC1, 0x01], &[0x09]], 0);
    let err = plistr::decode(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedMarker);
}

#[test]
fn deeply_nested_binary_hits_depth_limit() {
    // Each array holds the next one; the last is empty.
    let depth = 20usize;
    let mut objects: Vec<Vec<u8>> = (1..depth).map(|next| vec![0xA1, next as u8]).collect();
    objects.push(vec![0xA0]);
    let refs: Vec<&[u8]> = objects.iter().map(Vec::as_slice).collect();
    let bytes = assemble(&refs, 0);

    assert!(PlistCodec::new().decode(&bytes).is_ok());
    let err = PlistCodec::new().max_depth(10).decode(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NestingTooDeep);
}

#[test]
fn shared_subtree_reached_deeper_still_hits_depth_limit() {
    // Root [b0, a0]. b0..b5 is a chain ending in an empty array, a0..a5 is a
    // chain whose last array holds b0 again.
    let mut objects: Vec<Vec<u8>> = vec![vec![0xA2, 1, 7]];
    objects.extend((2..7u8).map(|next| vec![0xA1, next]));
    objects.push(vec![0xA0]);
    objects.extend((8..13u8).map(|next| vec![0xA1, next]));
    objects.push(vec![0xA1, 1]);
    let refs: Vec<&[u8]> = objects.iter().map(Vec::as_slice).collect();
    let bytes = assemble(&refs, 0);

    let err = PlistCodec::new().max_depth(10).decode(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NestingTooDeep);
    assert!(PlistCodec::new().max_depth(13).decode(&bytes).is_ok());
}

#[test]
fn shared_fan_out_hits_node_limit() {
    // Object i is [i+1, i+1], so 64 levels describe 2^64 values.
    let mut objects: Vec<Vec<u8>> = (1..=64u8).map(|next| vec![0xA2, next, next]).collect();
    objects.push(vec![0x08]);
    let refs: Vec<&[u8]> = objects.iter().map(Vec::as_slice).collect();
    let bytes = assemble(&refs, 0);

    let err = PlistCodec::new().max_nodes(100_000).decode(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TooLarge);
}

#[test]
fn deeply_nested_xml_hits_default_limit() {
    let text = format!("<plist>{}{}</plist>", "<array>".repeat(600), "</array>".repeat(600));
    let err = plistr::decode(text.as_bytes()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NestingTooDeep);
}

#[test]
fn external_entities_are_never_resolved() {
    let text = r#"<?xml version="1.0"?>
<!DOCTYPE plist [
  <!ENTITY xxe SYSTEM "file:///etc/passwd">
]>
<plist version="1.0"><string>&xxe;</string></plist>"#;
    let err = plistr::decode(text.as_bytes()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::XmlSyntax);
}

#[test]
fn xml_errors_carry_a_position() {
    let text = "<plist>\n  <integer>1</string>\n</plist>";
    match plistr::decode(text.as_bytes()).unwrap_err() {
        plistr::PlistError::XmlSyntax { line, .. } => assert_eq!(line, 2),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn oversized_xml_integer() {
    let text = "<plist><integer>18446744073709551616</integer></plist>";
    let err = plistr::decode(text.as_bytes()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IntegerOverflow);
}

#[test]
fn empty_input() {
    assert!(plistr::decode(b"").is_err());
    assert!(plistr::decode_as(b"", Format::Binary).is_err());
}
