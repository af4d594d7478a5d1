//! Binary property list decoding: bytes → `Value`.
//!
//! Objects are resolved with an explicit work stack rather than recursion, so
//! the depth limit is the only bound on nesting. Objects referenced from more
//! than one place are cached with their height and node count; a cache hit
//! is checked against both limits before it is cloned into the tree.

use bytes::Buf;

use super::marker;
use super::trailer::Trailer;
use crate::config::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_NODES};
use crate::date::Date;
use crate::error::{PlistError, PlistResult};
use crate::format::{BPLIST_MAGIC, BPLIST_VERSION, HEADER_LEN};
use crate::types::{Dictionary, Uid, Value};

/// Resource limits applied while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Deepest container nesting accepted; the root is at depth 0.
    pub max_depth: usize,
    /// Total values (dictionary keys included) the decoded tree may hold.
    pub max_nodes: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

/// Decodes a complete binary property list.
///
/// The returned value owns all of its data; nothing borrows from `bytes`.
pub fn decode_document(bytes: &[u8], limits: DecodeLimits) -> PlistResult<Value> {
    check_header(bytes)?;
    let trailer = Trailer::parse(bytes)?;
    tracing::trace!(
        num_objects = trailer.num_objects,
        top_object = trailer.top_object,
        offset_table_offset = trailer.offset_table_offset,
        offset_int_size = trailer.offset_int_size,
        object_ref_size = trailer.object_ref_size,
        "read bplist trailer"
    );

    let mut reader = ObjectReader::new(bytes, trailer, limits)?;
    reader.read_root(trailer.top_object)
}

fn check_header(bytes: &[u8]) -> PlistResult<()> {
    let magic_len = BPLIST_MAGIC.len().min(bytes.len());
    if bytes[..magic_len] != BPLIST_MAGIC[..magic_len] {
        return Err(PlistError::MalformedHeader(format!(
            "expected \"bplist\" magic, found {:?}",
            String::from_utf8_lossy(&bytes[..magic_len])
        )));
    }
    if bytes.len() < HEADER_LEN {
        return Err(PlistError::TruncatedInput(format!(
            "header needs {HEADER_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    let version = &bytes[BPLIST_MAGIC.len()..HEADER_LEN];
    if version != BPLIST_VERSION {
        return Err(PlistError::MalformedHeader(format!(
            "unsupported bplist version {:?}",
            String::from_utf8_lossy(version)
        )));
    }
    Ok(())
}

/// A fully decoded object.
#[derive(Clone)]
struct Node {
    value: Value,
    /// Levels of nesting below this value; 0 for scalars and empty containers.
    height: usize,
    /// Values in this subtree, itself and dictionary keys included.
    nodes: usize,
}

/// One object as laid out in the buffer, before its children are resolved.
enum Parsed {
    Leaf(Value),
    Array(Vec<u64>),
    Dictionary { keys: Vec<u64>, values: Vec<u64> },
}

enum Pending {
    Array {
        refs: std::vec::IntoIter<u64>,
        items: Vec<Value>,
    },
    Dictionary {
        keys: std::vec::IntoIter<String>,
        values: std::vec::IntoIter<u64>,
        dict: Dictionary,
    },
}

/// A container whose children are still being resolved.
struct Frame {
    index: usize,
    depth: usize,
    height: usize,
    nodes: usize,
    pending: Pending,
}

impl Frame {
    fn next_ref(&mut self) -> Option<u64> {
        match &mut self.pending {
            Pending::Array { refs, .. } => refs.next(),
            Pending::Dictionary { values, .. } => values.next(),
        }
    }

    fn push(&mut self, child: Node) {
        self.height = self.height.max(child.height + 1);
        self.nodes += child.nodes;
        match &mut self.pending {
            Pending::Array { items, .. } => items.push(child.value),
            Pending::Dictionary { keys, dict, .. } => {
                if let Some(key) = keys.next() {
                    dict.insert(key, child.value);
                }
            }
        }
    }

    fn finish(self) -> (usize, Node) {
        let value = match self.pending {
            Pending::Array { items, .. } => Value::Array(items),
            Pending::Dictionary { dict, .. } => Value::Dictionary(dict),
        };
        let node = Node {
            value,
            height: self.height,
            nodes: self.nodes,
        };
        (self.index, node)
    }
}

/// Resolves objects by index.
struct ObjectReader<'a> {
    bytes: &'a [u8],
    /// Objects live in `HEADER_LEN..objects_end`.
    objects_end: usize,
    object_ref_size: usize,
    offsets: Vec<usize>,
    /// Objects referenced more than once; only these are cached.
    shared: Vec<bool>,
    cache: Vec<Option<Node>>,
    in_progress: Vec<bool>,
    limits: DecodeLimits,
    nodes: usize,
}

impl<'a> ObjectReader<'a> {
    fn new(bytes: &'a [u8], trailer: Trailer, limits: DecodeLimits) -> PlistResult<Self> {
        // The trailer has already checked the table fits inside the buffer.
        let objects_end = trailer.offset_table_offset as usize;
        let num_objects = trailer.num_objects as usize;
        let width = usize::from(trailer.offset_int_size);

        let mut table = &bytes[objects_end..objects_end + num_objects * width];
        let mut offsets = Vec::with_capacity(num_objects);
        for index in 0..num_objects {
            let offset = table.get_uint(width);
            if offset < HEADER_LEN as u64 || offset >= objects_end as u64 {
                return Err(PlistError::InvalidReference(format!(
                    "object {index} has offset {offset} outside the object region {HEADER_LEN}..{objects_end}"
                )));
            }
            offsets.push(offset as usize);
        }

        let object_ref_size = usize::from(trailer.object_ref_size);
        let shared = count_shared(bytes, &offsets, objects_end, object_ref_size);
        Ok(Self {
            bytes,
            objects_end,
            object_ref_size,
            offsets,
            shared,
            cache: vec![None; num_objects],
            in_progress: vec![false; num_objects],
            limits,
            nodes: 0,
        })
    }

    fn read_root(&mut self, top: u64) -> PlistResult<Value> {
        let mut stack: Vec<Frame> = Vec::new();
        if let Some(node) = self.visit(top, 0, &mut stack)? {
            return Ok(node.value);
        }

        while let Some(frame) = stack.last_mut() {
            let depth = frame.depth + 1;
            let child = match frame.next_ref() {
                Some(r) => match self.visit(r, depth, &mut stack)? {
                    Some(node) => node,
                    None => continue,
                },
                None => {
                    let Some(frame) = stack.pop() else { break };
                    let (index, node) = frame.finish();
                    self.in_progress[index] = false;
                    self.remember(index, &node);
                    node
                }
            };
            match stack.last_mut() {
                Some(parent) => parent.push(child),
                None => return Ok(child.value),
            }
        }
        Err(PlistError::InvalidReference(format!(
            "top object {top} did not resolve"
        )))
    }

    /// Resolves a scalar or cached object immediately, or pushes a frame for
    /// a container and returns `None`.
    fn visit(&mut self, index: u64, depth: usize, stack: &mut Vec<Frame>) -> PlistResult<Option<Node>> {
        if depth > self.limits.max_depth {
            return Err(self.too_deep());
        }
        let i = self.resolve(index)?;

        if let Some((height, nodes)) = self.cache[i].as_ref().map(|c| (c.height, c.nodes)) {
            if depth + height > self.limits.max_depth {
                return Err(self.too_deep());
            }
            self.count(nodes)?;
            return Ok(self.cache[i].clone());
        }
        if self.in_progress[i] {
            return Err(PlistError::InvalidReference(format!(
                "object {i} refers back to itself"
            )));
        }

        match self.parse_object(i)? {
            Parsed::Leaf(value) => {
                self.count(1)?;
                let node = Node {
                    value,
                    height: 0,
                    nodes: 1,
                };
                self.remember(i, &node);
                Ok(Some(node))
            }
            Parsed::Array(refs) => {
                self.count(1)?;
                self.in_progress[i] = true;
                stack.push(Frame {
                    index: i,
                    depth,
                    height: 0,
                    nodes: 1,
                    pending: Pending::Array {
                        items: Vec::with_capacity(refs.len()),
                        refs: refs.into_iter(),
                    },
                });
                Ok(None)
            }
            Parsed::Dictionary { keys, values } => {
                let keys = keys
                    .into_iter()
                    .map(|k| self.read_key(k, i))
                    .collect::<PlistResult<Vec<String>>>()?;
                self.count(1 + keys.len())?;
                self.in_progress[i] = true;
                stack.push(Frame {
                    index: i,
                    depth,
                    height: 0,
                    nodes: 1 + keys.len(),
                    pending: Pending::Dictionary {
                        dict: Dictionary::with_capacity(keys.len()),
                        keys: keys.into_iter(),
                        values: values.into_iter(),
                    },
                });
                Ok(None)
            }
        }
    }

    /// Keys must be strings, so they never open a frame.
    fn read_key(&mut self, index: u64, dict: usize) -> PlistResult<String> {
        let i = self.resolve(index)?;
        if let Some(cached) = &self.cache[i] {
            return key_string(&cached.value, dict);
        }
        match self.parse_object(i)? {
            Parsed::Leaf(value) => {
                let key = key_string(&value, dict)?;
                self.remember(
                    i,
                    &Node {
                        value,
                        height: 0,
                        nodes: 1,
                    },
                );
                Ok(key)
            }
            Parsed::Array(_) => Err(key_mismatch("array", dict)),
            Parsed::Dictionary { .. } => Err(key_mismatch("dictionary", dict)),
        }
    }

    fn resolve(&self, index: u64) -> PlistResult<usize> {
        usize::try_from(index)
            .ok()
            .filter(|&i| i < self.offsets.len())
            .ok_or_else(|| {
                PlistError::InvalidReference(format!(
                    "object reference {index} out of range for {} objects",
                    self.offsets.len()
                ))
            })
    }

    fn remember(&mut self, index: usize, node: &Node) {
        if self.shared[index] {
            self.cache[index] = Some(node.clone());
        }
    }

    fn count(&mut self, nodes: usize) -> PlistResult<()> {
        self.nodes = self.nodes.saturating_add(nodes);
        if self.nodes > self.limits.max_nodes {
            return Err(PlistError::TooLarge(format!(
                "decoded tree exceeds {} values",
                self.limits.max_nodes
            )));
        }
        Ok(())
    }

    fn too_deep(&self) -> PlistError {
        PlistError::NestingTooDeep {
            limit: self.limits.max_depth,
        }
    }

    fn parse_object(&self, index: usize) -> PlistResult<Parsed> {
        let offset = self.offsets[index];
        let bytes: &'a [u8] = self.bytes;
        let mut buf = &bytes[offset..self.objects_end];

        let m = buf.get_u8();
        let leaf = match m {
            marker::NULL => Value::Null,
            marker::FALSE => Value::Boolean(false),
            marker::TRUE => Value::Boolean(true),
            marker::FILL => return Err(PlistError::UnsupportedMarker { marker: m, offset }),

            marker::INT_8..=marker::INT_128 => Value::Integer(read_int_body(&mut buf, m)?),

            marker::REAL_32 => {
                ensure_remaining(&buf, 4, "real")?;
                Value::Real(f64::from(buf.get_f32()))
            }
            marker::REAL_64 => {
                ensure_remaining(&buf, 8, "real")?;
                Value::Real(buf.get_f64())
            }

            marker::DATE => {
                ensure_remaining(&buf, 8, "date")?;
                Value::Date(Date::from_apple_timestamp(buf.get_f64()))
            }

            _ => {
                let low = m & 0x0F;
                match m & 0xF0 {
                    marker::DATA_NIBBLE => {
                        let len = read_length(&mut buf, low)?;
                        Value::Data(take(&mut buf, len, "data")?.to_vec())
                    }
                    marker::ASCII_STRING_NIBBLE => {
                        let len = read_length(&mut buf, low)?;
                        let data = take(&mut buf, len, "ASCII string")?;
                        let s = std::str::from_utf8(data).map_err(|e| {
                            PlistError::Encoding(format!("invalid ASCII string in object {index}: {e}"))
                        })?;
                        Value::String(s.to_owned())
                    }
                    marker::UTF16_STRING_NIBBLE => {
                        let units = read_length(&mut buf, low)?;
                        let byte_len = units.checked_mul(2).ok_or_else(|| {
                            PlistError::TruncatedInput(format!("UTF-16 string of {units} units"))
                        })?;
                        let data = take(&mut buf, byte_len, "UTF-16 string")?;
                        Value::String(decode_utf16(data, index)?)
                    }
                    marker::UID_NIBBLE => Value::Uid(read_uid(&mut buf, usize::from(low) + 1)?),
                    marker::ARRAY_NIBBLE => {
                        let len = read_length(&mut buf, low)?;
                        return Ok(Parsed::Array(read_refs(&mut buf, len, self.object_ref_size)?));
                    }
                    marker::DICT_NIBBLE => {
                        let len = read_length(&mut buf, low)?;
                        let keys = read_refs(&mut buf, len, self.object_ref_size)?;
                        let values = read_refs(&mut buf, len, self.object_ref_size)?;
                        return Ok(Parsed::Dictionary { keys, values });
                    }
                    // Sets have no value representation.
                    marker::SET_NIBBLE => {
                        return Err(PlistError::UnsupportedMarker { marker: m, offset });
                    }
                    _ => return Err(PlistError::UnsupportedMarker { marker: m, offset }),
                }
            }
        };
        Ok(Parsed::Leaf(leaf))
    }
}

fn key_string(value: &Value, dict: usize) -> PlistResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(key_mismatch(other.type_name(), dict)),
    }
}

fn key_mismatch(found: &str, dict: usize) -> PlistError {
    PlistError::TypeMismatch(format!(
        "dictionary key in object {dict} must be a string, got {found}"
    ))
}

/// Flags every object that more than one container refers to. Objects that
/// fail to parse here are left for the decoding pass to report.
fn count_shared(bytes: &[u8], offsets: &[usize], objects_end: usize, ref_size: usize) -> Vec<bool> {
    let mut counts = vec![0u8; offsets.len()];
    for &offset in offsets {
        let mut buf = &bytes[offset..objects_end];
        let m = buf.get_u8();
        let lists = match m & 0xF0 {
            marker::ARRAY_NIBBLE => 1,
            marker::DICT_NIBBLE => 2,
            _ => continue,
        };
        let Ok(len) = read_length(&mut buf, m & 0x0F) else {
            continue;
        };
        let Some(total) = len.checked_mul(lists) else {
            continue;
        };
        let Ok(refs) = read_refs(&mut buf, total, ref_size) else {
            continue;
        };
        for r in refs {
            if let Some(count) = usize::try_from(r).ok().and_then(|r| counts.get_mut(r)) {
                *count = count.saturating_add(1);
            }
        }
    }
    counts.into_iter().map(|c| c > 1).collect()
}

fn read_refs(buf: &mut &[u8], count: usize, ref_size: usize) -> PlistResult<Vec<u64>> {
    let needed = count
        .checked_mul(ref_size)
        .ok_or_else(|| PlistError::TruncatedInput(format!("{count} object references")))?;
    ensure_remaining(&*buf, needed, "object references")?;
    Ok((0..count).map(|_| buf.get_uint(ref_size)).collect())
}


fn ensure_remaining(buf: &impl Buf, needed: usize, what: &str) -> PlistResult<()> {
    if buf.remaining() < needed {
        Err(PlistError::TruncatedInput(format!(
            "{what} needs {needed} bytes but only {} remain",
            buf.remaining()
        )))
    } else {
        Ok(())
    }
}

fn take<'b>(buf: &mut &'b [u8], len: usize, what: &str) -> PlistResult<&'b [u8]> {
    ensure_remaining(&*buf, len, what)?;
    let (head, tail) = buf.split_at(len);
    *buf = tail;
    Ok(head)
}

/// Reads the payload of an integer whose marker has already been consumed.
fn read_int_body(buf: &mut &[u8], m: u8) -> PlistResult<i64> {
    match m {
        marker::INT_8 => {
            ensure_remaining(&*buf, 1, "integer")?;
            Ok(i64::from(buf.get_u8()))
        }
        marker::INT_16 => {
            ensure_remaining(&*buf, 2, "integer")?;
            Ok(i64::from(buf.get_u16()))
        }
        marker::INT_32 => {
            ensure_remaining(&*buf, 4, "integer")?;
            Ok(i64::from(buf.get_u32()))
        }
        marker::INT_64 => {
            ensure_remaining(&*buf, 8, "integer")?;
            Ok(buf.get_i64())
        }
        marker::INT_128 => {
            ensure_remaining(&*buf, 16, "integer")?;
            let wide = buf.get_i128();
            i64::try_from(wide).map_err(|_| {
                PlistError::IntegerOverflow(format!("{wide} does not fit in 64 bits"))
            })
        }
        _ => Err(PlistError::TypeMismatch(format!(
            "0x{m:02X} is not an integer marker"
        ))),
    }
}

/// Reads a length from the low nibble, or from the integer object that
/// follows when the nibble is `LONG_LENGTH`.
fn read_length(buf: &mut &[u8], low: u8) -> PlistResult<usize> {
    if low != marker::LONG_LENGTH {
        return Ok(usize::from(low));
    }
    ensure_remaining(&*buf, 1, "length marker")?;
    let m = buf.get_u8();
    if m & 0xF0 != marker::INT_NIBBLE {
        return Err(PlistError::TypeMismatch(format!(
            "long length must be an integer object, found marker 0x{m:02X}"
        )));
    }
    let len = read_int_body(buf, m)?;
    usize::try_from(len)
        .map_err(|_| PlistError::TypeMismatch(format!("invalid object length {len}")))
}

fn read_uid(buf: &mut &[u8], width: usize) -> PlistResult<Uid> {
    let data = take(buf, width, "uid")?;
    let (high, low) = data.split_at(width.saturating_sub(8));
    if high.iter().any(|&b| b != 0) {
        return Err(PlistError::IntegerOverflow(format!(
            "{width}-byte uid does not fit in 64 bits"
        )));
    }
    let mut low = low;
    Ok(Uid(low.get_uint(low.len())))
}

fn decode_utf16(data: &[u8], index: usize) -> PlistResult<String> {
    let units = data
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|e| PlistError::Encoding(format!("invalid UTF-16 in object {index}: {e}")))
}
