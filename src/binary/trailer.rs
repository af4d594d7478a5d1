//! The fixed 32-byte trailer at the end of a binary property list.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{PlistError, PlistResult};
use crate::format::HEADER_LEN;

/// Size of the trailer in bytes.
pub const TRAILER_LEN: usize = 32;

/// Sizing and addressing metadata needed to locate every object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub sort_version: u8,
    /// Width in bytes of each offset table entry.
    pub offset_int_size: u8,
    /// Width in bytes of each object reference inside arrays and dictionaries.
    pub object_ref_size: u8,
    pub num_objects: u64,
    pub top_object: u64,
    pub offset_table_offset: u64,
}

impl Trailer {
    /// Reads the trailer from the last 32 bytes of `bytes` and checks that the
    /// offset table it describes lies between the header and the trailer.
    ///
    /// A trailer that cannot describe a layout inside the buffer is reported
    /// as truncated input, since reading the tail of a short buffer is the
    /// usual way to get one.
    pub fn parse(bytes: &[u8]) -> PlistResult<Self> {
        if bytes.len() < HEADER_LEN + TRAILER_LEN {
            return Err(PlistError::TruncatedInput(format!(
                "need at least {} bytes for header and trailer, got {}",
                HEADER_LEN + TRAILER_LEN,
                bytes.len()
            )));
        }

        let mut buf = &bytes[bytes.len() - TRAILER_LEN..];
        buf.advance(5);
        let sort_version = buf.get_u8();
        let offset_int_size = buf.get_u8();
        let object_ref_size = buf.get_u8();
        let num_objects = buf.get_u64();
        let top_object = buf.get_u64();
        let offset_table_offset = buf.get_u64();

        let trailer = Self {
            sort_version,
            offset_int_size,
            object_ref_size,
            num_objects,
            top_object,
            offset_table_offset,
        };
        trailer.validate(bytes.len())?;
        Ok(trailer)
    }

    fn validate(&self, total_len: usize) -> PlistResult<()> {
        if !(1..=8).contains(&self.offset_int_size) || !(1..=8).contains(&self.object_ref_size) {
            return Err(PlistError::TruncatedInput(format!(
                "trailer has invalid widths (offset {}, ref {})",
                self.offset_int_size, self.object_ref_size
            )));
        }
        if self.num_objects == 0 {
            return Err(PlistError::TruncatedInput(
                "trailer declares no objects".into(),
            ));
        }

        let table_end = (self.num_objects)
            .checked_mul(u64::from(self.offset_int_size))
            .and_then(|len| len.checked_add(self.offset_table_offset));
        let trailer_start = (total_len - TRAILER_LEN) as u64;
        match table_end {
            Some(end) if self.offset_table_offset >= HEADER_LEN as u64 && end <= trailer_start => {}
            _ => {
                return Err(PlistError::TruncatedInput(format!(
                    "offset table at {} with {} entries does not fit before the trailer at {}",
                    self.offset_table_offset, self.num_objects, trailer_start
                )));
            }
        }

        if self.top_object >= self.num_objects {
            return Err(PlistError::InvalidReference(format!(
                "top object {} out of range for {} objects",
                self.top_object, self.num_objects
            )));
        }
        Ok(())
    }

    pub fn write(&self, buf: &mut BytesMut) {
        buf.put_bytes(0, 5);
        buf.put_u8(self.sort_version);
        buf.put_u8(self.offset_int_size);
        buf.put_u8(self.object_ref_size);
        buf.put_u64(self.num_objects);
        buf.put_u64(self.top_object);
        buf.put_u64(self.offset_table_offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sample() -> Trailer {
        Trailer {
            sort_version: 0,
            offset_int_size: 1,
            object_ref_size: 1,
            num_objects: 2,
            top_object: 0,
            offset_table_offset: 11,
        }
    }

    fn with_trailer(prefix_len: usize, trailer: &Trailer) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_slice(b"bplist00");
        buf.put_bytes(0, prefix_len - 8);
        trailer.write(&mut buf);
        buf.to_vec()
    }

    #[test]
    fn layout_is_32_bytes_big_endian() {
        let mut buf = BytesMut::new();
        sample().write(&mut buf);
        assert_eq!(buf.len(), TRAILER_LEN);
        assert_eq!(&buf[..8], &[0, 0, 0, 0, 0, 0, 1, 1]);
        assert_eq!(&buf[8..16], &2u64.to_be_bytes());
        assert_eq!(&buf[16..24], &0u64.to_be_bytes());
        assert_eq!(&buf[24..32], &11u64.to_be_bytes());
    }

    #[test]
    fn parse_written_trailer() {
        let bytes = with_trailer(13, &sample());
        assert_eq!(Trailer::parse(&bytes).unwrap(), sample());
    }

    #[test]
    fn short_buffer_is_truncated() {
        let err = Trailer::parse(b"bplist00").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
    }

    #[test]
    fn offset_table_past_trailer_is_truncated() {
        let mut t = sample();
        t.offset_table_offset = 12; // table would end at 14 > 13
        let bytes = with_trailer(13, &t);
        assert_eq!(Trailer::parse(&bytes).unwrap_err().kind(), ErrorKind::TruncatedInput);
    }

    #[test]
    fn zero_width_is_rejected() {
        let mut t = sample();
        t.offset_int_size = 0;
        let bytes = with_trailer(13, &t);
        assert_eq!(Trailer::parse(&bytes).unwrap_err().kind(), ErrorKind::TruncatedInput);
    }

    #[test]
    fn top_object_out_of_range() {
        let mut t = sample();
        t.top_object = 2;
        let bytes = with_trailer(13, &t);
        assert_eq!(Trailer::parse(&bytes).unwrap_err().kind(), ErrorKind::InvalidReference);
    }
}
