//! Binary property list object marker bytes.
//!
//! The high nibble of a marker selects the object type and the low nibble
//! carries a length or width code.

// Singletons (high nibble 0x0)
pub const NULL: u8 = 0x00;
pub const FALSE: u8 = 0x08;
pub const TRUE: u8 = 0x09;
pub const FILL: u8 = 0x0F;

// Integer: low nibble n means 2^n bytes follow
pub const INT_NIBBLE: u8 = 0x10;
pub const INT_8: u8 = 0x10;
pub const INT_16: u8 = 0x11;
pub const INT_32: u8 = 0x12;
pub const INT_64: u8 = 0x13;
pub const INT_128: u8 = 0x14;

// Real (IEEE 754, big-endian)
pub const REAL_32: u8 = 0x22;
pub const REAL_64: u8 = 0x23;

// Date: 8-byte double, seconds since 2001-01-01T00:00:00Z
pub const DATE: u8 = 0x33;

// Length-carrying types: low nibble = length, or LONG_LENGTH
pub const DATA_NIBBLE: u8 = 0x40;
pub const ASCII_STRING_NIBBLE: u8 = 0x50;
pub const UTF16_STRING_NIBBLE: u8 = 0x60;
// UID: low nibble = byte width - 1
pub const UID_NIBBLE: u8 = 0x80;
pub const ARRAY_NIBBLE: u8 = 0xA0;
pub const SET_NIBBLE: u8 = 0xC0;
pub const DICT_NIBBLE: u8 = 0xD0;

/// Low nibble signalling that an integer object holding the length follows.
pub const LONG_LENGTH: u8 = 0x0F;

/// Largest length that fits in the low nibble.
pub const MAX_SHORT_LENGTH: usize = 14;
