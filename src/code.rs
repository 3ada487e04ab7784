//! Type codes used in the igbinary binary format.
//!
//! Every encoded value starts with one of these bytes. The numbering is fixed by the
//! format and shared with every other igbinary implementation, so it must never change.
//! Object, object-id, serialized-object and reference codes are never produced, and are
//! only understood by [`Decoder::skip`](crate::Decoder::skip).

/// Stream header written once before the first value: magic zeroes plus format version 2.
pub const HEADER: [u8; 4] = [0x00, 0x00, 0x00, 0x02];

pub const NIL: u8 = 0x00;
pub const ARRAY_REF8: u8 = 0x01;
pub const ARRAY_REF16: u8 = 0x02;
pub const ARRAY_REF32: u8 = 0x03;
pub const BOOL_FALSE: u8 = 0x04;
pub const BOOL_TRUE: u8 = 0x05;
/// Integer, 8-bit positive magnitude
pub const POS_INT8: u8 = 0x06;
/// Integer, 8-bit negative magnitude
pub const NEG_INT8: u8 = 0x07;
pub const POS_INT16: u8 = 0x08;
pub const NEG_INT16: u8 = 0x09;
pub const POS_INT32: u8 = 0x0a;
pub const NEG_INT32: u8 = 0x0b;
/// IEEE 754 double, 8 bytes big-endian
pub const DOUBLE: u8 = 0x0c;
pub const STRING_EMPTY: u8 = 0x0d;
/// Back-reference to a previously sent string
pub const STRING_ID8: u8 = 0x0e;
pub const STRING_ID16: u8 = 0x0f;
pub const STRING_ID32: u8 = 0x10;
/// Literal string, 8-bit length prefix
pub const STRING8: u8 = 0x11;
pub const STRING16: u8 = 0x12;
pub const STRING32: u8 = 0x13;
pub const ARRAY8: u8 = 0x14;
pub const ARRAY16: u8 = 0x15;
pub const ARRAY32: u8 = 0x16;
pub const OBJECT8: u8 = 0x17;
pub const OBJECT16: u8 = 0x18;
pub const OBJECT32: u8 = 0x19;
pub const OBJECT_ID8: u8 = 0x1a;
pub const OBJECT_ID16: u8 = 0x1b;
pub const OBJECT_ID32: u8 = 0x1c;
pub const OBJECT_SER8: u8 = 0x1d;
pub const OBJECT_SER16: u8 = 0x1e;
pub const OBJECT_SER32: u8 = 0x1f;
pub const POS_INT64: u8 = 0x20;
pub const NEG_INT64: u8 = 0x21;
pub const OBJECT_REF8: u8 = 0x22;
pub const OBJECT_REF16: u8 = 0x23;
pub const OBJECT_REF32: u8 = 0x24;
pub const SIMPLE_REF: u8 = 0x25;

/// Returns true for the integer codes that carry a negative magnitude.
#[inline]
pub fn is_negative(code: u8) -> bool {
    matches!(code, NEG_INT8 | NEG_INT16 | NEG_INT32 | NEG_INT64)
}

/// Returns true for the string back-reference codes.
#[inline]
pub fn is_string_id(code: u8) -> bool {
    matches!(code, STRING_ID8 | STRING_ID16 | STRING_ID32)
}

/// Returns true for any integer code, regardless of sign or width.
#[inline]
pub fn is_integer(code: u8) -> bool {
    matches!(
        code,
        POS_INT8 | NEG_INT8 | POS_INT16 | NEG_INT16 | POS_INT32 | NEG_INT32 | POS_INT64 | NEG_INT64
    )
}

/// Payload width in bytes of an integer code, or `None` if `code` is not an integer code.
#[inline]
pub fn integer_width(code: u8) -> Option<usize> {
    match code {
        POS_INT8 | NEG_INT8 => Some(1),
        POS_INT16 | NEG_INT16 => Some(2),
        POS_INT32 | NEG_INT32 => Some(4),
        POS_INT64 | NEG_INT64 => Some(8),
        _ => None,
    }
}
