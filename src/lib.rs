//! # igbinary
//!
//! An encoder and decoder for the igbinary binary serialization format, byte-compatible with
//! the PHP extension of the same name.
//!
//! - Integers are written as a sign-carrying code plus a big-endian magnitude of minimal width
//! - Strings are interned per stream: a repeated string is sent as a back-reference to its
//!   first occurrence
//! - Records (named-field structs) are written as arrays of `(field name, value)` pairs
//! - Encode/decode strategies are resolved once per type and cached in a [`Registry`]
//!
//! ## Derive Macro
//!
//! `#[derive(Record)]` supplies the field schema of a named-field struct. The struct must also
//! implement `Default`, which is used whenever a decoded value needs fresh storage.
//!
//! - `#[igbinary(rename = "name")]`: Uses the given string as the field's wire name.
//! - `#[igbinary(skip)]`: The field is neither written nor read.
//!
//! ## Feature Flags
//!
//! - `indexmap`: Enables `indexmap::IndexMap<String, V>` as a map type (keeps stream order).
//! - `smol_str`: Enables `smol_str::SmolStr` as a string type.

pub mod code;
pub mod decoder;
pub mod encoder;
mod features;
pub mod read_raw;
pub mod registry;
pub mod schema;
pub mod value;

use bytes::{Bytes, BytesMut};
use std::io;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use igbinary_derive::Record;
pub use registry::{Registry, Strategy};
pub use schema::{Field, Record, Schema};
pub use value::{MapShape, Shape, Value, Wrapper};

/// Errors that can occur during encoding or decoding operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The value could not be encoded.
    #[error("igbinary: Encode({0})")]
    Encode(String),
    /// The input could not be decoded.
    #[error("igbinary: Decode({0})")]
    Decode(String),
    /// The stream ended before the value was complete.
    #[error("igbinary: insufficient data")]
    InsufficientData,
    /// The byte source or sink failed.
    #[error("igbinary: {0}")]
    Io(io::Error),
    /// A byte was read where a type code was expected, but it is not valid in this position.
    #[error("igbinary: Decode({context} unexpected code {code:#04x})")]
    UnexpectedCode { context: &'static str, code: u8 },
    /// A string back-reference points past the end of the string table.
    #[error("igbinary: Decode(string id {id} not found)")]
    UnknownStringId { id: u32, len: usize },
    /// No strategy exists for the type.
    #[error("igbinary: {op}(unsupported {type_name})")]
    Unsupported {
        op: &'static str,
        type_name: &'static str,
    },
    /// A string could not be stored in a UTF-8 destination.
    #[error("igbinary: Decode({0})")]
    Utf8(#[from] std::str::Utf8Error),
    /// Skipping an unknown value recursed too deep.
    #[error("igbinary: Decode(nesting deeper than {0} levels)")]
    DepthLimit(usize),
    /// Integer range error
    #[error(transparent)]
    Range(#[from] RangeError),
    /// Record-specific decode error
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::InsufficientData
        } else {
            Error::Io(err)
        }
    }
}

/// The result type used throughout this crate for encode/decode operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A decoded integer magnitude that does not fit the destination type.
///
/// Both variants name the offending value and the closed interval the destination accepts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("igbinary: Decode(signed: int {value} out of range [{min}:{max}])")]
    Signed { value: i128, min: i128, max: i128 },
    #[error("igbinary: Decode(unsigned: int {value} out of range [0:{max}])")]
    Unsigned { value: i128, max: u64 },
}

/// Errors raised while decoding a record.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("igbinary: unknown field {field:?} for {record}")]
    UnknownField { field: String, record: &'static str },
    #[error("igbinary: Decode(field {field:?} of {record} has no storage)")]
    UnreachableField { field: String, record: &'static str },
}

/// Encodes a value to bytes, preceded by the stream header.
///
/// # Example
/// ```rust
/// let bytes = igbinary::marshal(&"foobar".to_string()).unwrap();
/// assert_eq!(&bytes[..], b"\x00\x00\x00\x02\x11\x06foobar");
/// ```
pub fn marshal<T: Value>(value: &T) -> Result<Bytes> {
    let mut writer = BytesMut::new();
    {
        let mut encoder = Encoder::new(&mut writer);
        encoder.encode_header()?;
        encoder.encode(value)?;
    }
    Ok(writer.freeze())
}

/// Encodes a value, preceded by the stream header, and writes it to `w` in a single call.
///
/// The value is fully encoded before anything is written, so a failed encode leaves `w`
/// untouched.
///
/// # Example
/// ```rust
/// let mut out = Vec::new();
/// igbinary::to_writer(&"foobar".to_string(), &mut out).unwrap();
/// assert_eq!(out, b"\x00\x00\x00\x02\x11\x06foobar");
/// ```
pub fn to_writer<T: Value, W: io::Write>(value: &T, mut w: W) -> Result<()> {
    let bytes = marshal(value)?;
    w.write_all(&bytes)?;
    Ok(())
}

/// Decodes a single value from `data` into `dst`.
///
/// A leading stream header is accepted but not required. On failure `dst` may be left
/// partially written and should be discarded.
///
/// # Example
/// ```rust
/// let mut x = 0i32;
/// igbinary::unmarshal(&[0x07, 0x01], &mut x).unwrap();
/// assert_eq!(x, -1);
/// ```
pub fn unmarshal<T: Value>(data: &[u8], dst: &mut T) -> Result<()> {
    let data = data.strip_prefix(&code::HEADER[..]).unwrap_or(data);
    Decoder::new(data).decode(dst)
}

/// Convenience function to decode a fresh value from bytes.
///
/// # Example
/// ```rust
/// use igbinary::{decode, marshal, Record};
///
/// #[derive(Record, Default, PartialEq, Debug)]
/// struct User {
///     id: u32,
///     name: String,
/// }
///
/// let value = User { id: 42, name: "hello".to_string() };
/// let bytes = marshal(&value).unwrap();
/// let decoded: User = decode(&bytes).unwrap();
/// assert_eq!(value, decoded);
/// ```
pub fn decode<T: Value>(data: &[u8]) -> Result<T> {
    let mut value = T::default();
    unmarshal(data, &mut value)?;
    Ok(value)
}
