use crate::code;
use crate::registry::Registry;
use crate::{Error, Result, Value};
use bytes::{BufMut, Bytes};
use std::any::Any;
use std::collections::HashMap;
use std::io;

/// Writes igbinary values to a byte sink.
///
/// An encoder owns the string dictionary of one stream: the first occurrence of a string is
/// written in full and assigned the next sequential ID, later occurrences are written as
/// back-references to that ID. Use one encoder per stream and do not share it between threads.
///
/// The sink is a [`BufMut`]. To write to an [`io::Write`](std::io::Write) such as a file or
/// socket, encode into a `BytesMut` and write it out in one call, or use [`crate::to_writer`].
///
/// # Example
/// ```rust
/// use bytes::BytesMut;
/// use igbinary::Encoder;
///
/// let mut buf = BytesMut::new();
/// let mut encoder = Encoder::new(&mut buf);
/// encoder.encode(&"foobar".to_string()).unwrap();
/// encoder.encode(&"foobar".to_string()).unwrap();
/// drop(encoder);
/// assert_eq!(&buf[..], b"\x11\x06foobar\x0e\x00");
/// ```
pub struct Encoder<'a> {
    w: Box<dyn BufMut + 'a>,
    registry: &'a Registry,
    strings: HashMap<Vec<u8>, u64>,
    string_id: u64,
}

impl<'a> Encoder<'a> {
    /// Creates an encoder that resolves strategies through [`Registry::global`].
    pub fn new<W: BufMut + 'a>(w: W) -> Self {
        Self::with_registry(w, Registry::global())
    }

    /// Creates an encoder that resolves strategies through `registry`.
    pub fn with_registry<W: BufMut + 'a>(w: W, registry: &'a Registry) -> Self {
        Encoder {
            w: Box::new(w),
            registry,
            strings: HashMap::new(),
            string_id: 0,
        }
    }

    /// The registry this encoder resolves strategies through.
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Writes the 4-byte stream header. Call once, before the first value.
    pub fn encode_header(&mut self) -> Result<()> {
        self.write(&code::HEADER)
    }

    /// Encodes a value.
    ///
    /// `bool`, `f64`, `Vec<u8>` and `Bytes` are written directly; every other type goes
    /// through the strategy resolved for it by the registry.
    pub fn encode<T: Value>(&mut self, value: &T) -> Result<()> {
        if let Some(result) = self.encode_direct(value) {
            return result;
        }
        let strategy = self.registry.strategy::<T>();
        strategy.encode(self, value)
    }

    fn encode_direct(&mut self, value: &dyn Any) -> Option<Result<()>> {
        if let Some(v) = value.downcast_ref::<bool>() {
            return Some(self.encode_bool(*v));
        }
        if let Some(v) = value.downcast_ref::<f64>() {
            return Some(self.encode_f64(*v));
        }
        if let Some(v) = value.downcast_ref::<Vec<u8>>() {
            return Some(self.encode_bytes(v));
        }
        if let Some(v) = value.downcast_ref::<Bytes>() {
            return Some(self.encode_bytes(v));
        }
        None
    }

    pub fn encode_nil(&mut self) -> Result<()> {
        self.write(&[code::NIL])
    }

    pub fn encode_bool(&mut self, v: bool) -> Result<()> {
        let code = if v { code::BOOL_TRUE } else { code::BOOL_FALSE };
        self.write(&[code])
    }

    /// Encodes a signed integer as a sign code plus the minimal-width magnitude.
    ///
    /// Magnitudes above `u32::MAX` cannot be encoded.
    pub fn encode_int(&mut self, v: i64) -> Result<()> {
        let magnitude = v.unsigned_abs();
        self.write_magnitude(v < 0, magnitude)
            .ok_or_else(|| Error::Encode(format!("int {} out of range", v)))?
    }

    /// Encodes an unsigned integer. Values above `u32::MAX` cannot be encoded.
    pub fn encode_uint(&mut self, v: u64) -> Result<()> {
        self.write_magnitude(false, v)
            .ok_or_else(|| Error::Encode(format!("int {} out of range", v)))?
    }

    /// Returns `None` if the magnitude does not fit the widest encodable code.
    fn write_magnitude(&mut self, negative: bool, magnitude: u64) -> Option<Result<()>> {
        let (c8, c16, c32) = if negative {
            (code::NEG_INT8, code::NEG_INT16, code::NEG_INT32)
        } else {
            (code::POS_INT8, code::POS_INT16, code::POS_INT32)
        };
        if magnitude <= 0xff {
            Some(self.write1(c8, magnitude as u8))
        } else if magnitude <= 0xffff {
            Some(self.write2(c16, magnitude as u16))
        } else if magnitude <= 0xffff_ffff {
            Some(self.write4(c32, magnitude as u32))
        } else {
            None
        }
    }

    /// Encodes a double as 8 big-endian bytes of its IEEE 754 representation.
    pub fn encode_f64(&mut self, v: f64) -> Result<()> {
        self.write8(code::DOUBLE, v.to_bits())
    }

    pub fn encode_str(&mut self, v: &str) -> Result<()> {
        self.encode_bytes(v.as_bytes())
    }

    /// Encodes a byte string through the stream's string dictionary.
    ///
    /// The empty string has its own code and never takes a dictionary slot.
    pub fn encode_bytes(&mut self, v: &[u8]) -> Result<()> {
        if v.is_empty() {
            return self.write(&[code::STRING_EMPTY]);
        }

        if let Some(&id) = self.strings.get(v) {
            return if id <= 0xff {
                self.write1(code::STRING_ID8, id as u8)
            } else if id <= 0xffff {
                self.write2(code::STRING_ID16, id as u16)
            } else if id <= 0xffff_ffff {
                self.write4(code::STRING_ID32, id as u32)
            } else {
                Err(Error::Encode("string ID exceeds range".to_string()))
            };
        }

        let len = v.len();
        if len > 0xffff_ffff {
            return Err(Error::Encode(format!("string length {} exceeds range", len)));
        }
        if len <= 0xff {
            self.write1(code::STRING8, len as u8)?;
        } else if len <= 0xffff {
            self.write2(code::STRING16, len as u16)?;
        } else {
            self.write4(code::STRING32, len as u32)?;
        }
        self.write(v)?;

        // Only strings that reached the sink may be referenced later.
        self.strings.insert(v.to_vec(), self.string_id);
        self.string_id += 1;
        Ok(())
    }

    /// Encodes an array/map length prefix.
    pub fn encode_array_len(&mut self, len: usize) -> Result<()> {
        if len <= 0xff {
            self.write1(code::ARRAY8, len as u8)
        } else if len <= 0xffff {
            self.write2(code::ARRAY16, len as u16)
        } else if len <= 0xffff_ffff {
            self.write4(code::ARRAY32, len as u32)
        } else {
            Err(Error::Encode(format!("unsupported array length {}", len)))
        }
    }

    fn write1(&mut self, code: u8, n: u8) -> Result<()> {
        self.reserve(2)?;
        self.w.put_u8(code);
        self.w.put_u8(n);
        Ok(())
    }

    fn write2(&mut self, code: u8, n: u16) -> Result<()> {
        self.reserve(3)?;
        self.w.put_u8(code);
        self.w.put_u16(n);
        Ok(())
    }

    fn write4(&mut self, code: u8, n: u32) -> Result<()> {
        self.reserve(5)?;
        self.w.put_u8(code);
        self.w.put_u32(n);
        Ok(())
    }

    fn write8(&mut self, code: u8, n: u64) -> Result<()> {
        self.reserve(9)?;
        self.w.put_u8(code);
        self.w.put_u64(n);
        Ok(())
    }

    fn write(&mut self, b: &[u8]) -> Result<()> {
        self.reserve(b.len())?;
        self.w.put_slice(b);
        Ok(())
    }

    fn reserve(&self, n: usize) -> Result<()> {
        if self.w.remaining_mut() < n {
            return Err(Error::Io(io::ErrorKind::WriteZero.into()));
        }
        Ok(())
    }
}
