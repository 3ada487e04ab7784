use crate::code;
use crate::read_raw;
use crate::registry::Registry;
use crate::{Error, RangeError, Result, Value};
use bytes::Bytes;
use std::any::Any;
use std::io::{BufRead, BufReader, Read};

/// Maximum nesting of arrays walked by [`Decoder::skip`].
pub const MAX_SKIP_DEPTH: usize = 512;

/// Reads igbinary values from a byte source.
///
/// A decoder owns the string table of one stream. Every literal string it reads, including
/// strings that are skipped, is appended to the table in stream order so that back-references
/// resolve to the same strings the encoder assigned. Use one decoder per stream and do not
/// share it between threads.
///
/// # Example
/// ```rust
/// use igbinary::Decoder;
///
/// let mut decoder = Decoder::new(&b"\x11\x06foobar\x0e\x00"[..]);
/// assert_eq!(decoder.decode_string().unwrap(), "foobar");
/// assert_eq!(decoder.decode_string().unwrap(), "foobar");
/// ```
pub struct Decoder<'a> {
    r: Box<dyn BufRead + 'a>,
    registry: &'a Registry,
    disallow_unknown_fields: bool,
    buf: Vec<u8>,
    strings: Vec<Bytes>,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder that resolves strategies through [`Registry::global`].
    pub fn new<R: BufRead + 'a>(r: R) -> Self {
        Self::with_registry(r, Registry::global())
    }

    /// Creates a decoder over an unbuffered reader.
    pub fn from_reader<R: Read + 'a>(r: R) -> Self {
        Self::new(BufReader::new(r))
    }

    /// Creates a decoder that resolves strategies through `registry`.
    pub fn with_registry<R: BufRead + 'a>(r: R, registry: &'a Registry) -> Self {
        Decoder {
            r: Box::new(r),
            registry,
            disallow_unknown_fields: false,
            buf: Vec::new(),
            strings: Vec::new(),
        }
    }

    /// The registry this decoder resolves strategies through.
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// DisallowUnknownFields causes the decoder to fail when a record in the input carries a
    /// field name that the destination's schema does not know. When off (the default), the
    /// value of such a field is skipped.
    pub fn disallow_unknown_fields(&mut self, on: bool) {
        self.disallow_unknown_fields = on;
    }

    pub fn disallows_unknown_fields(&self) -> bool {
        self.disallow_unknown_fields
    }

    /// Reads and validates the 4-byte stream header.
    pub fn decode_header(&mut self) -> Result<()> {
        let mut header = [0u8; 4];
        self.r.read_exact(&mut header)?;
        if header != code::HEADER {
            return Err(Error::Decode(format!("unsupported header {:02x?}", header)));
        }
        Ok(())
    }

    /// Decodes one value into `dst`.
    ///
    /// `bool`, `f64`, `Vec<u8>` and `Bytes` are read directly; every other type goes through
    /// the strategy resolved for it by the registry.
    pub fn decode<T: Value>(&mut self, dst: &mut T) -> Result<()> {
        if let Some(result) = self.decode_direct(&mut *dst) {
            return result;
        }
        let strategy = self.registry.strategy::<T>();
        strategy.decode(self, dst)
    }

    fn decode_direct(&mut self, dst: &mut dyn Any) -> Option<Result<()>> {
        if let Some(v) = dst.downcast_mut::<bool>() {
            return Some(self.decode_bool().map(|b| *v = b));
        }
        if let Some(v) = dst.downcast_mut::<f64>() {
            return Some(self.decode_f64().map(|f| *v = f));
        }
        if let Some(v) = dst.downcast_mut::<Vec<u8>>() {
            return Some(self.decode_bytes().map(|b| *v = b));
        }
        if let Some(v) = dst.downcast_mut::<Bytes>() {
            return Some(self.decode_raw_string().map(|b| *v = b));
        }
        None
    }

    /// Returns the next type code without consuming it.
    pub fn peek_code(&mut self) -> Result<u8> {
        match self.r.fill_buf()?.first() {
            Some(&c) => Ok(c),
            None => Err(Error::InsufficientData),
        }
    }

    pub(crate) fn read_code(&mut self) -> Result<u8> {
        let mut c = [0u8; 1];
        self.r.read_exact(&mut c)?;
        Ok(c[0])
    }

    fn read_n(&mut self, n: usize) -> Result<&[u8]> {
        read_raw::read_n(&mut self.r, &mut self.buf, n)?;
        Ok(&self.buf)
    }

    fn uint8(&mut self) -> Result<u8> {
        self.read_code()
    }

    fn uint16(&mut self) -> Result<u16> {
        let mut b = [0u8; 2];
        self.r.read_exact(&mut b)?;
        Ok(u16::from_be_bytes(b))
    }

    fn uint32(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.r.read_exact(&mut b)?;
        Ok(u32::from_be_bytes(b))
    }

    fn uint64(&mut self) -> Result<u64> {
        let mut b = [0u8; 8];
        self.r.read_exact(&mut b)?;
        Ok(u64::from_be_bytes(b))
    }

    pub fn decode_nil(&mut self) -> Result<()> {
        match self.read_code()? {
            code::NIL => Ok(()),
            c => Err(Error::UnexpectedCode {
                context: "nil",
                code: c,
            }),
        }
    }

    pub fn decode_bool(&mut self) -> Result<bool> {
        match self.read_code()? {
            code::BOOL_FALSE => Ok(false),
            code::BOOL_TRUE => Ok(true),
            c => Err(Error::UnexpectedCode {
                context: "bool",
                code: c,
            }),
        }
    }

    pub fn decode_f64(&mut self) -> Result<f64> {
        match self.read_code()? {
            code::DOUBLE => Ok(f64::from_bits(self.uint64()?)),
            c => Err(Error::UnexpectedCode {
                context: "double",
                code: c,
            }),
        }
    }

    // --- Integers ---

    /// Reads an integer code and its big-endian magnitude. Returns `(code, magnitude)`.
    pub(crate) fn read_integer(&mut self) -> Result<(u8, u64)> {
        let c = self.read_code()?;
        let magnitude = match code::integer_width(c) {
            Some(1) => self.uint8()? as u64,
            Some(2) => self.uint16()? as u64,
            Some(4) => self.uint32()? as u64,
            Some(_) => self.uint64()?,
            None => {
                return Err(Error::UnexpectedCode {
                    context: "readInteger",
                    code: c,
                })
            }
        };
        Ok((c, magnitude))
    }

    /// Decodes a signed integer whose destination accepts `[-(limit + 1), limit]`.
    /// `limit` is clamped to `i64::MAX`.
    pub fn decode_signed(&mut self, limit: u64) -> Result<i64> {
        let limit = limit.min(i64::MAX as u64);
        let (c, magnitude) = self.read_integer()?;
        let negative = code::is_negative(c);
        if magnitude <= limit {
            let v = magnitude as i64;
            return Ok(if negative { -v } else { v });
        }
        if negative && limit.checked_add(1) == Some(magnitude) {
            // Only reachable for the most negative value of the destination type.
            return Ok((-(magnitude as i128)) as i64);
        }
        let value = if negative {
            -(magnitude as i128)
        } else {
            magnitude as i128
        };
        Err(RangeError::Signed {
            value,
            min: -(limit as i128) - 1,
            max: limit as i128,
        }
        .into())
    }

    /// Decodes an unsigned integer whose destination accepts `[0, limit]`.
    ///
    /// A zero magnitude is accepted under either sign code.
    pub fn decode_unsigned(&mut self, limit: u64) -> Result<u64> {
        let (c, magnitude) = self.read_integer()?;
        if magnitude == 0 {
            return Ok(0);
        }
        let negative = code::is_negative(c);
        if !negative && magnitude <= limit {
            return Ok(magnitude);
        }
        let value = if negative {
            -(magnitude as i128)
        } else {
            magnitude as i128
        };
        Err(RangeError::Unsigned { value, max: limit }.into())
    }

    pub fn decode_i8(&mut self) -> Result<i8> {
        Ok(self.decode_signed(i8::MAX as u64)? as i8)
    }

    pub fn decode_i16(&mut self) -> Result<i16> {
        Ok(self.decode_signed(i16::MAX as u64)? as i16)
    }

    pub fn decode_i32(&mut self) -> Result<i32> {
        Ok(self.decode_signed(i32::MAX as u64)? as i32)
    }

    pub fn decode_i64(&mut self) -> Result<i64> {
        self.decode_signed(i64::MAX as u64)
    }

    pub fn decode_isize(&mut self) -> Result<isize> {
        Ok(self.decode_signed(isize::MAX as u64)? as isize)
    }

    pub fn decode_u8(&mut self) -> Result<u8> {
        Ok(self.decode_unsigned(u8::MAX as u64)? as u8)
    }

    pub fn decode_u16(&mut self) -> Result<u16> {
        Ok(self.decode_unsigned(u16::MAX as u64)? as u16)
    }

    pub fn decode_u32(&mut self) -> Result<u32> {
        Ok(self.decode_unsigned(u32::MAX as u64)? as u32)
    }

    pub fn decode_u64(&mut self) -> Result<u64> {
        self.decode_unsigned(u64::MAX)
    }

    pub fn decode_usize(&mut self) -> Result<usize> {
        Ok(self.decode_unsigned(usize::MAX as u64)? as usize)
    }

    // --- Strings ---

    /// Decodes a string into a UTF-8 `String`.
    ///
    /// `Nil` and the empty-string code both decode to `""`.
    pub fn decode_string(&mut self) -> Result<String> {
        let b = self.decode_raw_string()?;
        Ok(std::str::from_utf8(&b)?.to_owned())
    }

    /// Decodes a string as raw bytes.
    pub fn decode_bytes(&mut self) -> Result<Vec<u8>> {
        Ok(self.decode_raw_string()?.to_vec())
    }

    fn decode_raw_string(&mut self) -> Result<Bytes> {
        let c = self.read_code()?;
        self.string(c)
    }

    fn string(&mut self, c: u8) -> Result<Bytes> {
        if code::is_string_id(c) {
            return self.string_by_id(c);
        }
        let n = self.bytes_len(c)?;
        self.string_with_len(n)
    }

    /// Length of a literal string; `None` for `Nil`.
    fn bytes_len(&mut self, c: u8) -> Result<Option<usize>> {
        match c {
            code::NIL => Ok(None),
            code::STRING_EMPTY => Ok(Some(0)),
            code::STRING8 => Ok(Some(self.uint8()? as usize)),
            code::STRING16 => Ok(Some(self.uint16()? as usize)),
            code::STRING32 => Ok(Some(self.uint32()? as usize)),
            _ => Err(Error::UnexpectedCode {
                context: "string",
                code: c,
            }),
        }
    }

    fn string_with_len(&mut self, n: Option<usize>) -> Result<Bytes> {
        let n = match n {
            None | Some(0) => return Ok(Bytes::new()),
            Some(n) => n,
        };
        let s = Bytes::copy_from_slice(self.read_n(n)?);
        self.strings.push(s.clone());
        Ok(s)
    }

    fn string_by_id(&mut self, c: u8) -> Result<Bytes> {
        let id = self.string_id(c)?;
        self.string_at(id)
    }

    fn string_at(&self, id: u32) -> Result<Bytes> {
        match self.strings.get(id as usize) {
            Some(s) => Ok(s.clone()),
            None => Err(Error::UnknownStringId {
                id,
                len: self.strings.len(),
            }),
        }
    }

    fn string_id(&mut self, c: u8) -> Result<u32> {
        match c {
            code::STRING_ID8 => Ok(self.uint8()? as u32),
            code::STRING_ID16 => Ok(self.uint16()? as u32),
            code::STRING_ID32 => self.uint32(),
            _ => Err(Error::UnexpectedCode {
                context: "string id",
                code: c,
            }),
        }
    }

    /// Reads the 1, 2 or 4-byte big-endian payload of a code from a `(8, 16, 32)`-bit triple
    /// starting at `base`.
    fn sized(&mut self, c: u8, base: u8) -> Result<u32> {
        match c.wrapping_sub(base) {
            0 => Ok(self.uint8()? as u32),
            1 => Ok(self.uint16()? as u32),
            2 => self.uint32(),
            _ => Err(Error::UnexpectedCode {
                context: "skip",
                code: c,
            }),
        }
    }

    // --- Arrays ---

    /// Decodes an array/map length prefix. `Nil` yields `None`: the container is absent.
    pub fn decode_array_len(&mut self) -> Result<Option<usize>> {
        let c = self.read_code()?;
        self.array_len(c)
    }

    fn array_len(&mut self, c: u8) -> Result<Option<usize>> {
        match c {
            code::NIL => Ok(None),
            code::ARRAY8 => Ok(Some(self.uint8()? as usize)),
            code::ARRAY16 => Ok(Some(self.uint16()? as usize)),
            code::ARRAY32 => Ok(Some(self.uint32()? as usize)),
            _ => Err(Error::UnexpectedCode {
                context: "array length",
                code: c,
            }),
        }
    }

    // --- Skipping ---

    /// Reads past one encoded value without materializing it.
    ///
    /// Every code of the format is understood here, including objects and references that
    /// the typed decoders reject. Literal strings and class names met on the way are still
    /// entered into the string table, and back-references are checked against it.
    pub fn skip(&mut self) -> Result<()> {
        self.skip_value(0)
    }

    fn skip_value(&mut self, depth: usize) -> Result<()> {
        if depth > MAX_SKIP_DEPTH {
            return Err(Error::DepthLimit(MAX_SKIP_DEPTH));
        }
        let c = self.read_code()?;
        match c {
            code::NIL | code::BOOL_FALSE | code::BOOL_TRUE | code::STRING_EMPTY => Ok(()),
            c if code::is_integer(c) => {
                let width = code::integer_width(c).unwrap_or(0);
                self.read_n(width)?;
                Ok(())
            }
            code::DOUBLE => {
                self.uint64()?;
                Ok(())
            }
            code::STRING_ID8 | code::STRING_ID16 | code::STRING_ID32 => {
                self.string_by_id(c)?;
                Ok(())
            }
            code::STRING8 | code::STRING16 | code::STRING32 => {
                let n = self.bytes_len(c)?;
                self.string_with_len(n)?;
                Ok(())
            }
            code::ARRAY8 | code::ARRAY16 | code::ARRAY32 => {
                let n = self.array_len(c)?.unwrap_or(0);
                for _ in 0..n {
                    self.skip_value(depth + 1)?; // key
                    self.skip_value(depth + 1)?; // value
                }
                Ok(())
            }
            // Class name literal, then the property array or serialized payload.
            code::OBJECT8 | code::OBJECT16 | code::OBJECT32 => {
                let n = self.sized(c, code::OBJECT8)? as usize;
                self.string_with_len(Some(n))?;
                self.skip_value(depth + 1)
            }
            code::OBJECT_ID8 | code::OBJECT_ID16 | code::OBJECT_ID32 => {
                let id = self.sized(c, code::OBJECT_ID8)?;
                self.string_at(id)?;
                self.skip_value(depth + 1)
            }
            code::OBJECT_SER8 | code::OBJECT_SER16 | code::OBJECT_SER32 => {
                let n = self.sized(c, code::OBJECT_SER8)? as usize;
                self.read_n(n)?;
                Ok(())
            }
            code::ARRAY_REF8 | code::ARRAY_REF16 | code::ARRAY_REF32 => {
                self.sized(c, code::ARRAY_REF8)?;
                Ok(())
            }
            code::OBJECT_REF8 | code::OBJECT_REF16 | code::OBJECT_REF32 => {
                self.sized(c, code::OBJECT_REF8)?;
                Ok(())
            }
            code::SIMPLE_REF => self.skip_value(depth + 1),
            _ => Err(Error::UnexpectedCode {
                context: "skip",
                code: c,
            }),
        }
    }
}
