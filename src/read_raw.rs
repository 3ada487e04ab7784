//! Bounded reads of length-prefixed payloads.
//!
//! Length prefixes come straight from the stream, so they cannot be trusted to size an
//! allocation. [`read_n`] grows its buffer at most [`BYTES_ALLOC_LIMIT`] bytes at a time and
//! only keeps growing while the source keeps delivering data.

use std::io::{self, Read};

/// Largest single growth step of a read buffer (1 MB).
pub const BYTES_ALLOC_LIMIT: usize = 1_000_000;

/// Reads exactly `n` bytes from `r` into `buf`, reusing its allocation.
///
/// On success `buf.len() == n`. If the source runs dry first the error is
/// [`io::ErrorKind::UnexpectedEof`] and `buf` holds whatever was read before the failing step.
///
/// # Example
/// ```rust
/// use igbinary::read_raw::read_n;
///
/// let mut source: &[u8] = b"foobar";
/// let mut buf = Vec::new();
/// read_n(&mut source, &mut buf, 3).unwrap();
/// assert_eq!(buf, b"foo");
/// assert_eq!(source, b"bar");
/// ```
pub fn read_n<R: Read + ?Sized>(r: &mut R, buf: &mut Vec<u8>, n: usize) -> io::Result<()> {
    buf.clear();
    if n == 0 {
        return Ok(());
    }

    if n <= buf.capacity() {
        buf.resize(n, 0);
        return r.read_exact(buf);
    }

    let mut pos = 0;
    while pos < n {
        let step = (n - pos).min(BYTES_ALLOC_LIMIT);
        buf.reserve_exact(step);
        buf.resize(pos + step, 0);
        if let Err(err) = r.read_exact(&mut buf[pos..]) {
            buf.truncate(pos);
            return Err(err);
        }
        pos += step;
    }
    Ok(())
}
