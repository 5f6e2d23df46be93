use byteorder::{ByteOrder, LE};
use std::io::{Error, ErrorKind, Read, Result};

/// Single delta control instruction.
///
/// Reads as: take `add` bytes from the source corrected by the diff
/// payload, then `copy` literal bytes from the data payload, then move
/// the source cursor by `seek` (which may rewind).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub add: u64,
    pub copy: u64,
    pub seek: i64,
}

/// Decodes integer.
#[inline]
pub fn decode_int(b: &[u8]) -> i64 {
    let x = LE::read_u64(b);
    if x >> 63 == 0 || x == 0x8000000000000000 {
        x as i64
    } else {
        ((x & 0x7fffffffffffffff) as i64).wrapping_neg()
    }
}

/// Encodes integer.
///
/// Negative values keep their magnitude in the low bits with the sign
/// bit set, so small magnitudes of either sign leave the high bytes
/// zero-filled.
#[inline]
pub fn encode_int(x: i64, b: &mut [u8]) {
    if x < 0 {
        LE::write_u64(b, x.wrapping_neg() as u64 | 0x8000000000000000);
    } else {
        LE::write_u64(b, x as u64);
    }
}

/// Read exact `buf.len()` bytes or an immediate EOF, returning the count
/// of bytes read. A partial fill is an error.
#[inline]
pub fn read_exact_or_eof<R>(r: &mut R, buf: &mut [u8]) -> Result<usize>
where
    R: Read,
{
    let mut cnt = 0;
    while cnt < buf.len() {
        match r.read(&mut buf[cnt..]) {
            Ok(0) => break,
            Ok(n) => cnt += n,
            Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    if cnt != 0 && cnt != buf.len() {
        Err(Error::new(
            ErrorKind::UnexpectedEof,
            "failed to fill whole buffer",
        ))
    } else {
        Ok(cnt)
    }
}
