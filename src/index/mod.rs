#![forbid(unsafe_code)]
//! Suffix-array index over the source data: construction, longest-prefix
//! search and disk persistence.

use crate::error::{DeltaError, Result};
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use std::io::{ErrorKind, Read, Write};
use suffix_array::SuffixArray;
use tracing::trace;

#[cfg(test)]
mod tests;

/// Max length of the indexable source data.
pub use suffix_array::MAX_LENGTH;

/// Magic prefix of a persisted suffix index, trailing NUL included.
pub const INDEX_MAGIC: &[u8; 13] = b"SUFFIX ARRAY\0";

/// Sorted suffix offsets of some source data.
///
/// Ranks are dense and cover every non-empty suffix; the matching source
/// bytes are not stored and must be supplied again when searching.
pub struct SuffixIndex {
    sa: Vec<u32>,
}

impl SuffixIndex {
    /// Sort the suffixes of `data`.
    ///
    /// Panics if the data is longer than `MAX_LENGTH`.
    pub fn build(data: &[u8]) -> Self {
        if data.len() > MAX_LENGTH {
            panic!("source data is too large to be indexed");
        }

        let (_, mut sa) = SuffixArray::new(data).into_parts();
        // The sorter emits a sentinel rank for the empty suffix.
        sa.retain(|&x| (x as usize) < data.len());
        SuffixIndex { sa }
    }

    /// Number of indexed suffixes, which equals the source length.
    pub fn len(&self) -> usize {
        self.sa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sa.is_empty()
    }

    /// Element width in bytes used when persisting this index.
    pub fn hint_unit_size(&self) -> u8 {
        unit_size_for(self.sa.len())
    }

    /// Longest match of a prefix of `needle` among the suffixes of
    /// `data`, as `(pos, len)` where `pos` is the one-based offset of
    /// the matched suffix.
    ///
    /// Classical lcp-accelerated binary search: the byte counts already
    /// known equal at both boundaries are carried along, and comparison
    /// at the probe resumes after their minimum, so no byte of the
    /// needle is ever compared twice on the narrowing path.
    pub fn prefix_search(&self, data: &[u8], needle: &[u8]) -> (usize, usize) {
        let n = self.sa.len();
        if n == 0 {
            return (1, 0);
        }

        let (mut lo, mut hi) = (1, n);
        let mut lo_c = lcp(&data[self.suffix(lo)..], needle);
        let mut hi_c = if hi > lo {
            lcp(&data[self.suffix(hi)..], needle)
        } else {
            lo_c
        };
        let mut c = Ord::min(lo_c, hi_c);

        while hi - lo >= 2 {
            let m = (lo + hi) / 2;
            // Suffixes between the boundaries share the first `c` bytes
            // with the needle; resume comparing from there.
            let (after, extra) = probe(&data[self.suffix(m)..], needle, c);
            if after {
                lo = m;
                lo_c = c + extra;
            } else {
                hi = m;
                hi_c = c + extra;
            }
            c = Ord::min(lo_c, hi_c);
        }

        if lo_c > hi_c {
            (self.suffix(lo) + 1, lo_c)
        } else {
            (self.suffix(hi) + 1, hi_c)
        }
    }

    /// Persist as magic, one unit-size byte, then the offsets as
    /// little-endian integers of that width.
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<()> {
        let unit = self.hint_unit_size();
        w.write_all(INDEX_MAGIC)?;
        w.write_u8(unit)?;
        for &x in self.sa.iter() {
            match unit {
                1 => w.write_u8(x as u8)?,
                2 => w.write_u16::<LE>(x as u16)?,
                4 => w.write_u32::<LE>(x)?,
                _ => w.write_u64::<LE>(u64::from(x))?,
            }
        }
        Ok(())
    }

    /// Load a persisted index for data of length `data_len`, verifying
    /// the header and every offset.
    pub fn read_from<R: Read>(mut r: R, data_len: usize) -> Result<Self> {
        if data_len > MAX_LENGTH {
            return Err(DeltaError::InvalidArgument(
                "data too large for an in-memory suffix index".to_string(),
            ));
        }

        let mut magic = [0u8; 13];
        fill(&mut r, &mut magic)?;
        if &magic != INDEX_MAGIC {
            return Err(DeltaError::CorruptIndex("bad magic".to_string()));
        }

        let unit = r.read_u8().map_err(short_read)?;
        if !matches!(unit, 1 | 2 | 4 | 8) {
            return Err(DeltaError::CorruptIndex(format!(
                "unit size {} not one of 1/2/4/8",
                unit
            )));
        }
        trace!("reading suffix index: {} elements of {} bytes", data_len, unit);

        let mut sa = Vec::with_capacity(data_len);
        for _ in 0..data_len {
            let x = match unit {
                1 => u64::from(r.read_u8().map_err(short_read)?),
                2 => u64::from(r.read_u16::<LE>().map_err(short_read)?),
                4 => u64::from(r.read_u32::<LE>().map_err(short_read)?),
                _ => r.read_u64::<LE>().map_err(short_read)?,
            };
            if x >= data_len as u64 {
                return Err(DeltaError::CorruptIndex(format!(
                    "suffix offset {} out of range for {} bytes of data",
                    x, data_len
                )));
            }
            sa.push(x as u32);
        }

        Ok(SuffixIndex { sa })
    }

    /// Zero-based offset of the suffix at one-based rank `rank`.
    #[inline]
    fn suffix(&self, rank: usize) -> usize {
        self.sa[rank - 1] as usize
    }
}

/// Smallest element width that holds every offset of a suffix array over
/// `len` bytes of data.
fn unit_size_for(len: usize) -> u8 {
    let max = len.saturating_sub(1) as u64;
    if max <= 0xff {
        1
    } else if max <= 0xffff {
        2
    } else if max <= 0xffff_ffff {
        4
    } else {
        8
    }
}

/// Compare `needle` against `suffix` where the first `from` bytes are
/// already known equal. Returns whether the needle sorts after the
/// suffix, plus the count of further equal bytes.
#[inline]
fn probe(suffix: &[u8], needle: &[u8], from: usize) -> (bool, usize) {
    let xs = &suffix[from..];
    let ys = &needle[from..];
    let extra = lcp(xs, ys);
    let after = match (ys.get(extra), xs.get(extra)) {
        (Some(y), Some(x)) => y > x,
        (Some(_), None) => true,
        (None, _) => false,
    };
    (after, extra)
}

/// Count the longest common prefix of two byte strings.
#[inline]
fn lcp(xs: &[u8], ys: &[u8]) -> usize {
    Iterator::zip(xs.iter(), ys.iter())
        .take_while(|(x, y)| x == y)
        .count()
}

fn fill<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<()> {
    r.read_exact(buf).map_err(short_read)
}

fn short_read(e: std::io::Error) -> DeltaError {
    if e.kind() == ErrorKind::UnexpectedEof {
        DeltaError::CorruptIndex("unexpected end of index".to_string())
    } else {
        DeltaError::Io(e)
    }
}
