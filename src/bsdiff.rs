#![forbid(unsafe_code)]
//! Delta generation: the greedy suffix-array scan and patch packing.

use crate::error::Result;
use crate::format::{Format, PatchWriter};
use crate::index::SuffixIndex;
use crate::utils::Control;
use std::io::Write;
use tracing::debug;

/// Compression level of the bzip2 compressor.
pub use bzip2::Compression;

/// Default buffer size for delta calculation.
pub const BUFFER_SIZE: usize = 4096;

/// Default compression level.
pub const LEVEL: Compression = Compression::Default;

/// Matching bytes a candidate must gain over the shifted source window
/// before the scan abandons the window for the candidate.
const MATCH_GAIN: isize = 8;

/// Delta compressor in the bsdiff tradition.
///
/// Compares source with target and generates a patch in the default
/// container:
/// ```
/// use std::io;
/// use bsdelta::Bsdiff;
///
/// fn bsdelta(source: &[u8], target: &[u8]) -> bsdelta::Result<Vec<u8>> {
///     let mut patch = Vec::new();
///     Bsdiff::new(source, target).compare(io::Cursor::new(&mut patch))?;
///     Ok(patch)
/// }
/// ```
///
/// The suffix index of the source may be built once and shared across
/// diffs against multiple targets:
/// ```
/// use std::io;
/// use bsdelta::{Bsdiff, SuffixIndex};
///
/// fn bsdelta_many(source: &[u8], targets: &[&[u8]]) -> bsdelta::Result<Vec<Vec<u8>>> {
///     let index = SuffixIndex::build(source);
///     let mut patches = Vec::new();
///     for target in targets {
///         let mut patch = Vec::new();
///         Bsdiff::new(source, target)
///             .index(&index)
///             .compare(io::Cursor::new(&mut patch))?;
///         patches.push(patch);
///     }
///     Ok(patches)
/// }
/// ```
pub struct Bsdiff<'s, 't, 'i> {
    s: &'s [u8],
    t: &'t [u8],
    index: Option<&'i SuffixIndex>,
    format: Format,
    bsize: usize,
    level: Compression,
}

impl<'s, 't, 'i> Bsdiff<'s, 't, 'i> {
    /// Create new configuration for delta compression.
    pub fn new(source: &'s [u8], target: &'t [u8]) -> Self {
        Bsdiff {
            s: source,
            t: target,
            index: None,
            format: Format::Classic,
            bsize: BUFFER_SIZE,
            level: LEVEL,
        }
    }

    /// Set the patch container variant (default is `Format::Classic`).
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Reuse a prebuilt suffix index of the source data.
    pub fn index(mut self, index: &'i SuffixIndex) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the compression level of bzip2 (default is `LEVEL`).
    pub fn compression_level(mut self, lv: Compression) -> Self {
        self.level = lv;
        self
    }

    /// Set the buffer size for delta calculation (`bs >= 128`, default
    /// is `BUFFER_SIZE`).
    pub fn buffer_size(mut self, mut bs: usize) -> Self {
        if bs < 128 {
            bs = 128;
        }
        self.bsize = bs;
        self
    }

    /// Scan the target for matches against the source and write the
    /// patch file.
    ///
    /// The size of the patch file would be returned if no error occurs.
    pub fn compare<P: Write>(&self, patch: P) -> Result<u64> {
        debug!(
            "diffing {} target bytes against {} source bytes",
            self.t.len(),
            self.s.len()
        );
        let built;
        let index = match self.index {
            Some(index) => index,
            None => {
                built = SuffixIndex::build(self.s);
                &built
            }
        };
        let scan = DeltaScan::new(self.s, self.t, index);
        pack(self.s, self.t, scan, patch, self.format, self.level, self.bsize)
    }
}

/// Construct the patch file from the control stream, deriving the diff
/// and literal payloads from the cursors implied by the controls.
fn pack<D, P>(
    s: &[u8],
    t: &[u8],
    scan: D,
    patch: P,
    format: Format,
    level: Compression,
    bsize: usize,
) -> Result<u64>
where
    D: Iterator<Item = Control>,
    P: Write,
{
    let mut w = PatchWriter::new(patch, format, t.len() as u64, level)?;

    let mut spos = 0u64;
    let mut tpos = 0u64;
    let mut dat = Vec::with_capacity(bsize);

    for ctl in scan {
        w.emit_control(&ctl)?;

        // Compute and write delta data, using limited buffer `dat`.
        if ctl.add > 0 {
            let mut n = ctl.add;
            while n > 0 {
                let k = Ord::min(n, bsize as u64) as usize;

                dat.extend(
                    Iterator::zip(s[spos as usize..].iter(), t[tpos as usize..].iter())
                        .map(|(x, y)| y.wrapping_sub(*x))
                        .take(k),
                );

                w.emit_diff(&dat[..])?;
                dat.clear();

                spos += k as u64;
                tpos += k as u64;
                n -= k as u64;
            }
        }

        // Write literal data.
        if ctl.copy > 0 {
            w.emit_data(&t[tpos as usize..(tpos + ctl.copy) as usize])?;
            tpos += ctl.copy;
        }

        spos = spos.wrapping_add(ctl.seek as u64);
    }

    w.finish()
}

/// The greedy delta scan, emitting one control per committed match.
///
/// The scan walks the target looking for source matches that beat the
/// current shifted window by at least `MATCH_GAIN` bytes, then extends
/// the committed region forward and the new match backward under a
/// match-density score, splitting any overlap at the densest crossover.
struct DeltaScan<'s, 't, 'i> {
    s: &'s [u8],
    t: &'t [u8],
    index: &'i SuffixIndex,

    scan: usize,
    pos: usize,
    len: usize,
    lastscan: usize,
    lastpos: usize,
    lastoffset: isize,
}

impl<'s, 't, 'i> DeltaScan<'s, 't, 'i> {
    fn new(s: &'s [u8], t: &'t [u8], index: &'i SuffixIndex) -> Self {
        DeltaScan {
            s,
            t,
            index,
            scan: 0,
            pos: 0,
            len: 0,
            lastscan: 0,
            lastpos: 0,
            lastoffset: 0,
        }
    }

    /// Whether target byte `j` agrees with the source under the shift
    /// committed by the previous control.
    #[inline]
    fn shifted_match(&self, j: usize) -> bool {
        let i = j as isize + self.lastoffset;
        i >= 0 && (i as usize) < self.s.len() && self.s[i as usize] == self.t[j]
    }

    /// Extend around the gap between the previous commit point and the
    /// current match, and produce the control record. Returns `None`
    /// for a degenerate record covering no target bytes; such a record
    /// leaves the committed cursors untouched so the control stream
    /// stays aligned with the payload derivation.
    fn commit(&mut self) -> Option<Control> {
        let s = self.s;
        let t = self.t;

        // Forward extension from the previous commit point, keeping the
        // length of the best density score seen so far.
        let mut lenf = 0usize;
        {
            let mut sf = 0isize;
            let mut eq = 0isize;
            let mut i = 0usize;
            while self.lastscan + i < self.scan && self.lastpos + i < s.len() {
                if s[self.lastpos + i] == t[self.lastscan + i] {
                    eq += 1;
                }
                i += 1;
                if eq * 2 - i as isize > sf * 2 - lenf as isize {
                    sf = eq;
                    lenf = i;
                }
            }
        }

        // Backward extension from the current match point.
        let mut lenb = 0usize;
        if self.scan < t.len() {
            let mut sb = 0isize;
            let mut eq = 0isize;
            let mut i = 1usize;
            while self.scan >= self.lastscan + i && self.pos >= i {
                if s[self.pos - i] == t[self.scan - i] {
                    eq += 1;
                }
                if eq * 2 - i as isize > sb * 2 - lenb as isize {
                    sb = eq;
                    lenb = i;
                }
                i += 1;
            }
        }

        // The extensions may overlap; split at the crossover where the
        // forward side stops winning.
        if self.lastscan + lenf > self.scan - lenb {
            let overlap = (self.lastscan + lenf) - (self.scan - lenb);
            let mut eq = 0isize;
            let mut best = 0isize;
            let mut lens = 0usize;
            for i in 0..overlap {
                if t[self.lastscan + lenf - overlap + i] == s[self.lastpos + lenf - overlap + i] {
                    eq += 1;
                }
                if t[self.scan - lenb + i] == s[self.pos - lenb + i] {
                    eq -= 1;
                }
                if eq > best {
                    best = eq;
                    lens = i + 1;
                }
            }
            lenf = lenf + lens - overlap;
            lenb -= lens;
        }

        let add = lenf as u64;
        let copy = ((self.scan - lenb) - (self.lastscan + lenf)) as u64;
        let seek = (self.pos - lenb) as i64 - (self.lastpos + lenf) as i64;

        if add == 0 && copy == 0 {
            return None;
        }

        self.lastscan = self.scan - lenb;
        self.lastpos = self.pos - lenb;
        self.lastoffset = self.pos as isize - self.scan as isize;

        Some(Control { add, copy, seek })
    }
}

impl<'s, 't, 'i> Iterator for DeltaScan<'s, 't, 'i> {
    type Item = Control;

    fn next(&mut self) -> Option<Self::Item> {
        let t = self.t;
        while self.scan < t.len() {
            // Signed: the decrement below may briefly outrun the counted
            // region when matches come back empty.
            let mut oldscore = 0isize;
            self.scan += self.len;
            let mut scsc = self.scan;

            while self.scan < t.len() {
                let (p, n) = self.index.prefix_search(self.s, &t[self.scan..]);
                self.pos = p - 1;
                self.len = n;

                // Count how far the shifted window already agrees with
                // the region the candidate would cover.
                while scsc < self.scan + self.len {
                    if self.shifted_match(scsc) {
                        oldscore += 1;
                    }
                    scsc += 1;
                }

                // Stop on an exact window hit or a sufficient gain.
                if (self.len as isize == oldscore && self.len != 0)
                    || self.len as isize > oldscore + MATCH_GAIN
                {
                    break;
                }

                if self.shifted_match(self.scan) {
                    oldscore -= 1;
                }
                self.scan += 1;
            }

            if self.len as isize != oldscore || self.scan == t.len() {
                if let Some(ctl) = self.commit() {
                    return Some(ctl);
                }
            }
        }
        None
    }
}
