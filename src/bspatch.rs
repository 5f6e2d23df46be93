#![forbid(unsafe_code)]
//! Patch application: control-record replay with full bounds checking.

use crate::error::{DeltaError, Result};
use crate::format::{Format, PatchReader};
use crate::utils::Control;
use std::io::Write;
use tracing::debug;

/// Default buffer size.
pub const BUFFER_SIZE: usize = 16384;

/// Default initial size of the delta calculation buffer.
pub const DELTA_MIN: usize = 1024;

/// Patcher reconstructing the target from the source and a patch.
///
/// Apply a patch to the source using a 4k buffer:
/// ```
/// use std::io;
/// use bsdelta::{Bspatch, Format};
///
/// fn bspatch(source: &[u8], patch: &[u8]) -> bsdelta::Result<Vec<u8>> {
///     let mut target = Vec::new();
///     Bspatch::new(patch, Format::Classic)?
///         .buffer_size(4096)
///         .apply(source, io::Cursor::new(&mut target))?;
///     Ok(target)
/// }
/// ```
///
/// Preallocate the target vector before applying:
/// ```
/// use std::io;
/// use bsdelta::{Bspatch, Format};
///
/// fn bspatch(source: &[u8], patch: &[u8]) -> bsdelta::Result<Vec<u8>> {
///     let patcher = Bspatch::new(patch, Format::Classic)?;
///     let mut target = Vec::with_capacity(patcher.hint_target_size() as usize);
///     patcher.apply(source, io::Cursor::new(&mut target))?;
///     Ok(target)
/// }
/// ```
pub struct Bspatch<'p> {
    patch: PatchReader<'p>,
    buffer_size: usize,
    delta_min: usize,
}

impl<'p> Bspatch<'p> {
    /// Parse the patch container and create new patcher configuration.
    ///
    /// Returns an error if the container header does not parse as the
    /// given format.
    pub fn new(patch: &'p [u8], format: Format) -> Result<Self> {
        Ok(Bspatch {
            patch: PatchReader::new(patch, format)?,
            buffer_size: BUFFER_SIZE,
            delta_min: DELTA_MIN,
        })
    }

    /// Set the main copy buffer size (`bs >= 128`, default is
    /// `BUFFER_SIZE`).
    pub fn buffer_size(mut self, mut bs: usize) -> Self {
        if bs < 128 {
            bs = 128;
        }
        self.buffer_size = bs;
        self
    }

    /// Set the initial delta cache size (`dm >= 128`, default is
    /// `DELTA_MIN`). The cache grows on demand.
    pub fn delta_min(mut self, mut dm: usize) -> Self {
        if dm < 128 {
            dm = 128;
        }
        self.delta_min = dm;
        self
    }

    /// Hint the final target size, as declared in the patch header.
    pub fn hint_target_size(&self) -> u64 {
        self.patch.new_size()
    }

    /// Apply the patch to the source data and stream out the target.
    ///
    /// The target data size would be returned if no error occurs; it
    /// always equals the declared target size.
    pub fn apply<T: Write>(self, source: &[u8], target: T) -> Result<u64> {
        debug!(
            "patching {} source bytes into {} declared target bytes",
            source.len(),
            self.patch.new_size()
        );
        let ctx = Context::new(self.patch, source, target, self.buffer_size, self.delta_min);
        ctx.apply()
    }
}

/// Patching context.
struct Context<'s, 'p, T>
where
    T: Write,
{
    source: &'s [u8],
    target: T,
    patch: PatchReader<'p>,

    old_pos: i64,
    written: u64,
    declared: u64,

    n: usize,
    buf: Vec<u8>,
    dlt: Vec<u8>,
}

impl<'s, 'p, T> Context<'s, 'p, T>
where
    T: Write,
{
    fn new(patch: PatchReader<'p>, source: &'s [u8], target: T, bsize: usize, dsize: usize) -> Self {
        let declared = patch.new_size();
        Context {
            source,
            target,
            patch,
            old_pos: 0,
            written: 0,
            declared,
            n: 0,
            buf: vec![0; bsize],
            dlt: vec![0; dsize],
        }
    }

    /// Replay the control stream to the end, then verify the total.
    fn apply(mut self) -> Result<u64> {
        while let Some(ctl) = self.patch.read_control()? {
            self.check(&ctl)?;
            self.add(ctl.add)?;
            self.copy(ctl.copy)?;
            self.seek(ctl.seek)?;
        }
        if self.n > 0 {
            self.target.write_all(&self.buf[..self.n])?;
        }
        self.target.flush()?;
        if self.written != self.declared {
            return Err(DeltaError::CorruptPatch(format!(
                "patch reconstructs {} bytes but declares {}",
                self.written, self.declared
            )));
        }
        Ok(self.written)
    }

    /// Validate one control record against the source and the declared
    /// target window before consuming anything.
    fn check(&self, ctl: &Control) -> Result<()> {
        let remain = self.declared - self.written;
        if ctl.add.saturating_add(ctl.copy) > remain {
            return Err(DeltaError::CorruptPatch(format!(
                "record wants {} + {} bytes with only {} left in the target window",
                ctl.add, ctl.copy, remain
            )));
        }
        if self.old_pos < 0 || self.old_pos as u64 + ctl.add > self.source.len() as u64 {
            return Err(DeltaError::CorruptPatch(format!(
                "record reads source bytes {}..{} outside 0..{}",
                self.old_pos,
                self.old_pos as i128 + ctl.add as i128,
                self.source.len()
            )));
        }
        Ok(())
    }

    /// Add delta bytes to source bytes and write the result.
    fn add(&mut self, mut count: u64) -> Result<()> {
        while count > 0 {
            let k = Ord::min(count, (self.buf.len() - self.n) as u64) as usize;
            let off = self.old_pos as usize;

            self.buf[self.n..self.n + k].copy_from_slice(&self.source[off..off + k]);
            self.reserve_delta(k);
            self.patch.read_diff(&mut self.dlt[..k])?;
            for i in 0..k {
                let j = self.n + i;
                self.buf[j] = self.buf[j].wrapping_add(self.dlt[i]);
            }
            self.n += k;
            if self.n >= self.buf.len() {
                self.target.write_all(self.buf.as_ref())?;
                self.n = 0;
            }
            self.old_pos += k as i64;
            self.written += k as u64;
            count -= k as u64;
        }
        Ok(())
    }

    /// Copy literal data to the target.
    fn copy(&mut self, mut count: u64) -> Result<()> {
        while count > 0 {
            let k = Ord::min(count, (self.buf.len() - self.n) as u64) as usize;

            self.patch.read_data(&mut self.buf[self.n..self.n + k])?;
            self.n += k;
            if self.n >= self.buf.len() {
                self.target.write_all(self.buf.as_ref())?;
                self.n = 0;
            }
            self.written += k as u64;
            count -= k as u64;
        }
        Ok(())
    }

    /// Move the cursor on the source. The cursor may point past either
    /// end transiently only on the positive side; a negative cursor is
    /// rejected immediately.
    fn seek(&mut self, offset: i64) -> Result<()> {
        self.old_pos = self.old_pos.checked_add(offset).ok_or_else(|| {
            DeltaError::CorruptPatch("seek overflows the source cursor".to_string())
        })?;
        if self.old_pos < 0 {
            return Err(DeltaError::CorruptPatch(format!(
                "seek rewinds the source cursor to {}",
                self.old_pos
            )));
        }
        Ok(())
    }

    /// Extend the delta cache if not large enough.
    fn reserve_delta(&mut self, size: usize) {
        if size > self.dlt.len() {
            self.dlt.resize(size, 0);
        }
    }
}
