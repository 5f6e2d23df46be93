#![forbid(unsafe_code)]
//! Patch containers: the framed, compressed envelopes around the raw
//! control/diff/data streams.

use crate::error::{DeltaError, Result};
use crate::utils::{decode_int, encode_int, read_exact_or_eof, Control};
use byteorder::{ByteOrder, LE};
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::io::{Cursor, ErrorKind, Read, Write};
use std::str::FromStr;
use tracing::trace;

/// Magic of the classic three-block container.
const CLASSIC_MAGIC: &[u8; 8] = b"BSDIFF40";

/// Magic of the interleaved single-stream container.
const ENDSLEY_MAGIC: &[u8; 16] = b"ENDSLEY/BSDIFF43";

/// Patch container variant.
///
/// `Classic` keeps the control, diff and data streams in three
/// independently compressed blocks behind a 32-byte header; `Endsley`
/// interleaves all three per record inside one compressed stream.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Format {
    Classic,
    Endsley,
}

impl Default for Format {
    fn default() -> Self {
        Format::Classic
    }
}

impl FromStr for Format {
    type Err = DeltaError;

    fn from_str(tag: &str) -> Result<Self> {
        match tag {
            "classic" => Ok(Format::Classic),
            "endsley" => Ok(Format::Endsley),
            _ => Err(DeltaError::InvalidArgument(format!(
                "unknown patch format `{}`",
                tag
            ))),
        }
    }
}

/// Writer half of a patch container.
///
/// The diff generator pushes control records and their payloads in
/// lock-step; `finish` frames and flushes whatever the variant buffers.
pub struct PatchWriter<W: Write> {
    kind: WriterKind<W>,
}

enum WriterKind<W: Write> {
    Classic {
        out: W,
        new_size: u64,
        ctrls: BzEncoder<Vec<u8>>,
        delta: BzEncoder<Vec<u8>>,
        extra: BzEncoder<Vec<u8>>,
    },
    Endsley {
        stream: BzEncoder<CountWrite<W>>,
    },
}

/// Counting shim so the endsley writer can report the patch size after
/// the compressor consumes the output stream.
struct CountWrite<W: Write> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for CountWrite<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> PatchWriter<W> {
    /// Open a writer over `out`. The endsley header goes out
    /// immediately; the classic header carries block sizes and is
    /// written on `finish`.
    pub fn new(mut out: W, format: Format, new_size: u64, level: Compression) -> Result<Self> {
        let kind = match format {
            Format::Classic => WriterKind::Classic {
                out,
                new_size,
                ctrls: BzEncoder::new(Vec::new(), level),
                delta: BzEncoder::new(Vec::new(), level),
                extra: BzEncoder::new(Vec::new(), level),
            },
            Format::Endsley => {
                let mut header = [0u8; 24];
                header[..16].copy_from_slice(ENDSLEY_MAGIC);
                LE::write_u64(&mut header[16..], new_size);
                out.write_all(&header)?;
                WriterKind::Endsley {
                    stream: BzEncoder::new(CountWrite { inner: out, count: 0 }, level),
                }
            }
        };
        Ok(PatchWriter { kind })
    }

    /// Append one record to the control stream.
    pub fn emit_control(&mut self, ctl: &Control) -> Result<()> {
        let mut buf = [0u8; 24];
        encode_int(ctl.add as i64, &mut buf[0..8]);
        encode_int(ctl.copy as i64, &mut buf[8..16]);
        encode_int(ctl.seek, &mut buf[16..24]);
        match &mut self.kind {
            WriterKind::Classic { ctrls, .. } => ctrls.write_all(&buf)?,
            WriterKind::Endsley { stream } => stream.write_all(&buf)?,
        }
        Ok(())
    }

    /// Append bytes to the diff payload stream.
    pub fn emit_diff(&mut self, bytes: &[u8]) -> Result<()> {
        match &mut self.kind {
            WriterKind::Classic { delta, .. } => delta.write_all(bytes)?,
            WriterKind::Endsley { stream } => stream.write_all(bytes)?,
        }
        Ok(())
    }

    /// Append literal bytes to the data payload stream.
    pub fn emit_data(&mut self, bytes: &[u8]) -> Result<()> {
        match &mut self.kind {
            WriterKind::Classic { extra, .. } => extra.write_all(bytes)?,
            WriterKind::Endsley { stream } => stream.write_all(bytes)?,
        }
        Ok(())
    }

    /// Terminate the compressed streams and write out any deferred
    /// framing. Returns the total patch size in bytes.
    pub fn finish(self) -> Result<u64> {
        match self.kind {
            WriterKind::Classic {
                mut out,
                new_size,
                ctrls,
                delta,
                extra,
            } => {
                let bz_ctrls = ctrls.finish()?;
                let bz_delta = delta.finish()?;
                let bz_extra = extra.finish()?;

                // Header: magic, control block size, diff block size,
                // target size.
                let mut header = [0u8; 32];
                header[0..8].copy_from_slice(CLASSIC_MAGIC);
                encode_int(bz_ctrls.len() as i64, &mut header[8..16]);
                encode_int(bz_delta.len() as i64, &mut header[16..24]);
                encode_int(new_size as i64, &mut header[24..32]);

                out.write_all(&header)?;
                out.write_all(&bz_ctrls)?;
                out.write_all(&bz_delta)?;
                out.write_all(&bz_extra)?;
                out.flush()?;
                Ok(32 + (bz_ctrls.len() + bz_delta.len() + bz_extra.len()) as u64)
            }
            WriterKind::Endsley { stream } => {
                let mut out = stream.finish()?;
                out.flush()?;
                Ok(24 + out.count)
            }
        }
    }
}

/// Reader half of a patch container.
pub struct PatchReader<'p> {
    new_size: u64,
    kind: ReaderKind<'p>,
}

enum ReaderKind<'p> {
    Classic {
        ctrls: BzDecoder<Cursor<&'p [u8]>>,
        delta: BzDecoder<Cursor<&'p [u8]>>,
        extra: BzDecoder<Cursor<&'p [u8]>>,
    },
    Endsley {
        stream: BzDecoder<Cursor<&'p [u8]>>,
    },
}

impl<'p> PatchReader<'p> {
    /// Parse the container header and set up the decompressors.
    pub fn new(patch: &'p [u8], format: Format) -> Result<Self> {
        match format {
            Format::Classic => parse_classic(patch),
            Format::Endsley => parse_endsley(patch),
        }
    }

    /// Target size declared by the header.
    pub fn new_size(&self) -> u64 {
        self.new_size
    }

    /// Decode the next control record, or `None` once the control
    /// stream is exhausted.
    pub fn read_control(&mut self) -> Result<Option<Control>> {
        let mut buf = [0u8; 24];
        let n = match &mut self.kind {
            ReaderKind::Classic { ctrls, .. } => read_exact_or_eof(ctrls, &mut buf),
            ReaderKind::Endsley { stream } => read_exact_or_eof(stream, &mut buf),
        }
        .map_err(|e| corrupt_stream(e, "control"))?;
        if n == 0 {
            return Ok(None);
        }

        let add = decode_int(&buf[0..8]);
        let copy = decode_int(&buf[8..16]);
        let seek = decode_int(&buf[16..24]);
        if add < 0 || copy < 0 {
            return Err(DeltaError::CorruptPatch(format!(
                "negative length in control record ({}, {})",
                add, copy
            )));
        }

        Ok(Some(Control {
            add: add as u64,
            copy: copy as u64,
            seek,
        }))
    }

    /// Fill `buf` from the diff payload stream.
    pub fn read_diff(&mut self, buf: &mut [u8]) -> Result<()> {
        match &mut self.kind {
            ReaderKind::Classic { delta, .. } => delta.read_exact(buf),
            ReaderKind::Endsley { stream } => stream.read_exact(buf),
        }
        .map_err(|e| corrupt_stream(e, "diff payload"))
    }

    /// Fill `buf` from the literal data stream.
    pub fn read_data(&mut self, buf: &mut [u8]) -> Result<()> {
        match &mut self.kind {
            ReaderKind::Classic { extra, .. } => extra.read_exact(buf),
            ReaderKind::Endsley { stream } => stream.read_exact(buf),
        }
        .map_err(|e| corrupt_stream(e, "data payload"))
    }
}

/// Parse the classic container: 32-byte header, then the three
/// compressed blocks back to back.
fn parse_classic(patch: &[u8]) -> Result<PatchReader<'_>> {
    if patch.len() < 32 || &patch[..8] != CLASSIC_MAGIC {
        return Err(DeltaError::CorruptPatch("not a classic patch".to_string()));
    }

    let csize = decode_int(&patch[8..16]);
    let dsize = decode_int(&patch[16..24]);
    let tsize = decode_int(&patch[24..32]);
    if csize < 0 || dsize < 0 || tsize < 0 {
        return Err(DeltaError::CorruptPatch(
            "negative size in patch header".to_string(),
        ));
    }
    let blocks = (csize as u64).checked_add(dsize as u64);
    if blocks.map_or(true, |n| n > patch.len() as u64 - 32) {
        return Err(DeltaError::CorruptPatch(
            "declared block sizes overrun the patch".to_string(),
        ));
    }
    trace!(
        "classic header: control {} bytes, diff {} bytes, target {} bytes",
        csize,
        dsize,
        tsize
    );

    let (_, remain) = patch.split_at(32);
    let (bz_ctrls, remain) = remain.split_at(csize as usize);
    let (bz_delta, bz_extra) = remain.split_at(dsize as usize);

    Ok(PatchReader {
        new_size: tsize as u64,
        kind: ReaderKind::Classic {
            ctrls: BzDecoder::new(Cursor::new(bz_ctrls)),
            delta: BzDecoder::new(Cursor::new(bz_delta)),
            extra: BzDecoder::new(Cursor::new(bz_extra)),
        },
    })
}

/// Parse the endsley container: 16-byte magic, target size, then one
/// compressed stream of interleaved records.
fn parse_endsley(patch: &[u8]) -> Result<PatchReader<'_>> {
    if patch.len() < 24 || &patch[..16] != ENDSLEY_MAGIC {
        return Err(DeltaError::CorruptPatch("not an endsley patch".to_string()));
    }

    let new_size = LE::read_u64(&patch[16..24]);
    trace!("endsley header: target {} bytes", new_size);

    Ok(PatchReader {
        new_size,
        kind: ReaderKind::Endsley {
            stream: BzDecoder::new(Cursor::new(&patch[24..])),
        },
    })
}

// The substreams decode out of an in-memory slice, so every read
// failure is some form of patch corruption rather than an I/O fault.
fn corrupt_stream(e: std::io::Error, what: &str) -> DeltaError {
    if e.kind() == ErrorKind::UnexpectedEof {
        DeltaError::CorruptPatch(format!("truncated {} stream", what))
    } else {
        DeltaError::CorruptPatch(format!("undecodable {} stream: {}", what, e))
    }
}
