#![forbid(unsafe_code)]
//! Filesystem-level surface: diff, patch and index over paths, with
//! temporary-file allocation and partial-output cleanup.

use crate::bsdiff::Bsdiff;
use crate::bspatch::Bspatch;
use crate::error::{DeltaError, Result};
use crate::format::Format;
use crate::index::SuffixIndex;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Source data for a diff, optionally paired with a persisted index.
pub enum OldSource<'a> {
    /// Read the data and build its index in memory.
    Data(&'a Path),
    /// Read the data and reuse a previously persisted index.
    DataAndIndex(&'a Path, &'a Path),
}

impl<'a> From<&'a Path> for OldSource<'a> {
    fn from(path: &'a Path) -> Self {
        OldSource::Data(path)
    }
}

impl<'a> From<(&'a Path, &'a Path)> for OldSource<'a> {
    fn from((data, index): (&'a Path, &'a Path)) -> Self {
        OldSource::DataAndIndex(data, index)
    }
}

/// Load the source bytes and their suffix index.
fn data_and_index(old: OldSource<'_>) -> Result<(Vec<u8>, SuffixIndex)> {
    match old {
        OldSource::Data(path) => {
            let data = fs::read(path)?;
            let index = SuffixIndex::build(&data);
            Ok((data, index))
        }
        OldSource::DataAndIndex(data_path, index_path) => {
            let data = fs::read(data_path)?;
            let file = File::open(index_path)?;
            let index = SuffixIndex::read_from(BufReader::new(file), data.len())?;
            Ok((data, index))
        }
    }
}

/// Diff `old` against the file at `new_path`, writing the patch to
/// `patch_path` or to a fresh temporary file. Returns the path holding
/// the patch.
pub fn diff<'a, O>(
    old: O,
    new_path: &Path,
    patch_path: Option<&Path>,
    format: Format,
) -> Result<PathBuf>
where
    O: Into<OldSource<'a>>,
{
    let (old_data, index) = data_and_index(old.into())?;
    let new_data = fs::read(new_path)?;

    let out = write_output(patch_path, |out| {
        Bsdiff::new(&old_data, &new_data)
            .index(&index)
            .format(format)
            .compare(out)
            .map(|_| ())
    })?;
    debug!("wrote patch to {:?}", out);
    Ok(out)
}

/// Apply the patch at `patch_path` to the file at `old_path`, writing
/// the reconstructed target to `new_path` or to a fresh temporary file.
/// Returns the path holding the target.
pub fn patch(
    old_path: &Path,
    new_path: Option<&Path>,
    patch_path: &Path,
    format: Format,
) -> Result<PathBuf> {
    let old_data = fs::read(old_path)?;
    let patch_data = fs::read(patch_path)?;

    let out = write_output(new_path, |out| {
        Bspatch::new(&patch_data, format)?
            .apply(&old_data, out)
            .map(|_| ())
    })?;
    debug!("wrote target to {:?}", out);
    Ok(out)
}

/// Build the suffix index of the file at `old_path` and persist it to
/// `index_path` or to a fresh temporary file. Returns the path holding
/// the index.
pub fn index(old_path: &Path, index_path: Option<&Path>) -> Result<PathBuf> {
    let data = fs::read(old_path)?;
    let idx = SuffixIndex::build(&data);

    let out = write_output(index_path, |out| idx.write_to(out))?;
    debug!("wrote index to {:?}", out);
    Ok(out)
}

/// Run `emit` against the requested output path, or against a fresh
/// temporary file when none is given. A failing `emit` leaves nothing
/// behind: the named output is unlinked, the temporary is dropped.
fn write_output<F>(path: Option<&Path>, emit: F) -> Result<PathBuf>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    match path {
        Some(path) => {
            let file = File::create(path)?;
            let mut out = BufWriter::new(file);
            let result = emit(&mut out).and_then(|()| out.flush().map_err(DeltaError::from));
            match result {
                Ok(()) => Ok(path.to_path_buf()),
                Err(e) => {
                    drop(out);
                    let _ = fs::remove_file(path);
                    Err(e)
                }
            }
        }
        None => {
            let mut tmp = NamedTempFile::new()?;
            emit(&mut tmp)?;
            tmp.flush()?;
            let (_, kept) = tmp.keep().map_err(|e| DeltaError::Io(e.error))?;
            Ok(kept)
        }
    }
}
