/*!
Binary delta compression and patching in the bsdiff tradition.

Patches encode a target as byte-wise corrections against shifted windows
of a source, interleaved with literal insertions, and come in two wire
formats: the classic three-block `BSDIFF40` container and the interleaved
`ENDSLEY/BSDIFF43` container. The suffix index used to find matches can
be persisted and reused across diffs of the same source.
*/

pub mod bsdiff;
pub mod bspatch;
pub mod error;
pub mod format;
pub mod index;
pub mod ops;
mod utils;

pub use bsdiff::{Bsdiff, Compression};
pub use bspatch::Bspatch;
pub use error::{DeltaError, Result};
pub use format::Format;
pub use index::SuffixIndex;
pub use ops::OldSource;
