//! Per-tile extraction: collaborator traits and the worker that drives them.
//!
//! The pipeline core depends only on the [`TileReader`] and [`RecordWriter`]
//! traits. The concrete defaults here — a delimited-text tile reader and a
//! hierarchical CSV writer — make the binary usable end to end; a real HDF5
//! reader would plug in at the same seam.

mod reader;
mod worker;
mod writer;

pub use reader::{DelimitedTileReader, RawDetection, TileReadError, TileReader};
pub use worker::{ExtractionConfig, ExtractionWorker, TileCounts, TileFailure, TileOutcome};
pub use writer::{CsvRecordWriter, RecordWriteError, RecordWriter, WriteOutcome};
