//! Quality gate for source output.

use super::{Band, SourceRecord};

/// Decides whether a source's detections qualify it for output.
///
/// A source is accepted iff its count of detected observations in the
/// reference band is strictly greater than the configured minimum. Pure
/// function over the record, no state, no I/O.
#[derive(Debug, Clone, Copy)]
pub struct QualityFilter {
    /// Band used as the quality gate (default: Ks)
    pub reference_band: Band,
    /// Detection count must exceed this to accept (default: 20)
    pub min_detections: u32,
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self {
            reference_band: Band::Ks,
            min_detections: 20,
        }
    }
}

impl QualityFilter {
    /// Create a filter with the given reference band and minimum count.
    pub fn new(reference_band: Band, min_detections: u32) -> Self {
        Self {
            reference_band,
            min_detections,
        }
    }

    /// Returns true iff the record passes the quality gate.
    ///
    /// The bound is strict: a source with exactly `min_detections` detected
    /// reference-band observations is rejected.
    pub fn accepts(&self, record: &SourceRecord) -> bool {
        record.detections_in(self.reference_band) > self.min_detections as usize
    }
}
