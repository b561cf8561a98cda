//! Per-epoch observation rows and per-source records.

use super::Band;

/// One epoch's measurement for a source in one photometric band.
///
/// The magnitude and error are stored once alongside the band label, which
/// enforces the one-band-per-observation invariant by construction; the CSV
/// writer projects them into per-band columns at write time. Non-detections
/// carry no magnitude (the epoch was covered but the source was not seen).
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Epoch timestamp (Modified Julian Date)
    pub mjd: f64,
    /// Photometric band this epoch was taken in
    pub band: Band,
    /// Magnitude, absent for non-detections
    pub mag: Option<f32>,
    /// Magnitude error, absent for non-detections
    pub err: Option<f32>,
    /// Seeing FWHM (arcsec)
    pub seeing: f32,
    /// Exposure time (seconds)
    pub exptime: f32,
    /// Sky background level (counts)
    pub skylevel: f32,
    /// PSF ellipticity
    pub ellipticity: f32,
    /// Profile fit chi-square, detections only
    pub chi: Option<f32>,
    /// Astrometric residual chi-square, detections only
    pub ast_res_chisq: Option<f32>,
    /// Whether the source was detected at this epoch
    pub detected: bool,
}

/// One source's complete time series, ordered by epoch.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    /// Stable survey-wide source identifier
    pub source_id: u64,
    /// Observations sorted by ascending MJD
    pub observations: Vec<Observation>,
}

impl SourceRecord {
    /// Assemble a record from unordered observation rows.
    ///
    /// Sorts by MJD so output files are always in epoch order regardless of
    /// the order rows appear in the tile.
    pub fn new(source_id: u64, mut observations: Vec<Observation>) -> Self {
        observations.sort_by(|a, b| a.mjd.total_cmp(&b.mjd));
        Self {
            source_id,
            observations,
        }
    }

    /// Number of detected observations in the given band.
    pub fn detections_in(&self, band: Band) -> usize {
        self.observations
            .iter()
            .filter(|obs| obs.band == band && obs.detected)
            .count()
    }
}
