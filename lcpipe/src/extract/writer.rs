//! Record writer collaborator trait and the hierarchical CSV default.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::lightcurve::{Band, Observation, SourceRecord};

/// Header of every per-source CSV artifact.
pub const CSV_HEADER: &str = "mjd,ks_mag,ks_err,z_mag,z_err,y_mag,y_err,j_mag,j_err,h_mag,h_err,\
seeing,exptime,skylevel,ellipticity,chi,ast_res_chisq,detected,filter";

/// Error writing one source's output artifact.
///
/// Counted per-source by the worker; a tile fails only past the configured
/// threshold.
#[derive(Debug, thiserror::Error)]
#[error("failed to write source {source_id}: {message}")]
pub struct RecordWriteError {
    pub source_id: u64,
    pub message: String,
}

/// Whether a write produced a new artifact or found one already on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    AlreadyPresent,
}

/// Persists one addressable output artifact per source id.
///
/// Re-invoking for the same source id must be safe, since retries and
/// redundant cross-job processing can re-produce previously-written sources.
pub trait RecordWriter: Send + Sync {
    /// Whether an artifact for this source already exists.
    fn exists(&self, source_id: u64) -> bool;

    /// Write the source's accepted observation sequence.
    fn write(&self, record: &SourceRecord) -> Result<WriteOutcome, RecordWriteError>;
}

/// Default writer: one CSV per source under a two-level directory hierarchy.
///
/// Digits `[0,3)` and `[3,6)` of the decimal source id form the subdirectory
/// levels (`<out>/836/503/8365035120893.csv`) to avoid directory explosion at
/// survey scale; ids shorter than the prefix fall back to a flat path.
/// Writing probes the path first and reports an existing artifact distinctly
/// from a fresh write (skip-if-exists).
#[derive(Debug, Clone)]
pub struct CsvRecordWriter {
    output_dir: PathBuf,
}

impl CsvRecordWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Hierarchical output path for a source id.
    pub fn output_path(&self, source_id: u64) -> PathBuf {
        let id = source_id.to_string();
        let filename = format!("{}.csv", id);
        if id.len() >= 6 {
            self.output_dir.join(&id[..3]).join(&id[3..6]).join(filename)
        } else {
            self.output_dir.join(filename)
        }
    }

    fn format_row(obs: &Observation) -> String {
        // Project the single band measurement into its column pair; the
        // other four pairs stay empty.
        let mut mags: [(Option<f32>, Option<f32>); 5] = [(None, None); 5];
        let slot = Band::ALL.iter().position(|b| *b == obs.band).unwrap_or(0);
        mags[slot] = (obs.mag, obs.err);

        let mut row = format!("{:.6}", obs.mjd);
        for (mag, err) in mags {
            row.push(',');
            row.push_str(&fmt4(mag));
            row.push(',');
            row.push_str(&fmt4(err));
        }
        row.push_str(&format!(
            ",{:.3},{:.2},{:.2},{:.4},{},{},{},{}",
            obs.seeing,
            obs.exptime,
            obs.skylevel,
            obs.ellipticity,
            fmt4(obs.chi),
            fmt4(obs.ast_res_chisq),
            if obs.detected { 1 } else { 0 },
            obs.band.as_str(),
        ));
        row
    }

    fn write_file(&self, path: &Path, record: &SourceRecord) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", CSV_HEADER)?;
        for obs in &record.observations {
            writeln!(writer, "{}", Self::format_row(obs))?;
        }
        writer.flush()
    }
}

impl RecordWriter for CsvRecordWriter {
    fn exists(&self, source_id: u64) -> bool {
        self.output_path(source_id).exists()
    }

    fn write(&self, record: &SourceRecord) -> Result<WriteOutcome, RecordWriteError> {
        let path = self.output_path(record.source_id);
        if path.exists() {
            return Ok(WriteOutcome::AlreadyPresent);
        }
        self.write_file(&path, record)
            .map_err(|e| RecordWriteError {
                source_id: record.source_id,
                message: format!("{}: {}", path.display(), e),
            })?;
        Ok(WriteOutcome::Written)
    }
}

fn fmt4(value: Option<f32>) -> String {
    value.map(|v| format!("{:.4}", v)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> SourceRecord {
        SourceRecord::new(
            8365035120893,
            vec![
                Observation {
                    mjd: 57001.123456,
                    band: Band::Ks,
                    mag: Some(14.25),
                    err: Some(0.02),
                    seeing: 0.9,
                    exptime: 10.0,
                    skylevel: 150.0,
                    ellipticity: 0.08,
                    chi: Some(1.1),
                    ast_res_chisq: Some(0.9),
                    detected: true,
                },
                Observation {
                    mjd: 57002.5,
                    band: Band::J,
                    mag: None,
                    err: None,
                    seeing: 1.2,
                    exptime: 10.0,
                    skylevel: 180.0,
                    ellipticity: 0.1,
                    chi: None,
                    ast_res_chisq: None,
                    detected: false,
                },
            ],
        )
    }

    #[test]
    fn test_hierarchical_path_layout() {
        let writer = CsvRecordWriter::new("/out");
        assert_eq!(
            writer.output_path(8365035120893),
            PathBuf::from("/out/836/503/8365035120893.csv")
        );
    }

    #[test]
    fn test_short_id_falls_back_to_flat_path() {
        let writer = CsvRecordWriter::new("/out");
        assert_eq!(writer.output_path(42), PathBuf::from("/out/42.csv"));
    }

    #[test]
    fn test_writes_header_and_band_columns() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CsvRecordWriter::new(dir.path());

        let outcome = writer.write(&sample_record()).unwrap();
        assert_eq!(outcome, WriteOutcome::Written);

        let contents = fs::read_to_string(writer.output_path(8365035120893)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        // Ks detection: magnitude lands in the ks columns only.
        assert_eq!(
            lines[1],
            "57001.123456,14.2500,0.0200,,,,,,,,,0.900,10.00,150.00,0.0800,1.1000,0.9000,1,Ks"
        );
        // J non-detection: all magnitude pairs empty, detected 0.
        assert_eq!(
            lines[2],
            "57002.500000,,,,,,,,,,,1.200,10.00,180.00,0.1000,,,0,J"
        );
    }

    #[test]
    fn test_skip_if_exists_reports_already_present() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CsvRecordWriter::new(dir.path());

        assert_eq!(writer.write(&sample_record()).unwrap(), WriteOutcome::Written);
        assert_eq!(
            writer.write(&sample_record()).unwrap(),
            WriteOutcome::AlreadyPresent
        );
        assert!(writer.exists(8365035120893));
    }
}
