//! Read-only status reporting over the checkpoint documents.
//!
//! The monitor never takes the checkpoint lock and never blocks a running
//! job. It reads whatever is on disk leniently: a missing or corrupt
//! document degrades to a warning line in the report, not an error. Source
//! totals are recomputed from the per-tile stats rather than trusted from
//! the progress rollup, so a stale `progress.json` cannot mislead.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::checkpoint::{
    CompletedDoc, FailedDoc, ProgressDoc, COMPLETED_FILE, FAILED_FILE, PROGRESS_FILE,
};

/// How many recent failures the report shows.
const RECENT_FAILURES: usize = 3;
/// Failure messages are clipped to this many bytes for display.
const FAILURE_DISPLAY_BYTES: usize = 120;

/// Quick-look validation of one output artifact.
#[derive(Debug, Clone)]
pub struct ArtifactSample {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub rows: usize,
    pub header_ok: bool,
}

/// One failure line for display.
#[derive(Debug, Clone)]
pub struct FailureLine {
    pub tile_id: String,
    pub error: String,
    pub timestamp: String,
}

/// Snapshot of pipeline progress assembled from the checkpoint directory
/// and the output tree.
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    /// Problems encountered while reading (missing docs, corrupt JSON)
    pub warnings: Vec<String>,
    /// Rollup document, if present and parseable
    pub progress: Option<ProgressDoc>,
    /// Tiles in the completed set
    pub tiles_completed: usize,
    /// Sources seen, recomputed from per-tile stats
    pub total_sources: u64,
    /// Sources saved, recomputed from per-tile stats
    pub valid_sources: u64,
    /// Tiles currently in the failed set
    pub failed_count: usize,
    /// Most recent failures, newest first
    pub recent_failures: Vec<FailureLine>,
    /// One output artifact checked for shape
    pub sample: Option<ArtifactSample>,
}

impl StatusReport {
    /// Assemble a report from `<output_dir>/checkpoints` and the output
    /// tree. Infallible: every read problem becomes a warning.
    pub fn gather(output_dir: &Path) -> Self {
        let checkpoint_dir = output_dir.join("checkpoints");
        let mut report = Self::default();

        let completed: CompletedDoc =
            read_doc_lenient(&checkpoint_dir.join(COMPLETED_FILE), &mut report.warnings);
        let failed: FailedDoc =
            read_doc_lenient(&checkpoint_dir.join(FAILED_FILE), &mut report.warnings);

        report.progress =
            read_doc_opt_lenient(&checkpoint_dir.join(PROGRESS_FILE), &mut report.warnings);

        report.tiles_completed = completed.completed.len();
        for stats in completed.stats.values() {
            report.total_sources += stats.n_sources;
            report.valid_sources += stats.n_valid;
        }

        report.failed_count = failed.failed.len();
        let mut failures: Vec<FailureLine> = failed
            .failed
            .into_iter()
            .map(|(tile_id, record)| FailureLine {
                tile_id,
                error: clip(&record.error, FAILURE_DISPLAY_BYTES),
                timestamp: record.timestamp,
            })
            .collect();
        failures.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        failures.truncate(RECENT_FAILURES);
        report.recent_failures = failures;

        report.sample = sample_artifact(output_dir);
        report
    }
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, " EXTRACTION PROGRESS")?;
        writeln!(f, "{}", "=".repeat(60))?;

        match &self.progress {
            Some(p) => {
                writeln!(
                    f,
                    " Tiles completed:  {} / {} ({:.1}%)",
                    p.processed_tiles, p.total_tiles, p.percent_complete
                )?;
                writeln!(f, " Last update:      {}", p.last_update)?;
            }
            None => {
                writeln!(f, " Tiles completed:  {}", self.tiles_completed)?;
            }
        }
        writeln!(f, " Sources scanned:  {}", self.total_sources)?;
        writeln!(f, " Sources saved:    {}", self.valid_sources)?;
        writeln!(f, " Failed tiles:     {}", self.failed_count)?;

        if !self.recent_failures.is_empty() {
            writeln!(f, " Recent failures:")?;
            for line in &self.recent_failures {
                writeln!(f, "   {}: {}", line.tile_id, line.error)?;
            }
        }

        match &self.sample {
            Some(sample) => {
                writeln!(f, " Sample artifact:  {}", sample.path.display())?;
                writeln!(
                    f,
                    "   {} bytes, {} rows, header {}",
                    sample.size_bytes,
                    sample.rows,
                    if sample.header_ok { "ok" } else { "UNEXPECTED" }
                )?;
            }
            None => {
                writeln!(f, " Sample artifact:  none written yet")?;
            }
        }

        for warning in &self.warnings {
            writeln!(f, " WARNING: {}", warning)?;
        }
        writeln!(f, "{}", "=".repeat(60))
    }
}

/// Read a document without locking, defaulting on any problem.
fn read_doc_lenient<T: DeserializeOwned + Default>(path: &Path, warnings: &mut Vec<String>) -> T {
    read_doc_opt_lenient(path, warnings).unwrap_or_default()
}

fn read_doc_opt_lenient<T: DeserializeOwned>(
    path: &Path,
    warnings: &mut Vec<String>,
) -> Option<T> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warnings.push(format!("cannot read {}: {}", path.display(), e));
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(doc) => Some(doc),
        Err(e) => {
            warnings.push(format!("corrupt document {}: {}", path.display(), e));
            None
        }
    }
}

/// Find one CSV artifact under the output tree and check its shape.
///
/// Skips the `checkpoints` and `logs` directories. First match wins; the
/// point is a spot check, not a census.
fn sample_artifact(output_dir: &Path) -> Option<ArtifactSample> {
    let path = find_first_csv(output_dir)?;
    let size_bytes = fs::metadata(&path).ok()?.len();
    let contents = fs::read_to_string(&path).ok()?;
    let mut lines = contents.lines();
    let header_ok = lines.next().is_some_and(|h| h.starts_with("mjd,"));
    let rows = lines.count();
    Some(ArtifactSample {
        path,
        size_bytes,
        rows,
        header_ok,
    })
}

fn find_first_csv(dir: &Path) -> Option<PathBuf> {
    let mut entries: Vec<_> = fs::read_dir(dir).ok()?.flatten().collect();
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            let name = entry.file_name();
            if name == "checkpoints" || name == "logs" {
                continue;
            }
            if let Some(found) = find_first_csv(&path) {
                return Some(found);
            }
        } else if path.extension().is_some_and(|ext| ext == "csv") {
            return Some(path);
        }
    }
    None
}

/// Clip a message for display, keeping a valid char boundary.
fn clip(message: &str, max_bytes: usize) -> String {
    if message.len() <= max_bytes {
        return message.to_string();
    }
    let mut end = max_bytes;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &message[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{FailureRecord, TileStats};
    use std::collections::BTreeMap;

    fn write_docs(output_dir: &Path, completed: &CompletedDoc, failed: &FailedDoc) {
        let dir = output_dir.join("checkpoints");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(COMPLETED_FILE),
            serde_json::to_string_pretty(completed).unwrap(),
        )
        .unwrap();
        fs::write(
            dir.join(FAILED_FILE),
            serde_json::to_string_pretty(failed).unwrap(),
        )
        .unwrap();
    }

    fn stats(n_sources: u64, n_valid: u64) -> TileStats {
        TileStats {
            n_sources,
            n_valid,
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_totals_recomputed_from_tile_stats() {
        let dir = tempfile::tempdir().unwrap();
        let mut completed = CompletedDoc::default();
        completed.completed = vec!["n1_0".to_string(), "n1_1".to_string()];
        completed.stats.insert("n1_0".to_string(), stats(100, 30));
        completed.stats.insert("n1_1".to_string(), stats(50, 10));
        write_docs(dir.path(), &completed, &FailedDoc::default());

        let report = StatusReport::gather(dir.path());
        assert_eq!(report.tiles_completed, 2);
        assert_eq!(report.total_sources, 150);
        assert_eq!(report.valid_sources, 40);
        assert_eq!(report.failed_count, 0);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_recent_failures_newest_first_capped_at_three() {
        let dir = tempfile::tempdir().unwrap();
        let mut failed = BTreeMap::new();
        for (i, ts) in ["01", "04", "02", "03"].iter().enumerate() {
            failed.insert(
                format!("n1_{}", i),
                FailureRecord {
                    error: "boom".to_string(),
                    timestamp: format!("2026-01-{}T00:00:00Z", ts),
                },
            );
        }
        write_docs(dir.path(), &CompletedDoc::default(), &FailedDoc { failed });

        let report = StatusReport::gather(dir.path());
        assert_eq!(report.failed_count, 4);
        assert_eq!(report.recent_failures.len(), 3);
        assert_eq!(report.recent_failures[0].tile_id, "n1_1");
        assert_eq!(report.recent_failures[1].tile_id, "n1_3");
        assert_eq!(report.recent_failures[2].tile_id, "n1_2");
    }

    #[test]
    fn test_corrupt_document_is_warning_not_crash() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoints = dir.path().join("checkpoints");
        fs::create_dir_all(&checkpoints).unwrap();
        fs::write(checkpoints.join(COMPLETED_FILE), "{ not json").unwrap();

        let report = StatusReport::gather(dir.path());
        assert_eq!(report.tiles_completed, 0);
        assert!(report.warnings.iter().any(|w| w.contains("corrupt")));
    }

    #[test]
    fn test_missing_checkpoint_dir_is_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = StatusReport::gather(dir.path());
        assert_eq!(report.tiles_completed, 0);
        assert!(report.sample.is_none());
        // Missing documents are the normal pre-first-run state, not warnings.
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_sample_artifact_skips_bookkeeping_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("logs")).unwrap();
        fs::write(dir.path().join("logs/run.csv"), "not an artifact").unwrap();
        let tile_dir = dir.path().join("836/503");
        fs::create_dir_all(&tile_dir).unwrap();
        fs::write(
            tile_dir.join("8365035120893.csv"),
            "mjd,ks_mag\n57001.1,14.25\n57002.2,14.30\n",
        )
        .unwrap();

        let sample = StatusReport::gather(dir.path()).sample.unwrap();
        assert!(sample.path.ends_with("836/503/8365035120893.csv"));
        assert_eq!(sample.rows, 2);
        assert!(sample.header_ok);
        assert!(sample.size_bytes > 0);
    }

    #[test]
    fn test_display_renders_without_progress_doc() {
        let report = StatusReport {
            tiles_completed: 5,
            total_sources: 500,
            valid_sources: 120,
            ..StatusReport::default()
        };
        let rendered = report.to_string();
        assert!(rendered.contains("EXTRACTION PROGRESS"));
        assert!(rendered.contains("Sources saved:    120"));
        assert!(rendered.contains("none written yet"));
    }

    #[test]
    fn test_clip_respects_char_boundaries() {
        let message = "éé".repeat(100);
        let clipped = clip(&message, 7);
        assert!(clipped.ends_with("..."));
        assert!(clipped.len() <= 10);
    }
}
