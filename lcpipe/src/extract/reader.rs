//! Tile reader collaborator trait and the delimited-text default.

use std::io::{BufRead, BufReader};

use crate::lightcurve::Band;
use crate::survey::Tile;

/// Errors raised by a tile reader.
///
/// Both variants classify the tile as unreadable: a reader must raise a
/// distinguishable signal rather than return partial silent data. Caught
/// per-tile by the worker, never propagated to crash the job.
#[derive(Debug, thiserror::Error)]
pub enum TileReadError {
    #[error("cannot open tile {tile}: {message}")]
    Open { tile: String, message: String },
    #[error("invalid row in tile {tile} at line {line}: {message}")]
    InvalidRow {
        tile: String,
        line: usize,
        message: String,
    },
}

/// One raw detection row from a tile, before grouping by source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub source_id: u64,
    pub mjd: f64,
    pub band: Band,
    pub mag: Option<f32>,
    pub err: Option<f32>,
    pub seeing: f32,
    pub exptime: f32,
    pub skylevel: f32,
    pub ellipticity: f32,
    pub chi: Option<f32>,
    pub ast_res_chisq: Option<f32>,
    pub detected: bool,
}

/// Reads a tile's backing data into raw per-source detection rows.
pub trait TileReader: Send + Sync {
    /// Read all detection rows for the tile, or fail the whole tile.
    fn read(&self, tile: &Tile) -> Result<Vec<RawDetection>, TileReadError>;
}

/// Default reader for delimited-text tile files.
///
/// Row layout, one detection per line:
///
/// ```text
/// source_id,mjd,band,mag,err,seeing,exptime,skylevel,ellipticity,chi,ast_res_chisq,detected
/// ```
///
/// Empty magnitude/error/chi fields mark non-detections. Blank lines and
/// lines starting with `#` are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct DelimitedTileReader;

impl DelimitedTileReader {
    pub fn new() -> Self {
        Self
    }

    fn parse_line(tile: &Tile, line_no: usize, line: &str) -> Result<RawDetection, TileReadError> {
        let invalid = |message: String| TileReadError::InvalidRow {
            tile: tile.id().to_string(),
            line: line_no,
            message,
        };

        let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();
        if fields.len() != 12 {
            return Err(invalid(format!("expected 12 fields, got {}", fields.len())));
        }

        let required = |idx: usize, name: &str| -> Result<f32, TileReadError> {
            fields[idx]
                .parse::<f32>()
                .map_err(|e| invalid(format!("bad {}: {}", name, e)))
        };
        let optional = |idx: usize, name: &str| -> Result<Option<f32>, TileReadError> {
            if fields[idx].is_empty() {
                Ok(None)
            } else {
                required(idx, name).map(Some)
            }
        };

        Ok(RawDetection {
            source_id: fields[0]
                .parse()
                .map_err(|e| invalid(format!("bad source_id: {}", e)))?,
            mjd: fields[1]
                .parse()
                .map_err(|e| invalid(format!("bad mjd: {}", e)))?,
            band: fields[2]
                .parse()
                .map_err(|e: crate::lightcurve::BandParseError| invalid(e.to_string()))?,
            mag: optional(3, "mag")?,
            err: optional(4, "err")?,
            seeing: required(5, "seeing")?,
            exptime: required(6, "exptime")?,
            skylevel: required(7, "skylevel")?,
            ellipticity: required(8, "ellipticity")?,
            chi: optional(9, "chi")?,
            ast_res_chisq: optional(10, "ast_res_chisq")?,
            detected: match fields[11] {
                "0" => false,
                "1" => true,
                other => return Err(invalid(format!("bad detected flag '{}'", other))),
            },
        })
    }
}

impl TileReader for DelimitedTileReader {
    fn read(&self, tile: &Tile) -> Result<Vec<RawDetection>, TileReadError> {
        let file = std::fs::File::open(tile.path()).map_err(|e| TileReadError::Open {
            tile: tile.id().to_string(),
            message: e.to_string(),
        })?;

        let mut rows = Vec::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line_no = i + 1;
            let line = line.map_err(|e| TileReadError::Open {
                tile: tile.id().to_string(),
                message: e.to_string(),
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            rows.push(Self::parse_line(tile, line_no, trimmed)?);
        }
        Ok(rows)
    }
}
