//! Photometric band definitions.

use std::fmt;
use std::str::FromStr;

/// Error returned when a band label cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown band label '{0}'")]
pub struct BandParseError(pub String);

/// The survey's five photometric filters.
///
/// Every observation is taken through exactly one of these. `Ks` is the
/// deepest, most-sampled band and serves as the default quality gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    /// Ks band (2.15 μm), the survey's reference band
    Ks,
    /// Z band (0.88 μm)
    Z,
    /// Y band (1.02 μm)
    Y,
    /// J band (1.25 μm)
    J,
    /// H band (1.65 μm)
    H,
}

impl Band {
    /// All bands in output-column order.
    pub const ALL: [Band; 5] = [Band::Ks, Band::Z, Band::Y, Band::J, Band::H];

    /// Returns the band label as it appears in tile data and CSV output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Ks => "Ks",
            Band::Z => "Z",
            Band::Y => "Y",
            Band::J => "J",
            Band::H => "H",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Band {
    type Err = BandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Ks" => Ok(Band::Ks),
            "Z" => Ok(Band::Z),
            "Y" => Ok(Band::Y),
            "J" => Ok(Band::J),
            "H" => Ok(Band::H),
            other => Err(BandParseError(other.to_string())),
        }
    }
}
