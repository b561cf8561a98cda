//! Light curve data model.
//!
//! A [`SourceRecord`] is one astronomical object's time series: an ordered
//! sequence of [`Observation`] rows, one per detection epoch, each in exactly
//! one photometric [`Band`]. The [`QualityFilter`] decides which sources
//! qualify for output based on their detection count in the reference band.

mod band;
mod observation;
mod quality;

pub use band::{Band, BandParseError};
pub use observation::{Observation, SourceRecord};
pub use quality::QualityFilter;
