//! Station climatology loader.
//!
//! Ingests daily station temperature records for the study area and reduces
//! them to one day-of-year climatology per station over the calibration years.

mod loader;
mod record;

use serde::{Deserialize, Serialize};

use crate::geo::BoundingBox;

pub use loader::{
    build_climatologies, load_station_climatologies, read_station_records, StationError,
};
pub use record::{
    day_of_year_index, CoverageGap, DailyObservation, StationClimatology, StationRecord,
    DAYS_PER_YEAR,
};

/// Configuration for station ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// First calibration year (inclusive).
    pub calibration_start: i32,
    /// Last calibration year (inclusive).
    pub calibration_end: i32,
    /// Minimum number of observed years required for every day of year.
    pub min_years_per_day: u32,
    /// Stations outside this box are ignored.
    pub study_area: BoundingBox,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            calibration_start: 1961,
            calibration_end: 1990,
            min_years_per_day: 5,
            study_area: BoundingBox::asia(),
        }
    }
}
