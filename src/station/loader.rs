//! CSV ingestion of station metadata and daily temperature records.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Deserialize;
use thiserror::Error;

use crate::geo::GeoCoord;

use super::record::{CoverageGap, DailyObservation, StationClimatology, StationRecord};
use super::StationConfig;

/// Errors that can occur while loading station tables.
#[derive(Error, Debug)]
pub enum StationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid date '{value}' for station '{station}'")]
    InvalidDate { station: String, value: String },
    #[error("Duplicate station id '{0}'")]
    DuplicateStation(String),
    #[error("No station inside the study area has a usable climatology")]
    NoUsableStations,
}

#[derive(Debug, Deserialize)]
struct StationRow {
    id: String,
    lon: f64,
    lat: f64,
    elevation_m: f64,
}

#[derive(Debug, Deserialize)]
struct DailyRow {
    station_id: String,
    date: String,
    tmin_c: Option<f64>,
    tmax_c: Option<f64>,
}

/// Reads station records from metadata and daily CSV readers.
///
/// Stations outside the study area or with non-finite metadata are skipped.
/// Daily rows outside the calibration period, with missing or non-finite
/// values, or with `tmin > tmax` are discarded.
pub fn read_station_records<R1: Read, R2: Read>(
    stations: R1,
    daily: R2,
    cfg: &StationConfig,
) -> Result<Vec<StationRecord>, StationError> {
    let mut records: Vec<StationRecord> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();

    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(stations);
    for row in reader.deserialize() {
        let row: StationRow = row?;
        let coord = GeoCoord::new(row.lon, row.lat);
        if !coord.is_finite() || !row.elevation_m.is_finite() {
            log::warn!("Station '{}' has non-finite metadata; skipped", row.id);
            continue;
        }
        if !cfg.study_area.contains(coord) {
            continue;
        }
        if by_id.contains_key(&row.id) {
            return Err(StationError::DuplicateStation(row.id));
        }
        by_id.insert(row.id.clone(), records.len());
        records.push(StationRecord {
            id: row.id,
            coord,
            elevation_m: row.elevation_m,
            daily: Vec::new(),
        });
    }

    let mut unknown = 0usize;
    let mut discarded = 0usize;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(daily);
    for row in reader.deserialize() {
        let row: DailyRow = row?;
        let Some(&idx) = by_id.get(&row.station_id) else {
            unknown += 1;
            continue;
        };
        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|_| {
            StationError::InvalidDate {
                station: row.station_id.clone(),
                value: row.date.clone(),
            }
        })?;
        let (Some(tmin_c), Some(tmax_c)) = (row.tmin_c, row.tmax_c) else {
            discarded += 1;
            continue;
        };
        if !tmin_c.is_finite() || !tmax_c.is_finite() || tmin_c > tmax_c {
            discarded += 1;
            continue;
        }
        records[idx].daily.push(DailyObservation { date, tmin_c, tmax_c });
    }

    if unknown > 0 {
        log::debug!("Ignored {} daily rows for stations outside the study area", unknown);
    }
    if discarded > 0 {
        log::warn!("Discarded {} incomplete or inconsistent daily rows", discarded);
    }

    Ok(records)
}

/// Reduces station records to calibration-period climatologies in parallel.
///
/// Stations without adequate coverage are dropped with a warning; an empty
/// result is an error because nothing downstream can be fitted.
pub fn build_climatologies(
    records: &[StationRecord],
    cfg: &StationConfig,
) -> Result<Vec<StationClimatology>, StationError> {
    let results: Vec<Result<StationClimatology, (String, CoverageGap)>> = records
        .par_iter()
        .map(|r| r.climatology(cfg).map_err(|gap| (r.id.clone(), gap)))
        .collect();

    let mut out = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(clim) => out.push(clim),
            Err((id, CoverageGap::NoObservations)) => {
                log::warn!("Station '{}' has no calibration-period data; dropped", id);
            }
            Err((id, CoverageGap::SparseDay { day_of_year, years })) => {
                log::warn!(
                    "Station '{}' has only {} year(s) for day {}; dropped",
                    id,
                    years,
                    day_of_year + 1
                );
            }
        }
    }

    if out.is_empty() {
        return Err(StationError::NoUsableStations);
    }
    log::info!("Loaded {} station climatologies ({} candidates)", out.len(), records.len());
    Ok(out)
}

/// Loads station climatologies from a metadata CSV and a daily CSV on disk.
pub fn load_station_climatologies(
    stations_path: &Path,
    daily_path: &Path,
    cfg: &StationConfig,
) -> Result<Vec<StationClimatology>, StationError> {
    let stations = std::fs::File::open(stations_path)?;
    let daily = std::fs::File::open(daily_path)?;
    let records = read_station_records(
        std::io::BufReader::new(stations),
        std::io::BufReader::new(daily),
        cfg,
    )?;
    build_climatologies(&records, cfg)
}
