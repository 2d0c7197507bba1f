//! Station records and their day-of-year climatologies.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::geo::GeoCoord;

use super::StationConfig;

/// Days in the climatological year; Feb 29 is dropped.
pub const DAYS_PER_YEAR: usize = 365;

/// One day of station temperature observations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyObservation {
    pub date: NaiveDate,
    pub tmin_c: f64,
    pub tmax_c: f64,
}

/// A weather station with its raw daily series. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct StationRecord {
    pub id: String,
    pub coord: GeoCoord,
    pub elevation_m: f64,
    pub daily: Vec<DailyObservation>,
}

/// Why a station could not produce a climatology.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageGap {
    /// No observations at all inside the calibration period.
    NoObservations,
    /// A day of year has fewer than the required number of years.
    SparseDay { day_of_year: usize, years: u32 },
}

/// Mean daily minimum/maximum temperature per day of year over the calibration period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationClimatology {
    pub id: String,
    pub coord: GeoCoord,
    pub elevation_m: f64,
    pub tmin_c: Vec<f64>,
    pub tmax_c: Vec<f64>,
}

/// Zero-based day-of-year index in a 365-day year, or `None` for Feb 29.
pub fn day_of_year_index(date: NaiveDate) -> Option<usize> {
    if date.month() == 2 && date.day() == 29 {
        return None;
    }
    let leap = NaiveDate::from_ymd_opt(date.year(), 2, 29).is_some();
    let ordinal0 = date.ordinal0() as usize;
    if leap && date.month() > 2 {
        Some(ordinal0 - 1)
    } else {
        Some(ordinal0)
    }
}

impl StationRecord {
    /// Averages the calibration-period observations by day of year.
    pub fn climatology(&self, cfg: &StationConfig) -> Result<StationClimatology, CoverageGap> {
        let mut sum_min = vec![0.0f64; DAYS_PER_YEAR];
        let mut sum_max = vec![0.0f64; DAYS_PER_YEAR];
        let mut counts = vec![0u32; DAYS_PER_YEAR];

        for obs in &self.daily {
            let year = obs.date.year();
            if year < cfg.calibration_start || year > cfg.calibration_end {
                continue;
            }
            if let Some(doy) = day_of_year_index(obs.date) {
                sum_min[doy] += obs.tmin_c;
                sum_max[doy] += obs.tmax_c;
                counts[doy] += 1;
            }
        }

        if counts.iter().all(|&c| c == 0) {
            return Err(CoverageGap::NoObservations);
        }

        let required = cfg.min_years_per_day.max(1);
        if let Some((doy, &years)) = counts.iter().enumerate().find(|(_, &c)| c < required) {
            return Err(CoverageGap::SparseDay { day_of_year: doy, years });
        }

        let tmin_c = sum_min.iter().zip(&counts).map(|(s, &c)| s / c as f64).collect();
        let tmax_c = sum_max.iter().zip(&counts).map(|(s, &c)| s / c as f64).collect();

        Ok(StationClimatology {
            id: self.id.clone(),
            coord: self.coord,
            elevation_m: self.elevation_m,
            tmin_c,
            tmax_c,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_year(year: i32, tmin: f64, tmax: f64) -> Vec<DailyObservation> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
        start
            .iter_days()
            .take_while(|d| d.year() == year)
            .map(|date| DailyObservation { date, tmin_c: tmin, tmax_c: tmax })
            .collect()
    }

    fn config(start: i32, end: i32) -> StationConfig {
        StationConfig {
            calibration_start: start,
            calibration_end: end,
            min_years_per_day: 1,
            ..StationConfig::default()
        }
    }

    #[test]
    fn test_day_of_year_skips_leap_day() {
        let feb28 = NaiveDate::from_ymd_opt(2000, 2, 28).unwrap();
        let feb29 = NaiveDate::from_ymd_opt(2000, 2, 29).unwrap();
        let mar1_leap = NaiveDate::from_ymd_opt(2000, 3, 1).unwrap();
        let mar1 = NaiveDate::from_ymd_opt(2001, 3, 1).unwrap();
        let dec31 = NaiveDate::from_ymd_opt(2000, 12, 31).unwrap();

        assert_eq!(day_of_year_index(feb28), Some(58));
        assert_eq!(day_of_year_index(feb29), None);
        assert_eq!(day_of_year_index(mar1_leap), Some(59));
        assert_eq!(day_of_year_index(mar1), Some(59));
        assert_eq!(day_of_year_index(dec31), Some(364));
    }

    #[test]
    fn test_climatology_averages_years() {
        let mut daily = full_year(1981, 10.0, 20.0);
        daily.extend(full_year(1982, 14.0, 30.0));
        // Outside the calibration period; must not contribute.
        daily.extend(full_year(1999, 100.0, 100.0));

        let record = StationRecord {
            id: "ST1".into(),
            coord: GeoCoord::new(105.0, 25.0),
            elevation_m: 400.0,
            daily,
        };
        let clim = record.climatology(&config(1981, 1990)).unwrap();
        assert_eq!(clim.tmin_c.len(), DAYS_PER_YEAR);
        assert!(clim.tmin_c.iter().all(|&t| (t - 12.0).abs() < 1e-12));
        assert!(clim.tmax_c.iter().all(|&t| (t - 25.0).abs() < 1e-12));
    }

    #[test]
    fn test_climatology_reports_sparse_days() {
        let mut daily = full_year(1981, 10.0, 20.0);
        daily.retain(|o| o.date.month() != 7);
        let record = StationRecord {
            id: "ST2".into(),
            coord: GeoCoord::new(105.0, 25.0),
            elevation_m: 0.0,
            daily,
        };

        match record.climatology(&config(1981, 1990)) {
            Err(CoverageGap::SparseDay { years, .. }) => assert_eq!(years, 0),
            other => panic!("expected sparse day, got {:?}", other),
        }
    }

    #[test]
    fn test_climatology_without_calibration_data() {
        let record = StationRecord {
            id: "ST3".into(),
            coord: GeoCoord::new(105.0, 25.0),
            elevation_m: 0.0,
            daily: full_year(2015, 10.0, 20.0),
        };
        assert_eq!(
            record.climatology(&config(1961, 1990)),
            Err(CoverageGap::NoObservations)
        );
    }
}
