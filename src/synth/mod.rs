//! Seeded synthetic study area.
//!
//! Produces an elevation grid, a station network with daily temperatures,
//! a proxy record and a cultivar list, all written in the formats the
//! loaders read. Station climate follows a latitude gradient, a lapse rate
//! and a seasonal cycle with daily noise.

use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::cultivar::Cultivar;
use crate::elevation::{write_elevation_grid, ElevationGrid, GridError, GridSpec};
use crate::gdd::{accumulated_gdd, GddConfig};
use crate::geo::GeoCoord;
use crate::station::{DailyObservation, StationConfig, StationRecord};
use crate::summary::quantile_sorted;

/// Errors that can occur while writing a synthetic dataset.
#[derive(Error, Debug)]
pub enum SynthError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),
    #[error("Invalid synthetic configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration for a synthetic study area.
#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub seed: u64,
    pub grid: GridSpec,
    pub station_count: usize,
    /// First and last year of daily records (inclusive).
    pub first_year: i32,
    pub last_year: i32,
    /// Number of proxy time steps, spaced `proxy_step_years` apart.
    pub proxy_steps: usize,
    pub proxy_step_years: f64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            grid: GridSpec::new(100.0, 40.0, 0.5, 24, 16),
            station_count: 30,
            first_year: 1981,
            last_year: 1985,
            proxy_steps: 12,
            proxy_step_years: 1000.0,
        }
    }
}

impl SynthConfig {
    /// A small area suitable for fast end-to-end runs.
    pub fn small(seed: u64) -> Self {
        Self {
            seed,
            grid: GridSpec::new(100.0, 36.0, 0.5, 12, 8),
            station_count: 18,
            proxy_steps: 4,
            ..Default::default()
        }
    }
}

/// Paths of the files written by [`write_dataset`].
#[derive(Debug, Clone)]
pub struct SynthPaths {
    pub elevation: PathBuf,
    pub stations: PathBuf,
    pub daily: PathBuf,
    pub proxy: PathBuf,
    pub cultivars: PathBuf,
}

/// In-memory synthetic dataset.
#[derive(Debug, Clone)]
pub struct SynthDataset {
    pub elevation: ElevationGrid,
    pub stations: Vec<StationRecord>,
    /// `(years_bp, lower, central, upper)` in °C anomalies.
    pub proxy: Vec<(f64, f64, f64, f64)>,
    pub cultivars: Vec<Cultivar>,
}

fn elevation_at(spec: &GridSpec, col: u32, row: u32) -> f64 {
    let u = (col as f64 + 0.5) / spec.ncols as f64;
    let v = (row as f64 + 0.5) / spec.nrows as f64;
    // One massif towards the north-west, rising from a coastal plain.
    let massif = 2800.0 * (-((u - 0.3).powi(2) + (v - 0.3).powi(2)) / 0.05).exp();
    150.0 + massif + 400.0 * v
}

/// Mean daily temperature (°C) for a location and day of year.
fn mean_temperature(lat: f64, elevation_m: f64, day_of_year: u32) -> f64 {
    let annual = 27.0 - 0.6 * (lat - 20.0) - 6.5 * elevation_m / 1000.0;
    let amplitude = 4.0 + 0.3 * (lat - 20.0).max(0.0);
    annual + amplitude * (2.0 * PI * (day_of_year as f64 - 105.0) / 365.0).sin()
}

fn synth_elevation(cfg: &SynthConfig, rng: &mut ChaCha8Rng) -> ElevationGrid {
    let spec = cfg.grid;
    let mut grid = ElevationGrid::masked(spec);
    for row in 0..spec.nrows {
        for col in 0..spec.ncols {
            // South-east corner is sea.
            let sea = col as f64 / spec.ncols as f64 + row as f64 / spec.nrows as f64 > 1.6;
            if !sea {
                let noise = rng.random::<f64>() * 60.0 - 30.0;
                grid.set(col, row, (elevation_at(&spec, col, row) + noise) as f32);
            }
        }
    }
    grid
}

fn synth_stations(cfg: &SynthConfig, grid: &ElevationGrid, rng: &mut ChaCha8Rng) -> Vec<StationRecord> {
    let land = grid.land_cells();
    let start = NaiveDate::from_ymd_opt(cfg.first_year, 1, 1);
    let end = NaiveDate::from_ymd_opt(cfg.last_year, 12, 31);
    let (Some(start), Some(end)) = (start, end) else {
        return Vec::new();
    };

    (0..cfg.station_count)
        .map(|i| {
            let cell = rng.random_range(0..land.len());
            let half = grid.spec.cell_size * 0.5;
            let centre = land.coords[cell];
            let coord = GeoCoord::new(
                centre.lon + (rng.random::<f64>() * 2.0 - 1.0) * half,
                centre.lat + (rng.random::<f64>() * 2.0 - 1.0) * half,
            );
            let elevation_m = (land.elevations[cell] + rng.random::<f64>() * 80.0 - 40.0).max(0.0);

            let daily = start
                .iter_days()
                .take_while(|d| *d <= end)
                .map(|date| {
                    let mean = mean_temperature(coord.lat, elevation_m, date.ordinal0());
                    let noise = rng.random::<f64>() * 3.0 - 1.5;
                    let half_range = 5.0 + rng.random::<f64>();
                    DailyObservation {
                        date,
                        tmin_c: mean + noise - half_range,
                        tmax_c: mean + noise + half_range,
                    }
                })
                .collect();

            StationRecord {
                id: format!("S{:03}", i + 1),
                coord,
                elevation_m,
                daily,
            }
        })
        .collect()
}

fn synth_proxy(cfg: &SynthConfig, rng: &mut ChaCha8Rng) -> Vec<(f64, f64, f64, f64)> {
    let n = cfg.proxy_steps.max(2);
    (0..n)
        .map(|i| {
            let years_bp = (n - 1 - i) as f64 * cfg.proxy_step_years;
            let frac = i as f64 / (n - 1) as f64;
            // Cold early record warming towards the present, with noise.
            let central = -2.5 * (1.0 - frac) + 0.6 * (PI * frac).sin() + rng.random::<f64>() * 0.3 - 0.15;
            let spread = 0.3 + rng.random::<f64>() * 0.2;
            (years_bp, central - spread, central, central + spread)
        })
        .collect()
}

/// Cultivars whose requirements split the station network at present-day climate.
fn synth_cultivars(stations: &[StationRecord], station_cfg: &StationConfig) -> Vec<Cultivar> {
    let gdd_cfg = GddConfig::default();
    let requirement = |base: f64, q: f64| {
        let mut gdd: Vec<f64> = stations
            .iter()
            .filter_map(|s| s.climatology(station_cfg).ok())
            .map(|c| accumulated_gdd(&c, base, 0.0, gdd_cfg.cap_c))
            .collect();
        gdd.sort_by(f64::total_cmp);
        quantile_sorted(&gdd, q).round()
    };

    vec![
        Cultivar::new("japonica", "rice", 10.0, requirement(10.0, 0.35)),
        Cultivar::new("indica", "rice", 10.0, requirement(10.0, 0.65)),
        Cultivar::new("foxtail", "millet", 8.0, requirement(8.0, 0.5)),
    ]
}

/// Station configuration whose calibration period covers the synthetic records.
pub fn station_config(cfg: &SynthConfig) -> StationConfig {
    StationConfig {
        calibration_start: cfg.first_year,
        calibration_end: cfg.last_year,
        min_years_per_day: 1,
        ..StationConfig::default()
    }
}

/// Generates a synthetic dataset in memory.
pub fn generate(cfg: &SynthConfig) -> Result<SynthDataset, SynthError> {
    if cfg.grid.is_empty() || cfg.station_count < 3 || cfg.first_year > cfg.last_year {
        return Err(SynthError::InvalidConfig(format!(
            "grid {}x{}, {} stations, years {}..={}",
            cfg.grid.ncols, cfg.grid.nrows, cfg.station_count, cfg.first_year, cfg.last_year
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
    let elevation = synth_elevation(cfg, &mut rng);
    if elevation.land_count() == 0 {
        return Err(SynthError::InvalidConfig("grid has no land cells".into()));
    }
    let stations = synth_stations(cfg, &elevation, &mut rng);
    let proxy = synth_proxy(cfg, &mut rng);
    let cultivars = synth_cultivars(&stations, &station_config(cfg));

    Ok(SynthDataset {
        elevation,
        stations,
        proxy,
        cultivars,
    })
}

/// Writes a dataset into `dir` using the loader formats.
pub fn write_dataset(dataset: &SynthDataset, dir: &Path) -> Result<SynthPaths, SynthError> {
    std::fs::create_dir_all(dir)?;
    let paths = SynthPaths {
        elevation: dir.join("elevation.json"),
        stations: dir.join("stations.csv"),
        daily: dir.join("daily.csv"),
        proxy: dir.join("proxy.csv"),
        cultivars: dir.join("cultivars.json"),
    };

    write_elevation_grid(&dataset.elevation, &paths.elevation, -9999.0)?;

    let mut stations = csv::Writer::from_path(&paths.stations)?;
    stations.write_record(["id", "lon", "lat", "elevation_m"])?;
    for s in &dataset.stations {
        stations.write_record([
            s.id.clone(),
            format!("{:.4}", s.coord.lon),
            format!("{:.4}", s.coord.lat),
            format!("{:.1}", s.elevation_m),
        ])?;
    }
    stations.flush()?;

    let mut daily = csv::Writer::from_path(&paths.daily)?;
    daily.write_record(["station_id", "date", "tmin_c", "tmax_c"])?;
    for s in &dataset.stations {
        for obs in &s.daily {
            daily.write_record([
                s.id.clone(),
                format!("{:04}-{:02}-{:02}", obs.date.year(), obs.date.month(), obs.date.day()),
                format!("{:.2}", obs.tmin_c),
                format!("{:.2}", obs.tmax_c),
            ])?;
        }
    }
    daily.flush()?;

    let mut proxy = csv::Writer::from_path(&paths.proxy)?;
    proxy.write_record(["years_bp", "lower", "central", "upper"])?;
    for &(t, lo, mid, hi) in &dataset.proxy {
        proxy.write_record([
            format!("{t}"),
            format!("{lo:.4}"),
            format!("{mid:.4}"),
            format!("{hi:.4}"),
        ])?;
    }
    proxy.flush()?;

    let mut cultivars = BufWriter::new(File::create(&paths.cultivars)?);
    serde_json::to_writer_pretty(&mut cultivars, &dataset.cultivars)?;
    cultivars.flush()?;

    Ok(paths)
}
