//! Paleoclimate proxy series with lower/central/upper bands.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Band;

/// Errors that can occur while loading or validating a proxy series.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Proxy series is empty")]
    Empty,
    #[error("Proxy bands have different lengths")]
    LengthMismatch,
    #[error("Non-finite proxy value at {years_bp} BP")]
    NonFinite { years_bp: f64 },
    #[error("Duplicate time label {0} BP")]
    DuplicateTime(f64),
    #[error("Central band has no variance; cannot standardize")]
    ZeroVariance,
}

/// How proxy values in an input table are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProxyUnits {
    /// Already standardized anomalies (SD units).
    Standardized,
    /// Temperature anomalies in °C, standardized by the central band's SD.
    Celsius,
}

/// Standardized temperature anomalies indexed by years before present.
///
/// Time steps keep the order of the source table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxySeries {
    pub years_bp: Vec<f64>,
    pub lower: Vec<f64>,
    pub central: Vec<f64>,
    pub upper: Vec<f64>,
    /// SD (°C) of the central band when built from °C anomalies.
    pub sd_c: Option<f64>,
}

impl ProxySeries {
    /// Builds a series from already-standardized bands.
    pub fn standardized(
        years_bp: Vec<f64>,
        lower: Vec<f64>,
        central: Vec<f64>,
        upper: Vec<f64>,
    ) -> Result<Self, ProxyError> {
        let series = Self {
            years_bp,
            lower,
            central,
            upper,
            sd_c: None,
        };
        series.validate()?;
        Ok(series)
    }

    /// Builds a series from °C anomalies, dividing every band by the sample
    /// standard deviation of the central band.
    pub fn from_anomalies_c(
        years_bp: Vec<f64>,
        lower: Vec<f64>,
        central: Vec<f64>,
        upper: Vec<f64>,
    ) -> Result<Self, ProxyError> {
        let raw = Self {
            years_bp,
            lower,
            central,
            upper,
            sd_c: None,
        };
        raw.validate()?;

        let n = raw.central.len();
        if n < 2 {
            return Err(ProxyError::ZeroVariance);
        }
        let mean = raw.central.iter().sum::<f64>() / n as f64;
        let var = raw.central.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        let sd = var.sqrt();
        if !(sd > 1e-12) {
            return Err(ProxyError::ZeroVariance);
        }

        let scale = |v: Vec<f64>| v.into_iter().map(|x| x / sd).collect::<Vec<f64>>();
        Ok(Self {
            years_bp: raw.years_bp,
            lower: scale(raw.lower),
            central: scale(raw.central),
            upper: scale(raw.upper),
            sd_c: Some(sd),
        })
    }

    fn validate(&self) -> Result<(), ProxyError> {
        let n = self.years_bp.len();
        if n == 0 {
            return Err(ProxyError::Empty);
        }
        if self.lower.len() != n || self.central.len() != n || self.upper.len() != n {
            return Err(ProxyError::LengthMismatch);
        }
        for i in 0..n {
            let t = self.years_bp[i];
            if !t.is_finite()
                || !self.lower[i].is_finite()
                || !self.central[i].is_finite()
                || !self.upper[i].is_finite()
            {
                return Err(ProxyError::NonFinite { years_bp: t });
            }
        }
        let mut sorted = self.years_bp.clone();
        sorted.sort_by(f64::total_cmp);
        if let Some(w) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(ProxyError::DuplicateTime(w[0]));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.years_bp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years_bp.is_empty()
    }

    /// Standardized values for one band.
    pub fn band(&self, band: Band) -> &[f64] {
        match band {
            Band::Lower => &self.lower,
            Band::Central => &self.central,
            Band::Upper => &self.upper,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProxyRow {
    years_bp: f64,
    lower: f64,
    central: f64,
    upper: f64,
}

/// Reads a `years_bp,lower,central,upper` table.
pub fn read_proxy_csv<R: Read>(reader: R, units: ProxyUnits) -> Result<ProxySeries, ProxyError> {
    let mut years_bp = Vec::new();
    let mut lower = Vec::new();
    let mut central = Vec::new();
    let mut upper = Vec::new();

    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    for row in csv_reader.deserialize() {
        let row: ProxyRow = row?;
        years_bp.push(row.years_bp);
        lower.push(row.lower);
        central.push(row.central);
        upper.push(row.upper);
    }

    match units {
        ProxyUnits::Standardized => ProxySeries::standardized(years_bp, lower, central, upper),
        ProxyUnits::Celsius => ProxySeries::from_anomalies_c(years_bp, lower, central, upper),
    }
}

/// Loads a proxy table from disk.
pub fn load_proxy(path: &Path, units: ProxyUnits) -> Result<ProxySeries, ProxyError> {
    let file = std::fs::File::open(path)?;
    read_proxy_csv(std::io::BufReader::new(file), units)
}
