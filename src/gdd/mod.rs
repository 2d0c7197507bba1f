//! GDD modulator.
//!
//! Turns each station climatology into accumulated growing degree days for a
//! crop base temperature, under synthetic temperature offsets expressed in
//! units of the paleoclimate proxy's standard deviation.

mod perturbation;
mod table;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use perturbation::PerturbationGrid;
pub use table::{accumulated_gdd, GddTable};

/// Errors raised while building or querying a GDD table.
#[derive(Error, Debug)]
pub enum GddError {
    #[error("SD scale must be a positive number of degrees, got {0}")]
    InvalidScale(f64),
    #[error("No GDD column for base temperature {0} °C")]
    UnknownBase(f64),
    #[error("Perturbation level index {0} is out of range")]
    LevelOutOfRange(usize),
    #[error("Perturbation levels must be non-empty and strictly increasing, got {0:?}")]
    InvalidLevels(Vec<i32>),
}

/// Configuration for GDD accumulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GddConfig {
    /// Upper temperature cap (°C) applied to daily extremes.
    pub cap_c: f64,
}

impl Default for GddConfig {
    fn default() -> Self {
        Self { cap_c: 30.0 }
    }
}
