//! Indicator smoother.
//!
//! Raw indicator-kriging predictions can leave `[0, 1]` and wobble along the
//! perturbation axis. Each cell's sequence is clipped, forced non-decreasing
//! by isotonic regression (warmer never lowers the chance of meeting a GDD
//! requirement) and then smoothed by local linear regression.

mod isotonic;
mod loess;
mod response;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use isotonic::isotonic_increasing;
pub use loess::{loess_at, loess_fit, neighbourhood_size, LocalDegree};
pub use response::{IndicatorSmoother, NicheModel};

/// Errors raised while assembling smoothed models.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SmoothingError {
    #[error("Expected {expected} perturbation levels, got {actual}")]
    LevelCount { expected: usize, actual: usize },
    #[error("Prediction surface has {actual} cells, grid has {expected}")]
    CellCount { expected: usize, actual: usize },
}

/// Configuration for the local regression step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Fraction of the perturbation axis in each local neighbourhood.
    pub span: f64,
    pub degree: LocalDegree,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            span: 0.1,
            degree: LocalDegree::Linear,
        }
    }
}
