//! Spatial interpolator.
//!
//! Indicator kriging with an exponential covariance over great-circle
//! distance and elevation as drift covariate. A fitted [`KrigingModel`]
//! predicts raw (unbounded) values over the land cells of the elevation grid.

mod config;
mod layout;
mod model;

use thiserror::Error;

pub use config::KrigingConfig;
pub use layout::{exponential_covariance, StationLayout};
pub use model::KrigingModel;

/// Errors that can occur while fitting a kriging surface.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KrigingError {
    #[error("Only {found} distinct stations have indicator values, at least {required} needed")]
    InsufficientStations { found: usize, required: usize },
    #[error("Every station reports the same indicator value ({value})")]
    DegenerateResponse { value: f64 },
    #[error("Kriging system could not be factored for any candidate parameters")]
    SingularSystem,
    #[error("Expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}
