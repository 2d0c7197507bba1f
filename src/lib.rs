//! Thermal-niche reconstruction of crop cultivars.
//!
//! Station temperatures are turned into growing-degree-day indicators under a
//! range of synthetic warming and cooling offsets, interpolated over an
//! elevation grid by indicator kriging, smoothed into monotone response
//! curves and projected through a paleotemperature proxy record.

pub mod aggregate;
pub mod cultivar;
pub mod elevation;
pub mod export;
pub mod gdd;
pub mod geo;
pub mod kriging;
pub mod pipeline;
pub mod projection;
pub mod smoothing;
pub mod station;
pub mod store;
pub mod summary;
pub mod synth;

pub use cultivar::Cultivar;
pub use elevation::{ElevationGrid, GridSpec};
pub use gdd::{GddTable, PerturbationGrid};
pub use kriging::{KrigingConfig, KrigingModel};
pub use pipeline::{Pipeline, PipelineError, PipelineStage, RunConfig};
pub use projection::{project, Band, ProxySeries, Reconstruction};
pub use smoothing::NicheModel;
pub use store::{ArtifactKind, ArtifactStore};
