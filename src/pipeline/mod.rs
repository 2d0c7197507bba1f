//! Pipeline module for orchestrating reconstruction stages.
//!
//! Stages run in order over a shared artifact store: per-cultivar model
//! fitting, projection through the proxy record, per-crop aggregation and
//! export. Each unit of work writes one uniquely keyed artifact, so a rerun
//! only computes what is missing.

mod config;
mod fit;
mod inputs;
mod stage;
mod status;

pub use config::{DegeneratePolicy, RunConfig};
pub use fit::FitContext;
pub use inputs::{InputPaths, RunInputs, RunState};
pub use stage::{
    AggregateStage, ExportStage, FitStage, Pipeline, PipelineError, PipelineStage, ProjectStage,
    StageId,
};
pub use status::{cultivar_states, CultivarState};
