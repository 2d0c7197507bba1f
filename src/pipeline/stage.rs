//! Pipeline stage trait and orchestration.

use std::path::PathBuf;

use log::{error, info, warn};
use rayon::prelude::*;
use rayon::ThreadPool;
use thiserror::Error;

use crate::aggregate::{aggregate, group_by_crop, AggregateError};
use crate::cultivar::{base_temperatures, Cultivar, CultivarError};
use crate::elevation::GridError;
use crate::export::{export_reconstruction_png, export_summary_csv, ExportError, PngExportOptions};
use crate::gdd::{GddError, GddTable};
use crate::geo::GeoCoord;
use crate::kriging::{KrigingError, StationLayout};
use crate::projection::{project, ProxyError, Reconstruction};
use crate::smoothing::{NicheModel, SmoothingError};
use crate::station::StationError;
use crate::store::{ArtifactKind, StoreError};
use crate::summary::summarize;

use super::fit::FitContext;
use super::{RunConfig, RunState};

/// Unique identifier for pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    /// Per-cultivar niche model fitting.
    Fit,
    /// Projection of models through the proxy record.
    Project,
    /// Per-crop averaging of reconstructions.
    Aggregate,
    /// PNG and CSV hand-off.
    Export,
}

impl StageId {
    /// Returns the name of the stage.
    pub fn name(&self) -> &'static str {
        match self {
            StageId::Fit => "fit",
            StageId::Project => "project",
            StageId::Aggregate => "aggregate",
            StageId::Export => "export",
        }
    }
}

/// Errors that can occur during pipeline execution.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Station error: {0}")]
    Station(#[from] StationError),
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),
    #[error("Cultivar error: {0}")]
    Cultivar(#[from] CultivarError),
    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),
    #[error("GDD error: {0}")]
    Gdd(#[from] GddError),
    #[error("Kriging error: {0}")]
    Kriging(#[from] KrigingError),
    #[error("Smoothing error: {0}")]
    Smoothing(#[from] SmoothingError),
    #[error("Aggregation error: {0}")]
    Aggregate(#[from] AggregateError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Missing input: {0}")]
    MissingInput(&'static str),
    #[error("No SD scale configured and the proxy record is not in °C")]
    MissingScale,
    #[error("Stage '{stage}' is missing {kind} artifacts: {}", .keys.join(", "))]
    MissingArtifact {
        stage: String,
        kind: &'static str,
        keys: Vec<String>,
    },
    #[error("Stage '{stage}' failed for {} unit(s): {}", .failed.len(), .failed.join("; "))]
    UnitsFailed { stage: String, failed: Vec<String> },
    #[error("Missing dependency: stage '{0}' requires '{1}'")]
    MissingDependency(String, String),
}

/// Trait for implementing pipeline stages.
///
/// A stage reads the run inputs and the artifact store and writes uniquely
/// keyed artifacts back. Units of work inside a stage never share mutable
/// state.
pub trait PipelineStage: Send + Sync {
    /// Returns the unique identifier for this stage.
    fn id(&self) -> StageId;

    /// Returns a human-readable name for the stage.
    fn name(&self) -> &str;

    /// Returns the stage IDs that must run before this stage when both are
    /// part of the same pipeline.
    fn dependencies(&self) -> &[StageId] {
        &[]
    }

    /// The artifact kind this stage writes to the store, if any.
    fn produces(&self) -> Option<ArtifactKind> {
        None
    }

    /// Executes the stage.
    ///
    /// # Arguments
    /// * `run` - Store, inputs and outputs of the run
    /// * `config` - Run configuration
    ///
    /// # Returns
    /// `Ok(())` once every unit of the stage is complete
    fn execute(&self, run: &mut RunState, config: &RunConfig) -> Result<(), PipelineError>;
}

/// Orchestrates stages into a run.
pub struct Pipeline {
    stages: Vec<Box<dyn PipelineStage>>,
    config: RunConfig,
}

impl Pipeline {
    /// Creates a new empty pipeline with the given configuration.
    pub fn new(config: RunConfig) -> Self {
        Self {
            stages: Vec::new(),
            config,
        }
    }

    /// The full fit → project → aggregate chain, plus export when an output
    /// directory is given.
    pub fn full(config: RunConfig, export_dir: Option<PathBuf>) -> Self {
        let mut pipeline = Self::new(config);
        pipeline
            .add_stage(FitStage)
            .add_stage(ProjectStage)
            .add_stage(AggregateStage);
        if let Some(dir) = export_dir {
            pipeline.add_stage(ExportStage::new(dir));
        }
        pipeline
    }

    /// Adds a stage to the pipeline.
    pub fn add_stage<S: PipelineStage + 'static>(&mut self, stage: S) -> &mut Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Returns the number of stages in the pipeline.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Artifact kinds a forced run discards: everything produced by the
    /// earliest producing stage and downstream of it.
    pub fn forced_kinds(&self) -> &'static [ArtifactKind] {
        self.stages
            .iter()
            .filter_map(|s| s.produces())
            .min()
            .map(|kind| kind.downstream())
            .unwrap_or(&[])
    }

    /// Executes all stages in order.
    pub fn run(&self, run: &mut RunState) -> Result<(), PipelineError> {
        self.run_with_callbacks(run, |_, _, _| {}, |_, _, _| {})
    }

    /// Executes all stages with progress callbacks.
    ///
    /// A dependency that is not part of this pipeline is assumed to have
    /// been satisfied by an earlier run; stages check the store for the
    /// artifacts they need. With `force`, only [`Pipeline::forced_kinds`]
    /// are discarded, so those upstream artifacts survive.
    ///
    /// # Arguments
    /// * `run` - Run state
    /// * `on_stage_start` - Called when each stage begins
    /// * `on_stage_complete` - Called when each stage finishes
    pub fn run_with_callbacks<F1, F2>(
        &self,
        run: &mut RunState,
        mut on_stage_start: F1,
        mut on_stage_complete: F2,
    ) -> Result<(), PipelineError>
    where
        F1: FnMut(&str, usize, usize),
        F2: FnMut(&str, usize, usize),
    {
        self.config.validate()?;
        if self.config.force {
            let kinds = self.forced_kinds();
            if kinds.is_empty() {
                warn!("Force enabled, but no stage in this run produces artifacts");
            } else {
                let names: Vec<&str> = kinds.iter().map(|k| k.dir_name()).collect();
                warn!(
                    "Force enabled: clearing {} in {}",
                    names.join(", "),
                    run.store.root().display()
                );
                run.store.clear(kinds)?;
            }
        }

        let total = self.stages.len();
        let mut completed: Vec<StageId> = Vec::new();

        for (i, stage) in self.stages.iter().enumerate() {
            on_stage_start(stage.name(), i, total);

            for dep in stage.dependencies() {
                let scheduled = self.stages.iter().any(|s| s.id() == *dep);
                if scheduled && !completed.contains(dep) {
                    return Err(PipelineError::MissingDependency(
                        stage.name().to_string(),
                        dep.name().to_string(),
                    ));
                }
            }

            info!("Stage '{}' started", stage.name());
            stage.execute(run, &self.config)?;
            completed.push(stage.id());
            info!("Stage '{}' complete", stage.name());

            on_stage_complete(stage.name(), i, total);
        }

        Ok(())
    }
}

/// Builds a fixed-size worker pool; zero means one thread per core.
fn worker_pool(workers: usize) -> Result<ThreadPool, PipelineError> {
    Ok(rayon::ThreadPoolBuilder::new().num_threads(workers).build()?)
}

/// Runs independent units on a pool and joins them.
///
/// Every unit runs to completion; failures are reported together once all
/// units have finished.
fn run_units<T, F>(pool: &ThreadPool, stage: &str, units: &[T], f: F) -> Result<(), PipelineError>
where
    T: Sync,
    F: Fn(&T) -> Result<(), (String, PipelineError)> + Sync,
{
    let failures: Vec<String> = pool.install(|| {
        units
            .par_iter()
            .filter_map(|unit| f(unit).err())
            .map(|(key, e)| {
                error!("Stage '{}': unit '{}' failed: {}", stage, key, e);
                format!("{key}: {e}")
            })
            .collect()
    });

    if failures.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::UnitsFailed {
            stage: stage.to_string(),
            failed: failures,
        })
    }
}

/// Fails unless every key has an artifact of `kind`.
fn require_artifacts<'a>(
    run: &RunState,
    stage: &str,
    kind: ArtifactKind,
    keys: impl IntoIterator<Item = &'a str>,
) -> Result<(), PipelineError> {
    let missing: Vec<String> = keys
        .into_iter()
        .filter(|k| !run.store.contains(kind, k))
        .map(str::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::MissingArtifact {
            stage: stage.to_string(),
            kind: kind.dir_name(),
            keys: missing,
        })
    }
}

/// Fits and persists one niche model per cultivar.
pub struct FitStage;

impl PipelineStage for FitStage {
    fn id(&self) -> StageId {
        StageId::Fit
    }

    fn name(&self) -> &str {
        "Niche Model Fitting"
    }

    fn produces(&self) -> Option<ArtifactKind> {
        Some(ArtifactKind::Model)
    }

    fn execute(&self, run: &mut RunState, config: &RunConfig) -> Result<(), PipelineError> {
        let pending: Vec<Cultivar> = run
            .inputs
            .cultivars
            .iter()
            .filter(|c| !run.store.contains(ArtifactKind::Model, &c.id))
            .cloned()
            .collect();
        if pending.is_empty() {
            info!("Every cultivar already has a model; nothing to fit");
            return Ok(());
        }

        let stations = run.inputs.stations()?;
        let elevation = run.inputs.elevation()?;
        let sd_scale_c = run.inputs.sd_scale_c(config)?;
        let levels = config.levels()?;

        let table = GddTable::compute(
            stations,
            &base_temperatures(&pending),
            &levels,
            sd_scale_c,
            &config.gdd,
        )?;
        let coords: Vec<GeoCoord> = stations.iter().map(|s| s.coord).collect();
        let station_elevations: Vec<f64> = stations.iter().map(|s| s.elevation_m).collect();
        let layout = StationLayout::new(&coords, &station_elevations, config.kriging.coordinate_trend)?;
        let cells = elevation.land_cells();

        info!(
            "Fitting {} cultivar(s): {} stations, {} levels, {} land cells, {:.3} °C per SD",
            pending.len(),
            stations.len(),
            levels.len(),
            cells.len(),
            sd_scale_c
        );

        let ctx = FitContext {
            table: &table,
            layout: &layout,
            cells: &cells,
            grid: elevation.spec,
            levels: &levels,
            config,
        };
        let store = &run.store;
        let pool = worker_pool(config.fit_workers)?;
        run_units(&pool, self.name(), &pending, |cultivar| {
            store
                .get_or_compute(ArtifactKind::Model, &cultivar.id, || ctx.fit_cultivar(cultivar))
                .map(|_: NicheModel| info!("Model for '{}' stored", cultivar.id))
                .map_err(|e| (cultivar.id.clone(), e))
        })
    }
}

/// Projects every cultivar's model through the proxy record.
pub struct ProjectStage;

impl PipelineStage for ProjectStage {
    fn id(&self) -> StageId {
        StageId::Project
    }

    fn name(&self) -> &str {
        "Temporal Projection"
    }

    fn dependencies(&self) -> &[StageId] {
        &[StageId::Fit]
    }

    fn produces(&self) -> Option<ArtifactKind> {
        Some(ArtifactKind::Reconstruction)
    }

    fn execute(&self, run: &mut RunState, config: &RunConfig) -> Result<(), PipelineError> {
        let cultivars = &run.inputs.cultivars;
        require_artifacts(
            run,
            self.name(),
            ArtifactKind::Model,
            cultivars.iter().map(|c| c.id.as_str()),
        )?;

        let pending: Vec<Cultivar> = cultivars
            .iter()
            .filter(|c| !run.store.contains(ArtifactKind::Reconstruction, &c.id))
            .cloned()
            .collect();
        if pending.is_empty() {
            info!("Every cultivar already has a reconstruction; nothing to project");
            return Ok(());
        }

        let proxy = run.inputs.proxy()?;
        let store = &run.store;
        let pool = worker_pool(config.project_workers)?;
        run_units(&pool, self.name(), &pending, |cultivar| {
            let unit = || -> Result<Reconstruction, PipelineError> {
                let model: NicheModel = store.load(ArtifactKind::Model, &cultivar.id)?;
                if let Some(sd) = proxy.sd_c {
                    if (model.sd_scale_c - sd).abs() > 1e-6 * sd.abs().max(1.0) {
                        warn!(
                            "Model for '{}' was built with {:.3} °C per SD, proxy SD is {:.3} °C",
                            cultivar.id, model.sd_scale_c, sd
                        );
                    }
                }
                Ok(project(&model, proxy))
            };
            store
                .get_or_compute(ArtifactKind::Reconstruction, &cultivar.id, unit)
                .map(|r: Reconstruction| {
                    info!("Reconstruction for '{}' stored ({} layers)", cultivar.id, r.years_bp().len())
                })
                .map_err(|e| (cultivar.id.clone(), e))
        })
    }
}

/// Averages reconstructions of crops with more than one cultivar.
pub struct AggregateStage;

impl PipelineStage for AggregateStage {
    fn id(&self) -> StageId {
        StageId::Aggregate
    }

    fn name(&self) -> &str {
        "Crop Aggregation"
    }

    fn dependencies(&self) -> &[StageId] {
        &[StageId::Project]
    }

    fn produces(&self) -> Option<ArtifactKind> {
        Some(ArtifactKind::Aggregate)
    }

    fn execute(&self, run: &mut RunState, config: &RunConfig) -> Result<(), PipelineError> {
        let cultivars = &run.inputs.cultivars;
        // Full join: every member of every group must be reconstructed first.
        require_artifacts(
            run,
            self.name(),
            ArtifactKind::Reconstruction,
            cultivars.iter().map(|c| c.id.as_str()),
        )?;

        let groups: Vec<(String, Vec<String>)> = group_by_crop(cultivars)
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .collect();

        let store = &run.store;
        let pool = worker_pool(config.project_workers)?;
        run_units(&pool, self.name(), &groups, |(crop, members)| {
            let unit = || -> Result<Reconstruction, PipelineError> {
                let loaded: Vec<Reconstruction> = members
                    .iter()
                    .map(|id| store.load(ArtifactKind::Reconstruction, id))
                    .collect::<Result<_, _>>()?;
                let refs: Vec<&Reconstruction> = loaded.iter().collect();
                Ok(aggregate(crop, &refs)?)
            };
            store
                .get_or_compute(ArtifactKind::Aggregate, crop, unit)
                .map(|_: Reconstruction| info!("Aggregate for crop '{}' stored", crop))
                .map_err(|e| (crop.clone(), e))
        })
    }
}

/// Writes PNG layers and a summary table for cultivars and crops.
pub struct ExportStage {
    pub output_dir: PathBuf,
    pub options: PngExportOptions,
}

impl ExportStage {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            options: PngExportOptions::default(),
        }
    }
}

impl PipelineStage for ExportStage {
    fn id(&self) -> StageId {
        StageId::Export
    }

    fn name(&self) -> &str {
        "Export"
    }

    fn dependencies(&self) -> &[StageId] {
        &[StageId::Project, StageId::Aggregate]
    }

    fn execute(&self, run: &mut RunState, _config: &RunConfig) -> Result<(), PipelineError> {
        let cultivars = &run.inputs.cultivars;
        require_artifacts(
            run,
            self.name(),
            ArtifactKind::Reconstruction,
            cultivars.iter().map(|c| c.id.as_str()),
        )?;

        let groups = group_by_crop(cultivars);
        require_artifacts(
            run,
            self.name(),
            ArtifactKind::Aggregate,
            groups
                .iter()
                .filter(|(_, members)| members.len() > 1)
                .map(|(crop, _)| crop.as_str()),
        )?;

        let cultivar_dir = self.output_dir.join("cultivars");
        let crop_dir = self.output_dir.join("crops");
        let mut written = Vec::new();
        let mut rows = Vec::new();

        for cultivar in cultivars {
            let rec: Reconstruction = run.store.load(ArtifactKind::Reconstruction, &cultivar.id)?;
            written.extend(export_reconstruction_png(&rec, &cultivar_dir, &self.options)?);
            rows.extend(summarize(&rec));
        }

        for (crop, members) in &groups {
            let rec: Reconstruction = if members.len() > 1 {
                run.store.load(ArtifactKind::Aggregate, crop)?
            } else {
                let only: Reconstruction = run.store.load(ArtifactKind::Reconstruction, &members[0])?;
                aggregate(crop, &[&only])?
            };
            written.extend(export_reconstruction_png(&rec, &crop_dir, &self.options)?);
            rows.extend(summarize(&rec));
        }

        let summary_path = self.output_dir.join("summary.csv");
        export_summary_csv(&summary_path, &rows)?;
        written.push(summary_path);

        info!("Exported {} files to {}", written.len(), self.output_dir.display());
        run.exported.extend(written);
        Ok(())
    }
}
