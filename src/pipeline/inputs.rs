//! Read-only run inputs and the mutable state stages work on.

use std::path::PathBuf;

use log::info;

use crate::cultivar::{load_cultivars, validate_cultivars, Cultivar};
use crate::elevation::{read_elevation_grid, ElevationGrid};
use crate::projection::{load_proxy, ProxySeries};
use crate::station::{load_station_climatologies, StationClimatology};
use crate::store::ArtifactStore;

use super::{PipelineError, RunConfig};

/// Input file locations. Only the files a command needs must be present.
#[derive(Debug, Clone, Default)]
pub struct InputPaths {
    pub stations: Option<PathBuf>,
    pub daily: Option<PathBuf>,
    pub elevation: Option<PathBuf>,
    pub proxy: Option<PathBuf>,
    pub cultivars: Option<PathBuf>,
}

/// Loaded inputs, shared read-only by every worker.
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    pub cultivars: Vec<Cultivar>,
    pub stations: Option<Vec<StationClimatology>>,
    pub elevation: Option<ElevationGrid>,
    pub proxy: Option<ProxySeries>,
}

impl RunInputs {
    /// Loads every input whose path is given.
    pub fn load(paths: &InputPaths, config: &RunConfig) -> Result<Self, PipelineError> {
        let cultivar_path = paths.cultivars.as_ref().ok_or(PipelineError::MissingInput("cultivars"))?;
        let cultivars = load_cultivars(cultivar_path)?;
        info!("Loaded {} cultivars", cultivars.len());

        let stations = match (&paths.stations, &paths.daily) {
            (Some(meta), Some(daily)) => Some(load_station_climatologies(meta, daily, &config.station)?),
            _ => None,
        };

        let elevation = match &paths.elevation {
            Some(path) => {
                let grid = read_elevation_grid(path)?;
                info!(
                    "Loaded elevation grid {}x{} ({} land cells)",
                    grid.spec.ncols,
                    grid.spec.nrows,
                    grid.land_count()
                );
                Some(grid)
            }
            None => None,
        };

        let proxy = match &paths.proxy {
            Some(path) => {
                let proxy = load_proxy(path, config.proxy_units)?;
                info!("Loaded proxy record with {} time steps", proxy.len());
                Some(proxy)
            }
            None => None,
        };

        Ok(Self {
            cultivars,
            stations,
            elevation,
            proxy,
        })
    }

    /// Builds inputs from in-memory data.
    pub fn new(cultivars: Vec<Cultivar>) -> Result<Self, PipelineError> {
        validate_cultivars(&cultivars)?;
        Ok(Self {
            cultivars,
            ..Default::default()
        })
    }

    pub fn with_stations(mut self, stations: Vec<StationClimatology>) -> Self {
        self.stations = Some(stations);
        self
    }

    pub fn with_elevation(mut self, elevation: ElevationGrid) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_proxy(mut self, proxy: ProxySeries) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn stations(&self) -> Result<&[StationClimatology], PipelineError> {
        self.stations.as_deref().ok_or(PipelineError::MissingInput("stations"))
    }

    pub fn elevation(&self) -> Result<&ElevationGrid, PipelineError> {
        self.elevation.as_ref().ok_or(PipelineError::MissingInput("elevation"))
    }

    pub fn proxy(&self) -> Result<&ProxySeries, PipelineError> {
        self.proxy.as_ref().ok_or(PipelineError::MissingInput("proxy"))
    }

    /// Degrees per SD unit: configured value, else the proxy's own SD.
    pub fn sd_scale_c(&self, config: &RunConfig) -> Result<f64, PipelineError> {
        config
            .sd_scale_c
            .or_else(|| self.proxy.as_ref().and_then(|p| p.sd_c))
            .ok_or(PipelineError::MissingScale)
    }
}

/// State a pipeline run threads through its stages.
#[derive(Debug)]
pub struct RunState {
    pub store: ArtifactStore,
    pub inputs: RunInputs,
    /// Files written by the export stage.
    pub exported: Vec<PathBuf>,
}

impl RunState {
    pub fn new(store: ArtifactStore, inputs: RunInputs) -> Self {
        Self {
            store,
            inputs,
            exported: Vec::new(),
        }
    }
}
