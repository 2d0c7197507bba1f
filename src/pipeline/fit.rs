//! Fitting one cultivar's niche model.

use log::{debug, warn};
use rayon::prelude::*;

use crate::cultivar::Cultivar;
use crate::elevation::{GridSpec, LandCells};
use crate::gdd::{GddTable, PerturbationGrid};
use crate::kriging::{KrigingError, KrigingModel, StationLayout};
use crate::smoothing::NicheModel;

use super::{DegeneratePolicy, PipelineError, RunConfig};

/// Read-only data every cultivar fit of a run shares.
pub struct FitContext<'a> {
    pub table: &'a GddTable,
    pub layout: &'a StationLayout,
    pub cells: &'a LandCells,
    pub grid: GridSpec,
    pub levels: &'a PerturbationGrid,
    pub config: &'a RunConfig,
}

/// Raw prediction surface for one level, and whether it was degenerate.
struct LevelSurface {
    values: Vec<f32>,
    constant: bool,
}

impl FitContext<'_> {
    fn fit_level(&self, cultivar: &Cultivar, level: usize) -> Result<LevelSurface, PipelineError> {
        let indicators = self.table.indicators(cultivar, level)?;
        match KrigingModel::fit(self.layout, &indicators, &self.config.kriging) {
            Ok(model) => {
                debug!(
                    "{} level {}: range {:.1} km, nugget ratio {}",
                    cultivar.id,
                    self.levels.levels()[level],
                    model.range_km(),
                    model.nugget_ratio()
                );
                Ok(LevelSurface {
                    values: model.predict_cells(self.cells, self.config.kriging.batch_size),
                    constant: false,
                })
            }
            Err(KrigingError::DegenerateResponse { value })
                if self.config.degenerate_policy == DegeneratePolicy::Constant =>
            {
                Ok(LevelSurface {
                    values: vec![value as f32; self.cells.len()],
                    constant: true,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fits every perturbation level in parallel, then smooths per cell.
    pub fn fit_cultivar(&self, cultivar: &Cultivar) -> Result<NicheModel, PipelineError> {
        let surfaces: Vec<LevelSurface> = (0..self.levels.len())
            .into_par_iter()
            .map(|k| self.fit_level(cultivar, k))
            .collect::<Result<_, _>>()?;

        let constant = surfaces.iter().filter(|s| s.constant).count();
        if constant > 0 {
            warn!(
                "Cultivar '{}': {} of {} levels have a uniform station response; using constant surfaces",
                cultivar.id,
                constant,
                surfaces.len()
            );
        }

        let raw: Vec<Vec<f32>> = surfaces.into_iter().map(|s| s.values).collect();
        let model = NicheModel::from_surfaces(
            &cultivar.id,
            &cultivar.crop,
            self.levels,
            self.table.sd_scale_c,
            self.grid,
            self.cells.indices.clone(),
            &raw,
            &self.config.smoothing,
        )?;
        Ok(model)
    }
}
