//! Projection of niche models through a proxy record.

use rayon::prelude::*;

use crate::smoothing::NicheModel;

use super::raster::to_percent;
use super::{Band, ProxySeries, RasterStack, Reconstruction};

/// Evaluates every cell's curve at each proxy value of one band.
fn project_band(model: &NicheModel, proxy: &ProxySeries, band: Band) -> RasterStack {
    let cells = model.cell_count();
    let steps = proxy.band(band);
    let mut values = vec![0u8; steps.len() * cells];

    values
        .par_chunks_mut(cells.max(1))
        .zip(steps.par_iter())
        .for_each(|(layer, &x)| {
            for (cell, out) in layer.iter_mut().enumerate() {
                *out = to_percent(model.evaluate(cell, x));
            }
        });

    RasterStack::from_parts(proxy.years_bp.clone(), cells, values)
}

/// Projects a cultivar's niche model through all three proxy bands.
///
/// Layer `t` of every band corresponds to `proxy.years_bp[t]`.
pub fn project(model: &NicheModel, proxy: &ProxySeries) -> Reconstruction {
    let [lower, central, upper] = Band::ALL.map(|band| project_band(model, proxy, band));
    Reconstruction {
        label: model.cultivar.clone(),
        crop: model.crop.clone(),
        grid: model.grid,
        cells: model.cells.clone(),
        bands: [lower, central, upper],
    }
}
