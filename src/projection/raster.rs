//! Time-labelled raster stacks of integer niche percentages.

use serde::{Deserialize, Serialize};

use crate::elevation::GridSpec;

/// Uncertainty band of the proxy record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    Lower,
    Central,
    Upper,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Lower, Band::Central, Band::Upper];

    pub fn name(&self) -> &'static str {
        match self {
            Band::Lower => "lower",
            Band::Central => "central",
            Band::Upper => "upper",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Band::Lower => 0,
            Band::Central => 1,
            Band::Upper => 2,
        }
    }
}

/// Converts a probability to an integer percentage in `0..=100`.
#[inline]
pub fn to_percent(p: f64) -> u8 {
    if p.is_finite() {
        (p * 100.0).round().clamp(0.0, 100.0) as u8
    } else {
        0
    }
}

/// One layer per time step, one value per land cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterStack {
    /// Time label of every layer, in layer order.
    pub years_bp: Vec<f64>,
    cell_count: usize,
    /// Row-major `[layer][cell]` percentages.
    values: Vec<u8>,
}

impl RasterStack {
    /// Wraps layer-major values. Returns `None` when the length does not match.
    pub fn from_values(years_bp: Vec<f64>, cell_count: usize, values: Vec<u8>) -> Option<Self> {
        if values.len() != years_bp.len() * cell_count {
            return None;
        }
        Some(Self {
            years_bp,
            cell_count,
            values,
        })
    }

    pub(crate) fn from_parts(years_bp: Vec<f64>, cell_count: usize, values: Vec<u8>) -> Self {
        debug_assert_eq!(values.len(), years_bp.len() * cell_count);
        Self {
            years_bp,
            cell_count,
            values,
        }
    }

    pub fn layer_count(&self) -> usize {
        self.years_bp.len()
    }

    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    pub fn layer(&self, layer: usize) -> &[u8] {
        &self.values[layer * self.cell_count..(layer + 1) * self.cell_count]
    }

    /// Layer carrying a given time label.
    pub fn layer_at(&self, years_bp: f64) -> Option<&[u8]> {
        self.years_bp
            .iter()
            .position(|&t| t == years_bp)
            .map(|i| self.layer(i))
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }
}

/// Niche reconstruction for one cultivar (or one aggregated crop).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconstruction {
    /// Cultivar id, or crop label for aggregates.
    pub label: String,
    pub crop: String,
    pub grid: GridSpec,
    /// Grid indices of the land cells, in value order.
    pub cells: Vec<u32>,
    /// Stacks indexed by [`Band::index`].
    pub bands: [RasterStack; 3],
}

impl Reconstruction {
    pub fn band(&self, band: Band) -> &RasterStack {
        &self.bands[band.index()]
    }

    /// Time labels shared by all bands.
    pub fn years_bp(&self) -> &[f64] {
        &self.bands[0].years_bp
    }

    /// Percentages for one band and time label.
    pub fn layer(&self, band: Band, years_bp: f64) -> Option<&[u8]> {
        self.band(band).layer_at(years_bp)
    }

    /// Expands one layer back onto the full grid; masked cells are `None`.
    pub fn to_full_raster(&self, band: Band, layer: usize) -> Vec<Option<u8>> {
        let mut out = vec![None; self.grid.len()];
        for (&cell, &v) in self.cells.iter().zip(self.band(band).layer(layer)) {
            out[cell as usize] = Some(v);
        }
        out
    }
}
