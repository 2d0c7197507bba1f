//! Elevation raster and the land-cell point set derived from it.

use serde::{Deserialize, Serialize};

use crate::geo::GeoCoord;

/// North-up lon/lat raster geometry.
///
/// Cells are stored row-major starting at the north-west corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Longitude of the western edge (degrees).
    pub west: f64,
    /// Latitude of the northern edge (degrees).
    pub north: f64,
    /// Cell size in degrees (square cells).
    pub cell_size: f64,
    pub ncols: u32,
    pub nrows: u32,
}

impl GridSpec {
    pub fn new(west: f64, north: f64, cell_size: f64, ncols: u32, nrows: u32) -> Self {
        Self { west, north, cell_size, ncols, nrows }
    }

    /// Total number of cells, masked or not.
    pub fn len(&self) -> usize {
        self.ncols as usize * self.nrows as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `(col, row)` for a flat cell index.
    #[inline]
    pub fn col_row(&self, index: usize) -> (u32, u32) {
        let ncols = self.ncols as usize;
        ((index % ncols) as u32, (index / ncols) as u32)
    }

    /// Coordinate of the centre of cell `index`.
    pub fn cell_center(&self, index: usize) -> GeoCoord {
        let (col, row) = self.col_row(index);
        GeoCoord::new(
            self.west + (col as f64 + 0.5) * self.cell_size,
            self.north - (row as f64 + 0.5) * self.cell_size,
        )
    }

    pub fn east(&self) -> f64 {
        self.west + self.ncols as f64 * self.cell_size
    }

    pub fn south(&self) -> f64 {
        self.north - self.nrows as f64 * self.cell_size
    }
}

/// Unmasked cells of an elevation grid, in grid order.
///
/// This is the covariate-bearing point set every prediction surface of a run
/// is aligned to: position `i` of a surface always refers to `indices[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LandCells {
    pub indices: Vec<u32>,
    pub coords: Vec<GeoCoord>,
    pub elevations: Vec<f64>,
}

impl LandCells {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Elevation raster in meters; non-finite values mark water or out-of-area cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationGrid {
    pub spec: GridSpec,
    pub values: Vec<f32>,
}

impl ElevationGrid {
    /// Creates a grid with every cell masked.
    pub fn masked(spec: GridSpec) -> Self {
        Self {
            spec,
            values: vec![f32::NAN; spec.len()],
        }
    }

    pub fn get(&self, col: u32, row: u32) -> f32 {
        self.values[(row * self.spec.ncols + col) as usize]
    }

    pub fn set(&mut self, col: u32, row: u32, value: f32) {
        let idx = (row * self.spec.ncols + col) as usize;
        self.values[idx] = value;
    }

    pub fn is_land(&self, index: usize) -> bool {
        self.values[index].is_finite()
    }

    pub fn land_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_finite()).count()
    }

    /// Collects the unmasked cells with their centres and elevations.
    pub fn land_cells(&self) -> LandCells {
        let n = self.land_count();
        let mut indices = Vec::with_capacity(n);
        let mut coords = Vec::with_capacity(n);
        let mut elevations = Vec::with_capacity(n);

        for (i, &v) in self.values.iter().enumerate() {
            if v.is_finite() {
                indices.push(i as u32);
                coords.push(self.spec.cell_center(i));
                elevations.push(v as f64);
            }
        }

        LandCells { indices, coords, elevations }
    }

    /// Returns `(min, max)` over land cells, or `None` if everything is masked.
    pub fn elevation_range(&self) -> Option<(f32, f32)> {
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for &v in self.values.iter().filter(|v| v.is_finite()) {
            min = min.min(v);
            max = max.max(v);
        }
        if min <= max {
            Some((min, max))
        } else {
            None
        }
    }
}
