//! Elevation grid: the covariate surface every prediction is aligned to.

mod grid;
mod raw;

pub use grid::{ElevationGrid, GridSpec, LandCells};
pub use raw::{
    expected_file_size, raw_body_path, read_elevation_grid, write_elevation_grid, GridError,
    GridHeader,
};
