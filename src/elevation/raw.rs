//! RAW float grid I/O with a JSON header sidecar.
//!
//! A grid is stored as two files sharing a stem: `{stem}.json` holds the
//! [`GridSpec`] and nodata value, `{stem}.raw` holds `ncols * nrows` 32-bit
//! little-endian floats in row-major order.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{ElevationGrid, GridSpec};

/// Errors that can occur reading or writing RAW grids.
#[derive(Error, Debug)]
pub enum GridError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid grid header: {0}")]
    Header(#[from] serde_json::Error),
    #[error("RAW body has {actual} bytes, header expects {expected}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("Invalid grid dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),
}

/// JSON sidecar describing a RAW grid body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridHeader {
    #[serde(flatten)]
    pub spec: GridSpec,
    /// Value in the body that marks masked cells.
    #[serde(default = "default_nodata")]
    pub nodata: f32,
}

fn default_nodata() -> f32 {
    -9999.0
}

/// Path of the RAW body belonging to a header path.
pub fn raw_body_path(header_path: &Path) -> PathBuf {
    header_path.with_extension("raw")
}

/// Expected RAW body size in bytes for a grid.
pub fn expected_file_size(spec: &GridSpec) -> u64 {
    spec.len() as u64 * 4
}

/// Reads an elevation grid from `{stem}.json` + `{stem}.raw`.
///
/// Cells equal to the header's nodata value (or non-finite) are masked.
pub fn read_elevation_grid(header_path: &Path) -> Result<ElevationGrid, GridError> {
    let header: GridHeader = serde_json::from_reader(BufReader::new(File::open(header_path)?))?;
    let spec = header.spec;
    if spec.ncols == 0 || spec.nrows == 0 || !(spec.cell_size > 0.0) {
        return Err(GridError::InvalidDimensions(spec.ncols, spec.nrows));
    }

    let body_path = raw_body_path(header_path);
    let expected = expected_file_size(&spec);
    let actual = std::fs::metadata(&body_path)?.len();
    if actual != expected {
        return Err(GridError::SizeMismatch { expected, actual });
    }

    let mut bytes = Vec::with_capacity(expected as usize);
    BufReader::new(File::open(&body_path)?).read_to_end(&mut bytes)?;

    let values = bytes
        .chunks_exact(4)
        .map(|b| {
            let v = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
            if v == header.nodata {
                f32::NAN
            } else {
                v
            }
        })
        .collect();

    Ok(ElevationGrid { spec, values })
}

/// Writes an elevation grid as `{stem}.json` + `{stem}.raw`.
///
/// Masked cells are written as `nodata`.
pub fn write_elevation_grid(
    grid: &ElevationGrid,
    header_path: &Path,
    nodata: f32,
) -> Result<(), GridError> {
    if let Some(parent) = header_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let header = GridHeader { spec: grid.spec, nodata };
    let mut header_writer = BufWriter::new(File::create(header_path)?);
    serde_json::to_writer_pretty(&mut header_writer, &header)?;
    header_writer.flush()?;

    let mut writer = BufWriter::new(File::create(raw_body_path(header_path))?);
    for &v in &grid.values {
        let out = if v.is_finite() { v } else { nodata };
        writer.write_all(&out.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}
