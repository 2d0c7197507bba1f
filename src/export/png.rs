//! PNG export of reconstruction layers.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageBuffer, ImageEncoder, LumaA};

use crate::projection::{Band, Reconstruction};

use super::ExportError;

/// Options for PNG export.
#[derive(Debug, Clone)]
pub struct PngExportOptions {
    /// PNG compression type.
    pub compression: CompressionType,
    /// PNG filter type.
    pub filter: FilterType,
}

impl Default for PngExportOptions {
    fn default() -> Self {
        Self {
            compression: CompressionType::Default,
            filter: FilterType::Adaptive,
        }
    }
}

/// File name for one layer: `{label}_{band}_{years_bp}bp.png`.
///
/// Whole years print without a fraction (`6000bp`); others keep it
/// (`100.2bp`), so distinct time labels never share a file.
pub fn layer_file_name(label: &str, band: Band, years_bp: f64) -> String {
    format!("{}_{}_{}bp.png", label, band.name(), years_bp)
}

/// Exports one layer as an 8-bit gray + alpha PNG.
///
/// Gray is the percentage scaled to `0..=255`; masked cells are fully
/// transparent.
///
/// # Arguments
/// * `reconstruction` - Source reconstruction
/// * `band` - Proxy band to export
/// * `layer` - Layer index along the time axis
/// * `path` - Output file path
/// * `options` - Encoder settings
pub fn export_layer_png(
    reconstruction: &Reconstruction,
    band: Band,
    layer: usize,
    path: &Path,
    options: &PngExportOptions,
) -> Result<(), ExportError> {
    let stack = reconstruction.band(band);
    if layer >= stack.layer_count() {
        return Err(ExportError::LayerOutOfRange {
            layer,
            count: stack.layer_count(),
        });
    }

    let grid = reconstruction.grid;
    let full = reconstruction.to_full_raster(band, layer);

    let mut img: ImageBuffer<LumaA<u8>, Vec<u8>> = ImageBuffer::new(grid.ncols, grid.nrows);
    for (i, value) in full.iter().enumerate() {
        let (x, y) = grid.col_row(i);
        let pixel = match value {
            Some(p) => LumaA([((*p as u32 * 255 + 50) / 100) as u8, 255]),
            None => LumaA([0, 0]),
        };
        img.put_pixel(x, y, pixel);
    }

    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let encoder = PngEncoder::new_with_quality(writer, options.compression, options.filter);
    encoder.write_image(
        img.as_raw(),
        grid.ncols,
        grid.nrows,
        image::ExtendedColorType::La8,
    )?;

    Ok(())
}

/// Exports every layer of every band into `output_dir`.
///
/// # Returns
/// Paths of the written files, band by band in layer order.
pub fn export_reconstruction_png(
    reconstruction: &Reconstruction,
    output_dir: &Path,
    options: &PngExportOptions,
) -> Result<Vec<PathBuf>, ExportError> {
    std::fs::create_dir_all(output_dir)?;

    let mut written = Vec::new();
    for band in Band::ALL {
        for (layer, &years_bp) in reconstruction.band(band).years_bp.iter().enumerate() {
            let path = output_dir.join(layer_file_name(&reconstruction.label, band, years_bp));
            export_layer_png(reconstruction, band, layer, &path, options)?;
            written.push(path);
        }
    }
    Ok(written)
}
