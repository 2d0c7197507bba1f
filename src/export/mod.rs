//! Export of reconstructions for rendering and reporting.
//!
//! Single layers go out as 8-bit gray + alpha PNGs; summary statistics as CSV.

mod summary_csv;
mod png;

use thiserror::Error;

pub use summary_csv::{export_summary_csv, write_summary_csv};
pub use png::{export_layer_png, export_reconstruction_png, layer_file_name, PngExportOptions};

/// Errors that can occur during export.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Layer {layer} out of range ({count} layers)")]
    LayerOutOfRange { layer: usize, count: usize },
}
