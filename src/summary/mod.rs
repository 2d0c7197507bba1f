//! Spatial summary statistics of reconstruction layers.

use serde::Serialize;

use crate::projection::{Band, Reconstruction};

/// Mean and quartiles of one layer over the land cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSummary {
    pub label: String,
    pub band: &'static str,
    pub years_bp: f64,
    pub mean: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
}

/// Linear-interpolated quantile of sorted data (`(n-1)·p` positioning).
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let h = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

fn summarize_values(values: &[u8]) -> (f64, f64, f64, f64) {
    let mut sorted: Vec<f64> = values.iter().map(|&v| v as f64).collect();
    sorted.sort_by(f64::total_cmp);
    let mean = if sorted.is_empty() {
        f64::NAN
    } else {
        sorted.iter().sum::<f64>() / sorted.len() as f64
    };
    (
        mean,
        quantile_sorted(&sorted, 0.25),
        quantile_sorted(&sorted, 0.5),
        quantile_sorted(&sorted, 0.75),
    )
}

/// One row per band and time step, bands in lower/central/upper order.
pub fn summarize(reconstruction: &Reconstruction) -> Vec<LayerSummary> {
    let mut rows = Vec::new();
    for band in Band::ALL {
        let stack = reconstruction.band(band);
        for (layer, &years_bp) in stack.years_bp.iter().enumerate() {
            let (mean, q1, median, q3) = summarize_values(stack.layer(layer));
            rows.push(LayerSummary {
                label: reconstruction.label.clone(),
                band: band.name(),
                years_bp,
                mean,
                q1,
                median,
                q3,
            });
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::GridSpec;
    use crate::projection::RasterStack;

    #[test]
    fn test_quantiles_interpolate() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&data, 0.0), 1.0);
        assert_eq!(quantile_sorted(&data, 0.25), 1.75);
        assert_eq!(quantile_sorted(&data, 0.5), 2.5);
        assert_eq!(quantile_sorted(&data, 1.0), 4.0);
        assert!(quantile_sorted(&[], 0.5).is_nan());
    }

    #[test]
    fn test_summarize_rows() {
        let stack = RasterStack::from_values(vec![2000.0, 1000.0], 4, vec![0, 10, 20, 30, 50, 50, 50, 50]).unwrap();
        let rec = Reconstruction {
            label: "rice".into(),
            crop: "rice".into(),
            grid: GridSpec::new(0.0, 2.0, 1.0, 2, 2),
            cells: vec![0, 1, 2, 3],
            bands: [stack.clone(), stack.clone(), stack],
        };
        let rows = summarize(&rec);
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].band, "lower");
        assert_eq!(rows[0].years_bp, 2000.0);
        assert_eq!(rows[0].mean, 15.0);
        assert_eq!(rows[0].q1, 7.5);
        assert_eq!(rows[0].median, 15.0);
        assert_eq!(rows[0].q3, 22.5);
        assert_eq!(rows[1].median, 50.0);
        assert_eq!(rows[5].band, "upper");
    }
}
