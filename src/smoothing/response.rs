//! Smoothed response curves and the per-cultivar niche model.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::elevation::GridSpec;
use crate::gdd::PerturbationGrid;

use super::isotonic::isotonic_increasing;
use super::loess::loess_fit;
use super::{SmoothingConfig, SmoothingError};

/// Clip → isotonic → loess → isotonic, over one perturbation axis.
#[derive(Debug, Clone)]
pub struct IndicatorSmoother {
    x: Vec<f64>,
    config: SmoothingConfig,
}

impl IndicatorSmoother {
    pub fn new(levels: &PerturbationGrid, config: SmoothingConfig) -> Self {
        Self {
            x: levels.as_f64(),
            config,
        }
    }

    /// Smooths one cell's raw predictions, ordered like the perturbation axis.
    ///
    /// The result is non-decreasing and inside `[0, 1]`.
    pub fn smooth(&self, raw: &[f64]) -> Vec<f64> {
        debug_assert_eq!(raw.len(), self.x.len());
        let clipped: Vec<f64> = raw
            .iter()
            .map(|&v| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 })
            .collect();
        let iso = isotonic_increasing(&clipped);
        let local = loess_fit(&self.x, &iso, self.config.span, self.config.degree);
        // The local fit can dip near the axis ends; project back onto the monotone cone.
        isotonic_increasing(&local)
            .into_iter()
            .map(|v| v.clamp(0.0, 1.0))
            .collect()
    }
}

/// Smoothed niche response curves for every land cell of one cultivar.
///
/// `curves` is row-major `[cell][level]`: the smoothed probability at each
/// perturbation level. Between levels the curve is evaluated by linear
/// interpolation; outside the axis it holds the end values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NicheModel {
    pub cultivar: String,
    pub crop: String,
    pub levels: PerturbationGrid,
    /// Degrees per SD unit the model was built with.
    pub sd_scale_c: f64,
    pub grid: GridSpec,
    /// Grid indices of the land cells, in prediction order.
    pub cells: Vec<u32>,
    curves: Vec<f32>,
}

impl NicheModel {
    /// Assembles a model from per-level raw prediction surfaces.
    ///
    /// `surfaces[k]` holds the raw predictions for level `k` at every cell;
    /// all surfaces must share the cell order of `cells`.
    pub fn from_surfaces(
        cultivar: &str,
        crop: &str,
        levels: &PerturbationGrid,
        sd_scale_c: f64,
        grid: GridSpec,
        cells: Vec<u32>,
        surfaces: &[Vec<f32>],
        config: &SmoothingConfig,
    ) -> Result<Self, SmoothingError> {
        if surfaces.len() != levels.len() {
            return Err(SmoothingError::LevelCount {
                expected: levels.len(),
                actual: surfaces.len(),
            });
        }
        if let Some(bad) = surfaces.iter().find(|s| s.len() != cells.len()) {
            return Err(SmoothingError::CellCount {
                expected: cells.len(),
                actual: bad.len(),
            });
        }

        let smoother = IndicatorSmoother::new(levels, config.clone());
        let nl = levels.len();
        let mut curves = vec![0.0f32; cells.len() * nl];
        curves
            .par_chunks_mut(nl.max(1))
            .enumerate()
            .for_each(|(cell, out)| {
                let raw: Vec<f64> = surfaces.iter().map(|s| s[cell] as f64).collect();
                for (o, v) in out.iter_mut().zip(smoother.smooth(&raw)) {
                    *o = v as f32;
                }
            });

        Ok(Self {
            cultivar: cultivar.to_string(),
            crop: crop.to_string(),
            levels: levels.clone(),
            sd_scale_c,
            grid,
            cells,
            curves,
        })
    }

    /// A model whose every cell has the same curve.
    #[cfg(test)]
    pub(crate) fn uniform(
        cultivar: &str,
        crop: &str,
        levels: &PerturbationGrid,
        sd_scale_c: f64,
        grid: GridSpec,
        cells: Vec<u32>,
        curve: &[f32],
    ) -> Result<Self, SmoothingError> {
        if curve.len() != levels.len() {
            return Err(SmoothingError::LevelCount {
                expected: levels.len(),
                actual: curve.len(),
            });
        }
        let curves = curve.repeat(cells.len());
        Ok(Self {
            cultivar: cultivar.to_string(),
            crop: crop.to_string(),
            levels: levels.clone(),
            sd_scale_c,
            grid,
            cells,
            curves,
        })
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Smoothed values at the knots for one cell.
    pub fn curve(&self, cell: usize) -> &[f32] {
        let nl = self.levels.len();
        &self.curves[cell * nl..(cell + 1) * nl]
    }

    /// Probability for `cell` at a real-valued perturbation `x` (SD units).
    pub fn evaluate(&self, cell: usize, x: f64) -> f64 {
        let curve = self.curve(cell);
        let levels = self.levels.levels();
        let n = levels.len();
        if n == 1 || x <= levels[0] as f64 {
            return curve[0] as f64;
        }
        if x >= levels[n - 1] as f64 {
            return curve[n - 1] as f64;
        }
        // first knot strictly greater than x
        let hi = levels.partition_point(|&l| (l as f64) <= x);
        let lo = hi - 1;
        let (x0, x1) = (levels[lo] as f64, levels[hi] as f64);
        let (y0, y1) = (curve[lo] as f64, curve[hi] as f64);
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smoother() -> IndicatorSmoother {
        IndicatorSmoother::new(&PerturbationGrid::default(), SmoothingConfig::default())
    }

    fn non_decreasing(v: &[f64]) -> bool {
        v.windows(2).all(|w| w[0] <= w[1] + 1e-12)
    }

    #[test]
    fn test_smoothed_curve_is_monotone_and_bounded() {
        // Noisy, out-of-range, partly decreasing raw kriging output.
        let raw: Vec<f64> = (0..41)
            .map(|i| {
                let t = (i as f64 - 20.0) / 6.0;
                let logistic = 1.0 / (1.0 + (-t).exp());
                logistic * 1.3 - 0.15 + 0.2 * ((i * 7 % 5) as f64 - 2.0) / 2.0
            })
            .collect();
        let out = smoother().smooth(&raw);
        assert_eq!(out.len(), 41);
        assert!(non_decreasing(&out));
        assert!(out.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_degenerate_inputs_give_constant_curves() {
        let s = smoother();
        assert!(s.smooth(&[0.0; 41]).iter().all(|&v| v == 0.0));
        assert!(s.smooth(&[1.0; 41]).iter().all(|&v| v == 1.0));
        assert!(s.smooth(&[1.7; 41]).iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_no_overshoot_beyond_isotonic_neighbours() {
        // Empirical pass rate rising monotonically with warming.
        let raw: Vec<f64> = (0..41).map(|i| (i as f64 / 40.0).powi(2)).collect();
        let out = smoother().smooth(&raw);
        let centre = 20;
        assert!(out[centre] >= raw[centre - 1] && out[centre] <= raw[centre + 1]);
    }

    #[test]
    fn test_evaluate_interpolates_and_clamps() {
        let levels = PerturbationGrid::range(-2, 2).unwrap();
        let grid = GridSpec::new(0.0, 1.0, 1.0, 1, 1);
        let model =
            NicheModel::uniform("c", "rice", &levels, 0.8, grid, vec![0], &[0.0, 0.1, 0.4, 0.8, 1.0]).unwrap();
        assert_eq!(model.sd_scale_c, 0.8);

        assert!((model.evaluate(0, 0.0) - 0.4).abs() < 1e-6);
        assert!((model.evaluate(0, 0.5) - 0.6).abs() < 1e-6);
        assert!((model.evaluate(0, -1.25) - 0.075).abs() < 1e-6);
        assert_eq!(model.evaluate(0, -9.0), 0.0);
        assert_eq!(model.evaluate(0, 9.0), 1.0);
    }

    #[test]
    fn test_from_surfaces_transposes_levels() {
        let levels = PerturbationGrid::range(-1, 1).unwrap();
        let grid = GridSpec::new(0.0, 2.0, 1.0, 2, 1);
        // cell 0 always absent, cell 1 always present
        let surfaces = vec![vec![0.0, 1.0], vec![-0.2, 1.4], vec![0.0, 1.0]];
        let model = NicheModel::from_surfaces(
            "c",
            "rice",
            &levels,
            0.5,
            grid,
            vec![0, 1],
            &surfaces,
            &SmoothingConfig::default(),
        )
        .unwrap();
        assert_eq!(model.curve(0), &[0.0, 0.0, 0.0]);
        assert_eq!(model.curve(1), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_from_surfaces_rejects_misaligned_cells() {
        let levels = PerturbationGrid::range(0, 1).unwrap();
        let grid = GridSpec::new(0.0, 2.0, 1.0, 2, 1);
        let err = NicheModel::from_surfaces(
            "c",
            "rice",
            &levels,
            0.5,
            grid,
            vec![0, 1],
            &[vec![0.0, 1.0], vec![0.0]],
            &SmoothingConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SmoothingError::CellCount { expected: 2, actual: 1 }));
    }
}
