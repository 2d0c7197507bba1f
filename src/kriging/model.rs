//! Indicator kriging: likelihood-based fit and batched grid prediction.

use glam::DVec3;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::elevation::LandCells;
use crate::geo::{unit_distance_km, GeoCoord};

use super::layout::{exponential_covariance, Drift, StationLayout};
use super::{KrigingConfig, KrigingError};

/// A fitted spatial surface for one (cultivar, perturbation level).
///
/// The model is `y = Xβ + g(s) + ε` with drift `X` (intercept, elevation and
/// optionally lon/lat), `Cov(g) = ρ·exp(-d/range)` over great-circle distance
/// and nugget `ε` with variance `λρ`.
#[derive(Debug, Clone)]
pub struct KrigingModel {
    units: Vec<DVec3>,
    drift: Drift,
    beta: Vec<f64>,
    /// `(K + λI)⁻¹ (y - Xβ)`
    weights: Vec<f64>,
    range_km: f64,
    nugget_ratio: f64,
    log_likelihood: f64,
}

/// Per-candidate solution of the generalized least squares problem.
struct Solution {
    beta: DVector<f64>,
    weights: DVector<f64>,
    log_likelihood: f64,
}

/// Solves the GLS problem for one `(range, λ)` candidate.
///
/// Returns `None` when either factorization fails.
fn solve_candidate(
    distances: &DMatrix<f64>,
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    range_km: f64,
    nugget_ratio: f64,
) -> Option<Solution> {
    let n = y.len();
    let m = DMatrix::from_fn(n, n, |i, j| {
        let c = exponential_covariance(distances[(i, j)], range_km);
        if i == j {
            c + nugget_ratio
        } else {
            c
        }
    });
    let chol = m.cholesky()?;
    let log_det: f64 = 2.0 * chol.l_dirty().diagonal().iter().map(|d| d.ln()).sum::<f64>();

    let minv_x = chol.solve(x);
    let minv_y = chol.solve(y);
    let xt_minv_x = x.transpose() * &minv_x;
    let xt_minv_y = x.transpose() * &minv_y;
    let beta = xt_minv_x.cholesky()?.solve(&xt_minv_y);

    let resid = y - x * &beta;
    let weights = chol.solve(&resid);
    let quad = resid.dot(&weights);
    let sigma2 = (quad / n as f64).max(1e-12);
    let log_likelihood = -0.5 * n as f64 * sigma2.ln() - 0.5 * log_det;

    Some(Solution {
        beta,
        weights,
        log_likelihood,
    })
}

impl KrigingModel {
    /// Fits a surface to the indicator values observed at the layout's stations.
    ///
    /// `values[i]` belongs to station `i`; `None` marks a missing observation
    /// and drops that station from this fit. Range and nugget ratio are chosen
    /// by maximizing the profile likelihood over the configured candidates.
    pub fn fit(
        layout: &StationLayout,
        values: &[Option<f64>],
        config: &KrigingConfig,
    ) -> Result<Self, KrigingError> {
        if values.len() != layout.len() {
            return Err(KrigingError::LengthMismatch {
                expected: layout.len(),
                actual: values.len(),
            });
        }

        let observed: Vec<usize> = values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.filter(|x| x.is_finite()).map(|_| i))
            .collect();

        let drift = layout.drift_for(&observed);
        let p = drift.len();
        let required = config.min_stations.max(p + 1);
        let distinct = layout.distinct_positions(&observed);
        if distinct < required {
            return Err(KrigingError::InsufficientStations {
                found: distinct,
                required,
            });
        }

        let y = DVector::from_iterator(
            observed.len(),
            observed.iter().map(|&i| values[i].unwrap_or_default()),
        );
        let first = y[0];
        if y.iter().all(|&v| v == first) {
            return Err(KrigingError::DegenerateResponse { value: first });
        }

        let n = observed.len();
        let distances = DMatrix::from_fn(n, n, |a, b| layout.distances[(observed[a], observed[b])]);
        let mut row = [0.0f64; 4];
        let x = DMatrix::from_fn(n, p, |a, k| {
            let i = observed[a];
            drift.row(layout.coords[i], layout.elevations[i], &mut row);
            row[k]
        });

        let max_distance = distances.iter().copied().fold(0.0f64, f64::max);
        let ranges = config.range_grid(max_distance);

        let mut best: Option<(Solution, f64, f64)> = None;
        for &range in &ranges {
            for &lambda in &config.nugget_ratios {
                let Some(sol) = solve_candidate(&distances, &x, &y, range, lambda) else {
                    continue;
                };
                let better = match &best {
                    Some((b, _, _)) => sol.log_likelihood > b.log_likelihood,
                    None => sol.log_likelihood.is_finite(),
                };
                if better {
                    best = Some((sol, range, lambda));
                }
            }
        }

        let (sol, range_km, nugget_ratio) = best.ok_or(KrigingError::SingularSystem)?;
        log::debug!(
            "Kriging fit: n={} range={:.1} km lambda={} loglik={:.3}",
            n,
            range_km,
            nugget_ratio,
            sol.log_likelihood
        );

        Ok(Self {
            units: observed.iter().map(|&i| layout.units[i]).collect(),
            drift,
            beta: sol.beta.iter().copied().collect(),
            weights: sol.weights.iter().copied().collect(),
            range_km,
            nugget_ratio,
            log_likelihood: sol.log_likelihood,
        })
    }

    pub fn range_km(&self) -> f64 {
        self.range_km
    }

    pub fn nugget_ratio(&self) -> f64 {
        self.nugget_ratio
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Number of stations the surface was fitted to.
    pub fn station_count(&self) -> usize {
        self.units.len()
    }

    /// Raw (unbounded) prediction at one location.
    pub fn predict(&self, coord: GeoCoord, elevation: f64) -> f64 {
        self.predict_unit(coord, coord.to_unit(), elevation)
    }

    #[inline]
    fn predict_unit(&self, coord: GeoCoord, unit: DVec3, elevation: f64) -> f64 {
        let mut row = [0.0f64; 4];
        self.drift.row(coord, elevation, &mut row);
        let trend: f64 = self.beta.iter().zip(row.iter()).map(|(b, x)| b * x).sum();
        let spatial: f64 = self
            .units
            .iter()
            .zip(&self.weights)
            .map(|(&s, &w)| w * exponential_covariance(unit_distance_km(unit, s), self.range_km))
            .sum();
        trend + spatial
    }

    /// Predicts one contiguous batch of locations.
    pub fn predict_batch(&self, coords: &[GeoCoord], elevations: &[f64]) -> Vec<f32> {
        coords
            .iter()
            .zip(elevations)
            .map(|(&c, &e)| self.predict_unit(c, c.to_unit(), e) as f32)
            .collect()
    }

    /// Predicts every land cell, `batch_size` cells at a time.
    ///
    /// Batches run in parallel; results are concatenated in grid order so
    /// position `i` of the output corresponds to `cells.indices[i]`.
    pub fn predict_cells(&self, cells: &LandCells, batch_size: usize) -> Vec<f32> {
        let batch = batch_size.max(1);
        let starts: Vec<usize> = (0..cells.len()).step_by(batch).collect();
        let batches: Vec<Vec<f32>> = starts
            .par_iter()
            .map(|&start| {
                let end = (start + batch).min(cells.len());
                self.predict_batch(&cells.coords[start..end], &cells.elevations[start..end])
            })
            .collect();
        batches.concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(points: &[(f64, f64, f64)]) -> StationLayout {
        let coords: Vec<GeoCoord> = points.iter().map(|&(lon, lat, _)| GeoCoord::new(lon, lat)).collect();
        let elev: Vec<f64> = points.iter().map(|&(_, _, e)| e).collect();
        StationLayout::new(&coords, &elev, false).unwrap()
    }

    fn network() -> StationLayout {
        layout(&[
            (100.0, 20.0, 50.0),
            (102.0, 22.0, 300.0),
            (104.0, 24.0, 800.0),
            (106.0, 26.0, 1500.0),
            (101.0, 25.0, 2500.0),
            (105.0, 21.0, 100.0),
        ])
    }

    #[test]
    fn test_too_few_stations() {
        let l = layout(&[(100.0, 20.0, 0.0), (101.0, 21.0, 10.0)]);
        let err = KrigingModel::fit(&l, &[Some(0.0), Some(1.0)], &KrigingConfig::default()).unwrap_err();
        assert!(matches!(err, KrigingError::InsufficientStations { found: 2, required: 3 }));
    }

    #[test]
    fn test_missing_values_count_against_minimum() {
        let l = network();
        let values = vec![Some(0.0), None, None, None, Some(1.0), None];
        let err = KrigingModel::fit(&l, &values, &KrigingConfig::default()).unwrap_err();
        assert!(matches!(err, KrigingError::InsufficientStations { found: 2, .. }));
    }

    #[test]
    fn test_constant_response_is_degenerate() {
        let l = network();
        let values = vec![Some(1.0); 6];
        let err = KrigingModel::fit(&l, &values, &KrigingConfig::default()).unwrap_err();
        assert!(matches!(err, KrigingError::DegenerateResponse { value } if value == 1.0));
    }

    #[test]
    fn test_length_mismatch() {
        let l = network();
        let err = KrigingModel::fit(&l, &[Some(1.0)], &KrigingConfig::default()).unwrap_err();
        assert!(matches!(err, KrigingError::LengthMismatch { expected: 6, actual: 1 }));
    }

    #[test]
    fn test_three_station_fit() {
        let l = layout(&[(100.0, 20.0, 100.0), (101.0, 21.0, 400.0), (102.0, 22.0, 50.0)]);
        let model = KrigingModel::fit(&l, &[Some(0.0), Some(0.0), Some(1.0)], &KrigingConfig::default()).unwrap();
        assert_eq!(model.station_count(), 3);
        assert!(model.range_km() > 0.0);
        assert!(model.predict(GeoCoord::new(101.0, 21.0), 200.0).is_finite());
    }

    #[test]
    fn test_three_station_response_smooths_within_isotonic_neighbours() {
        use crate::gdd::PerturbationGrid;
        use crate::smoothing::{isotonic_increasing, IndicatorSmoother, SmoothingConfig};

        let l = layout(&[(100.0, 20.0, 100.0), (101.0, 21.0, 400.0), (102.0, 22.0, 50.0)]);
        let levels = PerturbationGrid::default();
        // Level from which each station meets the requirement: [0, 0, 1] at
        // level 0, rising with warming.
        let first_pass = [4, 1, 0];
        let (target, target_elevation) = (GeoCoord::new(101.0, 21.5), 200.0);

        let raw: Vec<f64> = levels
            .levels()
            .iter()
            .map(|&level| {
                let values: Vec<Option<f64>> = first_pass
                    .iter()
                    .map(|&t| Some(if level >= t { 1.0 } else { 0.0 }))
                    .collect();
                match KrigingModel::fit(&l, &values, &KrigingConfig::default()) {
                    Ok(model) => model.predict(target, target_elevation),
                    Err(KrigingError::DegenerateResponse { value }) => value,
                    Err(e) => panic!("level {level}: {e}"),
                }
            })
            .collect();

        let clipped: Vec<f64> = raw.iter().map(|v| v.clamp(0.0, 1.0)).collect();
        let iso = isotonic_increasing(&clipped);
        let smoothed = IndicatorSmoother::new(&levels, SmoothingConfig::default()).smooth(&raw);

        let zero = levels.index_of(0).unwrap();
        assert!(
            smoothed[zero] >= iso[zero - 1] - 1e-9 && smoothed[zero] <= iso[zero + 1] + 1e-9,
            "smoothed {} outside [{}, {}]",
            smoothed[zero],
            iso[zero - 1],
            iso[zero + 1]
        );
    }

    #[test]
    fn test_flat_network_fits_without_elevation_drift() {
        let l = layout(&[
            (100.0, 20.0, 250.0),
            (101.0, 21.0, 250.0),
            (102.0, 22.0, 250.0),
            (103.0, 23.0, 250.0),
        ]);
        let values = vec![Some(0.0), Some(0.0), Some(1.0), Some(1.0)];
        let model = KrigingModel::fit(&l, &values, &KrigingConfig::default()).unwrap();

        let at = GeoCoord::new(101.5, 21.5);
        let p = model.predict(at, 250.0);
        assert!(p.is_finite());
        assert_eq!(model.predict(at, 2500.0), p);
    }

    #[test]
    fn test_prediction_tracks_indicator() {
        // Low stations pass, high stations fail.
        let l = network();
        let values = vec![Some(1.0), Some(1.0), Some(1.0), Some(0.0), Some(0.0), Some(1.0)];
        let model = KrigingModel::fit(&l, &values, &KrigingConfig::default()).unwrap();

        let low = model.predict(GeoCoord::new(103.0, 21.5), 80.0);
        let high = model.predict(GeoCoord::new(103.0, 25.5), 2200.0);
        assert!(low > high, "low={} high={}", low, high);
    }

    #[test]
    fn test_batched_prediction_matches_single_and_keeps_order() {
        let l = network();
        let values = vec![Some(1.0), Some(1.0), Some(0.0), Some(0.0), Some(0.0), Some(1.0)];
        let model = KrigingModel::fit(&l, &values, &KrigingConfig::default()).unwrap();

        let n = 25;
        let cells = LandCells {
            indices: (0..n as u32).collect(),
            coords: (0..n).map(|i| GeoCoord::new(100.0 + i as f64 * 0.25, 20.0 + i as f64 * 0.2)).collect(),
            elevations: (0..n).map(|i| i as f64 * 90.0).collect(),
        };

        let batched = model.predict_cells(&cells, 4);
        let whole = model.predict_cells(&cells, 10_000);
        assert_eq!(batched.len(), n);
        assert_eq!(batched, whole);
        for i in 0..n {
            let single = model.predict(cells.coords[i], cells.elevations[i]) as f32;
            assert_eq!(batched[i], single);
        }
    }
}
