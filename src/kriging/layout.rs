//! Station geometry shared by every fit over the same network.

use glam::DVec3;
use nalgebra::DMatrix;

use crate::geo::{unit_distance_km, GeoCoord};

use super::KrigingError;

/// Exponential covariance with unit sill.
#[inline]
pub fn exponential_covariance(distance_km: f64, range_km: f64) -> f64 {
    (-distance_km / range_km).exp()
}

/// Affine normalization applied to a drift covariate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Standardizer {
    center: f64,
    scale: f64,
}

impl Standardizer {
    /// `None` when the values do not vary: such a column cannot be estimated
    /// next to the intercept.
    fn fit(values: impl Iterator<Item = f64> + Clone) -> Option<Self> {
        let n = values.clone().count();
        if n == 0 {
            return None;
        }
        let center = values.clone().sum::<f64>() / n as f64;
        let var = values.map(|v| (v - center).powi(2)).sum::<f64>() / n as f64;
        (var > 1e-12).then(|| Self {
            center,
            scale: var.sqrt(),
        })
    }

    #[inline]
    pub(crate) fn apply(&self, v: f64) -> f64 {
        (v - self.center) / self.scale
    }
}

/// Drift terms: intercept, then elevation, longitude and latitude where
/// present. A covariate that is constant over the fitted stations is left out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Drift {
    elevation: Option<Standardizer>,
    lon: Option<Standardizer>,
    lat: Option<Standardizer>,
}

impl Drift {
    pub(crate) fn len(&self) -> usize {
        1 + [self.elevation, self.lon, self.lat].iter().flatten().count()
    }

    /// Writes the drift row for a location into `out[..self.len()]`.
    #[inline]
    pub(crate) fn row(&self, coord: GeoCoord, elevation: f64, out: &mut [f64; 4]) {
        out[0] = 1.0;
        let terms = [
            (self.elevation, elevation),
            (self.lon, coord.lon),
            (self.lat, coord.lat),
        ];
        let mut k = 1;
        for (column, value) in terms {
            if let Some(column) = column {
                out[k] = column.apply(value);
                k += 1;
            }
        }
    }
}

/// Station positions, covariates and pairwise great-circle distances.
///
/// Built once per station network and reused for every perturbation level
/// and cultivar fitted against it.
#[derive(Debug, Clone)]
pub struct StationLayout {
    pub(crate) coords: Vec<GeoCoord>,
    pub(crate) units: Vec<DVec3>,
    pub(crate) elevations: Vec<f64>,
    pub(crate) distances: DMatrix<f64>,
    coordinate_trend: bool,
}

impl StationLayout {
    /// Builds the layout from station positions and elevations (m).
    pub fn new(
        coords: &[GeoCoord],
        elevations: &[f64],
        coordinate_trend: bool,
    ) -> Result<Self, KrigingError> {
        if coords.len() != elevations.len() {
            return Err(KrigingError::LengthMismatch {
                expected: coords.len(),
                actual: elevations.len(),
            });
        }

        let units: Vec<DVec3> = coords.iter().map(|c| c.to_unit()).collect();
        let n = units.len();
        let distances = DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                0.0
            } else {
                unit_distance_km(units[i], units[j])
            }
        });

        Ok(Self {
            coords: coords.to_vec(),
            units,
            elevations: elevations.to_vec(),
            distances,
            coordinate_trend,
        })
    }

    /// Drift standardized over the stations in `subset`.
    pub(crate) fn drift_for(&self, subset: &[usize]) -> Drift {
        let column = |f: fn(&Self, usize) -> f64| Standardizer::fit(subset.iter().map(move |&i| f(self, i)));
        let (lon, lat) = if self.coordinate_trend {
            (column(|l, i| l.coords[i].lon), column(|l, i| l.coords[i].lat))
        } else {
            (None, None)
        };
        Drift {
            elevation: column(|l, i| l.elevations[i]),
            lon,
            lat,
        }
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Number of distinct station positions among `subset`.
    pub(crate) fn distinct_positions(&self, subset: &[usize]) -> usize {
        let mut keys: Vec<(u64, u64)> = subset
            .iter()
            .map(|&i| (self.coords[i].lon.to_bits(), self.coords[i].lat.to_bits()))
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys.len()
    }
}
