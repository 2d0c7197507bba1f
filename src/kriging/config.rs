//! Kriging configuration parameters.

use serde::{Deserialize, Serialize};

/// Configuration for the indicator kriging engine.
///
/// Units:
/// - distances: km along the great circle
/// - elevation: m
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KrigingConfig {
    /// Minimum number of distinct stations with an observed indicator.
    pub min_stations: usize,
    /// Add longitude/latitude to the drift alongside elevation.
    pub coordinate_trend: bool,
    /// Number of candidate covariance ranges searched by likelihood.
    pub range_candidates: usize,
    /// Smallest candidate range as a fraction of the largest station distance.
    pub min_range_fraction: f64,
    /// Largest candidate range as a fraction of the largest station distance.
    pub max_range_fraction: f64,
    /// Candidate nugget-to-sill ratios.
    pub nugget_ratios: Vec<f64>,
    /// Number of grid cells predicted per batch.
    pub batch_size: usize,
}

impl Default for KrigingConfig {
    fn default() -> Self {
        Self {
            min_stations: 3,
            coordinate_trend: false,
            range_candidates: 8,
            min_range_fraction: 0.02,
            max_range_fraction: 1.0,
            nugget_ratios: vec![0.01, 0.05, 0.2, 1.0, 5.0],
            batch_size: 10_000,
        }
    }
}

impl KrigingConfig {
    /// Geometric sequence of candidate ranges for a network whose widest
    /// station separation is `max_distance_km`.
    pub fn range_grid(&self, max_distance_km: f64) -> Vec<f64> {
        let n = self.range_candidates.max(1);
        let lo = (max_distance_km * self.min_range_fraction).max(1e-3);
        let hi = (max_distance_km * self.max_range_fraction).max(lo);
        if n == 1 {
            return vec![hi];
        }
        let ratio = (hi / lo).powf(1.0 / (n - 1) as f64);
        (0..n).map(|i| lo * ratio.powi(i as i32)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KrigingConfig::default();
        assert_eq!(config.batch_size, 10_000);
        assert_eq!(config.min_stations, 3);
        assert!(!config.coordinate_trend);
    }

    #[test]
    fn test_range_grid_is_geometric() {
        let config = KrigingConfig::default();
        let grid = config.range_grid(1000.0);
        assert_eq!(grid.len(), 8);
        assert!((grid[0] - 20.0).abs() < 1e-9);
        assert!((grid[7] - 1000.0).abs() < 1e-6);
        let r1 = grid[1] / grid[0];
        let r2 = grid[5] / grid[4];
        assert!((r1 - r2).abs() < 1e-9);
    }
}
