//! The perturbation axis: integer standard-deviation offsets.

use serde::{Deserialize, Serialize};

use super::GddError;

/// Ordered integer SD offsets sampled when building a niche response curve.
///
/// Positive levels are warmer than the calibration climate. A single grid is
/// shared read-only by every cultivar in a run. The levels are never empty
/// and strictly increasing, including when read back from an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<i32>", into = "Vec<i32>")]
pub struct PerturbationGrid {
    levels: Vec<i32>,
}

impl PerturbationGrid {
    /// Every integer level in `min..=max`. Returns `None` for an empty range.
    pub fn range(min: i32, max: i32) -> Option<Self> {
        if min > max {
            return None;
        }
        Some(Self {
            levels: (min..=max).collect(),
        })
    }

    pub fn levels(&self) -> &[i32] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn min(&self) -> i32 {
        self.levels[0]
    }

    pub fn max(&self) -> i32 {
        self.levels[self.levels.len() - 1]
    }

    /// Position of `level` on the axis.
    pub fn index_of(&self, level: i32) -> Option<usize> {
        self.levels.binary_search(&level).ok()
    }

    /// Levels as `f64`, the x coordinates of a response curve.
    pub fn as_f64(&self) -> Vec<f64> {
        self.levels.iter().map(|&l| l as f64).collect()
    }
}

impl TryFrom<Vec<i32>> for PerturbationGrid {
    type Error = GddError;

    fn try_from(levels: Vec<i32>) -> Result<Self, Self::Error> {
        if levels.is_empty() || levels.windows(2).any(|w| w[0] >= w[1]) {
            return Err(GddError::InvalidLevels(levels));
        }
        Ok(Self { levels })
    }
}

impl From<PerturbationGrid> for Vec<i32> {
    fn from(grid: PerturbationGrid) -> Self {
        grid.levels
    }
}

impl Default for PerturbationGrid {
    fn default() -> Self {
        Self {
            levels: (-20..=20).collect(),
        }
    }
}
