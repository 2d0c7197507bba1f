//! Growing-degree-day modulation and the station × base × level GDD table.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cultivar::Cultivar;
use crate::station::StationClimatology;

use super::{GddConfig, GddError, PerturbationGrid};

/// Annual GDD for a climatology shifted by `offset_c` degrees.
///
/// Modified method: daily maximum is capped at `cap_c`, daily minimum is
/// clamped to `[base_c, cap_c]` and the maximum is floored at `base_c`, so a
/// day contributes `(tmax' + tmin') / 2 - base_c >= 0`.
pub fn accumulated_gdd(clim: &StationClimatology, base_c: f64, offset_c: f64, cap_c: f64) -> f64 {
    clim.tmin_c
        .iter()
        .zip(&clim.tmax_c)
        .map(|(&tmin, &tmax)| {
            let tmax = (tmax + offset_c).min(cap_c).max(base_c);
            let tmin = (tmin + offset_c).clamp(base_c, cap_c.max(base_c));
            (tmax + tmin) * 0.5 - base_c
        })
        .sum()
}

/// GDD per (station, base temperature, perturbation level).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GddTable {
    pub station_ids: Vec<String>,
    pub base_temps_c: Vec<f64>,
    pub levels: PerturbationGrid,
    /// Degrees per SD unit used to turn levels into temperature offsets.
    pub sd_scale_c: f64,
    /// Row-major `[station][base][level]`.
    values: Vec<f64>,
}

impl GddTable {
    /// Computes the table in parallel over stations.
    pub fn compute(
        stations: &[StationClimatology],
        base_temps_c: &[f64],
        levels: &PerturbationGrid,
        sd_scale_c: f64,
        cfg: &GddConfig,
    ) -> Result<Self, GddError> {
        if !(sd_scale_c.is_finite() && sd_scale_c > 0.0) {
            return Err(GddError::InvalidScale(sd_scale_c));
        }

        let mut bases: Vec<f64> = base_temps_c.to_vec();
        bases.sort_by(f64::total_cmp);
        bases.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

        let offsets: Vec<f64> = levels.as_f64().iter().map(|l| l * sd_scale_c).collect();
        let cap_c = cfg.cap_c;
        let bases_ref = &bases;
        let offsets_ref = &offsets;
        let values: Vec<f64> = stations
            .par_iter()
            .flat_map_iter(move |clim| {
                bases_ref.iter().flat_map(move |&base| {
                    offsets_ref
                        .iter()
                        .map(move |&off| accumulated_gdd(clim, base, off, cap_c))
                })
            })
            .collect();

        Ok(Self {
            station_ids: stations.iter().map(|s| s.id.clone()).collect(),
            base_temps_c: bases,
            levels: levels.clone(),
            sd_scale_c,
            values,
        })
    }

    pub fn station_count(&self) -> usize {
        self.station_ids.len()
    }

    /// Index of a base temperature in the table.
    pub fn base_index(&self, base_c: f64) -> Option<usize> {
        self.base_temps_c.iter().position(|b| (b - base_c).abs() < 1e-9)
    }

    #[inline]
    pub fn get(&self, station: usize, base: usize, level: usize) -> f64 {
        let nb = self.base_temps_c.len();
        let nl = self.levels.len();
        self.values[(station * nb + base) * nl + level]
    }

    /// Thresholds one table column against a cultivar's GDD requirement.
    ///
    /// Returns one entry per station: `Some(1.0)` when the requirement is met,
    /// `Some(0.0)` when it is not, `None` when the GDD value is missing.
    pub fn indicators(&self, cultivar: &Cultivar, level: usize) -> Result<Vec<Option<f64>>, GddError> {
        let base = self
            .base_index(cultivar.base_temp_c)
            .ok_or(GddError::UnknownBase(cultivar.base_temp_c))?;
        if level >= self.levels.len() {
            return Err(GddError::LevelOutOfRange(level));
        }

        Ok((0..self.station_count())
            .map(|s| {
                let gdd = self.get(s, base, level);
                if gdd.is_finite() {
                    Some(if gdd >= cultivar.min_gdd { 1.0 } else { 0.0 })
                } else {
                    None
                }
            })
            .collect())
    }
}
