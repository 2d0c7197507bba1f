//! Run configuration shared by every stage.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::gdd::{GddConfig, PerturbationGrid};
use crate::kriging::KrigingConfig;
use crate::projection::ProxyUnits;
use crate::smoothing::SmoothingConfig;
use crate::station::StationConfig;

use super::PipelineError;

/// What the fit stage does when every station reports the same indicator at
/// one perturbation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Fail the cultivar.
    Abort,
    /// Use a constant surface equal to the shared indicator value.
    Constant,
}

/// Configuration for a full reconstruction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub station: StationConfig,
    pub gdd: GddConfig,
    pub kriging: KrigingConfig,
    pub smoothing: SmoothingConfig,
    /// Lowest perturbation level (SD units).
    pub perturbation_min: i32,
    /// Highest perturbation level (SD units).
    pub perturbation_max: i32,
    /// Degrees per SD unit. Taken from a °C proxy record when unset.
    pub sd_scale_c: Option<f64>,
    pub proxy_units: ProxyUnits,
    /// Worker threads for model fitting (0 = one per core).
    pub fit_workers: usize,
    /// Worker threads for projection and aggregation (0 = one per core).
    pub project_workers: usize,
    pub degenerate_policy: DegeneratePolicy,
    /// Discard the artifacts the scheduled stages produce before running.
    pub force: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            station: StationConfig::default(),
            gdd: GddConfig::default(),
            kriging: KrigingConfig::default(),
            smoothing: SmoothingConfig::default(),
            perturbation_min: -20,
            perturbation_max: 20,
            sd_scale_c: None,
            proxy_units: ProxyUnits::Celsius,
            fit_workers: 0,
            project_workers: 2,
            degenerate_policy: DegeneratePolicy::Constant,
            force: false,
        }
    }
}

impl RunConfig {
    /// Loads a configuration from a JSON file; missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let config: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));
        if self.perturbation_min > self.perturbation_max {
            return invalid(format!(
                "perturbation range {}..={} is empty",
                self.perturbation_min, self.perturbation_max
            ));
        }
        if let Some(scale) = self.sd_scale_c {
            if !(scale.is_finite() && scale > 0.0) {
                return invalid(format!("sd_scale_c must be positive, got {scale}"));
            }
        }
        if self.station.calibration_start > self.station.calibration_end {
            return invalid("calibration period ends before it starts".to_string());
        }
        if !(self.smoothing.span > 0.0 && self.smoothing.span <= 1.0) {
            return invalid(format!("smoothing span must be in (0, 1], got {}", self.smoothing.span));
        }
        if self.kriging.nugget_ratios.is_empty() || self.kriging.nugget_ratios.iter().any(|&r| !(r >= 0.0)) {
            return invalid("nugget ratios must be a non-empty list of non-negative values".to_string());
        }
        Ok(())
    }

    /// The perturbation axis shared by every cultivar.
    pub fn levels(&self) -> Result<PerturbationGrid, PipelineError> {
        PerturbationGrid::range(self.perturbation_min, self.perturbation_max).ok_or_else(|| {
            PipelineError::InvalidConfig(format!(
                "perturbation range {}..={} is empty",
                self.perturbation_min, self.perturbation_max
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.levels().unwrap().len(), 41);
        assert_eq!(config.degenerate_policy, DegeneratePolicy::Constant);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_takes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(
            &path,
            r#"{"perturbation_min": -5, "perturbation_max": 5, "sd_scale_c": 0.8,
                "degenerate_policy": "abort", "kriging": {"batch_size": 500}}"#,
        )
        .unwrap();
        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.levels().unwrap().len(), 11);
        assert_eq!(config.sd_scale_c, Some(0.8));
        assert_eq!(config.degenerate_policy, DegeneratePolicy::Abort);
        assert_eq!(config.kriging.batch_size, 500);
        assert_eq!(config.kriging.min_stations, 3);
        assert_eq!(config.station.calibration_start, 1961);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        let mut config = RunConfig::default();
        config.fit_workers = 3;
        config.save(&path).unwrap();
        assert_eq!(RunConfig::load(&path).unwrap().fit_workers, 3);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = RunConfig {
            perturbation_min: 3,
            perturbation_max: 1,
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));

        let config = RunConfig {
            sd_scale_c: Some(0.0),
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
