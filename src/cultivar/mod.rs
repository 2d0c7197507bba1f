//! Cultivar definitions: a crop label, a base temperature and a GDD requirement.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading cultivar definitions.
#[derive(Error, Debug)]
pub enum CultivarError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid cultivar file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Duplicate cultivar id '{0}'")]
    Duplicate(String),
    #[error("Cultivar '{0}' is invalid: {1}")]
    Invalid(String, String),
    #[error("No cultivars defined")]
    Empty,
}

/// A crop cultivar and its thermal requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cultivar {
    /// Unique identifier, also the artifact key for its model and reconstruction.
    pub id: String,
    /// Crop group label used for aggregation.
    pub crop: String,
    /// Base temperature (°C) below which no growth accumulates.
    pub base_temp_c: f64,
    /// Minimum annual GDD needed to complete the growth cycle.
    pub min_gdd: f64,
}

impl Cultivar {
    pub fn new(id: &str, crop: &str, base_temp_c: f64, min_gdd: f64) -> Self {
        Self {
            id: id.to_string(),
            crop: crop.to_string(),
            base_temp_c,
            min_gdd,
        }
    }

    fn validate(&self) -> Result<(), CultivarError> {
        let invalid = |msg: &str| Err(CultivarError::Invalid(self.id.clone(), msg.to_string()));
        if self.id.trim().is_empty() {
            return invalid("empty id");
        }
        if self.id.contains(['/', '\\']) {
            return invalid("id must not contain path separators");
        }
        if self.crop.trim().is_empty() {
            return invalid("empty crop label");
        }
        if !self.base_temp_c.is_finite() {
            return invalid("base temperature is not finite");
        }
        if !(self.min_gdd.is_finite() && self.min_gdd >= 0.0) {
            return invalid("GDD requirement must be a non-negative number");
        }
        Ok(())
    }
}

/// Validates a cultivar list: non-empty, unique ids, sane values.
pub fn validate_cultivars(cultivars: &[Cultivar]) -> Result<(), CultivarError> {
    if cultivars.is_empty() {
        return Err(CultivarError::Empty);
    }
    let mut seen = HashSet::new();
    for c in cultivars {
        c.validate()?;
        if !seen.insert(c.id.as_str()) {
            return Err(CultivarError::Duplicate(c.id.clone()));
        }
    }
    Ok(())
}

/// Loads and validates a JSON array of cultivars.
pub fn load_cultivars(path: &Path) -> Result<Vec<Cultivar>, CultivarError> {
    let cultivars: Vec<Cultivar> = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    validate_cultivars(&cultivars)?;
    Ok(cultivars)
}

/// Distinct base temperatures across cultivars, in first-appearance order.
pub fn base_temperatures(cultivars: &[Cultivar]) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::new();
    for c in cultivars {
        if !out.iter().any(|b| (b - c.base_temp_c).abs() < 1e-9) {
            out.push(c.base_temp_c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cultivar(id: &str, crop: &str, base: f64) -> Cultivar {
        Cultivar {
            id: id.into(),
            crop: crop.into(),
            base_temp_c: base,
            min_gdd: 2500.0,
        }
    }

    #[test]
    fn test_load_cultivars() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cultivars.json");
        std::fs::write(
            &path,
            r#"[{"id":"temperate_japonica","crop":"rice","base_temp_c":10.0,"min_gdd":2900},
                {"id":"foxtail","crop":"millet","base_temp_c":8.0,"min_gdd":1700}]"#,
        )
        .unwrap();

        let cultivars = load_cultivars(&path).unwrap();
        assert_eq!(cultivars.len(), 2);
        assert_eq!(cultivars[1].crop, "millet");
        assert_eq!(base_temperatures(&cultivars), vec![10.0, 8.0]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let list = vec![cultivar("a", "rice", 10.0), cultivar("a", "rice", 10.0)];
        assert!(matches!(validate_cultivars(&list), Err(CultivarError::Duplicate(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut bad = cultivar("a", "rice", 10.0);
        bad.min_gdd = -1.0;
        assert!(matches!(validate_cultivars(&[bad]), Err(CultivarError::Invalid(..))));

        let sneaky = cultivar("../a", "rice", 10.0);
        assert!(validate_cultivars(&[sneaky]).is_err());
        assert!(matches!(validate_cultivars(&[]), Err(CultivarError::Empty)));
    }
}
