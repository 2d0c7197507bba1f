//! Crop aggregation: per-cell mean of cultivar reconstructions.

use log::info;
use thiserror::Error;

use crate::cultivar::Cultivar;
use crate::projection::{Band, RasterStack, Reconstruction};

/// Errors raised while combining reconstructions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    #[error("No reconstructions to aggregate for crop '{0}'")]
    Empty(String),
    #[error("Reconstruction '{member}' does not share the grid or land cells of '{first}'")]
    LayoutMismatch { first: String, member: String },
    #[error("Reconstruction '{member}' does not share the time axis of '{first}'")]
    TimeAxisMismatch { first: String, member: String },
}

/// Averages reconstructions of cultivars sharing one crop label.
///
/// Values are the per-cell, per-band, per-layer mean rounded to the nearest
/// integer percentage. A group of one is copied value for value. Members must
/// share grid, land cells and time axis exactly.
pub fn aggregate(crop: &str, members: &[&Reconstruction]) -> Result<Reconstruction, AggregateError> {
    let first = members
        .first()
        .ok_or_else(|| AggregateError::Empty(crop.to_string()))?;

    for member in &members[1..] {
        if member.grid != first.grid || member.cells != first.cells {
            return Err(AggregateError::LayoutMismatch {
                first: first.label.clone(),
                member: member.label.clone(),
            });
        }
        if Band::ALL
            .iter()
            .any(|&b| member.band(b).years_bp != first.band(b).years_bp)
        {
            return Err(AggregateError::TimeAxisMismatch {
                first: first.label.clone(),
                member: member.label.clone(),
            });
        }
    }

    info!("Aggregating {} cultivar(s) into crop '{}'", members.len(), crop);

    let n = members.len() as u32;
    let bands = Band::ALL.map(|band| {
        let base = first.band(band);
        let mut sums: Vec<u32> = base.values().iter().map(|&v| v as u32).collect();
        for member in &members[1..] {
            for (s, &v) in sums.iter_mut().zip(member.band(band).values()) {
                *s += v as u32;
            }
        }
        let values = sums
            .into_iter()
            .map(|s| (s as f64 / n as f64).round() as u8)
            .collect();
        RasterStack::from_parts(base.years_bp.clone(), base.cell_count(), values)
    });

    Ok(Reconstruction {
        label: crop.to_string(),
        crop: crop.to_string(),
        grid: first.grid,
        cells: first.cells.clone(),
        bands,
    })
}

/// Groups cultivar ids by crop label, in first-appearance order.
pub fn group_by_crop(cultivars: &[Cultivar]) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for c in cultivars {
        match groups.iter_mut().find(|(crop, _)| *crop == c.crop) {
            Some((_, ids)) => ids.push(c.id.clone()),
            None => groups.push((c.crop.clone(), vec![c.id.clone()])),
        }
    }
    groups
}
