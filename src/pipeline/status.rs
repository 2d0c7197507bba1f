//! Per-cultivar progress derived from the artifact store.

use std::fmt;

use crate::aggregate::group_by_crop;
use crate::cultivar::Cultivar;
use crate::store::{ArtifactKind, ArtifactStore};

/// Where a cultivar stands in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CultivarState {
    Unfitted,
    ModelFitted,
    Reconstructed,
    /// Reconstructed and included in its crop aggregate.
    Aggregated,
}

impl fmt::Display for CultivarState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CultivarState::Unfitted => "unfitted",
            CultivarState::ModelFitted => "model fitted",
            CultivarState::Reconstructed => "reconstructed",
            CultivarState::Aggregated => "aggregated",
        };
        f.write_str(name)
    }
}

/// State of every cultivar, in input order.
///
/// A cultivar is only `Aggregated` when its crop has more than one cultivar;
/// a single-member crop needs no aggregate artifact.
pub fn cultivar_states(store: &ArtifactStore, cultivars: &[Cultivar]) -> Vec<(String, CultivarState)> {
    let groups = group_by_crop(cultivars);
    cultivars
        .iter()
        .map(|c| {
            let shared = groups
                .iter()
                .any(|(crop, members)| *crop == c.crop && members.len() > 1);
            let state = if !store.contains(ArtifactKind::Model, &c.id) {
                CultivarState::Unfitted
            } else if !store.contains(ArtifactKind::Reconstruction, &c.id) {
                CultivarState::ModelFitted
            } else if shared && store.contains(ArtifactKind::Aggregate, &c.crop) {
                CultivarState::Aggregated
            } else {
                CultivarState::Reconstructed
            };
            (c.id.clone(), state)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_states_follow_artifacts() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let cultivars = vec![
            Cultivar::new("a", "rice", 10.0, 1000.0),
            Cultivar::new("b", "rice", 10.0, 2000.0),
            Cultivar::new("c", "millet", 8.0, 1500.0),
            Cultivar::new("d", "barley", 0.0, 1500.0),
        ];

        for id in ["a", "b", "c"] {
            store.save(ArtifactKind::Model, id, &0u8).unwrap();
        }
        for id in ["a", "c"] {
            store.save(ArtifactKind::Reconstruction, id, &0u8).unwrap();
        }
        store.save(ArtifactKind::Aggregate, "rice", &0u8).unwrap();

        let states = cultivar_states(&store, &cultivars);
        assert_eq!(states[0].1, CultivarState::Aggregated);
        assert_eq!(states[1].1, CultivarState::ModelFitted);
        assert_eq!(states[2].1, CultivarState::Reconstructed);
        assert_eq!(states[3].1, CultivarState::Unfitted);
    }
}
