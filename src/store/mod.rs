//! Key-addressed artifact store.
//!
//! Every fitted model, reconstruction and crop aggregate is one file under
//! `root/<kind>/<key>.bin`. A file's presence marks the unit as complete:
//! writes go to a temporary file first and are renamed into place, so a
//! crashed run never leaves a half-written artifact behind.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while reading or writing artifacts.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Artifact encoding error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("Invalid artifact key '{0}'")]
    InvalidKey(String),
}

/// Artifact families kept by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKind {
    Model,
    Reconstruction,
    Aggregate,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Model,
        ArtifactKind::Reconstruction,
        ArtifactKind::Aggregate,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            ArtifactKind::Model => "models",
            ArtifactKind::Reconstruction => "reconstructions",
            ArtifactKind::Aggregate => "aggregates",
        }
    }

    /// This kind and every kind derived from it.
    pub fn downstream(&self) -> &'static [ArtifactKind] {
        match self {
            ArtifactKind::Model => &[
                ArtifactKind::Model,
                ArtifactKind::Reconstruction,
                ArtifactKind::Aggregate,
            ],
            ArtifactKind::Reconstruction => &[ArtifactKind::Reconstruction, ArtifactKind::Aggregate],
            ArtifactKind::Aggregate => &[ArtifactKind::Aggregate],
        }
    }
}

/// Filesystem-backed artifact store.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for kind in ArtifactKind::ALL {
            fs::create_dir_all(root.join(kind.dir_name()))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn validate_key(key: &str) -> Result<(), StoreError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    /// Path of the artifact file for `(kind, key)`.
    pub fn path(&self, kind: ArtifactKind, key: &str) -> PathBuf {
        self.root.join(kind.dir_name()).join(format!("{key}.bin"))
    }

    pub fn contains(&self, kind: ArtifactKind, key: &str) -> bool {
        self.path(kind, key).is_file()
    }

    pub fn load<T: DeserializeOwned>(&self, kind: ArtifactKind, key: &str) -> Result<T, StoreError> {
        Self::validate_key(key)?;
        let file = File::open(self.path(kind, key))?;
        Ok(bincode::deserialize_from(BufReader::new(file))?)
    }

    /// Persists an artifact atomically (temporary file, then rename).
    pub fn save<T: Serialize>(&self, kind: ArtifactKind, key: &str, value: &T) -> Result<(), StoreError> {
        Self::validate_key(key)?;
        let final_path = self.path(kind, key);
        let tmp_path = self
            .root
            .join(kind.dir_name())
            .join(format!(".{key}.bin.{}.tmp", std::process::id()));

        let result = (|| -> Result<(), StoreError> {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            bincode::serialize_into(&mut writer, value)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            fs::rename(&tmp_path, &final_path)?;
            Ok(())
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }

    /// Returns the stored artifact, or computes, persists and returns it.
    ///
    /// An existing artifact is never recomputed nor rewritten.
    pub fn get_or_compute<T, E, F>(&self, kind: ArtifactKind, key: &str, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<StoreError>,
        F: FnOnce() -> Result<T, E>,
    {
        if self.contains(kind, key) {
            debug!("Reusing {} artifact '{}'", kind.dir_name(), key);
            return Ok(self.load(kind, key)?);
        }
        let value = compute()?;
        self.save(kind, key, &value)?;
        Ok(value)
    }

    /// Keys of every stored artifact of one kind, sorted.
    pub fn keys(&self, kind: ArtifactKind) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(self.root.join(kind.dir_name()))? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(key) = name.strip_suffix(".bin") {
                if !key.starts_with('.') {
                    keys.push(key.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Removes every artifact of the given kinds.
    pub fn clear(&self, kinds: &[ArtifactKind]) -> Result<(), StoreError> {
        for &kind in kinds {
            let dir = self.root.join(kind.dir_name());
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
            }
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        store.save(ArtifactKind::Model, "japonica", &vec![1.5f32, 2.5]).unwrap();

        assert!(store.contains(ArtifactKind::Model, "japonica"));
        assert!(!store.contains(ArtifactKind::Reconstruction, "japonica"));
        let back: Vec<f32> = store.load(ArtifactKind::Model, "japonica").unwrap();
        assert_eq!(back, vec![1.5, 2.5]);
        assert_eq!(store.keys(ArtifactKind::Model).unwrap(), vec!["japonica".to_string()]);
    }

    #[test]
    fn test_get_or_compute_skips_if_present() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let calls = Cell::new(0);

        let first: Vec<u8> = store
            .get_or_compute(ArtifactKind::Reconstruction, "a", || {
                calls.set(calls.get() + 1);
                Ok::<_, StoreError>(vec![1, 2, 3])
            })
            .unwrap();
        let bytes_before = fs::read(store.path(ArtifactKind::Reconstruction, "a")).unwrap();

        let second: Vec<u8> = store
            .get_or_compute(ArtifactKind::Reconstruction, "a", || {
                calls.set(calls.get() + 1);
                Ok::<_, StoreError>(vec![9, 9, 9])
            })
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(first, second);
        assert_eq!(
            fs::read(store.path(ArtifactKind::Reconstruction, "a")).unwrap(),
            bytes_before
        );
    }

    #[test]
    fn test_failed_compute_leaves_nothing() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let result: Result<Vec<u8>, StoreError> = store.get_or_compute(ArtifactKind::Model, "x", || {
            Err(StoreError::InvalidKey("boom".into()))
        });
        assert!(result.is_err());
        assert!(!store.contains(ArtifactKind::Model, "x"));
        assert!(store.keys(ArtifactKind::Model).unwrap().is_empty());
    }

    #[test]
    fn test_clear_removes_only_given_kinds() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        store.save(ArtifactKind::Model, "a", &1u32).unwrap();
        store.save(ArtifactKind::Reconstruction, "a", &2u32).unwrap();
        store.save(ArtifactKind::Aggregate, "rice", &3u32).unwrap();

        store.clear(ArtifactKind::Reconstruction.downstream()).unwrap();
        assert!(store.contains(ArtifactKind::Model, "a"));
        assert!(!store.contains(ArtifactKind::Reconstruction, "a"));
        assert!(!store.contains(ArtifactKind::Aggregate, "rice"));

        store.clear(&ArtifactKind::ALL).unwrap();
        assert!(!store.contains(ArtifactKind::Model, "a"));
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.save(ArtifactKind::Model, "../escape", &1u32),
            Err(StoreError::InvalidKey(_))
        ));
    }
}
