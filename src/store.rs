//! Atomic file-based persistence for task and review-triage state.
//!
//! One pretty-printed JSON document per task key under
//! `.devflow/tasks/<KEY>.json`, and one per review request under
//! `.devflow/reviews/pr-<N>.json`. Documents are human-inspectable and safe
//! to hand-edit for recovery. Writes go through a temp file plus rename so a
//! crash never leaves a half-written record; an exclusive lock file guards
//! the rename against a concurrent save from this process.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::config::STATE_DIR;
use crate::error::Result;

/// Temporary file suffix for atomic writes.
const TMP_SUFFIX: &str = ".tmp";

/// Lock file suffix.
const LOCK_SUFFIX: &str = ".lock";

/// Persistence manager rooted at a project directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    /// Create a store rooted at `<project>/.devflow`.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            root: project_dir.as_ref().join(STATE_DIR),
        }
    }

    /// Path of the record for a task key.
    pub fn task_path(&self, key: &str) -> PathBuf {
        self.root.join("tasks").join(format!("{key}.json"))
    }

    /// Path of the cached triage report for a review request.
    pub fn review_path(&self, number: u64) -> PathBuf {
        self.root.join("reviews").join(format!("pr-{number}.json"))
    }

    /// Directory for rendered review artifacts (`review.md` and friends).
    pub fn review_artifact_dir(&self, number: u64) -> PathBuf {
        self.root.join("reviews").join(format!("pr-{number}"))
    }

    /// Save a record atomically.
    pub fn save<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_path = path.with_extension(format!("json{LOCK_SUFFIX}"));
        let lock_file = File::create(&lock_path)?;
        FileExt::lock_exclusive(&lock_file)?;

        let tmp_path = path.with_extension(format!("json{TMP_SUFFIX}"));
        let json = serde_json::to_string_pretty(value)?;

        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(json.as_bytes())?;
        tmp_file.sync_all()?;

        fs::rename(&tmp_path, path)?;

        Ok(())
    }

    /// Load a record, returning `None` when it does not exist.
    ///
    /// A corrupted record is logged and treated as absent rather than
    /// aborting the invocation.
    pub fn load<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&contents) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(
                    "Corrupted state file at {}: {}. Ignoring it.",
                    path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    /// Whether a record exists at the given path.
    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Probe {
        key: String,
        n: u32,
    }

    fn test_store() -> (StateStore, TempDir) {
        let temp = TempDir::new().expect("create temp dir");
        let store = StateStore::new(temp.path());
        (store, temp)
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let (store, _temp) = test_store();
        let path = store.task_path("PBI-1");
        let value = Probe {
            key: "PBI-1".into(),
            n: 7,
        };

        store.save(&path, &value).expect("save");
        let loaded: Option<Probe> = store.load(&path).expect("load");
        assert_eq!(loaded, Some(value));
    }

    #[test]
    fn test_load_missing_returns_none() {
        let (store, _temp) = test_store();
        let loaded: Option<Probe> = store.load(&store.task_path("PBI-404")).expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_leaves_no_tmp_file() {
        let (store, _temp) = test_store();
        let path = store.task_path("PBI-2");
        store
            .save(&path, &Probe { key: "PBI-2".into(), n: 1 })
            .expect("save");
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupted_record_is_treated_as_absent() {
        let (store, _temp) = test_store();
        let path = store.task_path("PBI-3");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not valid json {{{").unwrap();

        let loaded: Option<Probe> = store.load(&path).expect("load should not error");
        assert!(loaded.is_none());
    }

    #[test]
    fn test_record_is_human_inspectable_json() {
        let (store, _temp) = test_store();
        let path = store.task_path("PBI-4");
        store
            .save(&path, &Probe { key: "PBI-4".into(), n: 9 })
            .expect("save");

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n"), "pretty-printed for hand editing");
        assert!(raw.contains("\"PBI-4\""));
    }

    #[test]
    fn test_review_paths_are_keyed_by_number() {
        let (store, _temp) = test_store();
        assert!(store.review_path(42).ends_with("reviews/pr-42.json"));
        assert!(store.review_artifact_dir(42).ends_with("reviews/pr-42"));
    }

    #[test]
    fn test_save_overwrites_existing() {
        let (store, _temp) = test_store();
        let path = store.task_path("PBI-5");
        store
            .save(&path, &Probe { key: "PBI-5".into(), n: 1 })
            .expect("save");
        store
            .save(&path, &Probe { key: "PBI-5".into(), n: 2 })
            .expect("save");
        let loaded: Option<Probe> = store.load(&path).expect("load");
        assert_eq!(loaded.unwrap().n, 2);
    }
}
