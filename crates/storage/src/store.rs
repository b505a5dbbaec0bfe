//! File-based JSON snapshot store.
//!
//! Snapshots live under `<root>/snapshots/<project>/<base-date>.json`,
//! pretty-printed. Snapshots are immutable once written; saving the same
//! (project, base date) pair again replaces the file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::snapshot::ProjectSnapshot;

/// Error type for store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while reading or writing snapshots.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot not found
    #[error("snapshot not found: {0}")]
    NotFound(String),
}

/// Directory-backed snapshot store.
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// Open a store rooted at `root`, creating `<root>/snapshots/`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().join("snapshots");
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn project_dir(&self, project: &str) -> PathBuf {
        self.root.join(project)
    }

    fn snapshot_path(&self, project: &str, base_date: NaiveDate) -> PathBuf {
        self.project_dir(project).join(format!("{base_date}.json"))
    }

    /// Write a snapshot, returning the path it landed at.
    pub fn save(&self, snapshot: &ProjectSnapshot) -> Result<PathBuf> {
        let dir = self.project_dir(&snapshot.name);
        fs::create_dir_all(&dir)?;
        let path = self.snapshot_path(&snapshot.name, snapshot.base_date);
        fs::write(&path, serde_json::to_string_pretty(snapshot)?)?;
        tracing::debug!(path = %path.display(), "snapshot saved");
        Ok(path)
    }

    /// Load the snapshot of `project` taken at `base_date`.
    pub fn load(&self, project: &str, base_date: NaiveDate) -> Result<ProjectSnapshot> {
        let path = self.snapshot_path(project, base_date);
        if !path.exists() {
            return Err(StorageError::NotFound(format!("{project} @ {base_date}")));
        }
        Self::load_path(path)
    }

    /// Load a snapshot from an explicit file path.
    pub fn load_path(path: impl AsRef<Path>) -> Result<ProjectSnapshot> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Base dates of all stored snapshots of `project`, ascending.
    ///
    /// A project with no snapshot directory simply has none.
    pub fn list(&self, project: &str) -> Result<Vec<NaiveDate>> {
        let dir = self.project_dir(project);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut dates = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(date) = stem.parse::<NaiveDate>() {
                dates.push(date);
            }
        }
        dates.sort();
        Ok(dates)
    }

    /// All stored snapshots of `project`, ascending by base date.
    pub fn load_all(&self, project: &str) -> Result<Vec<ProjectSnapshot>> {
        self.list(project)?
            .into_iter()
            .map(|date| self.load(project, date))
            .collect()
    }

    /// The most recent snapshot of `project`.
    pub fn latest(&self, project: &str) -> Result<ProjectSnapshot> {
        let date = self
            .list(project)?
            .pop()
            .ok_or_else(|| StorageError::NotFound(project.to_string()))?;
        self.load(project, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evtrack_core::Task;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn snapshot(base: NaiveDate) -> ProjectSnapshot {
        ProjectSnapshot {
            name: "alpha".into(),
            base_date: base,
            start_date: None,
            end_date: None,
            holidays: Vec::new(),
            tasks: vec![Task::new("T", "Design")],
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path()).unwrap();
        let original = snapshot(date(2024, 3, 6));
        let path = store.save(&original).unwrap();
        assert!(path.ends_with("alpha/2024-03-06.json"));

        let loaded = store.load("alpha", date(2024, 3, 6)).unwrap();
        assert_eq!(loaded, original);

        let by_path = SnapshotStore::load_path(&path).unwrap();
        assert_eq!(by_path, original);
    }

    #[test]
    fn list_is_ascending_and_latest_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path()).unwrap();
        store.save(&snapshot(date(2024, 3, 11))).unwrap();
        store.save(&snapshot(date(2024, 3, 4))).unwrap();
        store.save(&snapshot(date(2024, 3, 7))).unwrap();

        assert_eq!(
            store.list("alpha").unwrap(),
            [date(2024, 3, 4), date(2024, 3, 7), date(2024, 3, 11)]
        );
        assert_eq!(store.latest("alpha").unwrap().base_date, date(2024, 3, 11));
        assert_eq!(store.load_all("alpha").unwrap().len(), 3);
    }

    #[test]
    fn missing_snapshot_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path()).unwrap();
        assert!(store.list("alpha").unwrap().is_empty());
        assert!(matches!(
            store.load("alpha", date(2024, 3, 6)),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.latest("alpha"),
            Err(StorageError::NotFound(_))
        ));
    }
}
