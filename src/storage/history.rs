//! Persisted retention history of the packages stored at one destination.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error};

use crate::package::Package;

/// Identifies the history of one storage destination of a trigger.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HistoryKey {
    pub trigger: String,
    /// Type of the storage, e.g. `local`.
    pub storage: String,
    /// Distinguishes multiple storages of the same type.
    pub storage_id: Option<String>,
}

impl HistoryKey {
    pub fn new(trigger: &str, storage: &str, storage_id: Option<&str>) -> Self {
        Self {
            trigger: trigger.to_string(),
            storage: storage.to_string(),
            storage_id: storage_id.map(str::to_string),
        }
    }

    /// `<storage>[-<storage_id>].json`
    pub fn file_name(&self) -> String {
        match &self.storage_id {
            Some(id) => format!("{}-{id}.json", self.storage),
            None => format!("{}.json", self.storage),
        }
    }
}

#[derive(Debug, Display, Error)]
/// Errors reading or writing a retention history.
pub enum HistoryError {
    #[display("Failed to access history file {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("History file {} is malformed: {source}", path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Repository of retention histories.
pub trait HistoryStore {
    /// Packages currently stored at the destination of `key`.
    fn load(&self, key: &HistoryKey) -> Result<Vec<Package>, HistoryError>;

    /// Replace the history of `key` with `packages`.
    fn save(&self, key: &HistoryKey, packages: &[Package]) -> Result<(), HistoryError>;
}

/// Stores histories as JSON at `<root>/<trigger>/<storage>[-<storage_id>].json`.
#[derive(Clone, Debug)]
pub struct FileHistoryStore {
    root: PathBuf,
}

impl FileHistoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, key: &HistoryKey) -> PathBuf {
        self.root.join(&key.trigger).join(key.file_name())
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> HistoryError + '_ {
    move |source| HistoryError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl HistoryStore for FileHistoryStore {
    fn load(&self, key: &HistoryKey) -> Result<Vec<Package>, HistoryError> {
        let path = self.path(key);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!(target: "storage::history", "No history at {} yet", path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(io_error(&path)(e)),
        };

        serde_json::from_slice(&content).map_err(|source| HistoryError::Malformed { path, source })
    }

    fn save(&self, key: &HistoryKey, packages: &[Package]) -> Result<(), HistoryError> {
        let path = self.path(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_error(dir))?;
        }

        let content = serde_json::to_vec_pretty(packages).map_err(|source| {
            HistoryError::Malformed {
                path: path.clone(),
                source,
            }
        })?;

        // replace atomically so an interrupted run never truncates the history
        let partial = path.with_extension("json.partial");
        fs::write(&partial, content).map_err(io_error(&partial))?;
        fs::rename(&partial, &path).map_err(io_error(&path))?;

        log::trace!(target: "storage::history", "Saved {} package(s) to {}", packages.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn package(day: u32) -> Package {
        let time = NaiveDate::from_ymd_opt(2026, 4, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Package::new("job", time)
    }

    #[test]
    fn file_names() {
        assert_eq!(HistoryKey::new("job", "local", None).file_name(), "local.json");
        assert_eq!(
            HistoryKey::new("job", "scp", Some("offsite")).file_name(),
            "scp-offsite.json"
        );
    }

    #[test]
    fn missing_history_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path());
        let history = store.load(&HistoryKey::new("job", "local", None)).unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path());
        let key = HistoryKey::new("job", "local", Some("nas"));

        let mut chunked = package(2);
        chunked.push_extension(".enc");
        chunked.no_cycle = true;
        let packages = vec![chunked, package(1)];
        store.save(&key, &packages).unwrap();

        assert!(dir.path().join("job/local-nas.json").is_file());
        assert!(!dir.path().join("job/local-nas.json.partial").exists());
        assert_eq!(store.load(&key).unwrap(), packages);

        store.save(&key, &packages[..1]).unwrap();
        assert_eq!(store.load(&key).unwrap(), &packages[..1]);
    }

    #[test]
    fn malformed_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path());
        let key = HistoryKey::new("job", "local", None);
        fs::create_dir_all(dir.path().join("job")).unwrap();
        fs::write(store.path(&key), "not json").unwrap();

        assert!(matches!(store.load(&key), Err(HistoryError::Malformed { .. })));
    }
}
