//! A backup job identified by its trigger, and the procedure performing it.

use std::io;
use std::path::Path;

use chrono::{Local, NaiveDateTime};
use derive_more::{Display, Error, From};

use crate::archive::{Archive, ArchiveError};
use crate::cleaner;
use crate::config::Paths;
use crate::database::{Database, DatabaseError};
use crate::encryptor::Encryptor;
use crate::package::Package;
use crate::packager::{PackageError, Packager};
use crate::splitter::Splitter;
use crate::storage::{self, FileHistoryStore, Storage, StorageBackend, StorageError};

#[derive(Debug, Display, Error, From)]
/// Errors aborting a [Model] run.
pub enum ModelError {
    #[display("Failed to prepare the temporary directory: {_0}")]
    Prepare(io::Error),
    #[display("Database dump failed: {_0}")]
    #[from]
    Database(DatabaseError),
    #[display("Archive failed: {_0}")]
    #[from]
    Archive(ArchiveError),
    #[display("Packaging failed: {_0}")]
    #[from]
    Package(PackageError),
    #[display("Storage {storage} failed: {source}")]
    Storage {
        storage: String,
        source: StorageError,
    },
    #[display("Cleaning up failed: {_0}")]
    Clean(io::Error),
}

/// Configuration of one backup job.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Model {
    /// Identifier of the job, used for file and directory names.
    pub trigger: String,
    pub description: Option<String>,
    #[serde(default, rename = "database", skip_serializing_if = "Vec::is_empty")]
    pub databases: Vec<Database>,
    #[serde(default, rename = "archive", skip_serializing_if = "Vec::is_empty")]
    pub archives: Vec<Archive>,
    pub encryptor: Option<Encryptor>,
    pub splitter: Option<Splitter>,
    #[serde(default, rename = "storage", skip_serializing_if = "Vec::is_empty")]
    pub storages: Vec<StorageBackend>,
}

impl Model {
    pub fn new(trigger: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            description: None,
            databases: Vec::new(),
            archives: Vec::new(),
            encryptor: None,
            splitter: None,
            storages: Vec::new(),
        }
    }

    /// Perform the job now.
    pub fn perform(&self, paths: &Paths) -> Result<Package, ModelError> {
        self.perform_at(paths, Local::now().naive_local())
    }

    /// Perform the job, dating the package at `time`.
    ///
    /// Procedures run in order: prepare, databases, archives, package, store
    /// and clean. Files of a failed run stay in the temporary directory until
    /// the next run of the trigger.
    pub fn perform_at(&self, paths: &Paths, time: NaiveDateTime) -> Result<Package, ModelError> {
        log::info!(target: "model", "Performing backup '{}'", self.trigger);

        let result = self.procedures(paths, time);
        match &result {
            Ok(package) => {
                log::info!(target: "model", "Backup '{}' completed ({})", self.trigger, package.time())
            }
            Err(_) => match cleaner::leftovers(&paths.tmp_path, &self.trigger) {
                Ok(leftovers) if !leftovers.is_empty() => log::warn!(
                    target: "model",
                    "Backup '{}' failed, the following files were kept for inspection:\n  {}",
                    self.trigger,
                    cleaner::display_paths(&leftovers)
                ),
                Ok(_) => {}
                Err(e) => log::warn!(target: "model", "Listing leftover files failed: {e}"),
            },
        }
        result
    }

    fn procedures(&self, paths: &Paths, time: NaiveDateTime) -> Result<Package, ModelError> {
        let tmp_path = paths.tmp_path.as_path();
        let staging_dir = cleaner::prepare(tmp_path, &self.trigger).map_err(ModelError::Prepare)?;

        for database in &self.databases {
            database.perform(&staging_dir)?;
        }
        for archive in &self.archives {
            archive.perform(&staging_dir)?;
        }

        let mut package = Package::new(&self.trigger, time);
        Packager::new(tmp_path)
            .with_optional_stage(self.encryptor.as_ref())
            .with_optional_stage(self.splitter.as_ref())
            .package(&mut package)?;
        cleaner::remove_packaging(tmp_path, &self.trigger).map_err(ModelError::Clean)?;

        self.store(&mut package, tmp_path, &FileHistoryStore::new(&paths.data_path), time)?;

        cleaner::remove_package(tmp_path, &package).map_err(ModelError::Clean)?;
        Ok(package)
    }

    /// Every storage is attempted, the first failure is returned.
    fn store(
        &self,
        package: &mut Package,
        tmp_path: &Path,
        history: &FileHistoryStore,
        now: NaiveDateTime,
    ) -> Result<(), ModelError> {
        let mut first_error = None;
        for backend in &self.storages {
            if let Err(source) = storage::perform(backend, package, tmp_path, history, now) {
                let error = ModelError::Storage {
                    storage: backend.name().to_string(),
                    source,
                };
                if first_error.is_none() {
                    first_error = Some(error);
                } else {
                    log::error!(target: "model", "{error}");
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
