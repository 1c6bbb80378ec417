//! Implements storing packages in a local directory using [Local].

use std::fs;
use std::path::{Path, PathBuf};

use super::{Storage, StorageError};
use crate::package::Package;
use crate::util::retention::KeepSetting;

/// Stores packages at `<path>/<trigger>/<time>/`.
///
/// The directory may be a mount point of a network share or removable drive.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Local {
    pub path: PathBuf,
    pub storage_id: Option<String>,
    pub keep: Option<KeepSetting>,
}

impl Local {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            storage_id: None,
            keep: None,
        }
    }

    /// Directory holding the files of `package`.
    pub fn remote_path(&self, package: &Package) -> PathBuf {
        self.path.join(package.trigger()).join(package.time())
    }
}

impl Storage for Local {
    fn name(&self) -> &'static str {
        "local"
    }

    fn storage_id(&self) -> Option<&str> {
        self.storage_id.as_deref()
    }

    fn keep(&self) -> Option<KeepSetting> {
        self.keep
    }

    fn transfer(&self, package: &mut Package, tmp_path: &Path) -> Result<(), StorageError> {
        if self.path.is_relative() {
            log::warn!(target: "storage::local", "Storage path is relative: {}", self.path.display());
        }

        let remote_path = self.remote_path(package);
        fs::create_dir_all(&remote_path).map_err(|source| StorageError::Io {
            context: "Failed to create",
            path: remote_path.clone(),
            source,
        })?;

        for filename in package.filenames() {
            let src = tmp_path.join(&filename);
            let dest = remote_path.join(&filename);
            log::debug!(target: "storage::local", "Copying {} to {}", src.display(), dest.display());
            fs::copy(&src, &dest).map_err(|source| StorageError::Io {
                context: "Failed to copy",
                path: src.clone(),
                source,
            })?;
        }

        Ok(())
    }

    fn remove(&self, package: &Package) -> Result<(), StorageError> {
        let remote_path = self.remote_path(package);
        log::debug!(target: "storage::local", "Removing {}", remote_path.display());
        fs::remove_dir_all(&remote_path).map_err(|source| StorageError::Io {
            context: "Failed to remove",
            path: remote_path,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn package() -> Package {
        let time = NaiveDate::from_ymd_opt(2026, 7, 8)
            .unwrap()
            .and_hms_opt(9, 10, 11)
            .unwrap();
        Package::new("job", time)
    }

    #[test]
    fn transfer_and_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("job.tar"), "archive").unwrap();

        let local = Local::new(dest.path());
        let mut package = package();
        local.transfer(&mut package, tmp.path()).unwrap();

        let stored = dest.path().join("job/2026.07.08.09.10.11/job.tar");
        assert_eq!(fs::read_to_string(&stored).unwrap(), "archive");
        // the package stays in place for the following storages
        assert!(tmp.path().join("job.tar").is_file());

        local.remove(&package).unwrap();
        assert!(!stored.exists());
        assert!(dest.path().join("job").is_dir());
    }

    #[test]
    fn missing_package_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();

        let err = Local::new(dest.path())
            .transfer(&mut package(), tmp.path())
            .unwrap_err();
        assert!(matches!(err, StorageError::Io { context: "Failed to copy", .. }));
    }

    #[test]
    fn removing_a_missing_package_fails() {
        let dest = tempfile::tempdir().unwrap();
        assert!(Local::new(dest.path()).remove(&package()).is_err());
    }
}
