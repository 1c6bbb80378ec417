//! Storage backends packages are transferred to.
//!
//! Currently the following backends are implemented:
//!
//! - [Local]: Copies packages to a local (or mounted) directory.
//! - [Scp]: Transfers packages to a remote host with `scp`.
//!
//! Every backend with a `keep` setting cycles old packages out using the
//! [cycler] and its retention [history].

pub mod cycler;
pub mod history;
pub mod local;
pub mod scp;

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::NaiveDateTime;
use derive_more::{Display, Error, From};

pub use history::{FileHistoryStore, HistoryKey, HistoryStore};
pub use local::Local;
pub use scp::Scp;

use crate::package::Package;
use crate::util::retention::KeepSetting;
use cycler::CycleError;

#[derive(Debug, Display, Error, From)]
/// Errors of a storage backend.
pub enum StorageError {
    /// Local file operation failed.
    #[display("{context} {}: {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        source: io::Error,
    },
    /// A command could not be started.
    #[display("Failed to run '{command}': {source}")]
    Spawn { command: String, source: io::Error },
    /// A command on or towards the remote side failed.
    #[display("'{command}' failed: {stderr}")]
    Remote { command: String, stderr: String },
    /// Cycling old packages failed after a successful transfer.
    #[from]
    Cycle(CycleError),
}

/// Generic storage backend.
pub trait Storage {
    /// Type name of the storage, part of its history key.
    fn name(&self) -> &'static str;

    /// Identifier distinguishing storages of the same type.
    fn storage_id(&self) -> Option<&str>;

    /// Retention setting, [None] disables cycling.
    fn keep(&self) -> Option<KeepSetting>;

    /// Transfer all files of `package` from `tmp_path` to the destination.
    fn transfer(&self, package: &mut Package, tmp_path: &Path) -> Result<(), StorageError>;

    /// Remove all files of a previously transferred `package`.
    fn remove(&self, package: &Package) -> Result<(), StorageError>;

    /// Key of the retention history of this storage for `trigger`.
    fn history_key(&self, trigger: &str) -> HistoryKey {
        HistoryKey::new(trigger, self.name(), self.storage_id())
    }
}

/// Transfer `package` with `storage` and cycle out packages beyond its keep setting.
pub fn perform<S, H>(
    storage: &S,
    package: &mut Package,
    tmp_path: &Path,
    history: &H,
    now: NaiveDateTime,
) -> Result<(), StorageError>
where
    S: Storage + ?Sized,
    H: HistoryStore + ?Sized,
{
    let label = match storage.storage_id() {
        Some(id) => format!("{} ({id})", storage.name()),
        None => storage.name().to_string(),
    };
    log::info!(target: "storage", "Storing '{}' with {label}", package.trigger());

    storage.transfer(package, tmp_path)?;

    match storage.keep().and_then(|keep| keep.resolve(now)) {
        Some(policy) => {
            let key = storage.history_key(package.trigger());
            let cycled = cycler::cycle(storage, package, policy, history, &key)?;
            log::debug!(
                target: "storage",
                "{label} keeps {} package(s), cycled {}",
                cycled.kept.len(),
                cycled.removed.len()
            );
        }
        None => log::debug!(target: "storage", "Cycling disabled for {label}"),
    }

    log::info!(target: "storage", "Storing with {label} complete");
    Ok(())
}

/// Run `command` to completion, failing on a non-zero exit status.
pub(crate) fn run_command(mut command: Command) -> Result<String, StorageError> {
    let rendered = render(&command);
    log::trace!(target: "storage", "Running: {rendered}");

    let output = command.output().map_err(|source| StorageError::Spawn {
        command: rendered.clone(),
        source,
    })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        return Err(StorageError::Remote {
            command: rendered,
            stderr: stderr.trim().to_string(),
        });
    }
    if !stderr.trim().is_empty() {
        log::warn!(target: "storage", "{}", stderr.trim_end());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

fn render(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Configured storage of a model.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageBackend {
    Local(Local),
    Scp(Scp),
}

impl StorageBackend {
    fn inner(&self) -> &dyn Storage {
        match self {
            Self::Local(local) => local,
            Self::Scp(scp) => scp,
        }
    }
}

impl Storage for StorageBackend {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn storage_id(&self) -> Option<&str> {
        self.inner().storage_id()
    }

    fn keep(&self) -> Option<KeepSetting> {
        self.inner().keep()
    }

    fn transfer(&self, package: &mut Package, tmp_path: &Path) -> Result<(), StorageError> {
        self.inner().transfer(package, tmp_path)
    }

    fn remove(&self, package: &Package) -> Result<(), StorageError> {
        self.inner().remove(package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_config() {
        let storage: StorageBackend = toml::from_str(
            "type = \"local\"\npath = \"/srv/backups\"\nstorage_id = \"nas\"\nkeep = 7",
        )
        .unwrap();
        assert_eq!(storage.name(), "local");
        assert_eq!(storage.storage_id(), Some("nas"));
        assert_eq!(storage.keep(), Some(KeepSetting::Count(7)));
        assert_eq!(
            storage.history_key("job"),
            HistoryKey::new("job", "local", Some("nas"))
        );

        let storage: StorageBackend =
            toml::from_str("type = \"scp\"\nhost = \"backup.example.org\"\npath = \"backups\"")
                .unwrap();
        assert_eq!(storage.name(), "scp");
        assert_eq!(storage.keep(), None);
    }

    #[test]
    fn failing_command_reports_stderr() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("echo nope >&2; exit 1");
        let err = run_command(command).unwrap_err();
        assert!(matches!(err, StorageError::Remote { ref stderr, .. } if stderr == "nope"));
    }

    #[test]
    fn command_output() {
        let mut command = Command::new("echo");
        command.arg("hello");
        assert_eq!(run_command(command).unwrap(), "hello");
    }
}
