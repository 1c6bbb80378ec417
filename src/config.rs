//! Configuration file of all backup models.
//!
//! ```toml
//! [paths]
//! tmp_path = "/var/backups/.tmp"
//! data_path = "/var/backups/.data"
//!
//! [[model]]
//! trigger = "db-backup"
//!
//! [[model.database]]
//! type = "mariadb"
//! name = "webapp"
//!
//! [model.encryptor]
//! type = "openssl"
//! password_file = "/etc/backup/password"
//!
//! [[model.storage]]
//! type = "local"
//! path = "/mnt/backups"
//! keep = 7
//! ```

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use derive_more::{Display, Error};
use regex::Regex;

use crate::cleaner;
use crate::encryptor::Encryptor;
use crate::model::Model;
use crate::storage::Storage;

static TRIGGER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.-]+$").expect("static regex is valid"));

#[derive(Debug, Display, Error)]
/// Errors in the configuration.
pub enum ConfigError {
    #[display("Reading the config file {} failed: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[display("Parsing the config file {} failed: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[display("Invalid trigger '{_0}': only letters, digits, '_', '-' and '.' are allowed")]
    InvalidTrigger(#[error(ignore)] String),
    #[display("Trigger '{second}' collides with the temporary files of trigger '{first}'")]
    CollidingTriggers { first: String, second: String },
    #[display("Model '{trigger}' has an invalid storage_id '{storage_id}': only letters, digits, '_', '-' and '.' are allowed")]
    InvalidStorageId { trigger: String, storage_id: String },
    #[display("Trigger '{_0}' is configured more than once")]
    DuplicateTrigger(#[error(ignore)] String),
    #[display("Model '{_0}' has no storage configured")]
    NoStorage(#[error(ignore)] String),
    #[display("Model '{trigger}' has multiple {storage} storages sharing the same storage_id")]
    DuplicateStorage { trigger: String, storage: String },
    #[display("Model '{_0}' has an encryptor without a password or key")]
    EncryptorWithoutKey(#[error(ignore)] String),
    #[display("No model matches trigger '{_0}'")]
    UnknownTrigger(#[error(ignore)] String),
}

/// Directories used while performing backups.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Paths {
    /// Staging area for dumps, archives and packages.
    #[serde(default = "default_tmp_path")]
    pub tmp_path: PathBuf,
    /// Retention histories of the storages.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
}

fn root_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/var/lib/pkg_backup"))
        .join("Backup")
}

fn default_tmp_path() -> PathBuf {
    root_path().join(".tmp")
}

fn default_data_path() -> PathBuf {
    root_path().join(".data")
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            tmp_path: default_tmp_path(),
            data_path: default_data_path(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
/// Configuration of all models.
pub struct Config {
    #[serde(default, rename = "model", skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<Model>,
    #[serde(default)]
    pub paths: Paths,
}

impl Config {
    /// Read the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the models for problems that would only surface while performing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut triggers = HashSet::new();
        for model in &self.models {
            if !is_valid_name(&model.trigger) {
                return Err(ConfigError::InvalidTrigger(model.trigger.clone()));
            }
            if !triggers.insert(model.trigger.as_str()) {
                return Err(ConfigError::DuplicateTrigger(model.trigger.clone()));
            }
            if model.storages.is_empty() {
                return Err(ConfigError::NoStorage(model.trigger.clone()));
            }

            // storages sharing a history key would cycle each other's packages
            let mut keys = HashSet::new();
            for storage in &model.storages {
                if let Some(storage_id) = storage.storage_id().filter(|id| !is_valid_name(id)) {
                    return Err(ConfigError::InvalidStorageId {
                        trigger: model.trigger.clone(),
                        storage_id: storage_id.to_string(),
                    });
                }
                if !keys.insert(storage.history_key(&model.trigger)) {
                    return Err(ConfigError::DuplicateStorage {
                        trigger: model.trigger.clone(),
                        storage: storage.name().to_string(),
                    });
                }
            }

            let has_key = match &model.encryptor {
                Some(Encryptor::OpenSsl(openssl)) => openssl.has_password(),
                Some(Encryptor::Gpg(gpg)) => gpg.has_key_source(),
                None => true,
            };
            if !has_key {
                return Err(ConfigError::EncryptorWithoutKey(model.trigger.clone()));
            }
        }

        // cleaning up one trigger must never touch the files of another
        for first in &self.models {
            for second in &self.models {
                if first.trigger != second.trigger
                    && cleaner::belongs_to(&second.trigger, &first.trigger)
                {
                    return Err(ConfigError::CollidingTriggers {
                        first: first.trigger.clone(),
                        second: second.trigger.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Models matching `patterns`, in the order of the patterns.
    ///
    /// A pattern is a trigger, `*` matches any number of characters.
    pub fn select(&self, patterns: &[String]) -> Result<Vec<&Model>, ConfigError> {
        let mut selected: Vec<&Model> = Vec::new();
        for pattern in patterns {
            let matcher = glob_regex(pattern);
            let before = selected.len();
            for model in &self.models {
                let already = selected.iter().any(|m| m.trigger == model.trigger);
                if matcher.is_match(&model.trigger) && !already {
                    selected.push(model);
                }
            }
            if selected.len() == before && !selected.iter().any(|m| matcher.is_match(&m.trigger)) {
                return Err(ConfigError::UnknownTrigger(pattern.clone()));
            }
        }
        Ok(selected)
    }
}

/// Triggers and storage ids end up in file names.
fn is_valid_name(name: &str) -> bool {
    TRIGGER_PATTERN.is_match(name) && name != "." && name != ".."
}

fn glob_regex(pattern: &str) -> Regex {
    let escaped: Vec<_> = pattern.split('*').map(regex::escape).collect();
    Regex::new(&format!("^{}$", escaped.join(".*"))).expect("escaped pattern is a valid regex")
}
