//! Implements storing packages on a remote host using [Scp].

use std::path::{Path, PathBuf};
use std::process::Command;

use super::{run_command, Storage, StorageError};
use crate::package::Package;
use crate::util::retention::KeepSetting;
use crate::util::shell;

const DEFAULT_PORT: u16 = 22;

/// Stores packages at `<path>/<trigger>/<time>/` on `host` via SSH.
///
/// Authentication relies on the SSH agent or keys configured through
/// `ssh_options`, each entry is passed to `ssh` and `scp` as one argument.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Scp {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: Option<String>,
    /// Remote directory, relative paths start at the login directory.
    pub path: PathBuf,
    #[serde(default)]
    pub ssh_options: Vec<String>,
    pub storage_id: Option<String>,
    pub keep: Option<KeepSetting>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Scp {
    fn destination(&self) -> String {
        match &self.username {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }

    /// Directory holding the files of `package` on the remote host.
    pub fn remote_path(&self, package: &Package) -> PathBuf {
        self.path.join(package.trigger()).join(package.time())
    }

    fn ssh(&self, remote_command: String) -> Command {
        let mut command = Command::new("ssh");
        command
            .arg("-p")
            .arg(self.port.to_string())
            .args(&self.ssh_options)
            .arg(self.destination())
            .arg(remote_command);
        command
    }

    fn scp(&self, file: &Path, remote_file: &Path) -> Command {
        let mut command = Command::new("scp");
        command
            .arg("-P")
            .arg(self.port.to_string())
            .args(&self.ssh_options)
            .arg(file)
            .arg(format!("{}:{}", self.destination(), remote_file.display()));
        command
    }
}

impl Storage for Scp {
    fn name(&self) -> &'static str {
        "scp"
    }

    fn storage_id(&self) -> Option<&str> {
        self.storage_id.as_deref()
    }

    fn keep(&self) -> Option<KeepSetting> {
        self.keep
    }

    fn transfer(&self, package: &mut Package, tmp_path: &Path) -> Result<(), StorageError> {
        let remote_path = self.remote_path(package);
        run_command(self.ssh(format!("mkdir -p {}", shell::quote_path(&remote_path))))?;

        for filename in package.filenames() {
            log::debug!(
                target: "storage::scp",
                "Transferring {filename} to {}:{}",
                self.host,
                remote_path.display()
            );
            run_command(self.scp(&tmp_path.join(&filename), &remote_path.join(&filename)))?;
        }
        Ok(())
    }

    fn remove(&self, package: &Package) -> Result<(), StorageError> {
        let remote_path = self.remote_path(package);
        run_command(self.ssh(format!("rm -r {}", shell::quote_path(&remote_path))))?;
        Ok(())
    }
}
