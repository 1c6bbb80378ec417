//! Implements dumps of MariaDB databases using [MariaDb].

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use derive_more::{Display, Error};
use flate2::write::GzEncoder;
use flate2::Compression;

use super::Dump;

#[derive(Debug, Display, Error)]
/// Errors on dumping a MariaDB database.
pub enum MariaDbError {
    /// `mariadb-dump` couldn't be started.
    #[display("Failed to run mariadb-dump: {_0}")]
    Spawn(io::Error),
    /// Writing the compressed dump failed.
    #[display("Failed to write database dump {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    /// `mariadb-dump` exited unsuccessfully.
    #[display("mariadb-dump {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
}

/// Dump of one MariaDB database, gzip compressed.
///
/// Credentials are best kept in an option file passed as `defaults_file`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MariaDb {
    /// Name of the database.
    pub name: String,
    pub user: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Passed as `--defaults-extra-file`.
    pub defaults_file: Option<PathBuf>,
    #[serde(default)]
    pub additional_options: Vec<String>,
}

impl MariaDb {
    fn command(&self) -> Command {
        let mut command = Command::new("mariadb-dump");
        if let Some(file) = &self.defaults_file {
            // has to be the first option
            command.arg(format!("--defaults-extra-file={}", file.display()));
        }
        command
            .arg("--opt") // sensible dump defaults
            .arg("--single-transaction");
        if let Some(user) = &self.user {
            command.arg(format!("--user={user}"));
        }
        if let Some(host) = &self.host {
            command.arg(format!("--host={host}"));
        }
        if let Some(port) = self.port {
            command.arg(format!("--port={port}"));
        }
        command.args(&self.additional_options).arg(&self.name);
        command
    }

    fn dump_filename(&self) -> String {
        format!("MariaDB-{}.sql.gz", self.name)
    }
}

impl Dump for MariaDb {
    type Error = MariaDbError;

    fn dump(&self, dump_dir: &Path) -> Result<PathBuf, Self::Error> {
        log::info!(target: "database::mariadb", "Create database dump of: {}", self.name);
        let path = dump_dir.join(self.dump_filename());
        log::debug!(target: "database::mariadb", "Save database dump at: {}", path.display());

        compress_output(self.command(), &path)?;

        log::info!(target: "database::mariadb", "Finished database dump of: {}", self.name);
        Ok(path)
    }
}

/// Run `command` and gzip its stdout into a new file at `path`.
fn compress_output(mut command: Command, path: &Path) -> Result<(), MariaDbError> {
    let mut dump_process = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(MariaDbError::Spawn)?;
    log::trace!(target: "database::mariadb", "Started dump process.");

    let stderr = dump_process.stderr.take();
    let stderr_reader = thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut buf);
        }
        buf
    });

    let write_error = |source| MariaDbError::Write {
        path: path.to_path_buf(),
        source,
    };
    let written = match dump_process.stdout.take() {
        Some(stdout) => File::create_new(path).and_then(|file| {
            let mut reader = BufReader::new(stdout);
            let mut encoder = GzEncoder::new(file, Compression::default());
            io::copy(&mut reader, &mut encoder)?;
            encoder.finish().map(drop)
        }),
        None => Ok(()),
    };

    let status = dump_process.wait().map_err(MariaDbError::Spawn)?;
    let stderr = stderr_reader.join().unwrap_or_default();
    if !status.success() {
        return Err(MariaDbError::Failed {
            status,
            stderr: stderr.trim().to_string(),
        });
    }
    written.map_err(write_error)?;
    if !stderr.trim().is_empty() {
        log::warn!(target: "database::mariadb", "{}", stderr.trim_end());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use flate2::read::GzDecoder;

    use super::*;

    #[test]
    fn dump_command() {
        let mariadb = MariaDb {
            name: "webapp".into(),
            user: Some("backup".into()),
            host: None,
            port: Some(3307),
            defaults_file: Some("/etc/backup/my.cnf".into()),
            additional_options: vec!["--skip-lock-tables".into()],
        };
        let command = mariadb.command();
        let args: Vec<_> = command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(command.get_program(), "mariadb-dump");
        assert_eq!(
            args,
            vec![
                "--defaults-extra-file=/etc/backup/my.cnf",
                "--opt",
                "--single-transaction",
                "--user=backup",
                "--port=3307",
                "--skip-lock-tables",
                "webapp",
            ]
        );
        assert_eq!(mariadb.dump_filename(), "MariaDB-webapp.sql.gz");
    }

    #[test]
    fn output_is_compressed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.sql.gz");
        let mut command = Command::new("sh");
        command.arg("-c").arg("echo 'CREATE TABLE t (id INT);'");

        compress_output(command, &path).unwrap();

        let mut content = String::new();
        GzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "CREATE TABLE t (id INT);\n");
    }

    #[test]
    fn failing_dump() {
        let dir = tempfile::tempdir().unwrap();
        let mut command = Command::new("sh");
        command.arg("-c").arg("echo 'Access denied' >&2; exit 2");

        let err = compress_output(command, &dir.path().join("dump.sql.gz")).unwrap_err();
        assert!(matches!(err, MariaDbError::Failed { ref stderr, .. } if stderr == "Access denied"));
    }
}
