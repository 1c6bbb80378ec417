//! Tar archives of files and directories written into the staging directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error, From};

use crate::util::pipeline::{Pipeline, PipelineError};
use crate::util::shell;

/// Directory below the staging directory holding all archives.
pub const ARCHIVE_DIR: &str = "archives";

// GNU tar exits with 1 if files changed while being read
const TAR_ACCEPTED_CODES: &[i32] = &[0, 1];

#[derive(Debug, Display, Error, From)]
/// Errors on creating an [Archive].
pub enum ArchiveError {
    #[display("Failed to create archive directory: {_0}")]
    ArchiveDir(io::Error),
    #[display("Failed to run archive pipeline: {_0}")]
    #[from]
    Pipeline(PipelineError),
    #[display("Archive '{name}' failed\n{messages}")]
    Failed { name: String, messages: String },
}

/// Archive of `paths`, written as `<name>.tar` or `<name>.tar.gz`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Archive {
    pub name: String,
    pub paths: Vec<PathBuf>,
    #[serde(default)]
    pub excludes: Vec<PathBuf>,
    /// Compress the archive with gzip.
    #[serde(default)]
    pub compress: bool,
    /// Additional options passed verbatim to tar.
    #[serde(default)]
    pub tar_options: Vec<String>,
}

impl Archive {
    fn filename(&self) -> String {
        if self.compress {
            format!("{}.tar.gz", self.name)
        } else {
            format!("{}.tar", self.name)
        }
    }

    fn tar_command(&self) -> String {
        let mut args = vec!["tar".to_string()];
        args.extend(self.tar_options.iter().cloned());
        args.push("-cPf -".to_string());
        for exclude in &self.excludes {
            args.push(format!("--exclude={}", shell::quote_path(exclude)));
        }
        args.extend(self.paths.iter().map(|path| shell::quote_path(path)));
        args.join(" ")
    }

    fn pipeline(&self, path: &Path) -> Pipeline {
        let mut pipeline = Pipeline::new();
        pipeline.add(self.tar_command(), TAR_ACCEPTED_CODES);
        if self.compress {
            pipeline.append("gzip");
        }
        pipeline.append(format!("cat > {}", shell::quote_path(path)));
        pipeline
    }

    /// Write the archive into the `archives` directory below `staging_dir`.
    pub fn perform(&self, staging_dir: &Path) -> Result<PathBuf, ArchiveError> {
        log::info!(target: "archive", "Creating archive '{}'", self.name);
        for path in self.paths.iter().filter(|path| path.is_relative()) {
            log::warn!(target: "archive", "Archive path is relative: {}", path.display());
        }

        let archive_dir = staging_dir.join(ARCHIVE_DIR);
        fs::create_dir_all(&archive_dir).map_err(ArchiveError::ArchiveDir)?;
        let path = archive_dir.join(self.filename());

        let mut pipeline = self.pipeline(&path);
        pipeline.run()?;
        if !pipeline.success() {
            return Err(ArchiveError::Failed {
                name: self.name.clone(),
                messages: pipeline.error_messages(),
            });
        }

        log::info!(target: "archive", "Archive '{}' complete", self.name);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::process::Command;

    use super::*;

    fn archive(source: &Path) -> Archive {
        Archive {
            name: "home".into(),
            paths: vec![source.to_path_buf()],
            excludes: vec![source.join("cache")],
            compress: false,
            tar_options: Vec::new(),
        }
    }

    fn listing(archive: &Path) -> String {
        let output = Command::new("tar").arg("-tPf").arg(archive).output().unwrap();
        String::from_utf8(output.stdout).unwrap()
    }

    #[test]
    fn tar_command() {
        let archive = Archive {
            tar_options: vec!["--warning=no-file-changed".into()],
            ..archive(Path::new("/home/user"))
        };
        assert_eq!(
            archive.tar_command(),
            "tar --warning=no-file-changed -cPf - --exclude='/home/user/cache' '/home/user'"
        );
    }

    #[test]
    fn excluded_paths_are_skipped() {
        let source = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        fs::write(source.path().join("keep.txt"), "keep").unwrap();
        fs::create_dir(source.path().join("cache")).unwrap();
        fs::write(source.path().join("cache/skip.txt"), "skip").unwrap();

        let path = archive(source.path()).perform(staging.path()).unwrap();

        assert_eq!(path, staging.path().join("archives/home.tar"));
        let listing = listing(&path);
        assert!(listing.contains("keep.txt"));
        assert!(!listing.contains("skip.txt"));
    }

    #[test]
    fn compressed_archive() {
        let source = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        fs::write(source.path().join("keep.txt"), "keep").unwrap();

        let archive = Archive {
            compress: true,
            ..archive(source.path())
        };
        let path = archive.perform(staging.path()).unwrap();
        assert_eq!(path, staging.path().join("archives/home.tar.gz"));

        let output = Command::new("gzip").arg("-t").arg(&path).status().unwrap();
        assert!(output.success());
    }

    #[test]
    fn missing_path_fails() {
        let staging = tempfile::tempdir().unwrap();
        let archive = archive(&staging.path().join("does-not-exist"));

        let err = archive.perform(staging.path()).unwrap_err();
        assert!(matches!(err, ArchiveError::Failed { .. }));
    }
}
