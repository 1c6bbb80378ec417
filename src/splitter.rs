//! Split the package stream into chunk files with the `split` utility.

use std::fs;
use std::io;
use std::path::Path;

use crate::package::Package;
use crate::packager::{StageContribution, StageProvider};
use crate::util::shell;

const DEFAULT_CHUNK_SIZE: u64 = 250;
const DEFAULT_SUFFIX_LENGTH: usize = 3;

/// Final packaging stage writing chunks of `chunk_size` MiB.
///
/// Chunks are named `<basename>-<suffix>` with alphabetic suffixes of
/// `suffix_length` characters (`aa`, `ab`, ...). The suffix length has to be
/// large enough for the number of chunks, otherwise `split` fails the
/// pipeline.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Splitter {
    /// Size of a chunk in MiB.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// Number of characters of the chunk suffixes.
    #[serde(default = "default_suffix_length")]
    pub suffix_length: usize,
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_suffix_length() -> usize {
    DEFAULT_SUFFIX_LENGTH
}

impl Default for Splitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_SUFFIX_LENGTH)
    }
}

impl Splitter {
    pub fn new(chunk_size: u64, suffix_length: usize) -> Self {
        Self {
            chunk_size,
            suffix_length,
        }
    }

    /// Suffixes of all chunks of `package` found in `dir`, sorted.
    fn chunk_suffixes(&self, package: &Package, dir: &Path) -> io::Result<Vec<String>> {
        let prefix = format!("{}-", package.basename());
        let mut suffixes = Vec::new();
        for entry in fs::read_dir(dir)? {
            let name = entry?.file_name();
            if let Some(suffix) = name.to_str().and_then(|name| name.strip_prefix(&prefix)) {
                suffixes.push(suffix.to_string());
            }
        }
        suffixes.sort();
        Ok(suffixes)
    }
}

impl StageProvider for Splitter {
    fn contribute(&self, package: &Package, tmp_path: &Path) -> StageContribution {
        let prefix = tmp_path.join(format!("{}-", package.basename()));
        StageContribution {
            command: format!(
                "split -a {} -b {}m - {}",
                self.suffix_length,
                self.chunk_size,
                shell::quote_path(&prefix)
            ),
            extension: None,
        }
    }

    fn writes_output(&self) -> bool {
        true
    }

    /// Record the chunk suffixes, or restore the plain file name if the
    /// package fit into a single chunk.
    fn post_process(&self, package: &mut Package, tmp_path: &Path) -> io::Result<()> {
        let suffixes = self.chunk_suffixes(package, tmp_path)?;
        let first_suffix = "a".repeat(self.suffix_length);

        if suffixes == [first_suffix.as_str()] {
            let basename = package.basename();
            log::debug!(target: "splitter", "Package fits into one chunk, keeping it as {basename}");
            fs::rename(
                tmp_path.join(format!("{basename}-{first_suffix}")),
                tmp_path.join(&basename),
            )?;
        } else {
            log::info!(target: "splitter", "Package was split into {} chunks", suffixes.len());
            package.set_chunk_suffixes(suffixes);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn package() -> Package {
        let time = NaiveDate::from_ymd_opt(2026, 2, 3)
            .unwrap()
            .and_hms_opt(4, 5, 6)
            .unwrap();
        Package::new("job", time)
    }

    #[test]
    fn split_command() {
        let splitter = Splitter::new(250, 3);
        let contribution = splitter.contribute(&package(), Path::new("/tmp/backup"));
        assert_eq!(
            contribution.command,
            "split -a 3 -b 250m - '/tmp/backup/job.tar-'"
        );
        assert_eq!(contribution.extension, None);
    }

    #[test]
    fn single_chunk_is_renamed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("job.tar-aa"), "data").unwrap();
        let mut package = package();

        Splitter::new(1, 2)
            .post_process(&mut package, dir.path())
            .unwrap();

        assert!(package.chunk_suffixes().is_empty());
        assert_eq!(package.filenames(), vec!["job.tar"]);
        assert!(dir.path().join("job.tar").is_file());
        assert!(!dir.path().join("job.tar-aa").exists());
    }

    #[test]
    fn multiple_chunks_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        for suffix in ["ac", "aa", "ab"] {
            fs::write(dir.path().join(format!("job.tar-{suffix}")), "data").unwrap();
        }
        // chunks of other packages are ignored
        fs::write(dir.path().join("job.tar.enc-aa"), "data").unwrap();
        let mut package = package();

        Splitter::new(1, 2)
            .post_process(&mut package, dir.path())
            .unwrap();

        assert_eq!(package.chunk_suffixes(), ["aa", "ab", "ac"]);
        assert_eq!(
            package.filenames(),
            vec!["job.tar-aa", "job.tar-ab", "job.tar-ac"]
        );
    }

    #[test]
    fn defaults_from_config() {
        let splitter: Splitter = toml::from_str("").unwrap();
        assert_eq!(splitter, Splitter::default());
        let splitter: Splitter = toml::from_str("chunk_size = 10").unwrap();
        assert_eq!(splitter, Splitter::new(10, 3));
    }
}
