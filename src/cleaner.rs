//! Housekeeping of the temporary directory used while performing a trigger.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::encryptor::EXTENSIONS;
use crate::package::Package;

/// `true` if the entry `name` of the temporary directory belongs to `trigger`.
///
/// That is the staging directory `<trigger>` or a package file
/// `<trigger>.tar[.enc|.gpg][-<chunk suffix>]`.
pub fn belongs_to(name: &str, trigger: &str) -> bool {
    if name == trigger {
        return true;
    }
    let Some(mut rest) = name
        .strip_prefix(trigger)
        .and_then(|rest| rest.strip_prefix(".tar"))
    else {
        return false;
    };
    while let Some(stripped) = EXTENSIONS.iter().find_map(|ext| rest.strip_prefix(ext)) {
        rest = stripped;
    }
    match rest.strip_prefix('-') {
        Some(suffix) => !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_lowercase()),
        None => rest.is_empty(),
    }
}

/// Files and directories in `tmp_path` belonging to `trigger`.
pub fn leftovers(tmp_path: &Path, trigger: &str) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    match fs::read_dir(tmp_path) {
        Ok(entries) => {
            for entry in entries {
                let entry = entry?;
                if belongs_to(&entry.file_name().to_string_lossy(), trigger) {
                    found.push(entry.path());
                }
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    found.sort();
    Ok(found)
}

fn remove(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Remove leftovers of a previous run and create a fresh staging directory.
pub fn prepare(tmp_path: &Path, trigger: &str) -> io::Result<PathBuf> {
    let leftovers = leftovers(tmp_path, trigger)?;
    if !leftovers.is_empty() {
        log::warn!(
            target: "cleaner",
            "Cleaning up files left by a previous run of '{trigger}':\n  {}",
            display_paths(&leftovers)
        );
        for path in &leftovers {
            remove(path)?;
        }
    }

    let staging_dir = tmp_path.join(trigger);
    fs::create_dir_all(&staging_dir)?;
    Ok(staging_dir)
}

/// Remove the staging directory once the package is built.
pub fn remove_packaging(tmp_path: &Path, trigger: &str) -> io::Result<()> {
    log::debug!(target: "cleaner", "Removing staging directory of '{trigger}'");
    fs::remove_dir_all(tmp_path.join(trigger))
}

/// Remove the package files once every storage is done.
pub fn remove_package(tmp_path: &Path, package: &Package) -> io::Result<()> {
    for filename in package.filenames() {
        log::debug!(target: "cleaner", "Removing {filename}");
        fs::remove_file(tmp_path.join(filename))?;
    }
    Ok(())
}

pub(crate) fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join("\n  ")
}
