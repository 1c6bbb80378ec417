//! Retention cycling of the packages stored at one destination.
//!
//! Whenever a storage transferred a new package, the packages that fell out
//! of its keep policy are removed from the destination and the history is
//! rewritten with the packages that remain.

use chrono::NaiveDateTime;
use derive_more::{Display, Error, From};

use super::history::{HistoryError, HistoryKey, HistoryStore};
use super::Storage;
use crate::package::Package;
use crate::util::retention::KeepPolicy;

#[derive(Debug, Display, Error, From)]
/// Errors aborting a cycling run.
pub enum CycleError {
    /// The retention history couldn't be loaded or saved.
    #[display("Cycling failed: {_0}")]
    History(HistoryError),
}

/// Outcome of the retention decision, both lists newest first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cycled {
    pub kept: Vec<Package>,
    pub removed: Vec<Package>,
}

/// Decide which packages of `history` fall out of `keep` once `package` was stored.
///
/// `package` itself is always kept. A history entry with the same time as
/// `package` is replaced by it. Entries whose time can't be parsed are kept
/// under a [KeepPolicy::Since].
pub fn select(package: &Package, keep: KeepPolicy, history: Vec<Package>) -> Cycled {
    let mut candidates: Vec<Package> = history
        .into_iter()
        .filter(|old| old.time() != package.time())
        .collect();
    candidates.push(package.clone());
    candidates.sort_by(|a, b| b.time().cmp(a.time()));

    let (mut kept, mut removed): (Vec<_>, Vec<_>) = match keep {
        KeepPolicy::Count(count) => {
            let count = count.max(1);
            let removed = if candidates.len() > count {
                candidates.split_off(count)
            } else {
                Vec::new()
            };
            (candidates, removed)
        }
        KeepPolicy::Since(threshold) => candidates
            .into_iter()
            .partition(|candidate| !is_older(candidate, threshold)),
    };

    // a new package dated before the newest history entry still stays
    if let Some(pos) = removed.iter().position(|old| old.time() == package.time()) {
        kept.push(removed.remove(pos));
        kept.sort_by(|a, b| b.time().cmp(a.time()));
    }

    Cycled { kept, removed }
}

fn is_older(package: &Package, threshold: NaiveDateTime) -> bool {
    match package.datetime() {
        Some(time) => time < threshold,
        None => {
            log::warn!(
                target: "storage::cycler",
                "Keeping package of '{}' with unreadable time '{}'",
                package.trigger(),
                package.time()
            );
            false
        }
    }
}

/// Cycle the packages stored by `storage` after `package` was transferred.
///
/// Failing to remove a package is logged and doesn't stop the cycling, the
/// package is dropped from the history regardless.
pub fn cycle<S, H>(
    storage: &S,
    package: &Package,
    keep: KeepPolicy,
    store: &H,
    key: &HistoryKey,
) -> Result<Cycled, CycleError>
where
    S: Storage + ?Sized,
    H: HistoryStore + ?Sized,
{
    log::info!(target: "storage::cycler", "Cycling started for {} storage", storage.name());

    let history = store.load(key)?;
    let cycled = select(package, keep, history);

    for old in &cycled.removed {
        if old.no_cycle {
            log::info!(
                target: "storage::cycler",
                "Package of '{}' dated {} is excluded from cycling, keeping its files",
                old.trigger(),
                old.time()
            );
            continue;
        }

        log::info!(target: "storage::cycler", "Removing package of '{}' dated {}", old.trigger(), old.time());
        if let Err(e) = storage.remove(old) {
            log::warn!(
                target: "storage::cycler",
                "There was a problem removing the following package:\n  \
                 Trigger: {} :: Dated: {}\n  \
                 Following files should be manually removed:\n  {}\n  \
                 Reason: {e}",
                old.trigger(),
                old.time(),
                old.filenames().join("\n  ")
            );
        }
    }

    store.save(key, &cycled.kept)?;
    Ok(cycled)
}
