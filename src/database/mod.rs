//! Database dumps written into the staging directory of a trigger.
//!
//! - [MariaDb]: Compressed dump of a MariaDB/MySQL database.
//! - [CommandDump]: Output of an arbitrary dump command, e.g. `pg_dump`.

pub mod command;
pub mod mariadb;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error, From};

pub use command::{CommandDump, CommandDumpError};
pub use mariadb::{MariaDb, MariaDbError};

/// Directory below the staging directory holding all dumps.
pub const DUMP_DIR: &str = "databases";

/// Generic database dump.
pub trait Dump {
    /// Error that may happen while dumping.
    type Error;

    /// Dump the database into `dump_dir`, returns the written file.
    fn dump(&self, dump_dir: &Path) -> Result<PathBuf, Self::Error>;
}

#[derive(Debug, Display, Error, From)]
/// Errors dumping a configured [Database].
pub enum DatabaseError {
    #[display("Failed to create dump directory: {_0}")]
    DumpDir(io::Error),
    #[from]
    MariaDb(MariaDbError),
    #[from]
    Command(CommandDumpError),
}

/// Configured database of a model.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Database {
    MariaDb(MariaDb),
    Command(CommandDump),
}

impl Database {
    /// Dump into the `databases` directory below `staging_dir`.
    pub fn perform(&self, staging_dir: &Path) -> Result<PathBuf, DatabaseError> {
        let dump_dir = staging_dir.join(DUMP_DIR);
        fs::create_dir_all(&dump_dir).map_err(DatabaseError::DumpDir)?;

        let path = match self {
            Self::MariaDb(mariadb) => mariadb.dump(&dump_dir)?,
            Self::Command(command) => command.dump(&dump_dir)?,
        };
        Ok(path)
    }
}
