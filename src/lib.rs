//! Library to package backups and ship them to storages.
//!
//! A [Model](model::Model) describes one backup job identified by its
//! trigger. Performing it dumps the configured databases and archives into a
//! staging directory, packages that directory into a single tar stream which
//! is optionally encrypted and split (see [packager]), transfers the package
//! to every configured storage and cycles old packages out of each storage
//! according to its keep setting (see [storage::cycler]).

#![forbid(unsafe_code)]

pub mod archive;
pub mod cleaner;
pub mod cli;
pub mod config;
pub mod database;
pub mod encryptor;
pub mod model;
pub mod package;
pub mod packager;
pub mod splitter;
pub mod storage;
pub mod util;
