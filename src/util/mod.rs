//! Building blocks shared by the backup procedures.

pub mod pipeline;
pub mod retention;
pub mod shell;
