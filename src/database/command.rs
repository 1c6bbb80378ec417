//! Implements dumps produced by arbitrary commands using [CommandDump].

use std::path::{Path, PathBuf};

use derive_more::{Display, Error, From};

use super::Dump;
use crate::util::pipeline::{Pipeline, PipelineError};
use crate::util::shell;

#[derive(Debug, Display, Error, From)]
/// Errors on running a [CommandDump].
pub enum CommandDumpError {
    #[display("Failed to run dump command: {_0}")]
    #[from]
    Pipeline(PipelineError),
    #[display("Dump '{name}' failed\n{messages}")]
    Failed { name: String, messages: String },
}

/// Stores the stdout of `command` as `<name>` (or `<name>.gz` when compressed).
///
/// ```toml
/// [[model.database]]
/// type = "command"
/// name = "app.pgdump"
/// command = "pg_dump --format=custom app"
/// compress = false
/// ```
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CommandDump {
    pub name: String,
    pub command: String,
    #[serde(default = "default_compress")]
    pub compress: bool,
}

fn default_compress() -> bool {
    true
}

impl CommandDump {
    fn filename(&self) -> String {
        if self.compress {
            format!("{}.gz", self.name)
        } else {
            self.name.clone()
        }
    }

    fn pipeline(&self, path: &Path) -> Pipeline {
        let mut pipeline = Pipeline::new();
        pipeline.append(self.command.as_str());
        if self.compress {
            pipeline.append("gzip");
        }
        pipeline.append(format!("cat > {}", shell::quote_path(path)));
        pipeline
    }
}

impl Dump for CommandDump {
    type Error = CommandDumpError;

    fn dump(&self, dump_dir: &Path) -> Result<PathBuf, Self::Error> {
        log::info!(target: "database::command", "Create dump '{}'", self.name);
        let path = dump_dir.join(self.filename());

        let mut pipeline = self.pipeline(&path);
        pipeline.run()?;
        if !pipeline.success() {
            return Err(CommandDumpError::Failed {
                name: self.name.clone(),
                messages: pipeline.error_messages(),
            });
        }

        log::info!(target: "database::command", "Finished dump '{}'", self.name);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn uncompressed_dump() {
        let dir = tempfile::tempdir().unwrap();
        let dump = CommandDump {
            name: "users.csv".into(),
            command: "printf 'id,name\\n1,root\\n'".into(),
            compress: false,
        };

        let path = dump.dump(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("users.csv"));
        assert_eq!(fs::read_to_string(path).unwrap(), "id,name\n1,root\n");
    }

    #[test]
    fn compressed_dump() {
        let dir = tempfile::tempdir().unwrap();
        let dump: CommandDump =
            toml::from_str("name = \"app.sql\"\ncommand = \"echo select 1\"").unwrap();
        assert!(dump.compress);

        let path = dump.dump(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("app.sql.gz"));
        assert!(path.is_file());
    }

    #[test]
    fn failing_dump_command() {
        let dir = tempfile::tempdir().unwrap();
        let dump = CommandDump {
            name: "broken".into(),
            command: "pg_dump_that_does_not_exist app".into(),
            compress: true,
        };

        let err = dump.dump(dir.path()).unwrap_err();
        let CommandDumpError::Failed { messages, .. } = err else {
            panic!("unexpected error: {err}");
        };
        assert!(messages.contains("'pg_dump_that_does_not_exist' returned exit code: 127"));
        assert!(!messages.contains("'gzip'"));
    }
}
