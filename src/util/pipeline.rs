//! Run a chain of shell commands as one OS pipeline.
//!
//! Every stage is spawned as its own child process and the stdout of stage
//! *i* is connected to the stdin of stage *i + 1* with an OS pipe. Because
//! each stage is a separate child its real exit status is available, so a
//! failure in the middle of `a | b | c` is never masked by the status of `c`.

use std::fmt;
use std::io::{self, Read};
use std::process::{Child, ChildStdout, ExitStatus, Stdio};
use std::thread;

use derive_more::{Display, Error};

use super::shell;

#[derive(Debug, Display, Error)]
/// The pipeline could not be executed at all.
pub enum PipelineError {
    /// A stage process could not be spawned.
    #[display("Failed to spawn pipeline stage '{command}': {source}")]
    Spawn {
        command: String,
        source: io::Error,
    },
    /// Waiting on a stage process failed.
    #[display("Failed to wait on pipeline stage '{command}': {source}")]
    Wait {
        command: String,
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
struct Stage {
    command: String,
    accepted: Vec<i32>,
}

/// A stage that exited with a status outside its accepted exit codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    /// Position of the stage in the pipeline.
    pub index: usize,
    /// Name of the utility run by the stage.
    pub name: String,
    /// Exit code, [None] if the stage was terminated by a signal.
    pub code: Option<i32>,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "'{}' returned exit code: {code}", self.name),
            None => write!(f, "'{}' was terminated by a signal", self.name),
        }
    }
}

/// Ordered list of shell commands executed as a single pipeline.
#[derive(Debug, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
    failures: Vec<StageFailure>,
    stderr: String,
    stdout: String,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage that succeeds on any of the `accepted` exit codes.
    pub fn add(&mut self, command: impl Into<String>, accepted: &[i32]) {
        self.stages.push(Stage {
            command: command.into(),
            accepted: accepted.to_vec(),
        });
    }

    /// Append a stage that only succeeds on exit code `0`.
    pub fn append(&mut self, command: impl Into<String>) {
        self.add(command, &[0]);
    }

    /// Command lines of all stages in pipe order.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|stage| stage.command.as_str())
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Execute all stages and block until every one of them terminated.
    ///
    /// Stage failures don't produce an error, inspect [success](Self::success)
    /// and [error_messages](Self::error_messages) instead.
    pub fn run(&mut self) -> Result<(), PipelineError> {
        self.failures.clear();
        self.stderr.clear();
        self.stdout.clear();

        if self.stages.is_empty() {
            log::debug!(target: "pipeline", "Nothing to run in empty pipeline");
            return Ok(());
        }
        log::debug!(target: "pipeline", "Running: {self}");

        let mut children = self.spawn()?;
        let last = children.len() - 1;
        let stderr_pipes: Vec<_> = children.iter_mut().map(|c| c.stderr.take()).collect();
        let stdout_pipe = children[last].stdout.take();

        let (statuses, stderr_parts, stdout) = thread::scope(|scope| {
            // drain the pipes while waiting, a full pipe buffer would block the stage
            let stderr_readers: Vec<_> = stderr_pipes
                .into_iter()
                .map(|pipe| scope.spawn(move || read_lossy(pipe)))
                .collect();
            let stdout_reader = scope.spawn(move || read_lossy(stdout_pipe));

            let statuses: Vec<io::Result<ExitStatus>> =
                children.iter_mut().map(Child::wait).collect();

            let stderr_parts: Vec<String> = stderr_readers
                .into_iter()
                .map(|reader| reader.join().unwrap_or_default())
                .collect();
            let stdout = stdout_reader.join().unwrap_or_default();

            (statuses, stderr_parts, stdout)
        });

        for (index, (stage, status)) in self.stages.iter().zip(statuses).enumerate() {
            let status = status.map_err(|source| PipelineError::Wait {
                command: stage.command.clone(),
                source,
            })?;
            let code = status.code();
            if !code.is_some_and(|code| stage.accepted.contains(&code)) {
                self.failures.push(StageFailure {
                    index,
                    name: shell::command_name(&stage.command),
                    code,
                });
            }
        }

        self.stderr = self
            .stages
            .iter()
            .zip(stderr_parts)
            .filter(|(_, part)| !part.trim().is_empty())
            .map(|(stage, part)| {
                format!("[{}] {}", shell::command_name(&stage.command), part.trim_end())
            })
            .collect::<Vec<_>>()
            .join("\n");
        self.stdout = stdout;

        if !self.stdout.trim().is_empty() {
            log::warn!(
                target: "pipeline",
                "Last pipeline stage unexpectedly wrote to stdout:\n{}",
                self.stdout.trim_end()
            );
        }
        if self.success() && !self.stderr.is_empty() {
            log::warn!(target: "pipeline", "{}", self.stderr_messages());
        }

        Ok(())
    }

    fn spawn(&self) -> Result<Vec<Child>, PipelineError> {
        let mut children: Vec<Child> = Vec::with_capacity(self.stages.len());
        let mut upstream: Option<ChildStdout> = None;

        for stage in &self.stages {
            let stdin = match upstream.take() {
                Some(stdout) => Stdio::from(stdout),
                None => Stdio::null(),
            };

            let spawned = shell::command_for_script(&stage.command)
                .stdin(stdin)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn();

            let mut child = match spawned {
                Ok(child) => child,
                Err(source) => {
                    for mut child in children {
                        let _ = child.kill();
                        let _ = child.wait();
                    }
                    return Err(PipelineError::Spawn {
                        command: stage.command.clone(),
                        source,
                    });
                }
            };
            upstream = child.stdout.take();
            children.push(child);
        }

        // the last stage keeps its stdout so it can be checked for stray output
        if let (Some(stdout), Some(last)) = (upstream, children.last_mut()) {
            last.stdout = Some(stdout);
        }

        Ok(children)
    }

    /// `true` if no stage exited with a status outside its accepted codes.
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Stages that failed during the last [run](Self::run).
    pub fn failures(&self) -> &[StageFailure] {
        &self.failures
    }

    /// Stderr of all stages of the last run, prefixed with the stage name.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Stdout of the last stage, which should have redirected its output.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    fn stderr_messages(&self) -> String {
        format!("Pipeline STDERR Messages:\n\n{}\n", self.stderr)
    }

    /// Report of captured stderr and every failed stage.
    pub fn error_messages(&self) -> String {
        let mut messages = String::new();
        if !self.stderr.is_empty() {
            messages.push_str(&self.stderr_messages());
        }
        messages.push_str("The following system errors were returned:");
        for failure in &self.failures {
            messages.push('\n');
            messages.push_str(&failure.to_string());
        }
        messages
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let commands: Vec<_> = self.commands().collect();
        write!(f, "{}", commands.join(" | "))
    }
}

fn read_lossy(pipe: Option<impl Read>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}
