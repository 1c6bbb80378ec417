//! Build the final backup artifact(s) of a trigger.
//!
//! The staging directory is streamed through `tar`, then through every
//! configured [StageProvider] (encryption first, splitting last) and finally
//! written to `<tmp_path>/<basename>`, unless a provider writes the output
//! files itself.

use std::io;
use std::path::Path;

use derive_more::{Display, Error, From};

use crate::package::Package;
use crate::util::pipeline::{Pipeline, PipelineError};
use crate::util::shell;

#[derive(Debug, Display, Error, From)]
/// Errors while creating a [Package].
pub enum PackageError {
    /// The packaging pipeline couldn't be run.
    #[display("Failed to run the packaging pipeline: {_0}")]
    #[from]
    Pipeline(PipelineError),
    /// At least one stage of the packaging pipeline failed.
    #[display("Failed to create backup package\n{_0}")]
    Failed(#[error(ignore)] String),
    /// Inspecting or renaming the packaged files failed.
    #[display("Post-processing of the package failed: {_0}")]
    PostProcess(io::Error),
}

/// Command contributed to the packaging pipeline by a [StageProvider].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageContribution {
    /// Filter command reading the package stream on stdin.
    pub command: String,
    /// Extension appended to the package, e.g. `.enc`.
    pub extension: Option<String>,
}

/// An optional stage of the packaging pipeline.
pub trait StageProvider {
    /// Command of this stage.
    ///
    /// Extensions contributed by earlier stages are already part of `package`.
    fn contribute(&self, package: &Package, tmp_path: &Path) -> StageContribution;

    /// `true` if the stage writes the output files itself instead of stdout.
    fn writes_output(&self) -> bool {
        false
    }

    /// Runs after the pipeline finished successfully.
    fn post_process(&self, _package: &mut Package, _tmp_path: &Path) -> io::Result<()> {
        Ok(())
    }
}

/// Composes and runs the packaging pipeline.
pub struct Packager<'a> {
    tmp_path: &'a Path,
    filters: Vec<&'a dyn StageProvider>,
    output: Option<&'a dyn StageProvider>,
}

impl<'a> Packager<'a> {
    /// Packager for the staging directory `<tmp_path>/<trigger>`.
    pub fn new(tmp_path: &'a Path) -> Self {
        Self {
            tmp_path,
            filters: Vec::new(),
            output: None,
        }
    }

    /// Add an optional stage.
    ///
    /// Filter stages run in the order they were added. A stage that
    /// [writes its own output](StageProvider::writes_output) always runs
    /// last, there can only be one of them.
    pub fn with_stage(mut self, stage: &'a dyn StageProvider) -> Self {
        if !stage.writes_output() {
            self.filters.push(stage);
        } else if self.output.replace(stage).is_some() {
            log::warn!(target: "packager", "Replacing the previously added output stage");
        }
        self
    }

    fn stages(&self) -> impl Iterator<Item = &'a dyn StageProvider> + '_ {
        self.filters.iter().copied().chain(self.output)
    }

    /// Add `stage` if it is configured.
    pub fn with_optional_stage<S: StageProvider>(self, stage: Option<&'a S>) -> Self {
        match stage {
            Some(stage) => self.with_stage(stage),
            None => self,
        }
    }

    /// Build the packaging pipeline, updating the extension of `package`.
    pub fn pipeline(&self, package: &mut Package) -> Pipeline {
        let mut pipeline = Pipeline::new();
        pipeline.append(format!(
            "tar -cf - -C {} {}",
            shell::quote_path(self.tmp_path),
            shell::quote(package.trigger())
        ));

        for stage in self.stages() {
            let contribution = stage.contribute(package, self.tmp_path);
            pipeline.append(contribution.command);
            if let Some(extension) = contribution.extension {
                package.push_extension(&extension);
            }
        }

        if self.output.is_none() {
            let destination = self.tmp_path.join(package.basename());
            pipeline.append(format!("cat > {}", shell::quote_path(&destination)));
        }

        pipeline
    }

    /// Package the staging directory of `package`'s trigger.
    pub fn package(&self, package: &mut Package) -> Result<(), PackageError> {
        log::info!(target: "packager", "Packaging the backup files for '{}'", package.trigger());

        let mut pipeline = self.pipeline(package);
        pipeline.run()?;
        if !pipeline.success() {
            return Err(PackageError::Failed(pipeline.error_messages()));
        }

        for stage in self.stages() {
            stage
                .post_process(package, self.tmp_path)
                .map_err(PackageError::PostProcess)?;
        }

        log::info!(target: "packager", "Packaging complete: {}", package.filenames().join(", "));
        Ok(())
    }
}
