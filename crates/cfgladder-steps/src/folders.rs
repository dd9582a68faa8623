use std::path::PathBuf;

use anyhow::Result;
use cfgladder_core::{report_step_failure, Logger, StepContext, Storage, UpgradeStep};
use cfgladder_git::GitRepository;

/// Deletes folders from the tree. With a cutoff, any commit to one of the
/// folders after that Unix time aborts the step before anything is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveFolders {
    folders: Vec<PathBuf>,
    unless_committed_after: Option<i64>,
}

impl RemoveFolders {
    pub fn new(folders: Vec<PathBuf>) -> Self {
        Self {
            folders,
            unless_committed_after: None,
        }
    }

    pub fn unless_committed_after(mut self, cutoff: i64) -> Self {
        self.unless_committed_after = Some(cutoff);
        self
    }

    fn apply(&self, storage: &dyn Storage, logger: &dyn Logger) -> Result<usize> {
        let present = self
            .folders
            .iter()
            .filter(|folder| storage.is_dir(folder))
            .collect::<Vec<_>>();

        if let Some(cutoff) = self.unless_committed_after {
            for folder in &present {
                logger.info(&format!("Checking for recent commits in {}", folder.display()));
                let location = storage.root().join(folder);
                let repository = GitRepository::discover(&location)?;
                let newer = repository
                    .commit_timestamps(&location)?
                    .into_iter()
                    .any(|stamp| stamp > cutoff);
                if newer {
                    anyhow::bail!(
                        "{} changed after it was copied elsewhere; copy the folders ({}) again by \
                         hand, delete them from the settings repository and rerun the upgrade. \
                         No folders have been removed yet",
                        folder.display(),
                        self.folders
                            .iter()
                            .map(|folder| folder.display().to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                }
            }
        }

        for folder in &present {
            logger.info(&format!("Deleting {}", folder.display()));
            storage.remove_dir(folder)?;
        }
        Ok(present.len())
    }
}

impl UpgradeStep for RemoveFolders {
    fn name(&self) -> &str {
        "remove-folders"
    }

    fn perform(&self, ctx: &mut StepContext<'_, '_>) -> i32 {
        match self.apply(ctx.storage, ctx.logger) {
            Ok(_) => 0,
            Err(err) => report_step_failure(ctx.logger, "Failed removing folders", &err),
        }
    }
}

/// Logs `message` as an error when `path` exists, then carries on. For
/// changes that need an operator to finish by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarnIfPresent {
    path: PathBuf,
    message: String,
}

impl WarnIfPresent {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl UpgradeStep for WarnIfPresent {
    fn name(&self) -> &str {
        "warn-if-present"
    }

    fn perform(&self, ctx: &mut StepContext<'_, '_>) -> i32 {
        if ctx.storage.exists(&self.path) {
            ctx.logger.error(&format!("{} exists. {}", self.path.display(), self.message));
        }
        0
    }
}
