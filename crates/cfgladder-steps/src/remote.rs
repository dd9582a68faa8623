use std::path::PathBuf;

use anyhow::Result;
use cfgladder_core::{report_step_failure, StepContext, UpgradeStep};
use cfgladder_git::GitRepository;

/// Points a remote of another working copy (for example a shared
/// calibration repository) at a new URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRemoteUrl {
    repository: PathBuf,
    remote: String,
    url: String,
}

impl SetRemoteUrl {
    pub fn new(
        repository: impl Into<PathBuf>,
        remote: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            remote: remote.into(),
            url: url.into(),
        }
    }

    fn apply(&self, ctx: &StepContext<'_, '_>) -> Result<()> {
        let location = if self.repository.is_absolute() {
            self.repository.clone()
        } else {
            ctx.storage.root().join(&self.repository)
        };
        let repository = GitRepository::discover(&location)?;
        repository.set_remote_url(&self.remote, &self.url)?;
        ctx.logger.info(&format!(
            "Remote '{}' of {} now points at {}",
            self.remote,
            repository.root().display(),
            self.url
        ));
        Ok(())
    }
}

impl UpgradeStep for SetRemoteUrl {
    fn name(&self) -> &str {
        "set-remote-url"
    }

    fn perform(&self, ctx: &mut StepContext<'_, '_>) -> i32 {
        match self.apply(ctx) {
            Ok(()) => 0,
            Err(err) => report_step_failure(
                ctx.logger,
                &format!("Failed updating remote '{}'", self.remote),
                &err,
            ),
        }
    }
}
