use anyhow::{Context, Result};

pub const DEFAULT_COMMIT_PREFIX: &str = "Config Upgrade";

/// The version-control working copy that backs the configuration tree.
pub trait RepositoryHandle {
    fn stage_all(&self) -> Result<()>;

    fn commit(&self, message: &str) -> Result<()>;

    fn active_branch(&self) -> Result<String>;

    /// Creates an annotated tag, replacing any existing tag of the same name.
    fn create_tag(&self, name: &str, message: &str) -> Result<()>;

    fn push_current_branch(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// Checkpoint after a single step; the label is the version upgraded from.
    Intermediate,
    /// Closing checkpoint of a run; the label is the version reached.
    Final,
}

/// Commit, tag and push protocol applied after every state change.
pub struct RepositorySync<'a> {
    repository: &'a dyn RepositoryHandle,
    commit_prefix: String,
}

impl<'a> RepositorySync<'a> {
    pub fn new(repository: &'a dyn RepositoryHandle) -> Self {
        Self {
            repository,
            commit_prefix: DEFAULT_COMMIT_PREFIX.to_string(),
        }
    }

    pub fn with_commit_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.commit_prefix = prefix.into();
        self
    }

    pub fn commit_message(&self, label: &str, kind: SyncKind) -> String {
        match kind {
            SyncKind::Intermediate => format!("{} from {}", self.commit_prefix, label),
            SyncKind::Final => format!("{} to {}", self.commit_prefix, label),
        }
    }

    pub fn commit_tag_push(&self, label: &str, kind: SyncKind) -> Result<()> {
        let message = self.commit_message(label, kind);

        self.repository
            .stage_all()
            .context("repository-sync-failed: staging changes")?;
        self.repository
            .commit(&message)
            .with_context(|| format!("repository-sync-failed: committing '{message}'"))?;

        let branch = self
            .repository
            .active_branch()
            .context("repository-sync-failed: resolving active branch")?;
        let tag = tag_name(&branch, label, kind);
        self.repository
            .create_tag(&tag, &message)
            .with_context(|| format!("repository-sync-failed: tagging '{tag}'"))?;

        self.repository
            .push_current_branch()
            .with_context(|| format!("repository-sync-failed: pushing branch '{branch}'"))
    }
}

pub(crate) fn tag_name(branch: &str, label: &str, kind: SyncKind) -> String {
    match kind {
        SyncKind::Intermediate => format!("{branch}_{label}_upgrade"),
        SyncKind::Final => format!("{branch}_{label}"),
    }
}
