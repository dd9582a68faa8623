use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cfgladder_core::RepositoryHandle;

use crate::git_ops::{git_stdout, run_git_command};

/// A git working copy driven through the `git` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRepository {
    root: PathBuf,
}

impl GitRepository {
    /// Opens the working copy that contains `path`, searching parent
    /// directories.
    pub fn discover(path: &Path) -> Result<Self> {
        let toplevel = git_stdout(path, &["rev-parse", "--show-toplevel"])
            .with_context(|| format!("{} is not under version control", path.display()))?;
        if toplevel.is_empty() {
            anyhow::bail!("{} is not under version control", path.display());
        }
        Ok(Self {
            root: PathBuf::from(toplevel),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn remote_url(&self, remote: &str) -> Result<String> {
        git_stdout(&self.root, &["remote", "get-url", remote])
    }

    pub fn set_remote_url(&self, remote: &str, url: &str) -> Result<()> {
        run_git_command(&self.root, &["remote", "set-url", remote, url])
    }

    /// Unix commit times of every commit touching `path`, newest first.
    pub fn commit_timestamps(&self, path: &Path) -> Result<Vec<i64>> {
        // Relative pathspec; the root may be reached through a symlink.
        let (directory, pathspec) = if path.is_dir() {
            (path.to_path_buf(), ".".to_string())
        } else {
            let parent = path.parent().unwrap_or(&self.root).to_path_buf();
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .with_context(|| format!("{} names no file", path.display()))?;
            (parent, name)
        };

        let output = git_stdout(&directory, &["log", "--format=%ct", "--", &pathspec])?;
        output
            .split_whitespace()
            .map(|stamp| {
                stamp
                    .parse::<i64>()
                    .with_context(|| format!("unexpected commit timestamp '{stamp}'"))
            })
            .collect()
    }
}

impl RepositoryHandle for GitRepository {
    fn stage_all(&self) -> Result<()> {
        run_git_command(&self.root, &["add", "-A"])
    }

    fn commit(&self, message: &str) -> Result<()> {
        run_git_command(&self.root, &["commit", "--allow-empty", "-m", message])
    }

    fn active_branch(&self) -> Result<String> {
        git_stdout(&self.root, &["symbolic-ref", "--short", "HEAD"])
            .context("HEAD is detached; check out a branch before upgrading")
    }

    fn create_tag(&self, name: &str, message: &str) -> Result<()> {
        run_git_command(&self.root, &["tag", "-a", "-f", "-m", message, name])
    }

    fn push_current_branch(&self) -> Result<()> {
        let branch = self.active_branch()?;
        run_git_command(&self.root, &["push", "origin", &branch])
    }
}
