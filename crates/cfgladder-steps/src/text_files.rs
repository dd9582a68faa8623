use std::path::PathBuf;

use anyhow::Result;
use cfgladder_core::{report_step_failure, StepContext, Storage, UpgradeStep};

use crate::env_path::expand_env_path;

/// Makes sure each of `lines` appears in a text file, appending the missing
/// ones. A missing file is created from `initial`, or from `lines` when
/// `initial` is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureLines {
    path: PathBuf,
    lines: Vec<String>,
    initial: Vec<String>,
}

impl EnsureLines {
    pub fn new(path: impl Into<PathBuf>, lines: Vec<String>) -> Self {
        Self {
            path: path.into(),
            lines,
            initial: Vec::new(),
        }
    }

    pub fn with_initial(mut self, initial: Vec<String>) -> Self {
        self.initial = initial;
        self
    }

    fn apply(&self, storage: &dyn Storage) -> Result<usize> {
        let path = expand_env_path(&self.path)?;
        if !storage.exists(&path) {
            let content = if self.initial.is_empty() {
                &self.lines
            } else {
                &self.initial
            };
            storage.write_lines(&path, content)?;
            return Ok(content.len());
        }

        let mut content = storage.read_lines(&path)?;
        let missing = self
            .lines
            .iter()
            .filter(|line| !content.iter().any(|present| present == line.trim_end()))
            .cloned()
            .collect::<Vec<_>>();
        if missing.is_empty() {
            return Ok(0);
        }
        let added = missing.len();
        content.extend(missing);
        storage.write_lines(&path, &content)?;
        Ok(added)
    }
}

impl UpgradeStep for EnsureLines {
    fn name(&self) -> &str {
        "ensure-lines"
    }

    fn perform(&self, ctx: &mut StepContext<'_, '_>) -> i32 {
        match self.apply(ctx.storage) {
            Ok(added) => {
                ctx.logger.info(&format!("{}: {added} line(s) added", self.path.display()));
                0
            }
            Err(err) => report_step_failure(
                ctx.logger,
                &format!("Failed updating {}", self.path.display()),
                &err,
            ),
        }
    }
}

/// Appends `lines` to a text file, creating it when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendLines {
    path: PathBuf,
    lines: Vec<String>,
}

impl AppendLines {
    pub fn new(path: impl Into<PathBuf>, lines: Vec<String>) -> Self {
        Self {
            path: path.into(),
            lines,
        }
    }

    fn apply(&self, storage: &dyn Storage) -> Result<()> {
        let path = expand_env_path(&self.path)?;
        let mut content = if storage.exists(&path) {
            storage.read_lines(&path)?
        } else {
            Vec::new()
        };
        content.extend(self.lines.iter().cloned());
        storage.write_lines(&path, &content)
    }
}

impl UpgradeStep for AppendLines {
    fn name(&self) -> &str {
        "append-lines"
    }

    fn perform(&self, ctx: &mut StepContext<'_, '_>) -> i32 {
        match self.apply(ctx.storage) {
            Ok(()) => {
                ctx.logger.info(&format!(
                    "Appended {} line(s) to {}",
                    self.lines.len(),
                    self.path.display()
                ));
                0
            }
            Err(err) => report_step_failure(
                ctx.logger,
                &format!("Failed appending to {}", self.path.display()),
                &err,
            ),
        }
    }
}

/// Replaces every occurrence of `from` with `to` in a text file. A missing
/// file leaves nothing to change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceText {
    path: PathBuf,
    from: String,
    to: String,
}

impl ReplaceText {
    pub fn new(path: impl Into<PathBuf>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    fn apply(&self, storage: &dyn Storage) -> Result<Option<usize>> {
        let path = expand_env_path(&self.path)?;
        if !storage.exists(&path) {
            return Ok(None);
        }

        let mut replaced = 0;
        let content = storage
            .read_lines(&path)?
            .into_iter()
            .map(|line| {
                if line.contains(self.from.as_str()) {
                    replaced += 1;
                    line.replace(self.from.as_str(), &self.to)
                } else {
                    line
                }
            })
            .collect::<Vec<_>>();
        if replaced > 0 {
            storage.write_lines(&path, &content)?;
        }
        Ok(Some(replaced))
    }
}

impl UpgradeStep for ReplaceText {
    fn name(&self) -> &str {
        "replace-text"
    }

    fn perform(&self, ctx: &mut StepContext<'_, '_>) -> i32 {
        match self.apply(ctx.storage) {
            Ok(Some(replaced)) => {
                ctx.logger.info(&format!(
                    "Replaced '{}' on {replaced} line(s) of {}",
                    self.from,
                    self.path.display()
                ));
                0
            }
            Ok(None) => {
                ctx.logger.info(&format!("{} not found, nothing to change", self.path.display()));
                0
            }
            Err(err) => report_step_failure(
                ctx.logger,
                &format!("Failed changing {}", self.path.display()),
                &err,
            ),
        }
    }
}
