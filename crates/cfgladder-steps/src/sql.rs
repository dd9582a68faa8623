use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cfgladder_core::{report_step_failure, StepContext, UpgradeStep};

use crate::env_path::resolve_step_path;

/// Executes fixed statements through the run's shared database session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSql {
    statements: Vec<String>,
}

impl RunSql {
    pub fn new(statements: Vec<String>) -> Self {
        Self { statements }
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }
}

impl UpgradeStep for RunSql {
    fn name(&self) -> &str {
        "run-sql"
    }

    fn perform(&self, ctx: &mut StepContext<'_, '_>) -> i32 {
        let executed = ctx
            .resources
            .session(ctx.logger)
            .and_then(|session| session.execute_batch(&self.statements));
        match executed {
            Ok(()) => 0,
            Err(err) => report_step_failure(ctx.logger, "Failed to run sql", &err),
        }
    }
}

/// Applies a schema file as one batch through the shared session.
///
/// Relative paths resolve against the configuration root; `${NAME}` pulls in
/// environment variables such as `EPICS_ROOT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplySqlFile {
    path: PathBuf,
}

impl ApplySqlFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl UpgradeStep for ApplySqlFile {
    fn name(&self) -> &str {
        "apply-sql-file"
    }

    fn perform(&self, ctx: &mut StepContext<'_, '_>) -> i32 {
        let path = match resolve_step_path(ctx.storage.root(), &self.path) {
            Ok(path) => path,
            Err(err) => {
                return report_step_failure(ctx.logger, "Failed locating schema file", &err)
            }
        };
        if !path.is_file() {
            ctx.logger.error(&format!("Failed to open {}", path.display()));
            return cfgladder_core::STEP_FAILURE_CODE;
        }

        let applied = read_statements(&path).and_then(|statements| {
            ctx.logger.info(&format!("Applying DB schema from {}", path.display()));
            ctx.resources
                .session(ctx.logger)?
                .execute_batch(&statements)
        });
        match applied {
            Ok(()) => 0,
            Err(err) => report_step_failure(
                ctx.logger,
                &format!("Failed applying {}", path.display()),
                &err,
            ),
        }
    }
}

fn read_statements(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    Ok(split_sql_statements(&content))
}

/// Splits a schema script into statements. Lines starting with `--` or `#`
/// are dropped; a statement ends on a line whose last non-space character is
/// `;`. Trailing text without a terminator is discarded.
pub fn split_sql_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut statement = String::new();
    for line in script.lines() {
        if line.starts_with("--") || line.starts_with('#') {
            continue;
        }
        statement.push_str(line);
        statement.push('\n');
        if line.trim_end_matches(' ').ends_with(';') {
            statements.push(std::mem::take(&mut statement));
        }
    }
    statements
}
