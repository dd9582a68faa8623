use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cfgladder_core::{report_step_failure, Logger, StepContext, Storage, UpgradeStep};
use regex::{NoExpand, Regex};

use crate::config_tree::files_with_extension;
use crate::env_path::resolve_step_path;

/// Appends `macros` to every `dbLoadRecords` line in the tree's `.cmd` files
/// that loads a database generated from `template`.
///
/// Generated databases are found by scanning `*.substitutions` files under
/// `substitutions_root` for the template name. Lines that already set any of
/// the macros are left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddDbLoadMacros {
    substitutions_root: PathBuf,
    template: String,
    macros: String,
}

impl AddDbLoadMacros {
    pub fn new(
        substitutions_root: impl Into<PathBuf>,
        template: impl Into<String>,
        macros: impl Into<String>,
    ) -> Self {
        Self {
            substitutions_root: substitutions_root.into(),
            template: template.into(),
            macros: macros.into(),
        }
    }

    fn databases(&self, storage: &dyn Storage) -> Result<Vec<String>> {
        let root = resolve_step_path(storage.root(), &self.substitutions_root)?;
        if !storage.is_dir(&root) {
            anyhow::bail!("{} is not a directory", root.display());
        }

        let mut databases = Vec::new();
        for path in files_with_extension(storage, &root, "substitutions")? {
            let uses_template = storage
                .read_lines(&path)?
                .iter()
                .any(|line| line.contains(self.template.as_str()));
            if uses_template {
                databases.push(database_name(&path));
            }
        }
        Ok(databases)
    }

    fn apply(&self, storage: &dyn Storage, logger: &dyn Logger) -> Result<usize> {
        let databases = self.databases(storage)?;
        logger.info(&format!("Database files using {}: {}", self.template, databases.join(" ")));

        let loads = databases
            .iter()
            .map(|database| Regex::new(&format!(r#"[\\/"]{}"#, regex::escape(database))))
            .collect::<Result<Vec<_>, _>>()
            .context("invalid database pattern")?;
        let terminator = Regex::new(r#",?"\)$"#).context("invalid terminator pattern")?;
        let replacement = format!(",{}\")", self.macros);
        let keys = macro_keys(&self.macros);

        let mut failed = 0;
        for path in files_with_extension(storage, Path::new(""), "cmd")? {
            logger.info(&format!("Checking '{}'", path.display()));
            let lines = storage.read_lines(&path)?;
            let mut updated = Vec::with_capacity(lines.len());
            for line in &lines {
                let needs_macros = line.contains("dbLoadRecords")
                    && loads.iter().any(|load| load.is_match(line))
                    && !keys.iter().any(|key| line.contains(key.as_str()));
                if !needs_macros {
                    updated.push(line.clone());
                    continue;
                }

                logger.info(&format!("Adding macros to {line}"));
                let changed = terminator.replace(line, NoExpand(&replacement)).into_owned();
                if changed == *line {
                    logger.error(&format!(
                        "Failed to modify {line}, check to see if it needs to be manually changed."
                    ));
                    failed += 1;
                }
                updated.push(changed);
            }
            if updated != lines {
                storage.write_lines(&path, &updated)?;
            }
        }
        Ok(failed)
    }
}

impl UpgradeStep for AddDbLoadMacros {
    fn name(&self) -> &str {
        "add-db-load-macros"
    }

    fn perform(&self, ctx: &mut StepContext<'_, '_>) -> i32 {
        match self.apply(ctx.storage, ctx.logger) {
            Ok(0) => 0,
            Ok(_) => cfgladder_core::STEP_FAILURE_CODE,
            Err(err) => report_step_failure(
                ctx.logger,
                &format!("Failed adding macros to {} loads", self.template),
                &err,
            ),
        }
    }
}

/// `name.substitutions` (or `name.x.substitutions`) expands to `name.db`.
fn database_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = file_name.split('.').next().unwrap_or_default();
    format!("{stem}.db")
}

/// Macro names of a `NAME=value,OTHER=value` list.
fn macro_keys(macros: &str) -> Vec<String> {
    macros
        .split(',')
        .filter_map(|item| item.split('=').next())
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .collect()
}
