use std::path::PathBuf;

use anyhow::{Context, Result};
use cfgladder_core::{report_step_failure, Logger, StepContext, Storage, UpgradeStep};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::env_path::expand_env_path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbField {
    pub name: String,
    pub value: String,
}

impl DbField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Field edits for one record. `add` only adds fields the record lacks;
/// `set` only changes fields the record already has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEdit {
    pub record: String,
    #[serde(default)]
    pub add: Vec<DbField>,
    #[serde(default)]
    pub set: Vec<DbField>,
}

/// Edits records of an EPICS database file in place. Lines outside the
/// edited fields, comments included, are kept as they are.
///
/// Every listed record is edited that can be; a record missing from the file
/// fails the step after the others are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDbRecords {
    path: PathBuf,
    edits: Vec<RecordEdit>,
}

impl EditDbRecords {
    pub fn new(path: impl Into<PathBuf>, edits: Vec<RecordEdit>) -> Self {
        Self {
            path: path.into(),
            edits,
        }
    }

    fn apply(&self, storage: &dyn Storage, logger: &dyn Logger) -> Result<Vec<String>> {
        let path = expand_env_path(&self.path)?;
        let mut lines = storage
            .read_lines(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;

        let mut missing = Vec::new();
        for edit in &self.edits {
            match find_record(&lines, &edit.record)? {
                Some((start, end)) => {
                    apply_edit(&mut lines, start, end, edit)?;
                    logger.info(&format!("Updated record {}", edit.record));
                }
                None => {
                    logger.error(&format!(
                        "Record {} not found in {}",
                        edit.record,
                        path.display()
                    ));
                    missing.push(edit.record.clone());
                }
            }
        }

        storage.write_lines(&path, &lines)?;
        Ok(missing)
    }
}

impl UpgradeStep for EditDbRecords {
    fn name(&self) -> &str {
        "edit-db-records"
    }

    fn perform(&self, ctx: &mut StepContext<'_, '_>) -> i32 {
        match self.apply(ctx.storage, ctx.logger) {
            Ok(missing) if missing.is_empty() => 0,
            Ok(_) => cfgladder_core::STEP_FAILURE_CODE,
            Err(err) => report_step_failure(
                ctx.logger,
                &format!("Failed editing {}", self.path.display()),
                &err,
            ),
        }
    }
}

/// Line range of `record(type, "name") {` through its closing brace.
fn find_record(lines: &[String], record: &str) -> Result<Option<(usize, usize)>> {
    let header = Regex::new(&format!(
        r#"^\s*record\(.+, ["']{}["']\)\s*\{{"#,
        regex::escape(record)
    ))
    .context("invalid record pattern")?;
    // A closing brace outside comments; `$(MACRO=a#b)` defaults may hold a `#`.
    let closing = Regex::new(r"^([^#]|(\$\(.*=.*#.*\)))*}.*$").context("invalid closing pattern")?;

    let Some(start) = lines.iter().position(|line| header.is_match(line)) else {
        return Ok(None);
    };
    Ok(lines[start..]
        .iter()
        .position(|line| closing.is_match(line))
        .map(|offset| (start, start + offset)))
}

fn apply_edit(lines: &mut Vec<String>, start: usize, end: usize, edit: &RecordEdit) -> Result<()> {
    for field in &edit.set {
        let pattern = field_pattern(&field.name)?;
        for line in &mut lines[start..=end] {
            let Some(captures) = pattern.captures(line.as_str()) else {
                continue;
            };
            let old = captures[2].to_string();
            *line = line.replacen(&format!("\"{old}\""), &format!("\"{}\"", field.value), 1);
            break;
        }
    }

    let any_field = Regex::new(r"^\s*field\(").context("invalid field pattern")?;
    let mut end = end;
    for field in &edit.add {
        let pattern = field_pattern(&field.name)?;
        if lines[start..=end].iter().any(|line| pattern.is_match(line)) {
            continue;
        }
        // New fields go after the last existing one, ahead of any info lines.
        let insert_at = lines[start..end]
            .iter()
            .rposition(|line| any_field.is_match(line))
            .map(|offset| start + offset + 1)
            .unwrap_or(end);
        lines.insert(insert_at, format!("    field({}, \"{}\")", field.name, field.value));
        end += 1;
    }
    Ok(())
}

fn field_pattern(name: &str) -> Result<Regex> {
    Regex::new(&format!(
        r#"^\s*field\(\s*({})\s*,\s*"(.*)"\s*\)"#,
        regex::escape(name)
    ))
    .context("invalid field pattern")
}
